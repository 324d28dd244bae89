//! The contract between the scheduler and pluggable toolchain adapters.
//!
//! A tool is invoked either per input file (compile/assemble) or once over a
//! group of prior outputs (link/archive).  The scheduler only depends on this
//! trait; concrete toolchains live behind it.

use crate::graph::Project;
use crate::input_file::InputFile;
use crate::process::{self, Termination};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of one tool invocation.
pub struct ToolOutcome {
    pub termination: Termination,
    /// Captured console output, interleaved stdout/stderr.
    pub console: Vec<u8>,
    /// Files the invocation produced, available to dependent steps.
    pub outputs: Vec<PathBuf>,
}

impl ToolOutcome {
    pub fn succeeded(&self) -> bool {
        self.termination == Termination::Success
    }
}

pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// File extensions this tool accepts as per-file inputs, without dots.
    fn input_extensions(&self) -> &[String];

    /// Called once per (tool, project) pair before any of the project's
    /// steps are admitted.  Validates required environment; failure is fatal
    /// for the project's subtree.
    fn setup_for_project(&self, project: &Project) -> anyhow::Result<()>;

    /// Outputs a per-file invocation is declared to produce.  Used for the
    /// incremental decision before the tool ever runs.
    fn outputs(&self, project: &Project, input: &InputFile) -> Vec<PathBuf>;

    /// Outputs of the fan-in invocation.
    fn group_outputs(&self, project: &Project) -> Vec<PathBuf>;

    /// Builds a single input.  Must be callable concurrently for different
    /// inputs of the same project.  Err means the invocation itself broke;
    /// a failing command is a normal outcome with a non-success termination.
    fn run(&self, project: &Project, input: &InputFile) -> anyhow::Result<ToolOutcome>;

    /// Builds the fan-in step over a group of prior outputs.
    fn run_group(&self, project: &Project, inputs: &[PathBuf]) -> anyhow::Result<ToolOutcome>;

    /// Full command line for display with --show-commands, if there is one.
    fn command_line(&self, _project: &Project, _input: &InputFile) -> Option<String> {
        None
    }

    fn group_command_line(&self, _project: &Project, _inputs: &[PathBuf]) -> Option<String> {
        None
    }
}

/// The tools available to a run, keyed by name.
#[derive(Default)]
pub struct ToolSet {
    map: FxHashMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> ToolSet {
        ToolSet::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.map.insert(tool.name().to_owned(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.map.get(name).cloned()
    }
}

/// A tool described by command templates, as declared in the manifest.
/// `$in`, `$out`, and `$project` are substituted per invocation.
pub struct ScriptTool {
    name: String,
    compile: String,
    link: String,
    input_exts: Vec<String>,
    obj_ext: String,
}

impl ScriptTool {
    pub fn new(
        name: String,
        compile: String,
        link: String,
        input_exts: Vec<String>,
        obj_ext: String,
    ) -> ScriptTool {
        ScriptTool {
            name,
            compile,
            link,
            input_exts,
            obj_ext,
        }
    }

    fn object_path(&self, project: &Project, input: &InputFile) -> PathBuf {
        input.intermediate_path(&project.int_dir, &self.obj_ext)
    }
}

impl Tool for ScriptTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_extensions(&self) -> &[String] {
        &self.input_exts
    }

    fn setup_for_project(&self, project: &Project) -> anyhow::Result<()> {
        for template in [&self.compile, &self.link] {
            let program = template.split_whitespace().next().unwrap_or("");
            if program.is_empty() {
                anyhow::bail!("tool {}: empty command template", self.name);
            }
            if !program_exists(program) {
                anyhow::bail!(
                    "tool {}: program {:?} not found (required by project {})",
                    self.name,
                    program,
                    project.name
                );
            }
        }
        Ok(())
    }

    fn outputs(&self, project: &Project, input: &InputFile) -> Vec<PathBuf> {
        vec![self.object_path(project, input)]
    }

    fn group_outputs(&self, project: &Project) -> Vec<PathBuf> {
        vec![project.output.clone()]
    }

    fn run(&self, project: &Project, input: &InputFile) -> anyhow::Result<ToolOutcome> {
        let out = self.object_path(project, input);
        ensure_parent(&out)?;
        let cmdline = expand(&self.compile, &[input.path().to_path_buf()], &out, project);
        let result = process::run_command(&cmdline)?;
        Ok(ToolOutcome {
            termination: result.termination,
            console: result.output,
            outputs: vec![out],
        })
    }

    fn run_group(&self, project: &Project, inputs: &[PathBuf]) -> anyhow::Result<ToolOutcome> {
        let out = project.output.clone();
        ensure_parent(&out)?;
        let cmdline = expand(&self.link, inputs, &out, project);
        let result = process::run_command(&cmdline)?;
        Ok(ToolOutcome {
            termination: result.termination,
            console: result.output,
            outputs: vec![out],
        })
    }

    fn command_line(&self, project: &Project, input: &InputFile) -> Option<String> {
        let out = self.object_path(project, input);
        Some(expand(
            &self.compile,
            &[input.path().to_path_buf()],
            &out,
            project,
        ))
    }

    fn group_command_line(&self, project: &Project, inputs: &[PathBuf]) -> Option<String> {
        Some(expand(&self.link, inputs, &project.output, project))
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Substitutes `$in`, `$out`, and `$project` in a command template.
/// `$$` yields a literal dollar sign.
pub fn expand(template: &str, inputs: &[PathBuf], output: &Path, project: &Project) -> String {
    let in_list = inputs
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let mut result = String::with_capacity(template.len() + in_list.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(stripped) = after.strip_prefix('$') {
            result.push('$');
            rest = stripped;
        } else if let Some(stripped) = strip_token(after, "project") {
            result.push_str(&project.name);
            rest = stripped;
        } else if let Some(stripped) = strip_token(after, "out") {
            result.push_str(&output.to_string_lossy());
            rest = stripped;
        } else if let Some(stripped) = strip_token(after, "in") {
            result.push_str(&in_list);
            rest = stripped;
        } else {
            result.push('$');
            rest = after;
        }
    }
    result.push_str(rest);
    result
}

/// A token only matches up to an identifier boundary, so `$input` stays
/// literal rather than expanding as `$in` + `put`.
fn strip_token<'a>(s: &'a str, token: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(token)?;
    match rest.bytes().next() {
        Some(b) if b.is_ascii_alphanumeric() || b == b'_' => None,
        _ => Some(rest),
    }
}

fn program_exists(program: &str) -> bool {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.exists();
    }
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return true;
        }
        if cfg!(windows) {
            return candidate.with_extension("exe").is_file();
        }
        false
    })
}
