//! Parsing of the build manifest into a project graph and tool set.
//!
//! The manifest is line oriented.  Top level entries are `builddir = path`
//! and `tool`/`project` blocks whose properties follow on indented lines:
//!
//! ```text
//! builddir = out
//!
//! tool cc
//!   compile = gcc -c $in -o $out
//!   link = ar rcs $out $in
//!   src = .c .s
//!   obj = .o
//!
//! project util
//!   type = static
//!   tool = cc
//!   source = src/util.c
//!
//! project hello
//!   type = application
//!   tool = cc
//!   deps = util
//!   source = src/main.c
//! ```

use crate::graph::{Dag, Project, ProjectType};
use crate::input_file::InputFile;
use crate::ordered_set::OrderedSet;
use crate::scanner::{ParseResult, Scanner};
use crate::tool::{ScriptTool, ToolSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a run needs, produced from one manifest.
pub struct Plan {
    pub dag: Dag,
    pub tools: ToolSet,
    pub builddir: PathBuf,
}

#[derive(Default)]
struct ToolDecl {
    name: String,
    compile: Option<String>,
    link: Option<String>,
    src_exts: Vec<String>,
    obj_ext: Option<String>,
}

#[derive(Default)]
struct ProjectDecl {
    name: String,
    project_type: Option<ProjectType>,
    tool: Option<String>,
    deps: Vec<String>,
    sources: Vec<String>,
}

#[derive(Default)]
struct ManifestFile {
    builddir: Option<String>,
    tools: Vec<ToolDecl>,
    projects: Vec<ProjectDecl>,
}

pub fn load(path: &Path) -> anyhow::Result<Plan> {
    let mut bytes = std::fs::read(path)
        .map_err(|err| anyhow::anyhow!("read {}: {}", path.display(), err))?;
    bytes.push(0);
    parse(path, &bytes)
}

/// Parses a nul-terminated manifest buffer.  Split from `load` so tests can
/// feed strings directly.
pub fn parse(path: &Path, bytes: &[u8]) -> anyhow::Result<Plan> {
    let mut parser = Parser {
        scanner: Scanner::new(bytes),
    };
    let file = match parser.read_file() {
        Ok(file) => file,
        Err(err) => anyhow::bail!("{}", parser.scanner.format_parse_error(path, err)),
    };
    build_plan(file)
}

struct Parser<'a> {
    scanner: Scanner<'a>,
}

impl<'a> Parser<'a> {
    fn read_file(&mut self) -> ParseResult<ManifestFile> {
        let mut file = ManifestFile::default();
        loop {
            match self.scanner.peek() {
                '\0' => return Ok(file),
                '\n' | '\r' => self.scanner.next(),
                '#' => self.skip_comment(),
                ' ' => return self.scanner.parse_error("unexpected indent"),
                _ => {
                    let ident = self.scanner.read_ident()?;
                    self.scanner.skip_spaces();
                    match ident {
                        "builddir" => {
                            self.scanner.expect('=')?;
                            self.scanner.skip_spaces();
                            file.builddir = Some(self.scanner.read_rest_of_line().to_owned());
                        }
                        "tool" => file.tools.push(self.read_tool()?),
                        "project" => file.projects.push(self.read_project()?),
                        ident => {
                            self.scanner.back();
                            return self
                                .scanner
                                .parse_error(format!("unexpected keyword {:?}", ident));
                        }
                    }
                }
            }
        }
    }

    fn skip_comment(&mut self) {
        while self.scanner.peek() != '\n' && self.scanner.peek() != '\0' {
            self.scanner.next();
        }
    }

    fn read_tool(&mut self) -> ParseResult<ToolDecl> {
        let mut tool = ToolDecl {
            name: self.scanner.read_ident()?.to_owned(),
            ..ToolDecl::default()
        };
        self.end_of_line()?;
        while let Some((key, value)) = self.read_property()? {
            match key {
                "compile" => tool.compile = Some(value.to_owned()),
                "link" => tool.link = Some(value.to_owned()),
                "src" => {
                    tool.src_exts = value
                        .split_whitespace()
                        .map(|ext| ext.trim_start_matches('.').to_owned())
                        .collect();
                }
                "obj" => tool.obj_ext = Some(value.to_owned()),
                _ => {
                    return self
                        .scanner
                        .parse_error(format!("unknown tool property {:?}", key))
                }
            }
        }
        Ok(tool)
    }

    fn read_project(&mut self) -> ParseResult<ProjectDecl> {
        let mut project = ProjectDecl {
            name: self.scanner.read_ident()?.to_owned(),
            ..ProjectDecl::default()
        };
        self.end_of_line()?;
        while let Some((key, value)) = self.read_property()? {
            match key {
                "type" => {
                    project.project_type = Some(match value {
                        "application" => ProjectType::Application,
                        "static" => ProjectType::StaticLibrary,
                        "shared" => ProjectType::SharedLibrary,
                        _ => {
                            return self
                                .scanner
                                .parse_error(format!("unknown project type {:?}", value))
                        }
                    })
                }
                "tool" => project.tool = Some(value.to_owned()),
                "deps" => project
                    .deps
                    .extend(value.split_whitespace().map(str::to_owned)),
                "source" => project.sources.push(value.to_owned()),
                _ => {
                    return self
                        .scanner
                        .parse_error(format!("unknown project property {:?}", key))
                }
            }
        }
        Ok(project)
    }

    /// Reads one indented `key = value` line, or None at the end of the
    /// block.  Blank lines inside a block are allowed.
    fn read_property(&mut self) -> ParseResult<Option<(&'a str, &'a str)>> {
        loop {
            match self.scanner.peek() {
                ' ' => {
                    self.scanner.skip_spaces();
                    // An indented blank line still ends in a newline.
                    if self.scanner.peek() == '\n' || self.scanner.peek() == '\r' {
                        continue;
                    }
                    let key = self.scanner.read_ident()?;
                    self.scanner.skip_spaces();
                    self.scanner.expect('=')?;
                    self.scanner.skip_spaces();
                    let value = self.scanner.read_rest_of_line();
                    self.end_of_line()?;
                    return Ok(Some((key, value)));
                }
                '\n' | '\r' => {
                    // Could be a blank separator or the end of the block;
                    // peek past it without committing.
                    self.scanner.next();
                    if self.scanner.peek() != ' ' {
                        return Ok(None);
                    }
                }
                _ => return Ok(None),
            }
        }
    }

    fn end_of_line(&mut self) -> ParseResult<()> {
        self.scanner.skip_spaces();
        self.scanner.skip('\r');
        match self.scanner.peek() {
            '\0' => Ok(()),
            '\n' => {
                self.scanner.next();
                Ok(())
            }
            _ => self.scanner.parse_error("expected end of line"),
        }
    }
}

fn build_plan(file: ManifestFile) -> anyhow::Result<Plan> {
    let builddir = PathBuf::from(file.builddir.unwrap_or_else(|| "out".to_owned()));

    let mut tools = ToolSet::new();
    let mut tool_names = Vec::new();
    for decl in file.tools {
        if tool_names.contains(&decl.name) {
            anyhow::bail!("duplicate tool {:?}", decl.name);
        }
        let compile = decl
            .compile
            .ok_or_else(|| anyhow::anyhow!("tool {:?}: missing compile command", decl.name))?;
        let link = decl
            .link
            .ok_or_else(|| anyhow::anyhow!("tool {:?}: missing link command", decl.name))?;
        if decl.src_exts.is_empty() {
            anyhow::bail!("tool {:?}: missing src extensions", decl.name);
        }
        let obj_ext = decl
            .obj_ext
            .ok_or_else(|| anyhow::anyhow!("tool {:?}: missing obj extension", decl.name))?;
        tool_names.push(decl.name.clone());
        tools.register(Arc::new(ScriptTool::new(
            decl.name,
            compile,
            link,
            decl.src_exts,
            obj_ext,
        )));
    }

    let mut dag = Dag::new();
    for decl in &file.projects {
        let tool = decl
            .tool
            .clone()
            .ok_or_else(|| anyhow::anyhow!("project {:?}: missing tool", decl.name))?;
        let project_type = decl
            .project_type
            .ok_or_else(|| anyhow::anyhow!("project {:?}: missing type", decl.name))?;
        if decl.sources.is_empty() {
            anyhow::bail!("project {:?}: no sources", decl.name);
        }
        let sources = decl
            .sources
            .iter()
            .map(|src| InputFile::new(PathBuf::from(src)))
            .collect();
        dag.insert(Project {
            name: decl.name.clone(),
            project_type,
            tool,
            sources,
            int_dir: builddir.join("obj").join(&decl.name),
            output: builddir.join(output_name(&decl.name, project_type)),
        })?;
    }
    for decl in &file.projects {
        // A dependency listed more than once still produces one edge, in
        // first-mention order.
        let deps: OrderedSet<&String> = decl.deps.iter().collect();
        for dep in deps.iter() {
            dag.add_dependency(&decl.name, dep)?;
        }
    }

    Ok(Plan {
        dag,
        tools,
        builddir,
    })
}

#[cfg(unix)]
fn output_name(name: &str, project_type: ProjectType) -> String {
    match project_type {
        ProjectType::Application => name.to_owned(),
        ProjectType::StaticLibrary => format!("lib{}.a", name),
        ProjectType::SharedLibrary => format!("lib{}.so", name),
    }
}

#[cfg(windows)]
fn output_name(name: &str, project_type: ProjectType) -> String {
    match project_type {
        ProjectType::Application => format!("{}.exe", name),
        ProjectType::StaticLibrary => format!("{}.lib", name),
        ProjectType::SharedLibrary => format!("{}.dll", name),
    }
}
