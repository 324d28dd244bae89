//! Command line entry point.

use crate::graph::ProjectId;
use crate::logger::Logger;
use crate::session::{BuildSession, Verbosity};
use crate::{manifest, signal, terminal, trace, work};
use anyhow::anyhow;
use std::path::Path;
use std::sync::Arc;

#[derive(argh::FromArgs)]
/// parallel cross-toolchain build orchestrator
struct Args {
    /// chdir before running
    #[argh(option, short = 'C')]
    chdir: Option<String>,

    /// build manifest to load [default=build.girder]
    #[argh(option, short = 'f', default = "String::from(\"build.girder\")")]
    file: String,

    /// parallelism [default from system]
    #[argh(option, short = 'j')]
    jobs: Option<usize>,

    /// also print informational messages
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// only print warnings and errors
    #[argh(switch, short = 'q')]
    quiet: bool,

    /// print nothing at all
    #[argh(switch)]
    mute: bool,

    /// echo full tool command lines
    #[argh(switch)]
    show_commands: bool,

    /// stop admitting new steps after the first failure
    #[argh(switch)]
    stop_on_error: bool,

    /// write a chrome trace of the run to FILE
    #[argh(option, arg_name = "FILE")]
    trace: Option<String>,

    /// projects to build [default: all]
    #[argh(positional)]
    targets: Vec<String>,
}

impl Args {
    fn verbosity(&self) -> Verbosity {
        if self.mute {
            Verbosity::Mute
        } else if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

fn build(
    args: &Args,
    session: &Arc<BuildSession>,
    logger: &Logger,
) -> anyhow::Result<Option<usize>> {
    let plan = trace::scope("manifest::load", || {
        manifest::load(Path::new(&args.file))
    })?;

    let mut targets: Vec<ProjectId> = Vec::new();
    for name in &args.targets {
        targets.push(
            plan.dag
                .lookup(name)
                .ok_or_else(|| anyhow!("unknown project {:?}", name))?,
        );
    }

    let mut options = work::WorkOptions::default();
    if let Some(jobs) = args.jobs {
        options.parallelism = jobs.max(1);
    }
    options.stop_on_error = args.stop_on_error;

    let mut work = work::Work::new(
        &plan.dag,
        &plan.tools,
        session.clone(),
        logger.clone(),
        options,
        &targets,
    )?;
    trace::scope("work.run", || work.run())
}

/// Echoes the accumulated warning and error lists at the end of the run,
/// the way a long scrolled-away failure wants to be found again.
fn recap(session: &BuildSession, logger: &Logger) {
    let warnings = session.warnings();
    let errors = session.errors();
    if warnings.is_empty() && errors.is_empty() {
        return;
    }
    logger.info(format!(
        "{} warning(s), {} error(s)",
        warnings.len(),
        errors.len()
    ));
    for warning in warnings {
        logger.warn_no_push(warning);
    }
    for error in errors {
        logger.error_no_push(error);
    }
}

fn run_impl(args: &Args) -> anyhow::Result<i32> {
    if let Some(dir) = &args.chdir {
        let dir = Path::new(dir);
        std::env::set_current_dir(dir).map_err(|err| anyhow!("chdir {:?}: {}", dir, err))?;
    }
    if let Some(path) = &args.trace {
        trace::open(path)?;
    }

    let session = Arc::new(BuildSession::new(args.verbosity(), args.show_commands));
    signal::register();
    let (logger, sink) = Logger::start(session.clone(), terminal::is_smart());

    let outcome = match build(args, &session, &logger) {
        Ok(outcome) => outcome,
        Err(err) => {
            logger.error(format!("{:#}", err));
            None
        }
    };
    recap(&session, &logger);
    sink.finish();

    // The status line prints even in quiet mode; only --mute silences it.
    if session.verbosity < Verbosity::Mute {
        match outcome {
            Some(0) => println!("girder: no work to do"),
            Some(n) => println!("girder: ran {} steps, now up to date", n),
            None => {}
        }
    }

    if signal::was_interrupted() {
        return Ok(130);
    }
    Ok(if outcome.is_some() { 0 } else { 1 })
}

pub fn run() -> i32 {
    let args: Args = argh::from_env();
    let result = run_impl(&args);
    let _ = trace::close();
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("girder: {:#}", err);
            1
        }
    }
}
