//! The build scheduler and work dispatcher.
//!
//! Given the validated project DAG, expands every project into build steps
//! (per-file compile steps fanning out, one link/archive step fanning in),
//! then dispatches Ready steps onto a bounded pool of worker threads.  Each
//! worker owns exactly one blocking toolchain invocation at a time.  Failures
//! propagate to transitive dependents as Skipped while unrelated subtrees
//! keep building.

use crate::densemap::{self, DenseMap};
use crate::graph::{Dag, ProjectId};
use crate::logger::Logger;
use crate::process::Termination;
use crate::recompile::{self, StatCache};
use crate::session::BuildSession;
use crate::signal;
use crate::tool::{Tool, ToolOutcome, ToolSet};
use crate::trace;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(u32);

impl densemap::Index for StepId {
    fn index(&self) -> usize {
        self.0 as usize
    }
}
impl From<usize> for StepId {
    fn from(u: usize) -> StepId {
        StepId(u as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    /// A predecessor failed, so this step never ran.  Not an error itself,
    /// but reported as not-built.
    Skipped,
}

impl StepState {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            StepState::Succeeded | StepState::Failed | StepState::Skipped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Compile,
    Link,
}

/// The atomic unit of scheduled work: one tool invocation.
pub struct BuildStep {
    pub project: ProjectId,
    pub kind: StepKind,
    /// Index into the project's sources, for compile steps.
    pub source: Option<usize>,
    /// Steps that cannot become Ready until this one succeeds.
    dependents: Vec<StepId>,
    /// Predecessor steps whose outputs a fan-in step consumes.
    preds: Vec<StepId>,
}

/// Counts of steps per state, for the progress display and the summary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateCounts([usize; 6]);

impl StateCounts {
    fn idx(state: StepState) -> usize {
        match state {
            StepState::Pending => 0,
            StepState::Ready => 1,
            StepState::Running => 2,
            StepState::Succeeded => 3,
            StepState::Failed => 4,
            StepState::Skipped => 5,
        }
    }

    fn transition(&mut self, from: Option<StepState>, to: StepState) {
        if let Some(from) = from {
            self.0[StateCounts::idx(from)] -= 1;
        }
        self.0[StateCounts::idx(to)] += 1;
    }

    pub fn get(&self, state: StepState) -> usize {
        self.0[StateCounts::idx(state)]
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }
}

pub struct WorkOptions {
    pub parallelism: usize,
    pub stop_on_error: bool,
}

impl Default for WorkOptions {
    fn default() -> Self {
        WorkOptions {
            parallelism: std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1),
            stop_on_error: false,
        }
    }
}

struct ProjectPlan {
    tool: Arc<dyn Tool>,
    compile_steps: Vec<StepId>,
    link_step: StepId,
}

struct FinishedStep {
    id: StepId,
    /// Worker track used for perf trace output.
    tid: usize,
    span: (Instant, Instant),
    result: anyhow::Result<ToolOutcome>,
}

/// Tracks worker-track ids claimed by in-flight steps.
struct ThreadIds {
    slots: Vec<bool>,
}

impl ThreadIds {
    fn new() -> Self {
        ThreadIds { slots: Vec::new() }
    }

    fn claim(&mut self) -> usize {
        match self.slots.iter().position(|&used| !used) {
            Some(idx) => {
                self.slots[idx] = true;
                idx
            }
            None => {
                self.slots.push(true);
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, slot: usize) {
        self.slots[slot] = false;
    }
}

enum JobInput {
    Compile(crate::input_file::InputFile),
    Link(Vec<PathBuf>),
}

pub struct Work<'a> {
    dag: &'a Dag,
    session: Arc<BuildSession>,
    logger: Logger,
    options: WorkOptions,
    steps: DenseMap<StepId, BuildStep>,
    states: DenseMap<StepId, StepState>,
    wait_counts: DenseMap<StepId, usize>,
    produced: DenseMap<StepId, Vec<PathBuf>>,
    ready: VecDeque<StepId>,
    counts: StateCounts,
    plans: FxHashMap<ProjectId, ProjectPlan>,
    env_failed: Vec<ProjectId>,
    cache: StatCache,
    /// Steps that actually invoked a tool (skipped steps excluded).
    ran: usize,
}

impl<'a> Work<'a> {
    /// Validates the graph and expands the full step graph.  `totalBuilds`
    /// accounting happens here, before execution begins, so the progress
    /// denominator is stable.  Environment validation failures are recorded
    /// and turn into Skipped subtrees at run time.
    pub fn new(
        dag: &'a Dag,
        tools: &ToolSet,
        session: Arc<BuildSession>,
        logger: Logger,
        options: WorkOptions,
        targets: &[ProjectId],
    ) -> anyhow::Result<Work<'a>> {
        let order = dag.topo_order();
        let included = included_set(dag, targets);

        let mut work = Work {
            dag,
            session,
            logger,
            options,
            steps: DenseMap::default(),
            states: DenseMap::default(),
            wait_counts: DenseMap::default(),
            produced: DenseMap::default(),
            ready: VecDeque::new(),
            counts: StateCounts::default(),
            plans: FxHashMap::default(),
            env_failed: Vec::new(),
            cache: StatCache::new(),
            ran: 0,
        };

        for &pid in &order {
            if !included[pid] {
                continue;
            }
            let project = dag.project(pid);
            let tool = tools.get(&project.tool).ok_or_else(|| {
                anyhow::anyhow!("project {}: unknown tool {:?}", project.name, project.tool)
            })?;

            if let Err(err) = tool.setup_for_project(project) {
                work.logger
                    .error(format!("{}: {:#}", project.name, err));
                work.env_failed.push(pid);
            } else if dag.deps(pid).iter().any(|dep| work.env_failed.contains(dep)) {
                // Environment failures are known before anything runs, so
                // the whole dependent subtree is withheld, compile steps
                // included.  Topological order makes the membership check
                // transitive.
                work.env_failed.push(pid);
            }

            let mut compile_steps = Vec::new();
            for (idx, source) in project.sources.iter().enumerate() {
                if !tool
                    .input_extensions()
                    .iter()
                    .any(|ext| ext.as_str() == source.extension())
                {
                    work.logger.warn(format!(
                        "{}: no input of tool {:?} matches {}",
                        project.name,
                        tool.name(),
                        source.path().display()
                    ));
                    continue;
                }
                let id = work.add_step(BuildStep {
                    project: pid,
                    kind: StepKind::Compile,
                    source: Some(idx),
                    dependents: Vec::new(),
                    preds: Vec::new(),
                });
                compile_steps.push(id);
            }

            let link_step = work.add_step(BuildStep {
                project: pid,
                kind: StepKind::Link,
                source: None,
                dependents: Vec::new(),
                preds: Vec::new(),
            });

            // Fan-in: the link step waits on every sibling compile step and
            // on the fan-in step of every dependency project.  Compile steps
            // have no predecessors; they may overlap dependency builds.
            for &cid in &compile_steps {
                work.add_edge(cid, link_step);
            }
            for &dep in dag.deps(pid) {
                if let Some(dep_plan) = work.plans.get(&dep) {
                    let dep_link = dep_plan.link_step;
                    work.add_edge(dep_link, link_step);
                }
            }

            work.plans.insert(
                pid,
                ProjectPlan {
                    tool,
                    compile_steps,
                    link_step,
                },
            );
        }

        work.session.add_steps(work.steps.len());
        for id in work.steps.all_ids() {
            if work.wait_counts[id] == 0 {
                work.set_state(id, StepState::Ready);
                work.ready.push_back(id);
            }
        }
        Ok(work)
    }

    fn add_step(&mut self, step: BuildStep) -> StepId {
        let id = self.steps.push(step);
        self.states.push(StepState::Pending);
        self.wait_counts.push(0);
        self.produced.push(Vec::new());
        self.counts.transition(None, StepState::Pending);
        id
    }

    fn add_edge(&mut self, from: StepId, to: StepId) {
        self.steps[from].dependents.push(to);
        self.steps[to].preds.push(from);
        self.wait_counts[to] += 1;
    }

    fn set_state(&mut self, id: StepId, to: StepState) {
        let from = self.states[id];
        self.counts.transition(Some(from), to);
        self.states[id] = to;
        if to.is_terminal() {
            self.session.step_completed();
            self.logger.progress();
        }
    }

    /// Declared inputs and outputs of a step, for the incremental decision
    /// and for dispatch.
    fn step_io(&self, id: StepId) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let step = &self.steps[id];
        let project = self.dag.project(step.project);
        let plan = &self.plans[&step.project];
        match step.kind {
            StepKind::Compile => {
                let source = &project.sources[step.source.unwrap_or(0)];
                (
                    vec![source.path().to_path_buf()],
                    plan.tool.outputs(project, source),
                )
            }
            StepKind::Link => {
                let inputs = step
                    .preds
                    .iter()
                    .flat_map(|&pred| self.produced[pred].iter().cloned())
                    .collect();
                (inputs, plan.tool.group_outputs(project))
            }
        }
    }

    /// If the step's outputs are already up to date, moves it straight from
    /// Ready to Succeeded without invoking the tool.
    fn try_skip(&mut self, id: StepId) -> bool {
        let (inputs, outputs) = self.step_io(id);
        if !recompile::should_skip(&self.cache, &inputs, &outputs).unwrap_or(false) {
            return false;
        }
        self.logger.info(format!("up to date: {}", self.describe(id)));
        self.produced[id] = outputs;
        self.set_state(id, StepState::Succeeded);
        self.unblock_dependents(id);
        true
    }

    fn unblock_dependents(&mut self, id: StepId) {
        let dependents = self.steps[id].dependents.clone();
        for dep in dependents {
            self.wait_counts[dep] -= 1;
            if self.wait_counts[dep] == 0 && self.states[dep] == StepState::Pending {
                self.set_state(dep, StepState::Ready);
                self.ready.push_back(dep);
            }
        }
    }

    /// Marks every transitive dependent of a failed or skipped step as
    /// Skipped.  Dependents cannot be Running, since this step was one of
    /// their unfinished predecessors.
    fn skip_dependents(&mut self, id: StepId) {
        let dependents = self.steps[id].dependents.clone();
        for dep in dependents {
            if !self.states[dep].is_terminal() {
                self.set_state(dep, StepState::Skipped);
                self.skip_dependents(dep);
            }
        }
    }

    fn skip_project(&mut self, pid: ProjectId) {
        let plan_steps: Vec<StepId> = {
            let plan = &self.plans[&pid];
            plan.compile_steps
                .iter()
                .copied()
                .chain(std::iter::once(plan.link_step))
                .collect()
        };
        for id in plan_steps {
            if !self.states[id].is_terminal() {
                self.set_state(id, StepState::Skipped);
                self.skip_dependents(id);
            }
        }
    }

    fn describe(&self, id: StepId) -> String {
        let step = &self.steps[id];
        let project = self.dag.project(step.project);
        match step.kind {
            StepKind::Compile => {
                let source = &project.sources[step.source.unwrap_or(0)];
                format!("{}: {}", project.name, source.basename())
            }
            StepKind::Link => format!("{}: {}", project.name, project.output.display()),
        }
    }

    fn announce(&self, id: StepId) {
        let step = &self.steps[id];
        let project = self.dag.project(step.project);
        let plan = &self.plans[&step.project];
        match step.kind {
            StepKind::Compile => {
                let source = &project.sources[step.source.unwrap_or(0)];
                self.logger.build(format!(
                    "Compiling {} for {}",
                    source.basename(),
                    project.name
                ));
                if let Some(cmd) = plan.tool.command_line(project, source) {
                    self.logger.command(cmd);
                }
            }
            StepKind::Link => {
                self.logger
                    .link(format!("Linking {}", project.output.display()));
                let inputs: Vec<PathBuf> = step
                    .preds
                    .iter()
                    .flat_map(|&pred| self.produced[pred].iter().cloned())
                    .collect();
                if let Some(cmd) = plan.tool.group_command_line(project, &inputs) {
                    self.logger.command(cmd);
                }
            }
        }
    }

    fn prime_stat_cache(&self) {
        let mut paths = Vec::new();
        for (&pid, plan) in &self.plans {
            let project = self.dag.project(pid);
            for source in &project.sources {
                paths.push(source.path().to_path_buf());
                paths.extend(plan.tool.outputs(project, source));
            }
            paths.extend(plan.tool.group_outputs(project));
        }
        self.cache.prime(&paths);
    }

    fn on_finished(&mut self, finished: FinishedStep) {
        let desc = self.describe(finished.id);
        trace::task_span(&desc, finished.tid, finished.span);
        self.ran += 1;
        let failed = match finished.result {
            Ok(outcome) => {
                if !outcome.console.is_empty() {
                    self.logger
                        .raw(String::from_utf8_lossy(&outcome.console).into_owned());
                }
                match outcome.termination {
                    Termination::Success => {
                        for out in &outcome.outputs {
                            self.cache.invalidate(out);
                        }
                        self.produced[finished.id] = outcome.outputs;
                        self.set_state(finished.id, StepState::Succeeded);
                        self.unblock_dependents(finished.id);
                        false
                    }
                    Termination::Interrupted => {
                        self.session.cancel();
                        self.logger.error(format!("interrupted: {}", desc));
                        true
                    }
                    Termination::Failure => {
                        self.logger.error(format!("build failed: {}", desc));
                        true
                    }
                }
            }
            Err(err) => {
                self.logger.error(format!("{}: {:#}", desc, err));
                true
            }
        };
        if failed {
            self.set_state(finished.id, StepState::Failed);
            self.skip_dependents(finished.id);
            if self.options.stop_on_error {
                self.session.cancel();
            }
        }
    }

    /// Dispatches until every step is terminal or the run is cancelled.
    /// Returns None on failure, or the number of steps that actually
    /// invoked a tool.
    pub fn run(&mut self) -> anyhow::Result<Option<usize>> {
        self.prime_stat_cache();

        let env_failed = std::mem::take(&mut self.env_failed);
        for pid in env_failed {
            self.skip_project(pid);
        }

        let dag = self.dag;
        let parallelism = self.options.parallelism.max(1);

        std::thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<FinishedStep>();
            let mut running = 0usize;
            let mut tids = ThreadIds::new();
            let mut announced_cancel = false;
            loop {
                if signal::was_interrupted() {
                    self.session.cancel();
                }
                if self.session.is_cancelled() && running > 0 && !announced_cancel {
                    self.logger
                        .thread(format!("waiting for {} running steps to finish", running));
                    announced_cancel = true;
                }
                // Admit ready steps while the pool has free slots.
                while running < parallelism && !self.session.is_cancelled() {
                    let Some(id) = self.ready.pop_front() else {
                        break;
                    };
                    if self.states[id] != StepState::Ready {
                        continue;
                    }
                    if self.try_skip(id) {
                        continue;
                    }
                    self.announce(id);
                    let (inputs, _) = self.step_io(id);
                    let step = &self.steps[id];
                    let project = dag.project(step.project);
                    let tool = self.plans[&step.project].tool.clone();
                    let job = match step.kind {
                        StepKind::Compile => {
                            JobInput::Compile(project.sources[step.source.unwrap_or(0)].clone())
                        }
                        StepKind::Link => JobInput::Link(inputs),
                    };
                    self.set_state(id, StepState::Running);
                    let tid = tids.claim();
                    let tx = tx.clone();
                    scope.spawn(move || {
                        let start = Instant::now();
                        let result = match &job {
                            JobInput::Compile(input) => tool.run(project, input),
                            JobInput::Link(inputs) => tool.run_group(project, inputs),
                        };
                        // Send fails only if the control loop is gone.
                        let _ = tx.send(FinishedStep {
                            id,
                            tid,
                            span: (start, Instant::now()),
                            result,
                        });
                    });
                    running += 1;
                }

                if running == 0 {
                    break;
                }

                match rx.recv_timeout(Duration::from_millis(500)) {
                    Ok(finished) => {
                        tids.release(finished.tid);
                        running -= 1;
                        self.on_finished(finished);
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        // Poll the interrupt flag while steps run long.
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        // Whatever never became Ready (cancellation, or dependents of
        // failures that were still queued) is reported as Skipped, and
        // counts as completed so progress reaches its denominator.
        for id in self.steps.all_ids() {
            if !self.states[id].is_terminal() {
                self.set_state(id, StepState::Skipped);
            }
        }

        if self.session.failed() || self.session.is_cancelled() {
            Ok(None)
        } else {
            Ok(Some(self.ran))
        }
    }

    pub fn counts(&self) -> &StateCounts {
        &self.counts
    }

    /// Step states for one project: (compile states, link state).
    /// Test and reporting helper.
    pub fn project_states(&self, name: &str) -> Option<(Vec<StepState>, StepState)> {
        let pid = self.dag.lookup(name)?;
        let plan = self.plans.get(&pid)?;
        let compiles = plan
            .compile_steps
            .iter()
            .map(|&id| self.states[id])
            .collect();
        Some((compiles, self.states[plan.link_step]))
    }
}

fn included_set(dag: &Dag, targets: &[ProjectId]) -> DenseMap<ProjectId, bool> {
    if targets.is_empty() {
        return DenseMap::new_sized(dag.len(), true);
    }
    let mut included = DenseMap::new_sized(dag.len(), false);
    let mut stack: Vec<ProjectId> = targets.to_vec();
    while let Some(pid) = stack.pop() {
        if included[pid] {
            continue;
        }
        included[pid] = true;
        stack.extend_from_slice(dag.deps(pid));
    }
    included
}
