//! The project dependency graph.
//!
//! Projects are inserted during configuration, edges are validated eagerly,
//! and the graph is frozen (read-only) once scheduling starts.  Structural
//! violations are configuration errors raised before any build step runs.

use crate::densemap::{self, DenseMap};
use crate::input_file::InputFile;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectId(u32);

impl densemap::Index for ProjectId {
    fn index(&self) -> usize {
        self.0 as usize
    }
}
impl From<usize> for ProjectId {
    fn from(u: usize) -> ProjectId {
        ProjectId(u as u32)
    }
}

/// What kind of output a project produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Application,
    StaticLibrary,
    SharedLibrary,
}

/// A unit of build output: one application or library, with the tool that
/// builds it and the source files feeding it.  Frozen before scheduling.
#[derive(Debug)]
pub struct Project {
    pub name: String,
    pub project_type: ProjectType,
    /// Name of the tool that builds this project's files.
    pub tool: String,
    pub sources: Vec<InputFile>,
    /// Flattened directory for per-file intermediate outputs.
    pub int_dir: PathBuf,
    /// Final output path of the fan-in (link/archive) step.
    pub output: PathBuf,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("duplicate project in dependency graph: {0}")]
    DuplicateProject(String),
    #[error("unknown project: {0}")]
    UnknownProject(String),
    #[error("dependency cycle: {from} -> {to} would close a loop")]
    Cycle { from: String, to: String },
}

/// Directed acyclic graph of projects.  Owns the nodes and the edges; the
/// scheduler only ever borrows it.
#[derive(Default)]
pub struct Dag {
    projects: DenseMap<ProjectId, Project>,
    deps: DenseMap<ProjectId, Vec<ProjectId>>,
    by_name: FxHashMap<String, ProjectId>,
}

impl Dag {
    pub fn new() -> Dag {
        Dag::default()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Adds a project with no dependencies.  The name must be unique.
    pub fn insert(&mut self, project: Project) -> Result<ProjectId, GraphError> {
        if self.by_name.contains_key(&project.name) {
            return Err(GraphError::DuplicateProject(project.name));
        }
        let name = project.name.clone();
        let id = self.projects.push(project);
        self.deps.push(Vec::new());
        self.by_name.insert(name, id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<ProjectId> {
        self.by_name.get(name).copied()
    }

    pub fn project(&self, id: ProjectId) -> &Project {
        &self.projects[id]
    }

    pub fn deps(&self, id: ProjectId) -> &[ProjectId] {
        &self.deps[id]
    }

    pub fn all_ids(&self) -> impl Iterator<Item = ProjectId> {
        self.projects.all_ids()
    }

    /// Registers `from` as depending on `to`.  Rejects edges to or from
    /// unknown projects and edges that would close a cycle; on error the
    /// graph is left unchanged.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let from_id = self
            .lookup(from)
            .ok_or_else(|| GraphError::UnknownProject(from.to_owned()))?;
        let to_id = self
            .lookup(to)
            .ok_or_else(|| GraphError::UnknownProject(to.to_owned()))?;
        // An edge from->to creates a cycle iff from is already reachable
        // from to (this also catches self-edges).
        if from_id == to_id || self.reachable(to_id, from_id) {
            return Err(GraphError::Cycle {
                from: from.to_owned(),
                to: to.to_owned(),
            });
        }
        if !self.deps[from_id].contains(&to_id) {
            self.deps[from_id].push(to_id);
        }
        Ok(())
    }

    fn reachable(&self, start: ProjectId, needle: ProjectId) -> bool {
        let mut stack = vec![start];
        let mut seen = DenseMap::<ProjectId, bool>::new_sized(self.projects.len(), false);
        while let Some(id) = stack.pop() {
            if id == needle {
                return true;
            }
            if seen[id] {
                continue;
            }
            seen[id] = true;
            stack.extend_from_slice(&self.deps[id]);
        }
        false
    }

    /// Produces every project exactly once, each after all of its
    /// dependencies.  Ties among independent projects break by insertion
    /// order, so the plan is deterministic.
    pub fn topo_order(&self) -> Vec<ProjectId> {
        let mut indegree = DenseMap::<ProjectId, usize>::new_sized(self.projects.len(), 0);
        for id in self.projects.all_ids() {
            for _ in &self.deps[id] {
                indegree[id] += 1;
            }
        }
        let mut order = Vec::with_capacity(self.projects.len());
        let mut queue: std::collections::VecDeque<ProjectId> = self
            .projects
            .all_ids()
            .filter(|&id| indegree[id] == 0)
            .collect();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for other in self.projects.all_ids() {
                if self.deps[other].contains(&id) {
                    indegree[other] -= 1;
                    if indegree[other] == 0 {
                        queue.push_back(other);
                    }
                }
            }
        }
        debug_assert_eq!(order.len(), self.projects.len());
        order
    }
}
