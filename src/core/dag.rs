//! Task DAG (Directed Acyclic Graph) for dependency management.
//!
//! Nodes are plan tasks and an edge `a -> b` means `b` cannot start before
//! `a` finishes. The DAG is assembled unchecked from planner output so that
//! leveling can report cycles instead of refusing the input outright.

use crate::core::task::{AgentTask, TaskDependency, TaskId};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Result of topological leveling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Leveling {
    /// Levels in execution order.
    pub groups: Vec<Vec<TaskId>>,
    /// Tasks left over when leveling stalled on a cycle, in plan order.
    pub unscheduled: Vec<TaskId>,
}

impl Leveling {
    pub fn is_complete(&self) -> bool {
        self.unscheduled.is_empty()
    }

    pub fn task_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

/// The task dependency graph.
pub struct TaskDAG {
    graph: DiGraph<AgentTask, ()>,
    task_index: HashMap<TaskId, NodeIndex>,
}

impl TaskDAG {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            task_index: HashMap::new(),
        }
    }

    /// Build a DAG from planner output without rejecting cycles.
    ///
    /// Edges naming unknown tasks are ignored, as are duplicate edges.
    /// Each task's own `dependencies` set contributes edges as well.
    pub fn from_parts(tasks: &[AgentTask], deps: &[TaskDependency]) -> Self {
        let mut dag = Self::new();
        for task in tasks {
            dag.add_task(task.clone());
        }

        let implied = tasks.iter().flat_map(|task| {
            task.dependencies
                .iter()
                .map(move |dep| TaskDependency::new(task.id, *dep))
        });

        for edge in deps.iter().copied().chain(implied) {
            let (Some(&from), Some(&to)) = (
                dag.task_index.get(&edge.depends_on),
                dag.task_index.get(&edge.task_id),
            ) else {
                continue;
            };
            if dag.graph.find_edge(from, to).is_none() {
                dag.graph.add_edge(from, to, ());
            }
        }
        dag
    }

    /// Add a task. Returns the existing index if the id is already present.
    pub fn add_task(&mut self, task: AgentTask) -> NodeIndex {
        if let Some(&index) = self.task_index.get(&task.id) {
            return index;
        }

        let id = task.id;
        let index = self.graph.add_node(task);
        self.task_index.insert(id, index);
        index
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Split the graph into topological levels.
    ///
    /// Each round collects every unscheduled task whose dependencies are all
    /// in earlier rounds. Inside a level, higher priority comes first and
    /// ties keep insertion order. A round that schedules nothing means the
    /// rest of the graph sits on or behind a cycle; leveling stops there.
    pub fn levels(&self) -> Leveling {
        let mut scheduled: HashSet<NodeIndex> = HashSet::new();
        let mut groups = Vec::new();

        while scheduled.len() < self.graph.node_count() {
            let mut level: Vec<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|index| !scheduled.contains(index))
                .filter(|&index| {
                    self.graph
                        .neighbors_directed(index, Direction::Incoming)
                        .all(|dep| scheduled.contains(&dep))
                })
                .collect();

            if level.is_empty() {
                break;
            }

            level.sort_by_key(|&index| (-self.graph[index].priority, index.index()));
            scheduled.extend(level.iter().copied());
            groups.push(level.into_iter().map(|i| self.graph[i].id).collect());
        }

        let unscheduled = self
            .graph
            .node_indices()
            .filter(|index| !scheduled.contains(index))
            .map(|index| self.graph[index].id)
            .collect();

        Leveling { groups, unscheduled }
    }

    /// Tasks that sit on a dependency cycle (self-loops included), in plan
    /// order. Tasks merely waiting behind a cycle are not members.
    pub fn cycle_members(&self) -> Vec<TaskId> {
        let mut members: Vec<NodeIndex> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&n| self.graph.find_edge(n, n).is_some())
            })
            .flatten()
            .collect();
        members.sort_by_key(|n| n.index());
        members.into_iter().map(|n| self.graph[n].id).collect()
    }
}

impl Default for TaskDAG {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskDAG {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDAG")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
