use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use crate::action::Action;
use crate::error::GraphError;

/// Per-action scheduling state derived from the flat action list. Owned by
/// an executor for the duration of one run.
#[derive(Debug, Clone)]
pub struct ScheduledAction {
    /// Indices of actions this one depends on.
    pub dependencies: Vec<usize>,

    /// Indices of actions that depend on this one.
    pub dependents: Vec<usize>,

    /// Unresolved dependency count. Reaches zero exactly once, when every
    /// dependency has completed with exit code 0.
    pub pending_deps: usize,

    /// Number of distinct actions that transitively depend on this one.
    pub total_dependents: usize,
}

/// Dependency graph over a flat action list, linked through produced-file
/// to prerequisite-file matching.
#[derive(Debug, Clone)]
pub struct ActionGraph {
    nodes: Vec<ScheduledAction>,
}

impl ActionGraph {
    /// Link actions into a DAG.
    ///
    /// Every produced file maps to its producing action; prerequisites are
    /// resolved through that map, and prerequisites nobody produces are
    /// treated as externally satisfied source files. Two actions claiming
    /// the same output resolve last-wins, with a warning naming both.
    pub fn build(actions: &[Action]) -> Result<Self, GraphError> {
        let mut producers: HashMap<&PathBuf, usize> = HashMap::new();
        for (index, action) in actions.iter().enumerate() {
            for item in &action.produced {
                if let Some(previous) = producers.insert(item, index) {
                    tracing::warn!(
                        item = %item.display(),
                        first = %actions[previous],
                        second = %action,
                        "produced item claimed by multiple actions; later action wins"
                    );
                }
            }
        }

        let mut dependency_sets: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); actions.len()];
        for (index, action) in actions.iter().enumerate() {
            for item in &action.prerequisites {
                if let Some(&producer) = producers.get(item) {
                    if producer != index {
                        dependency_sets[index].insert(producer);
                    }
                }
            }
        }

        let mut nodes: Vec<ScheduledAction> = dependency_sets
            .iter()
            .map(|deps| ScheduledAction {
                dependencies: deps.iter().copied().collect(),
                dependents: Vec::new(),
                pending_deps: deps.len(),
                total_dependents: 0,
            })
            .collect();

        for index in 0..nodes.len() {
            for dep in dependency_sets[index].iter().copied().collect::<Vec<_>>() {
                nodes[dep].dependents.push(index);
            }
        }

        let order = topological_order(&nodes).map_err(|cyclic| {
            GraphError::CyclicDependencies(describe_cycle(actions, &nodes, &cyclic))
        })?;

        compute_total_dependents(&mut nodes, &order);

        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &ScheduledAction {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut ScheduledAction {
        &mut self.nodes[index]
    }

    pub fn nodes(&self) -> &[ScheduledAction] {
        &self.nodes
    }

    /// Indices of actions with no unresolved dependencies, in input order.
    pub fn ready(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.pending_deps == 0)
            .map(|(index, _)| index)
            .collect()
    }

    /// Sort a ready queue so the actions that unblock the most future work
    /// dispatch first: descending transitive dependent count, then
    /// descending prerequisite count, then input order (stable).
    pub fn sort_by_priority(&self, actions: &[Action], queue: &mut [usize]) {
        queue.sort_by_key(|&index| {
            (
                Reverse(self.nodes[index].total_dependents),
                Reverse(actions[index].prerequisites.len()),
                index,
            )
        });
    }
}

/// Kahn's algorithm over the dependency edges. Returns indices in an order
/// where every action precedes its dependents, or the set of actions caught
/// in cycles.
fn topological_order(nodes: &[ScheduledAction]) -> Result<Vec<usize>, Vec<usize>> {
    let mut pending: Vec<usize> = nodes.iter().map(|n| n.pending_deps).collect();
    let mut frontier: Vec<usize> = (0..nodes.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(index) = frontier.pop() {
        order.push(index);
        for &dependent in &nodes[index].dependents {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                frontier.push(dependent);
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        let placed: HashSet<usize> = order.into_iter().collect();
        Err((0..nodes.len()).filter(|i| !placed.contains(i)).collect())
    }
}

/// Single memoized pass in reverse topological order: each node's reachable
/// dependent set is the union of its direct dependents and their sets.
fn compute_total_dependents(nodes: &mut [ScheduledAction], order: &[usize]) {
    let mut reachable: Vec<HashSet<usize>> = vec![HashSet::new(); nodes.len()];
    for &index in order.iter().rev() {
        let mut set = HashSet::new();
        for &dependent in &nodes[index].dependents {
            set.insert(dependent);
            set.extend(reachable[dependent].iter().copied());
        }
        nodes[index].total_dependents = set.len();
        reachable[index] = set;
    }
}

fn describe_cycle(actions: &[Action], nodes: &[ScheduledAction], cyclic: &[usize]) -> String {
    let cyclic_set: HashSet<usize> = cyclic.iter().copied().collect();
    let mut description = String::new();
    for &index in cyclic {
        description.push_str(&format!("action #{}: {}\n", index, actions[index]));
        for &dep in &nodes[index].dependencies {
            if cyclic_set.contains(&dep) {
                description.push_str(&format!("\tdepends on cyclic action #{}\n", dep));
            }
        }
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use pretty_assertions::assert_eq;

    fn action(produced: &[&str], prerequisites: &[&str]) -> Action {
        let mut a = Action::new(ActionKind::Compile, "/bin/true", "/tmp");
        a.produced = produced.iter().map(PathBuf::from).collect();
        a.prerequisites = prerequisites.iter().map(PathBuf::from).collect();
        a
    }

    /// A (no deps), B->A, C->A, D->{B,C}, E (no deps).
    fn diamond() -> Vec<Action> {
        vec![
            action(&["a.o"], &["a.c"]),
            action(&["b.o"], &["a.o"]),
            action(&["c.o"], &["a.o"]),
            action(&["d.bin"], &["b.o", "c.o"]),
            action(&["e.o"], &["e.c"]),
        ]
    }

    #[test]
    fn links_producers_to_consumers() {
        let graph = ActionGraph::build(&diamond()).unwrap();
        assert_eq!(graph.node(0).dependencies, Vec::<usize>::new());
        assert_eq!(graph.node(1).dependencies, vec![0]);
        assert_eq!(graph.node(2).dependencies, vec![0]);
        assert_eq!(graph.node(3).dependencies, vec![1, 2]);
        assert_eq!(graph.node(0).dependents, vec![1, 2]);
        assert_eq!(graph.node(4).dependents, Vec::<usize>::new());
    }

    #[test]
    fn unproduced_prerequisites_are_external() {
        let graph = ActionGraph::build(&[action(&["x.o"], &["x.c", "x.h"])]).unwrap();
        assert_eq!(graph.node(0).pending_deps, 0);
    }

    #[test]
    fn initial_ready_queue_has_zero_dependency_actions() {
        let graph = ActionGraph::build(&diamond()).unwrap();
        assert_eq!(graph.ready(), vec![0, 4]);
    }

    #[test]
    fn transitive_dependent_counts_are_distinct() {
        let graph = ActionGraph::build(&diamond()).unwrap();
        // A unblocks B, C and D; the diamond must not double-count D.
        assert_eq!(graph.node(0).total_dependents, 3);
        assert_eq!(graph.node(1).total_dependents, 1);
        assert_eq!(graph.node(2).total_dependents, 1);
        assert_eq!(graph.node(3).total_dependents, 0);
        assert_eq!(graph.node(4).total_dependents, 0);
    }

    #[test]
    fn priority_prefers_high_dependent_count_then_input_order() {
        let actions = diamond();
        let graph = ActionGraph::build(&actions).unwrap();
        let mut queue = vec![4, 0];
        graph.sort_by_priority(&actions, &mut queue);
        assert_eq!(queue, vec![0, 4]);

        let mut peers = vec![2, 1];
        graph.sort_by_priority(&actions, &mut peers);
        assert_eq!(peers, vec![1, 2]);
    }

    #[test]
    fn produced_item_collision_resolves_last_wins() {
        let actions = vec![
            action(&["shared.o"], &[]),
            action(&["shared.o"], &[]),
            action(&["out"], &["shared.o"]),
        ];
        let graph = ActionGraph::build(&actions).unwrap();
        assert_eq!(graph.node(2).dependencies, vec![1]);
        assert_eq!(graph.node(0).dependents, Vec::<usize>::new());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let actions = diamond();
        let first = ActionGraph::build(&actions).unwrap();
        let second = ActionGraph::build(&actions).unwrap();
        for (a, b) in first.nodes().iter().zip(second.nodes()) {
            assert_eq!(a.dependencies, b.dependencies);
            assert_eq!(a.dependents, b.dependents);
            assert_eq!(a.total_dependents, b.total_dependents);
        }
    }

    #[test]
    fn cycles_are_rejected_with_description() {
        let actions = vec![
            action(&["a.o"], &["b.o"]),
            action(&["b.o"], &["a.o"]),
        ];
        let err = ActionGraph::build(&actions).unwrap_err();
        let GraphError::CyclicDependencies(description) = err;
        assert!(description.contains("action #0"));
        assert!(description.contains("action #1"));
    }

    #[test]
    fn self_produced_prerequisite_is_ignored() {
        let graph = ActionGraph::build(&[action(&["gen.h"], &["gen.h"])]).unwrap();
        assert_eq!(graph.node(0).pending_deps, 0);
    }
}
