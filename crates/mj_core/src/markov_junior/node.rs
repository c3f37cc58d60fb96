//! Node trait and branch nodes.
//!
//! - `Node`: one `go()` per interpreter step, `reset()` before each run
//! - `SequenceNode`: runs children in order until each is exhausted
//! - `MarkovNode`: restarts from the first child after every success

use super::rng::MjRng;
use super::MjGrid;

/// State shared by every node during one interpreter step.
pub struct ExecutionContext<'a> {
    /// The grid being rewritten
    pub grid: &'a mut MjGrid,
    /// Run generator, seeded per run
    pub random: &'a mut dyn MjRng,
    /// Interpreter step counter
    pub counter: usize,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(grid: &'a mut MjGrid, random: &'a mut dyn MjRng) -> Self {
        Self {
            grid,
            random,
            counter: 0,
        }
    }
}

/// A node of the model tree.
pub trait Node {
    /// Execute one step. Returns `false` once the node can make no progress.
    fn go(&mut self, ctx: &mut ExecutionContext) -> bool;

    /// Restore the node to its initial state.
    fn reset(&mut self);

    /// Branch nodes keep control across steps once one of their children
    /// succeeds.
    fn is_branch(&self) -> bool {
        false
    }
}

/// Children shared by `SequenceNode` and `MarkovNode`.
///
/// When a branch child succeeds it stays active: later `go()` calls are
/// delegated straight to it until it fails, and the step on which it fails
/// still counts as progress for the parent.
struct Branch {
    nodes: Vec<Box<dyn Node>>,
    n: usize,
    active: Option<usize>,
}

impl Branch {
    fn new(nodes: Vec<Box<dyn Node>>) -> Self {
        Self {
            nodes,
            n: 0,
            active: None,
        }
    }

    /// Delegate to the active branch child. `None` when no child is active.
    fn go_active(&mut self, ctx: &mut ExecutionContext) -> Option<bool> {
        let active = self.active?;
        if !self.nodes[active].go(ctx) {
            self.active = None;
        }
        Some(true)
    }

    /// Try children from `n` onwards.
    fn go_from_current(&mut self, ctx: &mut ExecutionContext) -> bool {
        while self.n < self.nodes.len() {
            let node = &mut self.nodes[self.n];
            if node.go(ctx) {
                if node.is_branch() {
                    self.active = Some(self.n);
                }
                return true;
            }
            self.n += 1;
        }
        self.reset();
        false
    }

    fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
        self.n = 0;
        self.active = None;
    }
}

/// Runs each child until it fails, then moves to the next one.
pub struct SequenceNode {
    branch: Branch,
}

impl SequenceNode {
    pub fn new(nodes: Vec<Box<dyn Node>>) -> Self {
        Self {
            branch: Branch::new(nodes),
        }
    }
}

impl Node for SequenceNode {
    fn go(&mut self, ctx: &mut ExecutionContext) -> bool {
        if let Some(progress) = self.branch.go_active(ctx) {
            return progress;
        }
        self.branch.go_from_current(ctx)
    }

    fn reset(&mut self) {
        self.branch.reset();
    }

    fn is_branch(&self) -> bool {
        true
    }
}

/// Tries children from the first one on every step; fails only when none
/// of them can make progress.
pub struct MarkovNode {
    branch: Branch,
}

impl MarkovNode {
    pub fn new(nodes: Vec<Box<dyn Node>>) -> Self {
        Self {
            branch: Branch::new(nodes),
        }
    }
}

impl Node for MarkovNode {
    fn go(&mut self, ctx: &mut ExecutionContext) -> bool {
        if let Some(progress) = self.branch.go_active(ctx) {
            return progress;
        }
        self.branch.n = 0;
        self.branch.go_from_current(ctx)
    }

    fn reset(&mut self) {
        self.branch.reset();
    }

    fn is_branch(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markov_junior::rng::StdRandom;

    /// Succeeds `count` times, then fails until reset.
    struct CountdownNode {
        initial: usize,
        remaining: usize,
    }

    impl CountdownNode {
        fn boxed(count: usize) -> Box<dyn Node> {
            Box::new(Self {
                initial: count,
                remaining: count,
            })
        }
    }

    impl Node for CountdownNode {
        fn go(&mut self, _ctx: &mut ExecutionContext) -> bool {
            if self.remaining > 0 {
                self.remaining -= 1;
                true
            } else {
                false
            }
        }

        fn reset(&mut self) {
            self.remaining = self.initial;
        }
    }

    #[test]
    fn test_sequence_node_runs_in_order() {
        let mut grid = MjGrid::with_values(1, 1, 1, "BW");
        let mut rng = StdRandom::from_seed(42);
        let mut ctx = ExecutionContext::new(&mut grid, &mut rng);

        let mut seq = SequenceNode::new(vec![CountdownNode::boxed(2), CountdownNode::boxed(3)]);
        for _ in 0..5 {
            assert!(seq.go(&mut ctx));
        }
        assert!(!seq.go(&mut ctx));
    }

    #[test]
    fn test_markov_node_fails_when_no_child_progresses() {
        let mut grid = MjGrid::with_values(1, 1, 1, "BW");
        let mut rng = StdRandom::from_seed(42);
        let mut ctx = ExecutionContext::new(&mut grid, &mut rng);

        let mut markov = MarkovNode::new(vec![CountdownNode::boxed(3)]);
        assert!(markov.go(&mut ctx));
        assert!(markov.go(&mut ctx));
        assert!(markov.go(&mut ctx));
        assert!(!markov.go(&mut ctx));
    }

    #[test]
    fn test_sequence_keeps_active_branch_child() {
        let mut grid = MjGrid::with_values(1, 1, 1, "BW");
        let mut rng = StdRandom::from_seed(42);
        let mut ctx = ExecutionContext::new(&mut grid, &mut rng);

        let inner = Box::new(MarkovNode::new(vec![CountdownNode::boxed(2)]));
        let mut seq = SequenceNode::new(vec![inner, CountdownNode::boxed(1)]);

        // inner markov: two successes, then the failing step still counts
        assert!(seq.go(&mut ctx));
        assert!(seq.go(&mut ctx));
        assert!(seq.go(&mut ctx));
        // inner was reset by its own failure, so it runs again from n = 0
        assert!(seq.go(&mut ctx));
    }
}
