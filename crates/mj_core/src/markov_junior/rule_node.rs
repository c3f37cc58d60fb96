//! Match bookkeeping shared by `OneNode`, `AllNode` and `ParallelNode`.
//!
//! Matches are recomputed with a full grid scan on every step.

use super::node::ExecutionContext;
use super::rule::KEEP;
use super::{MjGrid, MjRule};

/// A rule application site: (rule index, x, y, z).
pub type Match = (usize, usize, usize, usize);

/// Rules plus per-node step accounting.
pub struct RuleNodeData {
    /// Rules with all symmetry variants expanded
    pub rules: Vec<MjRule>,
    /// Successful steps since the last reset
    pub counter: usize,
    /// Step limit for this node (0 = unlimited)
    pub steps: usize,
    /// Which rules were applied on the last step
    pub last: Vec<bool>,
}

impl RuleNodeData {
    pub fn new(rules: Vec<MjRule>) -> Self {
        let last = vec![false; rules.len()];
        Self {
            rules,
            counter: 0,
            steps: 0,
            last,
        }
    }

    pub fn with_steps(rules: Vec<MjRule>, steps: usize) -> Self {
        Self {
            steps,
            ..Self::new(rules)
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
        self.last.fill(false);
    }

    /// Clear `last` and check the step limit. Returns false when the node
    /// has used up its steps.
    pub fn begin_step(&mut self) -> bool {
        self.last.fill(false);
        self.steps == 0 || self.counter < self.steps
    }

    /// All sites where some rule's input matches, in rule then z, y, x order.
    pub fn scan_matches(&self, ctx: &ExecutionContext) -> Vec<Match> {
        let grid = &*ctx.grid;
        let mut matches = Vec::new();
        for (r, rule) in self.rules.iter().enumerate() {
            if rule.imx > grid.mx || rule.imy > grid.my || rule.imz > grid.mz {
                continue;
            }
            for z in 0..=grid.mz - rule.imz {
                for y in 0..=grid.my - rule.imy {
                    for x in 0..=grid.mx - rule.imx {
                        if grid.matches(rule, x, y, z) {
                            matches.push((r, x, y, z));
                        }
                    }
                }
            }
        }
        matches
    }
}

/// Write a rule's output at (x, y, z). Returns the flat indices that changed.
pub fn apply_rule(grid: &mut MjGrid, rule: &MjRule, x: usize, y: usize, z: usize) -> Vec<usize> {
    let mut changed = Vec::new();
    for_each_output(rule, x, y, z, |dx, dy, dz, value| {
        let i = grid.flat(dx, dy, dz);
        if grid.state[i] != value {
            grid.state[i] = value;
            changed.push(i);
        }
    });
    changed
}

/// Visit every written (non-`KEEP`) output cell of a rule placed at (x, y, z).
pub(crate) fn for_each_output(
    rule: &MjRule,
    x: usize,
    y: usize,
    z: usize,
    mut f: impl FnMut(usize, usize, usize, u8),
) {
    let mut i = 0;
    for dz in 0..rule.omz {
        for dy in 0..rule.omy {
            for dx in 0..rule.omx {
                let value = rule.output[i];
                i += 1;
                if value != KEEP {
                    f(x + dx, y + dy, z + dz, value);
                }
            }
        }
    }
}
