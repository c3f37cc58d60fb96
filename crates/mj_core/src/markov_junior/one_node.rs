//! OneNode - apply a single random match per step.

use super::node::{ExecutionContext, Node};
use super::rule_node::{apply_rule, RuleNodeData};
use super::MjRule;

/// Picks one matching site uniformly at random and rewrites it.
pub struct OneNode {
    pub data: RuleNodeData,
}

impl OneNode {
    pub fn new(rules: Vec<MjRule>) -> Self {
        Self {
            data: RuleNodeData::new(rules),
        }
    }

    pub fn with_data(data: RuleNodeData) -> Self {
        Self { data }
    }
}

impl Node for OneNode {
    fn go(&mut self, ctx: &mut ExecutionContext) -> bool {
        if !self.data.begin_step() {
            return false;
        }

        let matches = self.data.scan_matches(ctx);
        if matches.is_empty() {
            return false;
        }

        let (r, x, y, z) = matches[ctx.random.next_index(matches.len())];
        apply_rule(ctx.grid, &self.data.rules[r], x, y, z);
        self.data.last[r] = true;
        self.data.counter += 1;
        true
    }

    fn reset(&mut self) {
        self.data.reset();
    }
}
