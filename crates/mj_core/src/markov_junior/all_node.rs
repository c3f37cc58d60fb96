//! AllNode - apply every non-overlapping match in one step.
//!
//! Matches are visited in shuffled order; a match is skipped when one of the
//! cells it would write was already claimed this step (`grid.mask`).

use super::node::{ExecutionContext, Node};
use super::rng::shuffled_indices;
use super::rule_node::{for_each_output, Match, RuleNodeData};
use super::MjRule;

pub struct AllNode {
    pub data: RuleNodeData,
}

impl AllNode {
    pub fn new(rules: Vec<MjRule>) -> Self {
        Self {
            data: RuleNodeData::new(rules),
        }
    }

    pub fn with_data(data: RuleNodeData) -> Self {
        Self { data }
    }

    /// Apply a match unless it overlaps a cell claimed earlier this step.
    fn fit(
        &mut self,
        (r, x, y, z): Match,
        ctx: &mut ExecutionContext,
        claimed: &mut Vec<usize>,
    ) {
        let rule = &self.data.rules[r];
        let grid = &mut *ctx.grid;

        let mut free = true;
        for_each_output(rule, x, y, z, |sx, sy, sz, _| {
            free &= !grid.mask[grid.flat(sx, sy, sz)];
        });
        if !free {
            return;
        }

        self.data.last[r] = true;
        for_each_output(rule, x, y, z, |sx, sy, sz, value| {
            let i = grid.flat(sx, sy, sz);
            grid.mask[i] = true;
            grid.state[i] = value;
            claimed.push(i);
        });
    }
}

impl Node for AllNode {
    fn go(&mut self, ctx: &mut ExecutionContext) -> bool {
        if !self.data.begin_step() {
            return false;
        }

        let matches = self.data.scan_matches(ctx);
        if matches.is_empty() {
            return false;
        }

        let before = ctx.grid.state.clone();
        let mut claimed = Vec::new();
        for k in shuffled_indices(matches.len(), ctx.random) {
            self.fit(matches[k], ctx, &mut claimed);
        }

        for &i in &claimed {
            ctx.grid.mask[i] = false;
        }
        self.data.counter += 1;

        claimed.iter().any(|&i| ctx.grid.state[i] != before[i])
    }

    fn reset(&mut self) {
        self.data.reset();
    }
}
