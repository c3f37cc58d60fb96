//! ParallelNode (`prl`) - apply all matches simultaneously.
//!
//! Every match reads the state from the start of the step and writes into a
//! buffer that replaces the grid afterwards. Each match fires with its rule's
//! probability `p`.

use super::node::{ExecutionContext, Node};
use super::rule_node::{for_each_output, RuleNodeData};
use super::MjRule;

pub struct ParallelNode {
    pub data: RuleNodeData,
    newstate: Vec<u8>,
}

impl ParallelNode {
    pub fn new(rules: Vec<MjRule>) -> Self {
        Self::with_data(RuleNodeData::new(rules))
    }

    pub fn with_data(data: RuleNodeData) -> Self {
        Self {
            data,
            newstate: Vec::new(),
        }
    }
}

impl Node for ParallelNode {
    fn go(&mut self, ctx: &mut ExecutionContext) -> bool {
        if !self.data.begin_step() {
            return false;
        }

        let matches = self.data.scan_matches(ctx);
        self.newstate.clone_from(&ctx.grid.state);

        let mut fired = 0;
        for (r, x, y, z) in matches {
            let rule = &self.data.rules[r];
            if ctx.random.next_double() > rule.p {
                continue;
            }
            self.data.last[r] = true;
            fired += 1;

            let grid = &*ctx.grid;
            let newstate = &mut self.newstate;
            for_each_output(rule, x, y, z, |sx, sy, sz, value| {
                let i = grid.flat(sx, sy, sz);
                if value != grid.state[i] {
                    newstate[i] = value;
                }
            });
        }

        std::mem::swap(&mut ctx.grid.state, &mut self.newstate);
        self.data.counter += 1;
        fired > 0
    }

    fn reset(&mut self) {
        self.data.reset();
    }
}
