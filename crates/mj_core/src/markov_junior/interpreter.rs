//! Interpreter for running loaded models.
//!
//! A run resets the grid, reseeds the generator and then steps the root node
//! until it stops making progress or the step budget is spent. Frames are
//! produced lazily by `FrameRun`:
//!
//! - gif mode: one frame before every step, then the final frame
//! - otherwise: only the final frame
//!
//! The step counter increments on every step, including the one on which the
//! root node fails.

use super::loader::LoadedModel;
use super::node::{ExecutionContext, Node};
use super::rng::{MjRng, RngKind};
use super::MjGrid;
use std::iter::FusedIterator;
use tracing::debug;

/// Parameters of one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
    pub seed: i32,
    /// Step budget (0 = unlimited)
    pub steps: usize,
    /// Yield a frame before every step
    pub gif: bool,
}

impl RunRequest {
    pub fn new(seed: i32, steps: usize, gif: bool) -> Self {
        Self { seed, steps, gif }
    }
}

/// A snapshot of the grid handed to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Cell values, `x + y * fx + z * fx * fy`
    pub state: Vec<u8>,
    /// Symbol for each value, in value order
    pub legend: Vec<char>,
    pub fx: usize,
    pub fy: usize,
    pub fz: usize,
    /// Interpreter step counter when the frame was taken
    pub counter: usize,
}

/// Runs one model. Each `run()` starts from a cleared grid.
pub struct Interpreter {
    root: Box<dyn Node>,
    grid: MjGrid,
    origin: bool,
    rng_kind: RngKind,
    random: Box<dyn MjRng>,
    counter: usize,
    running: bool,
}

impl Interpreter {
    pub fn from_model(model: LoadedModel) -> Self {
        let rng_kind = RngKind::default();
        Self {
            root: model.root,
            grid: model.grid,
            origin: model.origin,
            rng_kind,
            random: rng_kind.create(0),
            counter: 0,
            running: false,
        }
    }

    /// Select the generator used by subsequent runs.
    pub fn with_rng(mut self, kind: RngKind) -> Self {
        self.rng_kind = kind;
        self
    }

    /// Clear the grid, reseed and rewind the node tree.
    pub fn reset(&mut self, seed: i32) {
        self.random = self.rng_kind.create(seed);
        self.grid.clear();
        if self.origin {
            let center = self.grid.center();
            self.grid.state[center] = 1;
        }
        self.root.reset();
        self.counter = 0;
        self.running = true;
    }

    /// Execute one step. Returns whether the root node is still running.
    pub fn step(&mut self) -> bool {
        if !self.running {
            return false;
        }

        let mut ctx = ExecutionContext {
            grid: &mut self.grid,
            random: self.random.as_mut(),
            counter: self.counter,
        };
        self.running = self.root.go(&mut ctx);
        self.counter += 1;
        self.running
    }

    /// Start a run and return its lazy frame sequence.
    pub fn run(&mut self, request: &RunRequest) -> FrameRun<'_> {
        debug!(
            seed = request.seed,
            steps = request.steps,
            gif = request.gif,
            "starting run"
        );
        self.reset(request.seed);
        FrameRun {
            interpreter: self,
            steps: request.steps,
            gif: request.gif,
            phase: Phase::Stepping,
        }
    }

    pub fn grid(&self) -> &MjGrid {
        &self.grid
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn within_budget(&self, steps: usize) -> bool {
        self.running && (steps == 0 || self.counter < steps)
    }

    fn snapshot(&self) -> Frame {
        Frame {
            state: self.grid.state.clone(),
            legend: self.grid.characters.clone(),
            fx: self.grid.mx,
            fy: self.grid.my,
            fz: self.grid.mz,
            counter: self.counter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stepping,
    Final,
    Exhausted,
}

/// Lazy, single-use frame sequence of one run.
///
/// Holds the interpreter mutably for its whole lifetime; once the final frame
/// has been yielded it stays exhausted.
pub struct FrameRun<'a> {
    interpreter: &'a mut Interpreter,
    steps: usize,
    gif: bool,
    phase: Phase,
}

impl FrameRun<'_> {
    pub fn is_exhausted(&self) -> bool {
        self.phase == Phase::Exhausted
    }
}

impl Iterator for FrameRun<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            match self.phase {
                Phase::Stepping => {
                    if !self.interpreter.within_budget(self.steps) {
                        self.phase = Phase::Final;
                        continue;
                    }
                    if self.gif {
                        let frame = self.interpreter.snapshot();
                        self.interpreter.step();
                        return Some(frame);
                    }
                    self.interpreter.step();
                }
                Phase::Final => {
                    self.phase = Phase::Exhausted;
                    return Some(self.interpreter.snapshot());
                }
                Phase::Exhausted => return None,
            }
        }
    }
}

impl FusedIterator for FrameRun<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markov_junior::load_model_str;

    fn fill_model(mx: usize, my: usize) -> Interpreter {
        let model = load_model_str(r#"<one values="BW" in="B" out="W"/>"#, mx, my, 1).unwrap();
        Interpreter::from_model(model)
    }

    #[test]
    fn test_run_without_gif_yields_one_final_frame() {
        let mut interp = fill_model(4, 4);
        let frames: Vec<Frame> = interp.run(&RunRequest::new(42, 0, false)).collect();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!((frame.fx, frame.fy, frame.fz), (4, 4, 1));
        assert_eq!(frame.legend, vec!['B', 'W']);
        assert!(frame.state.iter().all(|&v| v == 1));
        // 16 successful steps plus the failing one
        assert_eq!(frame.counter, 17);
    }

    #[test]
    fn test_gif_yields_frame_per_step_then_final() {
        let mut interp = fill_model(2, 2);
        let frames: Vec<Frame> = interp.run(&RunRequest::new(1, 0, true)).collect();
        // 5 steps (4 successes + 1 failure), one frame before each, plus the final frame
        assert_eq!(frames.len(), 6);
        let counters: Vec<usize> = frames.iter().map(|f| f.counter).collect();
        assert_eq!(counters, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(frames[0].state, vec![0; 4]);
    }

    #[test]
    fn test_step_budget() {
        let mut interp = fill_model(4, 4);
        let frame = interp.run(&RunRequest::new(7, 5, false)).next().unwrap();
        assert_eq!(frame.counter, 5);
        assert_eq!(frame.state.iter().filter(|&&v| v == 1).count(), 5);
    }

    #[test]
    fn test_frame_run_is_fused() {
        let mut interp = fill_model(2, 2);
        let mut run = interp.run(&RunRequest::new(3, 0, false));
        assert!(run.next().is_some());
        assert!(run.is_exhausted());
        assert!(run.next().is_none());
        assert!(run.next().is_none());
    }

    #[test]
    fn test_same_seed_same_frames() {
        let xml = r#"<one values="BRW" in="RB" out="WR" symmetry="(xy)"/>"#;
        let run = |seed| {
            let mut model = load_model_str(xml, 9, 9, 1).unwrap();
            model.origin = true;
            let mut interp = Interpreter::from_model(model);
            let last = interp.run(&RunRequest::new(seed, 0, false)).last();
            last.unwrap()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_origin_sets_center() {
        let model = load_model_str(r#"<one values="BW" in="WB" out="WW" origin="True"/>"#, 5, 5, 1)
            .unwrap();
        let mut interp = Interpreter::from_model(model);
        let mut run = interp.run(&RunRequest::new(0, 0, true));
        let first = run.next().unwrap();
        assert_eq!(first.state[12], 1);
        assert_eq!(first.state.iter().filter(|&&v| v == 1).count(), 1);
    }

    #[test]
    fn test_dotnet_rng_run_is_deterministic() {
        let run = || {
            let model = load_model_str(r#"<one values="BW" in="B" out="W"/>"#, 6, 6, 1).unwrap();
            let mut interp = Interpreter::from_model(model).with_rng(RngKind::DotNet);
            let states: Vec<Vec<u8>> = interp
                .run(&RunRequest::new(11, 10, true))
                .map(|f| f.state)
                .collect();
            states
        };
        assert_eq!(run(), run());
    }
}
