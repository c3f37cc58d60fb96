//! MarkovJunior rule-rewrite engine.
//!
//! A compact interpreter for MarkovJunior model documents: a grid of symbol
//! indices is rewritten by pattern rules until no rule applies or the step
//! budget runs out.
//!
//! This module provides:
//! - `MjGrid`: grid state with character/value/wave mappings
//! - `MjRule`: rewrite rules parsed from `in`/`out` pattern strings
//! - `symmetry`: square (8) and cube (48) symmetry variants of a rule
//! - Node tree: `SequenceNode`, `MarkovNode`, `OneNode`, `AllNode`, `ParallelNode`
//! - `Interpreter`: runs a loaded model and yields frames lazily
//! - `render` / `vox`: PNG rendering and MagicaVoxel export of a frame
//!
//! ## Example
//!
//! ```ignore
//! use mj_core::markov_junior::{load_model_str, Interpreter};
//!
//! let model = load_model_str(r#"<one values="BW" in="B" out="W"/>"#, 8, 8, 1)?;
//! let mut interpreter = Interpreter::from_model(model);
//! for frame in interpreter.run(&RunRequest::new(42, 0, false)) {
//!     println!("{}x{}x{} at step {}", frame.fx, frame.fy, frame.fz, frame.counter);
//! }
//! ```

pub mod all_node;
pub mod interpreter;
pub mod loader;
pub mod node;
pub mod one_node;
pub mod parallel_node;
pub mod render;
pub mod rng;
pub mod rule;
pub mod rule_node;
pub mod symmetry;
pub mod vox;

pub use all_node::AllNode;
pub use interpreter::{Frame, FrameRun, Interpreter, RunRequest};
pub use loader::{load_model_str, LoadError, LoadedModel};
pub use node::{ExecutionContext, MarkovNode, Node, SequenceNode};
pub use one_node::OneNode;
pub use parallel_node::ParallelNode;
pub use render::{render_2d, render_3d_isometric, render_frame, save_png};
pub use rng::{DotNetRandom, MjRng, RngKind, StdRandom};
pub use rule::{MjRule, RuleParseError};
pub use symmetry::{cube_symmetries, square_symmetries, SquareSubgroup, Symmetry};
pub use vox::{save_vox, write_vox, VoxError};

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("duplicate character '{0}' in values string")]
    DuplicateCharacter(char),
    /// Waves are `u32` bitmasks
    #[error("too many values ({0}), at most 32 are supported")]
    TooManyValues(usize),
    #[error("values string is empty")]
    NoValues,
}

/// A 3D grid of symbol indices, laid out `x + y * mx + z * mx * my`.
///
/// Symbol `i` of the `values` string is stored as value `i`; in patterns it
/// matches through the wave bit `1 << i`.
#[derive(Debug, Clone)]
pub struct MjGrid {
    pub state: Vec<u8>,
    /// Cells claimed during the current `AllNode` step
    pub mask: Vec<bool>,
    pub mx: usize,
    pub my: usize,
    pub mz: usize,
    /// Number of distinct values
    pub c: u8,
    /// Symbol of each value; the frame legend
    pub characters: Vec<char>,
    pub values: HashMap<char, u8>,
    /// Symbol or union to the set of values it matches
    pub waves: HashMap<char, u32>,
}

impl MjGrid {
    /// Grid for a `values` string such as `"BWR"`; whitespace is skipped and
    /// `*` matches every value.
    pub fn try_with_values(
        mx: usize,
        my: usize,
        mz: usize,
        values_str: &str,
    ) -> Result<Self, GridError> {
        let characters: Vec<char> = values_str.chars().filter(|c| !c.is_whitespace()).collect();
        if characters.is_empty() {
            return Err(GridError::NoValues);
        }
        if characters.len() > 32 {
            return Err(GridError::TooManyValues(characters.len()));
        }

        let mut values = HashMap::with_capacity(characters.len());
        let mut waves = HashMap::with_capacity(characters.len() + 1);
        for (i, &ch) in characters.iter().enumerate() {
            if values.insert(ch, i as u8).is_some() {
                return Err(GridError::DuplicateCharacter(ch));
            }
            waves.insert(ch, 1u32 << i);
        }

        let c = characters.len() as u8;
        let all = if c == 32 { u32::MAX } else { (1u32 << c) - 1 };
        waves.insert('*', all);

        let size = mx * my * mz;
        Ok(Self {
            state: vec![0; size],
            mask: vec![false; size],
            mx,
            my,
            mz,
            c,
            characters,
            values,
            waves,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_values(mx: usize, my: usize, mz: usize, values_str: &str) -> Self {
        Self::try_with_values(mx, my, mz, values_str).expect("invalid values string")
    }

    /// Union of the wave bits of `chars`; unknown symbols contribute nothing.
    pub fn wave(&self, chars: &str) -> u32 {
        chars
            .chars()
            .filter_map(|ch| self.values.get(&ch))
            .fold(0u32, |sum, &idx| sum | (1 << idx))
    }

    /// Whether `rule.input` fits at `(x, y, z)`.
    pub fn matches(&self, rule: &MjRule, x: usize, y: usize, z: usize) -> bool {
        if x + rule.imx > self.mx || y + rule.imy > self.my || z + rule.imz > self.mz {
            return false;
        }

        let mut di = 0;
        for dz in 0..rule.imz {
            for dy in 0..rule.imy {
                for dx in 0..rule.imx {
                    let value = self.state[self.flat(x + dx, y + dy, z + dz)];
                    if rule.input[di] & (1 << value) == 0 {
                        return false;
                    }
                    di += 1;
                }
            }
        }

        true
    }

    /// Flat index for in-bounds coordinates.
    #[inline]
    pub fn flat(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.mx + z * self.mx * self.my
    }

    /// Bounds-checked `flat`.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        (x < self.mx && y < self.my && z < self.mz).then(|| self.flat(x, y, z))
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<u8> {
        self.index(x, y, z).map(|i| self.state[i])
    }

    /// Returns false when `(x, y, z)` is outside the grid.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: u8) -> bool {
        match self.index(x, y, z) {
            Some(i) => {
                self.state[i] = value;
                true
            }
            None => false,
        }
    }

    /// Index of the center cell, used by models with `origin="True"`.
    pub fn center(&self) -> usize {
        self.flat(self.mx / 2, self.my / 2, self.mz / 2)
    }

    /// Every cell back to value 0.
    pub fn clear(&mut self) {
        self.state.fill(0);
        self.mask.fill(false);
    }

    pub fn count_nonzero(&self) -> usize {
        self.state.iter().filter(|&&v| v != 0).count()
    }
}
