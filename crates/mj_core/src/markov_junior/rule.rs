//! Rewrite rules.
//!
//! Pattern syntax: one symbol per cell, `/` between rows, a space between
//! layers (top layer first). In an input `*` matches anything; in an output
//! it leaves the cell untouched.

use super::MjGrid;
use std::fmt;
use thiserror::Error;

/// Output value meaning "don't change this cell".
pub const KEEP: u8 = 0xff;

/// `input` cells are wave masks, `output` cells are values or `KEEP`.
#[derive(Clone)]
pub struct MjRule {
    pub input: Vec<u32>,
    pub output: Vec<u8>,
    pub imx: usize,
    pub imy: usize,
    pub imz: usize,
    pub omx: usize,
    pub omy: usize,
    pub omz: usize,
    /// Application probability (used by `prl` nodes)
    pub p: f64,
}

impl fmt::Debug for MjRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MjRule")
            .field("input", &format!("[{}x{}x{}]", self.imx, self.imy, self.imz))
            .field("output", &format!("[{}x{}x{}]", self.omx, self.omy, self.omz))
            .field("p", &self.p)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleParseError {
    #[error("empty pattern")]
    EmptyPattern,
    #[error("non-rectangular pattern '{0}'")]
    NonRectangularPattern(String),
    #[error("unknown character '{0}'")]
    UnknownCharacter(char),
    #[error("input and output dimensions don't match")]
    DimensionMismatch,
}

impl MjRule {
    /// Build a rule from `in` / `out` patterns over the grid's symbols.
    pub fn parse(input: &str, output: &str, grid: &MjGrid) -> Result<Self, RuleParseError> {
        let (in_cells, imx, imy, imz) = Self::parse_pattern(input)?;
        let (out_cells, omx, omy, omz) = Self::parse_pattern(output)?;

        if (imx, imy, imz) != (omx, omy, omz) {
            return Err(RuleParseError::DimensionMismatch);
        }

        let input = in_cells
            .iter()
            .map(|ch| {
                grid.waves
                    .get(ch)
                    .copied()
                    .ok_or(RuleParseError::UnknownCharacter(*ch))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = out_cells
            .iter()
            .map(|&ch| match ch {
                '*' => Ok(KEEP),
                _ => grid
                    .values
                    .get(&ch)
                    .copied()
                    .ok_or(RuleParseError::UnknownCharacter(ch)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            input,
            output,
            imx,
            imy,
            imz,
            omx,
            omy,
            omz,
            p: 1.0,
        })
    }

    /// Cells in grid order plus the pattern extents.
    pub(crate) fn parse_pattern(
        s: &str,
    ) -> Result<(Vec<char>, usize, usize, usize), RuleParseError> {
        if s.is_empty() {
            return Err(RuleParseError::EmptyPattern);
        }

        let layers: Vec<Vec<Vec<char>>> = s
            .split(' ')
            .map(|layer| layer.split('/').map(|row| row.chars().collect()).collect())
            .collect();

        let mz = layers.len();
        let my = layers[0].len();
        let mx = layers[0][0].len();
        if mx == 0 {
            return Err(RuleParseError::EmptyPattern);
        }

        let rectangular = layers
            .iter()
            .all(|rows| rows.len() == my && rows.iter().all(|row| row.len() == mx));
        if !rectangular {
            return Err(RuleParseError::NonRectangularPattern(s.to_string()));
        }

        let mut chars = Vec::with_capacity(mx * my * mz);
        for z in 0..mz {
            let rows = &layers[mz - 1 - z];
            for row in rows {
                chars.extend_from_slice(row);
            }
        }

        Ok((chars, mx, my, mz))
    }

    /// Rotate the rule 90 degrees around the Z axis.
    pub fn z_rotated(&self) -> Self {
        let input = rotate_z(&self.input, self.imx, self.imy, self.imz);
        let output = rotate_z(&self.output, self.omx, self.omy, self.omz);
        Self {
            input,
            output,
            imx: self.imy,
            imy: self.imx,
            imz: self.imz,
            omx: self.omy,
            omy: self.omx,
            omz: self.omz,
            p: self.p,
        }
    }

    /// Rotate the rule 90 degrees around the Y axis.
    pub fn y_rotated(&self) -> Self {
        let input = rotate_y(&self.input, self.imx, self.imy, self.imz);
        let output = rotate_y(&self.output, self.omx, self.omy, self.omz);
        Self {
            input,
            output,
            imx: self.imz,
            imy: self.imy,
            imz: self.imx,
            omx: self.omz,
            omy: self.omy,
            omz: self.omx,
            p: self.p,
        }
    }

    /// Mirror the rule along the X axis.
    pub fn reflected(&self) -> Self {
        Self {
            input: reflect_x(&self.input, self.imx, self.imy, self.imz),
            output: reflect_x(&self.output, self.omx, self.omy, self.omz),
            ..self.clone()
        }
    }

    /// Check if two rules have the same dimensions and patterns.
    pub fn same(&self, other: &Self) -> bool {
        (self.imx, self.imy, self.imz, self.omx, self.omy, self.omz)
            == (other.imx, other.imy, other.imz, other.omx, other.omy, other.omz)
            && self.input == other.input
            && self.output == other.output
    }
}

// new[x + y*MY + z*MX*MY] = old[MX-1-y + x*MX + z*MX*MY]
fn rotate_z<T: Copy>(cells: &[T], mx: usize, my: usize, mz: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(cells.len());
    for z in 0..mz {
        for y in 0..mx {
            for x in 0..my {
                out.push(cells[(mx - 1 - y) + x * mx + z * mx * my]);
            }
        }
    }
    out
}

// new[x + y*MZ + z*MZ*MY] = old[MX-1-z + y*MX + x*MX*MY]
fn rotate_y<T: Copy>(cells: &[T], mx: usize, my: usize, mz: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(cells.len());
    for z in 0..mx {
        for y in 0..my {
            for x in 0..mz {
                out.push(cells[(mx - 1 - z) + y * mx + x * mx * my]);
            }
        }
    }
    out
}

fn reflect_x<T: Copy>(cells: &[T], mx: usize, my: usize, mz: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(cells.len());
    for z in 0..mz {
        for y in 0..my {
            for x in 0..mx {
                out.push(cells[(mx - 1 - x) + y * mx + z * mx * my]);
            }
        }
    }
    out
}
