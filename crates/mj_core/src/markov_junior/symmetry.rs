//! Symmetry helpers for MarkovJunior rules.
//!
//! Generates all unique rotations and reflections of a rule so that a
//! pattern written once matches in any allowed orientation.

use super::MjRule;

/// Predefined symmetry subgroups for 2D (square) patterns.
///
/// Each subgroup selects from the 8 elements of the square group:
/// e, b, a, ba, a², ba², a³, ba³ (a = 90° rotation, b = reflection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SquareSubgroup {
    /// Just the identity
    None,
    /// Identity + X reflection
    ReflectX,
    /// Identity + Y reflection
    ReflectY,
    /// X and Y reflections (4 variants)
    ReflectXY,
    /// Rotations only (4 variants)
    Rotate,
    /// All 8 symmetries
    #[default]
    All,
}

impl SquareSubgroup {
    /// Get the boolean mask for this subgroup.
    pub fn mask(&self) -> [bool; 8] {
        match self {
            SquareSubgroup::None => [true, false, false, false, false, false, false, false],
            SquareSubgroup::ReflectX => [true, true, false, false, false, false, false, false],
            SquareSubgroup::ReflectY => [true, false, false, false, false, true, false, false],
            SquareSubgroup::ReflectXY => [true, true, false, false, true, true, false, false],
            SquareSubgroup::Rotate => [true, false, true, false, true, false, true, false],
            SquareSubgroup::All => [true; 8],
        }
    }

    /// Parse from the notation used in model documents.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "()" => Some(SquareSubgroup::None),
            "(x)" => Some(SquareSubgroup::ReflectX),
            "(y)" => Some(SquareSubgroup::ReflectY),
            "(x)(y)" => Some(SquareSubgroup::ReflectXY),
            "(xy+)" => Some(SquareSubgroup::Rotate),
            "(xy)" => Some(SquareSubgroup::All),
            _ => None,
        }
    }
}

/// Parse a 48-element cube subgroup mask.
pub fn cube_subgroup(s: &str) -> Option<[bool; 48]> {
    let mut mask = [false; 48];
    match s {
        "()" => mask[0] = true,
        "(x)" => {
            mask[0] = true;
            mask[1] = true;
        }
        "(z)" => {
            mask[0] = true;
            mask[17] = true;
        }
        "(xy)" => mask[..8].fill(true),
        "(xyz+)" => mask.iter_mut().step_by(2).for_each(|m| *m = true),
        "(xyz)" => mask = [true; 48],
        _ => return None,
    }
    Some(mask)
}

/// Symmetry selection for a node, 2D or 3D.
#[derive(Debug, Clone, PartialEq)]
pub enum Symmetry {
    Square([bool; 8]),
    Cube([bool; 48]),
}

impl Symmetry {
    /// Full symmetry group for the grid dimensionality.
    pub fn full(is_2d: bool) -> Self {
        if is_2d {
            Symmetry::Square([true; 8])
        } else {
            Symmetry::Cube([true; 48])
        }
    }

    /// Parse a named subgroup for the grid dimensionality.
    pub fn parse(is_2d: bool, s: &str) -> Option<Self> {
        if is_2d {
            SquareSubgroup::parse(s).map(|sg| Symmetry::Square(sg.mask()))
        } else {
            cube_subgroup(s).map(Symmetry::Cube)
        }
    }

    /// Expand a rule into its unique variants under this symmetry.
    pub fn apply(&self, rule: &MjRule) -> Vec<MjRule> {
        match self {
            Symmetry::Square(mask) => square_variants(rule, mask),
            Symmetry::Cube(mask) => cube_symmetries(rule, Some(mask)),
        }
    }
}

/// Generate all unique symmetry variants of a rule for 2D patterns.
///
/// Duplicates are removed by comparing rule patterns, so a fully symmetric
/// pattern yields a single rule.
pub fn square_symmetries(rule: &MjRule, subgroup: Option<SquareSubgroup>) -> Vec<MjRule> {
    square_variants(rule, &subgroup.unwrap_or_default().mask())
}

fn square_variants(rule: &MjRule, mask: &[bool; 8]) -> Vec<MjRule> {
    let r0 = rule.clone();
    let r1 = r0.reflected();
    let r2 = r0.z_rotated();
    let r3 = r2.reflected();
    let r4 = r2.z_rotated();
    let r5 = r4.reflected();
    let r6 = r4.z_rotated();
    let r7 = r6.reflected();

    dedup_masked([r0, r1, r2, r3, r4, r5, r6, r7], mask)
}

/// Generate all unique 3D cube symmetry variants of a rule.
///
/// The 48 elements are generated from a = 90° around Z, b = 90° around Y and
/// r = X reflection, in the order used by model documents' subgroup masks.
pub fn cube_symmetries(rule: &MjRule, subgroup: Option<&[bool; 48]>) -> Vec<MjRule> {
    let mut s: [MjRule; 48] = std::array::from_fn(|_| rule.clone());

    // even slots are rotations, each odd slot is the reflection of the one before
    let rotation_sources: [(usize, usize, bool); 23] = [
        (2, 0, true),   // a
        (4, 2, true),   // a²
        (6, 4, true),   // a³
        (8, 0, false),  // b
        (10, 2, false), // ba
        (12, 4, false), // ba²
        (14, 6, false), // ba³
        (16, 8, false), // b²
        (18, 10, false),
        (20, 12, false),
        (22, 14, false),
        (24, 16, false), // b³
        (26, 18, false),
        (28, 20, false),
        (30, 22, false),
        (32, 8, true), // ab
        (34, 10, true),
        (36, 12, true),
        (38, 14, true),
        (40, 24, true), // ab³
        (42, 26, true),
        (44, 28, true),
        (46, 30, true),
    ];

    s[1] = s[0].reflected();
    for (target, source, around_z) in rotation_sources {
        s[target] = if around_z {
            s[source].z_rotated()
        } else {
            s[source].y_rotated()
        };
        s[target + 1] = s[target].reflected();
    }

    dedup_masked(s, subgroup.unwrap_or(&[true; 48]))
}

fn dedup_masked<const N: usize>(variants: [MjRule; N], mask: &[bool; N]) -> Vec<MjRule> {
    let mut result: Vec<MjRule> = Vec::new();
    for (i, variant) in variants.into_iter().enumerate() {
        if mask[i] && !result.iter().any(|v| v.same(&variant)) {
            result.push(variant);
        }
    }
    result
}
