//! Random number generators driving a model run.
//!
//! - `StdRandom`: `rand::rngs::StdRng`, the default
//! - `DotNetRandom`: `clr_random::CLRRandom`, reproduces `System.Random`
//!   sequences so runs can be compared against the reference program
//!
//! Nodes only see the `MjRng` trait object held by the execution context.

use clr_random::CLRRandom;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_core::SeedableRng as RandCoreSeedableRng;
use std::fmt;
use std::str::FromStr;

/// Random source used by the node tree.
///
/// Method names mirror `System.Random`: `Next()`, `Next(max)`, `NextDouble()`.
pub trait MjRng {
    /// Non-negative integer in [0, i32::MAX).
    fn next_int(&mut self) -> i32;

    /// Integer in [0, max). Returns 0 when `max <= 0`.
    fn next_int_max(&mut self, max: i32) -> i32;

    /// Double in [0.0, 1.0).
    fn next_double(&mut self) -> f64;

    /// Index in [0, max), for picking matches.
    fn next_index(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        if max <= i32::MAX as usize {
            self.next_int_max(max as i32) as usize
        } else {
            (self.next_double() * max as f64) as usize
        }
    }
}

/// Fisher-Yates shuffle of `0..len`, drawing `Next(i + 1)` for each slot.
pub fn shuffled_indices(len: usize, rng: &mut dyn MjRng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    for i in (1..len).rev() {
        let j = rng.next_index(i + 1);
        order.swap(i, j);
    }
    order
}

/// `rand` backed generator.
#[derive(Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Seed from a run seed. Negative seeds use their absolute value.
    pub fn from_seed(seed: i32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed.unsigned_abs() as u64),
        }
    }
}

impl MjRng for StdRandom {
    fn next_int(&mut self) -> i32 {
        self.rng.gen_range(0..i32::MAX)
    }

    fn next_int_max(&mut self, max: i32) -> i32 {
        if max <= 0 {
            return 0;
        }
        self.rng.gen_range(0..max)
    }

    fn next_double(&mut self) -> f64 {
        self.rng.gen()
    }
}

/// `System.Random` compatible generator.
pub struct DotNetRandom {
    rng: CLRRandom,
}

impl DotNetRandom {
    /// Matches `new System.Random(seed)`.
    pub fn from_seed(seed: i32) -> Self {
        Self {
            rng: CLRRandom::from_seed(clr_random::Seed::from(seed)),
        }
    }
}

impl MjRng for DotNetRandom {
    fn next_int(&mut self) -> i32 {
        self.rng.next_i32()
    }

    fn next_int_max(&mut self, max: i32) -> i32 {
        if max <= 0 {
            return 0;
        }
        // (int)(Sample() * maxValue)
        (self.rng.next_f64() * max as f64) as i32
    }

    fn next_double(&mut self) -> f64 {
        self.rng.next_f64()
    }
}

/// Which generator a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RngKind {
    #[default]
    Std,
    DotNet,
}

impl RngKind {
    /// Create a generator of this kind for a run seed.
    pub fn create(self, seed: i32) -> Box<dyn MjRng> {
        match self {
            RngKind::Std => Box::new(StdRandom::from_seed(seed)),
            RngKind::DotNet => Box::new(DotNetRandom::from_seed(seed)),
        }
    }
}

impl FromStr for RngKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "std" => Ok(RngKind::Std),
            "dotnet" => Ok(RngKind::DotNet),
            other => Err(format!("unknown rng '{}', expected std or dotnet", other)),
        }
    }
}

impl fmt::Display for RngKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RngKind::Std => write!(f, "std"),
            RngKind::DotNet => write!(f, "dotnet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_random_ranges() {
        let mut rng = StdRandom::from_seed(42);
        for _ in 0..100 {
            let v = rng.next_int();
            assert!((0..i32::MAX).contains(&v));
            let v = rng.next_int_max(10);
            assert!((0..10).contains(&v));
            let d = rng.next_double();
            assert!((0.0..1.0).contains(&d));
        }
        assert_eq!(rng.next_int_max(0), 0);
    }

    #[test]
    fn test_dotnet_random_matches_system_random() {
        // new Random(42).Next() x 5
        let mut rng = DotNetRandom::from_seed(42);
        let expected = [1434747710, 302596119, 269548474, 1122627734, 361709742];
        for exp in expected {
            assert_eq!(rng.next_int(), exp);
        }
    }

    #[test]
    fn test_rng_kind_is_deterministic() {
        for kind in [RngKind::Std, RngKind::DotNet] {
            let mut a = kind.create(123);
            let mut b = kind.create(123);
            for _ in 0..50 {
                assert_eq!(a.next_int(), b.next_int());
            }
        }
    }

    #[test]
    fn test_shuffled_indices_is_permutation() {
        let mut rng = StdRandom::from_seed(7);
        let mut order = shuffled_indices(20, &mut rng);
        order.sort_unstable();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_rng_kind_parse() {
        assert_eq!("std".parse::<RngKind>(), Ok(RngKind::Std));
        assert_eq!("DotNet".parse::<RngKind>(), Ok(RngKind::DotNet));
        assert!("mersenne".parse::<RngKind>().is_err());
    }
}
