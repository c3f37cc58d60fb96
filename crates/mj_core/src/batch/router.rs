//! Output routing: which artifacts a frame becomes and where they go.
//!
//! | mode                | artifact                              |
//! |---------------------|---------------------------------------|
//! | gif                 | `{root}/{name}/{counter}.png`         |
//! | `fz == 1` or iso    | `{root}/{name}_{seed}.png`            |
//! | volume              | `{root}/{name}_{seed}.vox`            |
//! | `emit_both`, no gif | both stills, raster first             |

use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Final image of an iteration
    RasterStill,
    /// One image of a frame sequence
    RasterFrame,
    /// MagicaVoxel volume
    Volumetric,
}

impl OutputFormat {
    pub fn is_raster(self) -> bool {
        matches!(self, Self::RasterStill | Self::RasterFrame)
    }
}

/// A planned artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPlan {
    pub format: OutputFormat,
    pub path: PathBuf,
}

/// Frame facts the router decides on.
#[derive(Debug, Clone, Copy)]
pub struct RouteInput<'a> {
    pub name: &'a str,
    pub seed: i32,
    pub counter: usize,
    pub fx: usize,
    pub fy: usize,
    pub fz: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteFlags {
    pub gif: bool,
    pub iso: bool,
    pub emit_both: bool,
}

/// Artifacts for one frame, in write order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutePlan {
    artifacts: Vec<ArtifactPlan>,
}

impl RoutePlan {
    pub fn artifacts(&self) -> &[ArtifactPlan] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    fn push(&mut self, format: OutputFormat, path: PathBuf) {
        self.artifacts.push(ArtifactPlan { format, path });
    }
}

impl IntoIterator for RoutePlan {
    type Item = ArtifactPlan;
    type IntoIter = std::vec::IntoIter<ArtifactPlan>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.into_iter()
    }
}

/// Decide the artifacts for a frame. Pure: no I/O.
pub fn route(output_root: &Path, input: &RouteInput<'_>, flags: &RouteFlags) -> RoutePlan {
    let mut plan = RoutePlan::default();

    if flags.gif {
        plan.push(
            OutputFormat::RasterFrame,
            output_root
                .join(input.name)
                .join(format!("{}.png", input.counter)),
        );
        return plan;
    }

    let stem = format!("{}_{}", input.name, input.seed);
    let raster = input.fz == 1 || flags.iso;
    if raster || flags.emit_both {
        plan.push(
            OutputFormat::RasterStill,
            output_root.join(format!("{stem}.png")),
        );
    }
    if !raster || flags.emit_both {
        plan.push(
            OutputFormat::Volumetric,
            output_root.join(format!("{stem}.vox")),
        );
    }
    plan
}
