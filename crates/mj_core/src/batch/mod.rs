//! Batch run orchestration.
//!
//! Turns declared model configurations into engine runs and artifacts:
//!
//! - `config`: `models.xml` entries and the single-model form
//! - `palette`: symbol colors and the missing-symbol policy
//! - `seeds`: explicit and drawn seeds per iteration
//! - `engine`: `ModelSource` / `EngineBinder` / `Engine` seams
//! - `router`: frame geometry and flags to artifact paths
//! - `persistence`: PNG and `.vox` sinks
//! - `scheduler`: `RunScheduler`, sequential or on a rayon pool
//! - `report`: per-model outcomes and `batch_report.json`
//!
//! ## Example
//!
//! ```ignore
//! use mj_core::batch::{load_models, load_palette, BatchOptions, RunScheduler};
//!
//! let entries = load_models(Path::new("models.xml"))?;
//! let palette = load_palette(Path::new("resources/palette.xml"))?;
//! let scheduler = RunScheduler::new(BatchOptions::default());
//! let report = scheduler.run_batch(&entries, &palette)?;
//! println!("{} models completed", report.summary.completed);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod palette;
pub mod persistence;
pub mod report;
pub mod router;
pub mod scheduler;
pub mod seeds;

pub use config::{document_root, load_models, ModelConfig, ModelEntry, SingleRun, MODELS_ROOT};
pub use engine::{Engine, EngineBinder, FsModelSource, MarkovJuniorBinder, ModelSource};
pub use error::{BatchError, BindError, ConfigError, PaletteLookupError, PersistenceError};
pub use palette::{load_palette, PaletteLookupPolicy, PaletteMap, PaletteResolver, PLACEHOLDER_COLOR};
pub use persistence::{FileSinks, RasterSink, VolumeSink};
pub use report::{
    ArtifactRecord, BatchReport, BatchSummary, FailReason, ModelOutcome, RunState, SkipReason,
    REPORT_FILE,
};
pub use router::{route, ArtifactPlan, OutputFormat, RouteFlags, RouteInput, RoutePlan};
pub use scheduler::{BatchOptions, CancelToken, RunScheduler};
pub use seeds::{resolve_seed, SeedSource};
