//! The run scheduler.
//!
//! For every model configuration: load the document, bind an engine, then
//! run `effective_amount()` iterations. Each frame of an iteration is
//! colored, routed and written. A failing model is recorded and the batch
//! moves on; only a palette lookup failure under `PaletteLookupPolicy::Abort`
//! stops the whole batch.

use super::config::{ModelConfig, ModelEntry};
use super::engine::{EngineBinder, FsModelSource, MarkovJuniorBinder, ModelSource};
use super::error::{BatchError, PaletteLookupError};
use super::palette::{PaletteLookupPolicy, PaletteMap, PaletteResolver};
use super::persistence::{FileSinks, RasterSink, VolumeSink};
use super::report::{BatchReport, ModelOutcome, RunState, SkipReason};
use super::router::{route, OutputFormat, RouteFlags, RouteInput};
use super::seeds::{resolve_seed, SeedSource};
use crate::markov_junior::{Frame, RngKind, RunRequest};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Cooperative cancellation shared between the caller and the scheduler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runtime knobs of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Directory receiving every artifact
    pub output_root: PathBuf,
    /// Models run concurrently when greater than 1
    pub workers: usize,
    /// Engine random generator
    pub rng: RngKind,
    pub missing_color: PaletteLookupPolicy,
    /// Seed of the shared seed source; OS entropy when unset
    pub master_seed: Option<u64>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("output"),
            workers: 1,
            rng: RngKind::default(),
            missing_color: PaletteLookupPolicy::default(),
            master_seed: None,
        }
    }
}

pub struct RunScheduler {
    options: BatchOptions,
    source: Arc<dyn ModelSource>,
    binder: Arc<dyn EngineBinder>,
    raster: Arc<dyn RasterSink>,
    volume: Arc<dyn VolumeSink>,
    seeds: SeedSource,
    resolver: PaletteResolver,
    cancel: CancelToken,
    halted: AtomicBool,
}

impl RunScheduler {
    /// Scheduler reading model documents from disk and writing files under
    /// `options.output_root`.
    pub fn new(options: BatchOptions) -> Self {
        Self {
            source: Arc::new(FsModelSource),
            binder: Arc::new(MarkovJuniorBinder::new(options.rng)),
            raster: Arc::new(FileSinks),
            volume: Arc::new(FileSinks),
            seeds: SeedSource::new(options.master_seed),
            resolver: PaletteResolver::new(options.missing_color),
            cancel: CancelToken::new(),
            halted: AtomicBool::new(false),
            options,
        }
    }

    pub fn with_model_source(mut self, source: impl ModelSource + 'static) -> Self {
        self.source = Arc::new(source);
        self
    }

    pub fn with_binder(mut self, binder: impl EngineBinder + 'static) -> Self {
        self.binder = Arc::new(binder);
        self
    }

    pub fn with_raster_sink(mut self, sink: impl RasterSink + 'static) -> Self {
        self.raster = Arc::new(sink);
        self
    }

    pub fn with_volume_sink(mut self, sink: impl VolumeSink + 'static) -> Self {
        self.volume = Arc::new(sink);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.halted.load(Ordering::SeqCst)
    }

    /// Run one configuration to completion, skip, cancellation or failure.
    pub fn run_model(&self, config: &ModelConfig, palette: &PaletteMap) -> ModelOutcome {
        let mut outcome = ModelOutcome::new(&config.name);
        if self.stopped() {
            outcome.transition(RunState::Cancelled);
            return outcome;
        }
        debug!(
            model = %config.name,
            gui = config.gui_level,
            path = %config.model_path.display(),
            "running model"
        );

        outcome.transition(RunState::Loading);
        let definition = match self.source.load(config) {
            Ok(definition) => definition,
            Err(err) => {
                outcome.skip(SkipReason::LoadError, &err);
                return outcome;
            }
        };

        let (x, y, z) = config.extents();
        let mut engine = match self.binder.bind(&definition, x, y, z) {
            Ok(engine) => engine,
            Err(err) => {
                outcome.skip(SkipReason::BindError, &err);
                return outcome;
            }
        };
        outcome.transition(RunState::Bound);
        outcome.transition(RunState::Running);
        info!(model = %config.name, "{} >", config.name);

        for k in 0..config.effective_amount() {
            if self.stopped() {
                outcome.transition(RunState::Cancelled);
                return outcome;
            }
            let seed = resolve_seed(config.seeds.as_deref(), k, &self.seeds);
            outcome.begin_iteration(seed);

            let request = RunRequest::new(seed, config.steps, config.gif);
            let mut frames = engine.run(&request);
            loop {
                if self.stopped() {
                    outcome.transition(RunState::Cancelled);
                    return outcome;
                }
                let Some(frame) = frames.next() else {
                    break;
                };
                if let Err(err) = self.persist_frame(config, seed, &frame, palette, &mut outcome) {
                    error!(model = %config.name, error = %err, "palette lookup failed, stopping batch");
                    self.halted.store(true, Ordering::SeqCst);
                    outcome.fail(err);
                    return outcome;
                }
            }

            outcome.finish_iteration();
            info!(model = %config.name, seed, "DONE");
        }

        outcome.transition(RunState::Completed);
        outcome
    }

    fn persist_frame(
        &self,
        config: &ModelConfig,
        seed: i32,
        frame: &Frame,
        palette: &PaletteMap,
        outcome: &mut ModelOutcome,
    ) -> Result<(), PaletteLookupError> {
        let colors = self.resolver.resolve(palette, &config.name, &frame.legend)?;
        let input = RouteInput {
            name: &config.name,
            seed,
            counter: frame.counter,
            fx: frame.fx,
            fy: frame.fy,
            fz: frame.fz,
        };
        let flags = RouteFlags {
            gif: config.gif,
            iso: config.iso,
            emit_both: config.emit_both,
        };

        for plan in route(&self.options.output_root, &input, &flags) {
            let written = match plan.format {
                OutputFormat::RasterStill | OutputFormat::RasterFrame => {
                    self.raster
                        .save_raster(&plan.path, frame, &colors, config.pixel_size)
                }
                OutputFormat::Volumetric => self.volume.save_volume(&plan.path, frame, &colors),
            };
            match written {
                Ok(()) => outcome.record(plan, seed, frame.counter),
                Err(err) => {
                    error!(model = %config.name, error = %err, "failed to write artifact");
                    outcome.record_failure();
                }
            }
        }
        Ok(())
    }

    fn run_entry(&self, position: usize, entry: &ModelEntry, palette: &PaletteMap) -> ModelOutcome {
        if self.halted.load(Ordering::SeqCst) {
            // never started
            return ModelOutcome::new(entry_label(position, entry));
        }
        match entry {
            Ok(config) => self.run_model(config, palette),
            Err(err) => {
                let mut outcome = ModelOutcome::new(entry_label(position, entry));
                outcome.transition(RunState::Loading);
                outcome.skip(SkipReason::LoadError, err);
                outcome
            }
        }
    }

    /// Run every entry and collect outcomes in declaration order.
    pub fn run_batch(
        &self,
        configs: &[ModelEntry],
        palette: &PaletteMap,
    ) -> Result<BatchReport, BatchError> {
        let started = Instant::now();
        self.halted.store(false, Ordering::SeqCst);
        let workers = self.options.workers.max(1);
        info!(models = configs.len(), workers, "starting batch");

        let outcomes: Vec<ModelOutcome> = if workers == 1 {
            configs
                .iter()
                .enumerate()
                .map(|(position, entry)| self.run_entry(position, entry, palette))
                .collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("mj-worker-{i}"))
                .build()?;
            pool.install(|| {
                configs
                    .par_iter()
                    .enumerate()
                    .map(|(position, entry)| self.run_entry(position, entry, palette))
                    .collect()
            })
        };

        if let Some(err) = outcomes.iter().find_map(ModelOutcome::fatal) {
            return Err(err.clone().into());
        }

        let report = BatchReport::new(outcomes, started.elapsed());
        info!(
            completed = report.summary.completed,
            skipped = report.summary.skipped,
            cancelled = report.summary.cancelled,
            artifacts = report.summary.artifacts,
            "batch finished"
        );
        Ok(report)
    }
}

fn entry_label(position: usize, entry: &ModelEntry) -> String {
    match entry {
        Ok(config) => config.name.clone(),
        Err(err) => err
            .entry_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("entry {position}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::config::SingleRun;
    use crate::batch::error::{ConfigError, PersistenceError};
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    const FILL: &str = r#"<one values="BW" in="B" out="W"/>"#;

    /// Serves fixed documents by model name.
    struct MemorySource(Vec<(&'static str, &'static str)>);

    impl ModelSource for MemorySource {
        fn load(&self, config: &ModelConfig) -> Result<String, ConfigError> {
            self.0
                .iter()
                .find(|(name, _)| *name == config.name)
                .map(|(_, xml)| xml.to_string())
                .ok_or_else(|| ConfigError::Io {
                    path: config.model_path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such model"),
                })
        }
    }

    /// Records writes without touching the disk.
    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<PathBuf>>>);

    impl Recorder {
        fn paths(&self) -> Vec<PathBuf> {
            self.0.lock().unwrap().clone()
        }
    }

    impl RasterSink for Recorder {
        fn save_raster(
            &self,
            path: &Path,
            _frame: &Frame,
            _colors: &[u32],
            _pixel_size: u32,
        ) -> Result<(), PersistenceError> {
            self.0.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    impl VolumeSink for Recorder {
        fn save_volume(
            &self,
            path: &Path,
            _frame: &Frame,
            _colors: &[u32],
        ) -> Result<(), PersistenceError> {
            self.0.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    /// Fails its first write, then records like `Recorder`.
    #[derive(Default)]
    struct FlakyRaster {
        calls: AtomicUsize,
        written: Recorder,
    }

    impl RasterSink for FlakyRaster {
        fn save_raster(
            &self,
            path: &Path,
            frame: &Frame,
            colors: &[u32],
            pixel_size: u32,
        ) -> Result<(), PersistenceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(PersistenceError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.written.save_raster(path, frame, colors, pixel_size)
        }
    }

    fn config(name: &str, size: usize) -> ModelConfig {
        let mut config = ModelConfig::single_run(&SingleRun {
            model_path: PathBuf::from(format!("models/{name}.xml")),
            size,
            dimension: 2,
            ..SingleRun::default()
        });
        config.emit_both = false;
        config
    }

    fn palette() -> PaletteMap {
        [('B', 0x000000), ('W', 0xFFFFFF)].into_iter().collect()
    }

    fn scheduler(recorder: &Recorder) -> RunScheduler {
        RunScheduler::new(BatchOptions {
            output_root: PathBuf::from("out"),
            master_seed: Some(7),
            ..BatchOptions::default()
        })
        .with_model_source(MemorySource(vec![("Fill", FILL), ("Bad", "<one/>")]))
        .with_raster_sink(recorder.clone())
        .with_volume_sink(recorder.clone())
    }

    #[test]
    fn test_explicit_then_drawn_seeds() {
        let recorder = Recorder::default();
        let mut fill = config("Fill", 4);
        fill.seeds = Some(vec![5, 9]);
        let outcome = scheduler(&recorder).run_model(&fill, &palette());

        assert_eq!(outcome.state(), RunState::Completed);
        assert_eq!(outcome.iterations_completed(), 3);
        assert_eq!(&outcome.seeds()[..2], &[5, 9]);
        assert!(outcome.seeds()[2] >= 0);
        assert_eq!(outcome.artifacts(), 3);
        assert_eq!(outcome.error(), None);
        assert_eq!(recorder.paths()[0], Path::new("out").join("Fill_5.png"));
    }

    #[test]
    fn test_failed_write_is_counted_and_run_continues() {
        let recorder = Recorder::default();
        let flaky = FlakyRaster {
            written: recorder.clone(),
            ..FlakyRaster::default()
        };
        let scheduler = RunScheduler::new(BatchOptions {
            output_root: PathBuf::from("out"),
            ..BatchOptions::default()
        })
        .with_model_source(MemorySource(vec![("Fill", FILL)]))
        .with_raster_sink(flaky);

        let mut fill = config("Fill", 3);
        fill.seeds = Some(vec![1, 2, 3]);
        let report = scheduler.run_batch(&[Ok(fill)], &palette()).unwrap();
        let outcome = &report.outcomes[0];

        assert_eq!(outcome.state(), RunState::Completed);
        assert_eq!(outcome.iterations_completed(), 3);
        assert_eq!(outcome.persistence_failures(), 1);
        assert_eq!(outcome.artifacts(), 2);
        assert_eq!(
            recorder.paths(),
            vec![Path::new("out").join("Fill_2.png"), Path::new("out").join("Fill_3.png")]
        );
        assert_eq!(report.summary.completed, 1);
        assert_eq!(report.summary.persistence_failures, 1);
    }

    #[test]
    fn test_gif_runs_once() {
        let recorder = Recorder::default();
        let mut fill = config("Fill", 2);
        fill.gif = true;
        fill.amount = 4;
        let outcome = scheduler(&recorder).run_model(&fill, &palette());
        assert_eq!(outcome.iterations_completed(), 1);
        assert_eq!(outcome.seeds().len(), 1);
        // 4 fills + the failing step, one frame each, plus the final frame
        assert_eq!(outcome.artifacts(), 6);
        assert_eq!(recorder.paths()[5], Path::new("out").join("Fill").join("5.png"));
    }

    #[test]
    fn test_load_and_bind_errors_skip() {
        let recorder = Recorder::default();
        let scheduler = scheduler(&recorder);

        let missing = scheduler.run_model(&config("Nope", 4), &palette());
        assert_eq!(missing.state(), RunState::Skipped(SkipReason::LoadError));
        assert!(missing.error().is_some());

        let bad = scheduler.run_model(&config("Bad", 4), &palette());
        assert_eq!(bad.state(), RunState::Skipped(SkipReason::BindError));
        assert_eq!(bad.artifacts(), 0);
        assert!(recorder.paths().is_empty());
    }

    #[test]
    fn test_missing_color_aborts_batch() {
        let recorder = Recorder::default();
        let only_black: PaletteMap = [('B', 0)].into_iter().collect();
        let entries = vec![Ok(config("Fill", 3)), Ok(config("Fill", 3))];
        let err = scheduler(&recorder)
            .run_batch(&entries, &only_black)
            .unwrap_err();
        assert!(matches!(err, BatchError::PaletteLookup(PaletteLookupError { symbol: 'W', .. })));
        assert!(recorder.paths().is_empty());
    }

    #[test]
    fn test_placeholder_policy_keeps_going() {
        let recorder = Recorder::default();
        let only_black: PaletteMap = [('B', 0)].into_iter().collect();
        let scheduler = RunScheduler::new(BatchOptions {
            output_root: PathBuf::from("out"),
            missing_color: PaletteLookupPolicy::Placeholder,
            ..BatchOptions::default()
        })
        .with_model_source(MemorySource(vec![("Fill", FILL)]))
        .with_raster_sink(recorder.clone());
        let report = scheduler
            .run_batch(&[Ok(config("Fill", 3))], &only_black)
            .unwrap();
        assert_eq!(report.summary.completed, 1);
        assert_eq!(report.summary.artifacts, 3);
    }

    #[test]
    fn test_cancelled_before_start() {
        let recorder = Recorder::default();
        let scheduler = scheduler(&recorder);
        scheduler.cancel_token().cancel();
        let outcome = scheduler.run_model(&config("Fill", 3), &palette());
        assert_eq!(outcome.state(), RunState::Cancelled);
        assert!(outcome.seeds().is_empty());
    }

    #[test]
    fn test_rejected_entry_is_labelled() {
        let recorder = Recorder::default();
        let rejected = ConfigError::Entry {
            position: 1,
            name: Some("Broken".to_string()),
            source: Box::new(ConfigError::missing("model", "size")),
        };
        let entries = vec![Ok(config("Fill", 2)), Err(rejected)];
        let report = scheduler(&recorder).run_batch(&entries, &palette()).unwrap();
        assert_eq!(report.outcomes[1].name(), "Broken");
        assert_eq!(
            report.outcomes[1].state(),
            RunState::Skipped(SkipReason::LoadError)
        );
        assert_eq!(report.summary.completed, 1);
    }
}
