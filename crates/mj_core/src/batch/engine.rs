//! Seams between the scheduler and the generation engine.
//!
//! The scheduler only sees `ModelSource` (where a model document comes from),
//! `EngineBinder` (document + extents to a runnable engine) and `Engine`
//! (seeded runs producing a `FrameRun`).

use super::config::{read_document, ModelConfig};
use super::error::{BindError, ConfigError};
use crate::markov_junior::{load_model_str, FrameRun, Interpreter, RngKind, RunRequest};
use tracing::debug;

/// A bound model ready to run.
pub trait Engine {
    /// Reset and start a run. Equal requests on equal bindings yield equal frames.
    fn run(&mut self, request: &RunRequest) -> FrameRun<'_>;
}

impl Engine for Interpreter {
    fn run(&mut self, request: &RunRequest) -> FrameRun<'_> {
        Interpreter::run(self, request)
    }
}

/// Binds a model definition to concrete grid extents.
pub trait EngineBinder: Send + Sync {
    fn bind(
        &self,
        definition: &str,
        x: usize,
        y: usize,
        z: usize,
    ) -> Result<Box<dyn Engine>, BindError>;
}

/// Binds MarkovJunior documents to an `Interpreter`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkovJuniorBinder {
    rng: RngKind,
}

impl MarkovJuniorBinder {
    pub fn new(rng: RngKind) -> Self {
        Self { rng }
    }
}

impl EngineBinder for MarkovJuniorBinder {
    fn bind(
        &self,
        definition: &str,
        x: usize,
        y: usize,
        z: usize,
    ) -> Result<Box<dyn Engine>, BindError> {
        let model = load_model_str(definition, x, y, z)?;
        debug!(x, y, z, rng = %self.rng, "bound model");
        Ok(Box::new(Interpreter::from_model(model).with_rng(self.rng)))
    }
}

/// Supplies the model document for a configuration.
pub trait ModelSource: Send + Sync {
    fn load(&self, config: &ModelConfig) -> Result<String, ConfigError>;
}

/// Reads `config.model_path` from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsModelSource;

impl ModelSource for FsModelSource {
    fn load(&self, config: &ModelConfig) -> Result<String, ConfigError> {
        read_document(&config.model_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::config::SingleRun;
    use crate::markov_junior::LoadError;
    use std::path::PathBuf;

    #[test]
    fn test_bind_and_run() {
        let binder = MarkovJuniorBinder::default();
        let mut engine = binder
            .bind(r#"<one values="BW" in="B" out="W"/>"#, 3, 2, 1)
            .unwrap();
        let frames: Vec<_> = engine.run(&RunRequest::new(1, 0, false)).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].state, vec![1; 6]);
    }

    #[test]
    fn test_bind_rejects_bad_definition() {
        let binder = MarkovJuniorBinder::new(RngKind::DotNet);
        let err = binder.bind(r#"<one in="B" out="W"/>"#, 3, 3, 1).err().unwrap();
        assert!(matches!(err, BindError::Load(LoadError::MissingAttribute { .. })));

        let err = binder
            .bind(r#"<spiral values="BW"/>"#, 3, 3, 1)
            .err()
            .unwrap();
        assert!(matches!(err, BindError::Load(LoadError::UnknownNodeType(_))));
    }

    #[test]
    fn test_fs_source_reads_model_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Fill.xml");
        std::fs::write(&path, "<one values=\"BW\" in=\"B\" out=\"W\"/>").unwrap();
        let config = ModelConfig::single_run(&SingleRun {
            model_path: path,
            ..SingleRun::default()
        });
        assert!(FsModelSource.load(&config).unwrap().contains("values"));

        let missing = ModelConfig::single_run(&SingleRun {
            model_path: PathBuf::from("nowhere/Fill.xml"),
            ..SingleRun::default()
        });
        assert!(matches!(
            FsModelSource.load(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
