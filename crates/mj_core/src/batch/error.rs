//! Error types for the batch orchestrator.

use crate::markov_junior::{LoadError, VoxError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Reading or parsing `models.xml`, `palette.xml` or a model document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("missing attribute '{attribute}' in <{element}>")]
    MissingAttribute { element: String, attribute: String },
    #[error("invalid value '{value}' for '{attribute}' in <{element}>: {reason}")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
        reason: String,
    },
    #[error("{path}: expected root <{expected}>, found <{found}>")]
    UnexpectedRoot {
        path: PathBuf,
        expected: String,
        found: String,
    },
    /// A `<model>` entry of `models.xml` that could not be turned into a config.
    #[error("model entry {position}: {source}")]
    Entry {
        position: usize,
        name: Option<String>,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        element: &str,
        attribute: &str,
        value: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(element: &str, attribute: &str) -> Self {
        Self::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
    }

    /// Name of the model entry this error belongs to, if known.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Self::Entry { name, .. } => name.as_deref(),
            _ => None,
        }
    }
}

/// A model definition the engine refused to bind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("model definition rejected: {0}")]
    Load(#[from] LoadError),
}

/// A legend symbol with no palette color.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("palette has no color for symbol '{symbol}' used by model '{model}'")]
pub struct PaletteLookupError {
    pub model: String,
    pub symbol: char,
}

/// Writing one artifact failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("cannot encode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}: {fx}x{fy}x{fz} frame at pixel size {pixel_size} is too large to render")]
    ImageTooLarge {
        path: PathBuf,
        fx: usize,
        fy: usize,
        fz: usize,
        pixel_size: u32,
    },
    #[error("{path}: volume {fx}x{fy}x{fz} is too large for .vox")]
    VolumeTooLarge {
        path: PathBuf,
        fx: usize,
        fy: usize,
        fz: usize,
    },
}

impl PersistenceError {
    pub(crate) fn from_vox(path: PathBuf, err: VoxError) -> Self {
        match err {
            VoxError::Io(source) => Self::Io { path, source },
            VoxError::VolumeTooLarge { fx, fy, fz } => Self::VolumeTooLarge { path, fx, fy, fz },
            VoxError::ValueOutOfRange(value) => Self::Io {
                path,
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("value {value} has no voxel palette index"),
                ),
            },
        }
    }
}

/// Errors that end a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    PaletteLookup(#[from] PaletteLookupError),
    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("cannot write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}
