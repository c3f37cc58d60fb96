//! Model configurations from `models.xml`.
//!
//! ```xml
//! <models>
//!   <model name="Basic" size="40" d="2" amount="2" seeds="5 9"/>
//!   <model name="Growth" size="16" d="3" steps="400" iso="True"/>
//! </models>
//! ```
//!
//! Each `<model>` becomes one `ModelEntry`. A bad entry is kept as an error
//! so the rest of the batch still runs.

use super::error::ConfigError;
use crate::xml::{parse_document, XmlElement};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Root element of a batch document.
pub const MODELS_ROOT: &str = "models";

/// One declared generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub name: String,
    /// 2 or 3
    pub dimension: u8,
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    /// Iterations to run; forced to 1 in gif mode
    pub amount: usize,
    /// Step budget per iteration (0 = unlimited)
    pub steps: usize,
    /// Explicit seeds, consumed in iteration order
    pub seeds: Option<Vec<i32>>,
    pub pixel_size: u32,
    pub gif: bool,
    pub iso: bool,
    pub gui_level: i32,
    /// Location of the model document
    pub model_path: PathBuf,
    /// Write both the raster and the volumetric artifact for each frame
    pub emit_both: bool,
}

/// A parsed `<model>` entry or the reason it was rejected.
pub type ModelEntry = Result<ModelConfig, ConfigError>;

/// Parameters of the single-model command line form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleRun {
    pub model_path: PathBuf,
    pub size: usize,
    pub dimension: u8,
    pub steps: usize,
    pub amount: usize,
    /// 0 = draw random seeds
    pub seed: i32,
}

impl Default for SingleRun {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            size: 20,
            dimension: 3,
            steps: 2000,
            amount: 3,
            seed: 0,
        }
    }
}

impl ModelConfig {
    /// Config for running one model document directly, named after its file stem.
    pub fn single_run(run: &SingleRun) -> Self {
        let name = run
            .model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        let size_z = if run.dimension == 2 { 1 } else { run.size };
        Self {
            name,
            dimension: run.dimension,
            size_x: run.size,
            size_y: run.size,
            size_z,
            amount: run.amount,
            steps: run.steps,
            seeds: (run.seed != 0).then(|| vec![run.seed; run.amount]),
            pixel_size: 4,
            gif: false,
            iso: false,
            gui_level: 0,
            model_path: run.model_path.clone(),
            emit_both: true,
        }
    }

    /// Iterations actually run: gif mode records a single animation.
    pub fn effective_amount(&self) -> usize {
        if self.gif {
            1
        } else {
            self.amount
        }
    }

    pub fn extents(&self) -> (usize, usize, usize) {
        (self.size_x, self.size_y, self.size_z)
    }
}

/// Read and parse `models.xml`.
///
/// Fails only when the document itself is unreadable or is not a `<models>`
/// document; individual entries carry their own errors.
pub fn load_models(path: &Path) -> Result<Vec<ModelEntry>, ConfigError> {
    let xml = read_document(path)?;
    let model_dir = path
        .parent()
        .map(|dir| dir.join("models"))
        .unwrap_or_else(|| PathBuf::from("models"));
    parse_models(&xml, path, &model_dir)
}

/// Parse a `<models>` document. Model documents resolve to `{model_dir}/{name}.xml`.
pub fn parse_models(
    xml: &str,
    path: &Path,
    model_dir: &Path,
) -> Result<Vec<ModelEntry>, ConfigError> {
    let root = parse_document(xml).map_err(|e| ConfigError::Xml(e.to_string()))?;
    if root.name != MODELS_ROOT {
        return Err(ConfigError::UnexpectedRoot {
            path: path.to_path_buf(),
            expected: MODELS_ROOT.to_string(),
            found: root.name,
        });
    }

    let entries: Vec<ModelEntry> = root
        .children_named("model")
        .enumerate()
        .map(|(position, element)| {
            parse_model_entry(element, model_dir).map_err(|source| ConfigError::Entry {
                position,
                name: element.attr("name").map(str::to_string),
                source: Box::new(source),
            })
        })
        .collect();
    debug!(path = %path.display(), entries = entries.len(), "loaded model list");
    Ok(entries)
}

/// Name of a document's root element, used to tell batch and model documents apart.
pub fn document_root(path: &Path) -> Result<String, ConfigError> {
    let xml = read_document(path)?;
    let root = parse_document(&xml).map_err(|e| ConfigError::Xml(e.to_string()))?;
    Ok(root.name)
}

pub(crate) fn read_document(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_model_entry(element: &XmlElement, model_dir: &Path) -> Result<ModelConfig, ConfigError> {
    const TAG: &str = "model";

    let name = element
        .attr("name")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ConfigError::missing(TAG, "name"))?
        .to_string();

    let size: i64 = attr_or(element, TAG, "size", -1)?;
    let dimension: i64 = attr_or(element, TAG, "d", 2)?;
    if dimension != 2 && dimension != 3 {
        return Err(ConfigError::invalid(
            TAG,
            "d",
            &dimension.to_string(),
            "dimension must be 2 or 3",
        ));
    }
    let size_x = extent(element, "length", size)?;
    let size_y = extent(element, "width", size)?;
    let size_z = extent(element, "height", if dimension == 2 { 1 } else { size })?;

    let amount: i64 = attr_or(element, TAG, "amount", 2)?;
    if amount <= 0 {
        return Err(ConfigError::invalid(
            TAG,
            "amount",
            &amount.to_string(),
            "must be positive",
        ));
    }
    let pixel_size: i64 = attr_or(element, TAG, "pixelsize", 4)?;
    if pixel_size <= 0 {
        return Err(ConfigError::invalid(
            TAG,
            "pixelsize",
            &pixel_size.to_string(),
            "must be positive",
        ));
    }
    let pixel_size = u32::try_from(pixel_size).map_err(|e| {
        ConfigError::invalid(TAG, "pixelsize", &pixel_size.to_string(), e.to_string())
    })?;

    let gif = bool_attr(element, TAG, "gif", false)?;
    let iso = bool_attr(element, TAG, "iso", false)?;
    let steps: i64 = attr_or(element, TAG, "steps", if gif { 1000 } else { 50000 })?;
    let gui_level: i32 = attr_or(element, TAG, "gui", 0)?;

    let seeds = match element.attr("seeds") {
        Some(list) => Some(
            list.split_whitespace()
                .map(|s| {
                    s.parse::<i32>()
                        .map_err(|e| ConfigError::invalid(TAG, "seeds", s, e.to_string()))
                })
                .collect::<Result<Vec<i32>, _>>()?,
        ),
        None => None,
    };

    Ok(ModelConfig {
        model_path: model_dir.join(format!("{name}.xml")),
        name,
        dimension: dimension as u8,
        size_x,
        size_y,
        size_z,
        amount: amount as usize,
        steps: steps.max(0) as usize,
        seeds,
        pixel_size,
        gif,
        iso,
        gui_level,
        emit_both: false,
    })
}

fn attr_or<T>(element: &XmlElement, tag: &str, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match element.attr(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(tag, key, value, e.to_string())),
        None => Ok(default),
    }
}

fn bool_attr(element: &XmlElement, tag: &str, key: &str, default: bool) -> Result<bool, ConfigError> {
    match element.attr(key) {
        Some(value) if value.eq_ignore_ascii_case("true") => Ok(true),
        Some(value) if value.eq_ignore_ascii_case("false") => Ok(false),
        Some(value) => Err(ConfigError::invalid(tag, key, value, "expected True or False")),
        None => Ok(default),
    }
}

fn extent(element: &XmlElement, key: &str, default: i64) -> Result<usize, ConfigError> {
    let value: i64 = attr_or(element, "model", key, default)?;
    if value <= 0 {
        return Err(ConfigError::invalid(
            "model",
            key,
            &value.to_string(),
            "extent must be positive",
        ));
    }
    Ok(value as usize)
}
