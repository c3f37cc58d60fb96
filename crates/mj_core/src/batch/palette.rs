//! Symbol colors from `palette.xml`.
//!
//! ```xml
//! <colors>
//!   <color symbol="B" value="000000"/>
//!   <color symbol="W" value="FFF1E8"/>
//! </colors>
//! ```

use super::config::read_document;
use super::error::{ConfigError, PaletteLookupError};
use crate::xml::parse_document;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Color painted for unknown symbols under `PaletteLookupPolicy::Placeholder`.
pub const PLACEHOLDER_COLOR: u32 = 0xFFFF00FF;

/// Legend symbol to packed `0xAARRGGBB`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaletteMap {
    colors: HashMap<char, u32>,
}

impl PaletteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `symbol` to an RGB color; alpha is forced opaque.
    pub fn insert(&mut self, symbol: char, rgb: u32) {
        self.colors.insert(symbol, 0xFF000000 | (rgb & 0x00FF_FFFF));
    }

    pub fn get(&self, symbol: char) -> Option<u32> {
        self.colors.get(&symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl FromIterator<(char, u32)> for PaletteMap {
    fn from_iter<I: IntoIterator<Item = (char, u32)>>(iter: I) -> Self {
        let mut palette = Self::new();
        for (symbol, rgb) in iter {
            palette.insert(symbol, rgb);
        }
        palette
    }
}

/// Read and parse `palette.xml`.
pub fn load_palette(path: &Path) -> Result<PaletteMap, ConfigError> {
    let palette = parse_palette(&read_document(path)?)?;
    debug!(path = %path.display(), colors = palette.len(), "loaded palette");
    Ok(palette)
}

/// Parse every `<color symbol value>` element; later entries win.
pub fn parse_palette(xml: &str) -> Result<PaletteMap, ConfigError> {
    let root = parse_document(xml).map_err(|e| ConfigError::Xml(e.to_string()))?;
    let mut palette = PaletteMap::new();
    for element in root.descendants() {
        if element.name != "color" {
            continue;
        }
        let symbol = element
            .attr("symbol")
            .ok_or_else(|| ConfigError::missing("color", "symbol"))?;
        let value = element
            .attr("value")
            .ok_or_else(|| ConfigError::missing("color", "value"))?;

        let mut chars = symbol.chars();
        let symbol = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(ConfigError::invalid(
                    "color",
                    "symbol",
                    symbol,
                    "expected a single character",
                ))
            }
        };
        let rgb = u32::from_str_radix(value.trim_start_matches('#'), 16)
            .map_err(|e| ConfigError::invalid("color", "value", value, e.to_string()))?;
        palette.insert(symbol, rgb);
    }
    Ok(palette)
}

/// What to do with a legend symbol the palette does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaletteLookupPolicy {
    /// Fail the model and stop the batch
    #[default]
    Abort,
    /// Paint the symbol with `PLACEHOLDER_COLOR`
    Placeholder,
}

impl FromStr for PaletteLookupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(Self::Abort),
            "placeholder" => Ok(Self::Placeholder),
            other => Err(format!(
                "unknown missing-color policy '{other}' (expected abort or placeholder)"
            )),
        }
    }
}

impl fmt::Display for PaletteLookupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Abort => "abort",
            Self::Placeholder => "placeholder",
        })
    }
}

/// Resolves frame legends to color arrays under a lookup policy.
///
/// Shared by all workers; placeholder warnings are emitted once per
/// (model, symbol).
#[derive(Debug)]
pub struct PaletteResolver {
    policy: PaletteLookupPolicy,
    warned: Mutex<HashSet<(String, char)>>,
}

impl PaletteResolver {
    pub fn new(policy: PaletteLookupPolicy) -> Self {
        Self {
            policy,
            warned: Mutex::new(HashSet::new()),
        }
    }

    pub fn policy(&self) -> PaletteLookupPolicy {
        self.policy
    }

    /// Colors in legend order, so `colors[value]` is the color of that value.
    pub fn resolve(
        &self,
        palette: &PaletteMap,
        model: &str,
        legend: &[char],
    ) -> Result<Vec<u32>, PaletteLookupError> {
        legend
            .iter()
            .map(|&symbol| match palette.get(symbol) {
                Some(color) => Ok(color),
                None => match self.policy {
                    PaletteLookupPolicy::Abort => Err(PaletteLookupError {
                        model: model.to_string(),
                        symbol,
                    }),
                    PaletteLookupPolicy::Placeholder => {
                        self.warn_once(model, symbol);
                        Ok(PLACEHOLDER_COLOR)
                    }
                },
            })
            .collect()
    }

    fn warn_once(&self, model: &str, symbol: char) {
        let mut warned = self.warned.lock().unwrap_or_else(|e| e.into_inner());
        if warned.insert((model.to_string(), symbol)) {
            warn!(model, %symbol, "palette has no color for symbol, using placeholder");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_palette_forces_alpha() {
        let palette = parse_palette(
            r#"<colors>
                 <color symbol="B" value="000000"/>
                 <color symbol="W" value="FFF1E8"/>
               </colors>"#,
        )
        .unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.get('B'), Some(0xFF000000));
        assert_eq!(palette.get('W'), Some(0xFFFFF1E8));
        assert_eq!(palette.get('R'), None);
    }

    #[test]
    fn test_parse_palette_rejects_bad_entries() {
        let err = parse_palette(r#"<colors><color symbol="BW" value="000000"/></colors>"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAttribute { attribute, .. } if attribute == "symbol"));

        let err = parse_palette(r#"<colors><color symbol="B" value="zz"/></colors>"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAttribute { attribute, .. } if attribute == "value"));

        let err = parse_palette(r#"<colors><color value="000000"/></colors>"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAttribute { .. }));

        assert!(matches!(parse_palette("<colors"), Err(ConfigError::Xml(_))));
    }

    #[test]
    fn test_resolve_follows_legend_order() {
        let palette: PaletteMap = [('B', 0x000000), ('W', 0xFFFFFF), ('R', 0xFF0000)]
            .into_iter()
            .collect();
        let resolver = PaletteResolver::new(PaletteLookupPolicy::Abort);
        let colors = resolver.resolve(&palette, "m", &['R', 'B', 'W']).unwrap();
        assert_eq!(colors, vec![0xFFFF0000, 0xFF000000, 0xFFFFFFFF]);
    }

    #[test]
    fn test_abort_policy_names_symbol() {
        let palette: PaletteMap = [('B', 0)].into_iter().collect();
        let resolver = PaletteResolver::new(PaletteLookupPolicy::Abort);
        let err = resolver.resolve(&palette, "Maze", &['B', 'Q']).unwrap_err();
        assert_eq!(
            err,
            PaletteLookupError {
                model: "Maze".to_string(),
                symbol: 'Q'
            }
        );
    }

    #[test]
    fn test_placeholder_policy_paints_magenta() {
        let palette: PaletteMap = [('B', 0)].into_iter().collect();
        let resolver = PaletteResolver::new(PaletteLookupPolicy::Placeholder);
        for _ in 0..3 {
            let colors = resolver.resolve(&palette, "Maze", &['B', 'Q']).unwrap();
            assert_eq!(colors, vec![0xFF000000, PLACEHOLDER_COLOR]);
        }
        assert_eq!(resolver.warned.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("abort".parse::<PaletteLookupPolicy>(), Ok(PaletteLookupPolicy::Abort));
        assert_eq!("placeholder".parse::<PaletteLookupPolicy>(), Ok(PaletteLookupPolicy::Placeholder));
        assert!("ignore".parse::<PaletteLookupPolicy>().is_err());
        assert_eq!(PaletteLookupPolicy::default().to_string(), "abort");
    }
}
