//! Model document loader.
//!
//! Builds the grid and node tree for a model document at concrete grid
//! dimensions. Supported elements: `one`, `all`, `prl`, `markov`,
//! `sequence`, `rule` and `union`.

use super::node::Node;
use super::rule_node::RuleNodeData;
use super::symmetry::Symmetry;
use super::{
    AllNode, GridError, MarkovNode, MjGrid, MjRule, OneNode, ParallelNode, RuleParseError,
    SequenceNode,
};
use crate::xml::{parse_document, XmlElement, XmlError};
use std::fmt;
use thiserror::Error;

/// Error type for model loading.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("missing attribute '{attribute}' in <{element}>")]
    MissingAttribute { element: String, attribute: String },
    #[error("invalid value '{value}' for attribute '{attribute}' in <{element}>")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
    #[error("unsupported element <{child}> inside <{parent}>")]
    UnsupportedElement { parent: String, child: String },
    #[error("unknown symmetry: {0}")]
    UnknownSymmetry(String),
    #[error("rule in <{element}>: {source}")]
    Rule {
        element: String,
        #[source]
        source: RuleParseError,
    },
    #[error("<{0}> has no rules")]
    NoRules(String),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("union symbol '{0}' is already defined")]
    DuplicateUnion(char),
    #[error("unknown character '{character}' in union '{symbol}'")]
    UnknownUnionValue { symbol: char, character: char },
    #[error("grid dimensions must be positive, got {mx}x{my}x{mz}")]
    InvalidDimensions { mx: usize, my: usize, mz: usize },
}

/// A model bound to grid dimensions, ready for an `Interpreter`.
pub struct LoadedModel {
    pub root: Box<dyn Node>,
    pub grid: MjGrid,
    /// Start with the center cell set to value 1
    pub origin: bool,
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("grid_size", &(self.grid.mx, self.grid.my, self.grid.mz))
            .field("legend", &self.grid.characters)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Load a model document for a grid of `mx * my * mz` cells.
///
/// A root that is not a branch is wrapped in a `MarkovNode`, so a single
/// `<one .../>` runs until it has no matches.
pub fn load_model_str(
    xml: &str,
    mx: usize,
    my: usize,
    mz: usize,
) -> Result<LoadedModel, LoadError> {
    if mx == 0 || my == 0 || mz == 0 {
        return Err(LoadError::InvalidDimensions { mx, my, mz });
    }

    let root_elem = parse_document(xml)?;
    let values = root_elem
        .attr("values")
        .ok_or_else(|| missing(&root_elem, "values"))?;
    let mut grid = MjGrid::try_with_values(mx, my, mz, values)?;
    load_unions(&root_elem, &mut grid)?;

    let origin = match root_elem.attr("origin") {
        Some(v) => parse_bool(&root_elem, "origin", v)?,
        None => false,
    };

    let is_2d = mz == 1;
    let symmetry = node_symmetry(&root_elem, is_2d, &Symmetry::full(is_2d))?;
    let node = load_node(&root_elem, &grid, &symmetry)?;
    let root: Box<dyn Node> = if node.is_branch() {
        node
    } else {
        Box::new(MarkovNode::new(vec![node]))
    };

    Ok(LoadedModel { root, grid, origin })
}

fn load_node(
    elem: &XmlElement,
    grid: &MjGrid,
    parent: &Symmetry,
) -> Result<Box<dyn Node>, LoadError> {
    let symmetry = node_symmetry(elem, grid.mz == 1, parent)?;

    match elem.name.as_str() {
        "one" | "all" | "prl" => {
            let rules = load_rules(elem, grid, &symmetry)?;
            let steps = match elem.attr("steps") {
                Some(v) => parse_steps(elem, v)?,
                None => 0,
            };
            let data = RuleNodeData::with_steps(rules, steps);
            let node: Box<dyn Node> = match elem.name.as_str() {
                "one" => Box::new(OneNode::with_data(data)),
                "all" => Box::new(AllNode::with_data(data)),
                _ => Box::new(ParallelNode::with_data(data)),
            };
            Ok(node)
        }
        "markov" | "sequence" => {
            let children = elem
                .children
                .iter()
                .filter(|c| c.name != "union")
                .map(|c| load_node(c, grid, &symmetry))
                .collect::<Result<Vec<_>, _>>()?;
            let node: Box<dyn Node> = if elem.name == "markov" {
                Box::new(MarkovNode::new(children))
            } else {
                Box::new(SequenceNode::new(children))
            };
            Ok(node)
        }
        other => Err(LoadError::UnknownNodeType(other.to_string())),
    }
}

/// Rules from the node's own `in`/`out` attributes followed by its `<rule>`
/// children, each expanded by its symmetry.
fn load_rules(
    elem: &XmlElement,
    grid: &MjGrid,
    symmetry: &Symmetry,
) -> Result<Vec<MjRule>, LoadError> {
    let mut rules = Vec::new();

    if elem.attr("in").is_some() || elem.attr("out").is_some() {
        rules.extend(load_rule(elem, elem, grid, symmetry)?);
    }
    for child in elem.children.iter().filter(|c| c.name != "union") {
        if child.name != "rule" {
            return Err(LoadError::UnsupportedElement {
                parent: elem.name.clone(),
                child: child.name.clone(),
            });
        }
        let rule_symmetry = node_symmetry(child, grid.mz == 1, symmetry)?;
        rules.extend(load_rule(elem, child, grid, &rule_symmetry)?);
    }

    if rules.is_empty() {
        return Err(LoadError::NoRules(elem.name.clone()));
    }
    Ok(rules)
}

fn load_rule(
    node: &XmlElement,
    rule_elem: &XmlElement,
    grid: &MjGrid,
    symmetry: &Symmetry,
) -> Result<Vec<MjRule>, LoadError> {
    let input = rule_elem.attr("in").ok_or_else(|| missing(rule_elem, "in"))?;
    let output = rule_elem.attr("out").ok_or_else(|| missing(rule_elem, "out"))?;

    let mut rule = MjRule::parse(input, output, grid).map_err(|source| LoadError::Rule {
        element: node.name.clone(),
        source,
    })?;
    if let Some(p) = rule_elem.attr("p") {
        rule.p = p.parse().map_err(|_| invalid(rule_elem, "p", p))?;
    }

    Ok(symmetry.apply(&rule))
}

fn load_unions(root: &XmlElement, grid: &mut MjGrid) -> Result<(), LoadError> {
    for union in root.descendants().into_iter().filter(|e| e.name == "union") {
        let symbol_str = union.attr("symbol").ok_or_else(|| missing(union, "symbol"))?;
        let mut symbol_chars = symbol_str.chars();
        let symbol = match (symbol_chars.next(), symbol_chars.next()) {
            (Some(c), None) => c,
            _ => return Err(invalid(union, "symbol", symbol_str)),
        };
        if grid.waves.contains_key(&symbol) {
            return Err(LoadError::DuplicateUnion(symbol));
        }

        let values = union.attr("values").ok_or_else(|| missing(union, "values"))?;
        if let Some(character) = values.chars().find(|c| !grid.values.contains_key(c)) {
            return Err(LoadError::UnknownUnionValue { symbol, character });
        }
        let wave = grid.wave(values);
        grid.waves.insert(symbol, wave);
    }
    Ok(())
}

fn node_symmetry(
    elem: &XmlElement,
    is_2d: bool,
    inherited: &Symmetry,
) -> Result<Symmetry, LoadError> {
    match elem.attr("symmetry") {
        Some(name) => Symmetry::parse(is_2d, name)
            .ok_or_else(|| LoadError::UnknownSymmetry(name.to_string())),
        None => Ok(inherited.clone()),
    }
}

/// A negative step count means no limit.
fn parse_steps(elem: &XmlElement, value: &str) -> Result<usize, LoadError> {
    let steps: i64 = value.parse().map_err(|_| invalid(elem, "steps", value))?;
    Ok(usize::try_from(steps).unwrap_or(0))
}

fn parse_bool(elem: &XmlElement, attribute: &str, value: &str) -> Result<bool, LoadError> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(elem, attribute, value)),
    }
}

fn missing(elem: &XmlElement, attribute: &str) -> LoadError {
    LoadError::MissingAttribute {
        element: elem.name.clone(),
        attribute: attribute.to_string(),
    }
}

fn invalid(elem: &XmlElement, attribute: &str, value: &str) -> LoadError {
    LoadError::InvalidAttribute {
        element: elem.name.clone(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_single_rule_root_is_wrapped() {
        let model = load_model_str(r#"<one values="BW" in="B" out="W"/>"#, 8, 8, 1).unwrap();
        assert!(model.root.is_branch());
        assert_eq!(model.grid.characters, vec!['B', 'W']);
        assert!(!model.origin);
    }

    #[test]
    fn test_load_sequence_with_rule_children() {
        let xml = r#"
            <sequence values="BRW" origin="True">
              <one in="R" out="W" steps="5"/>
              <markov>
                <all>
                  <rule in="RB" out="WR"/>
                  <rule in="W" out="B" p="0.5"/>
                </all>
              </markov>
            </sequence>"#;
        let model = load_model_str(xml, 10, 10, 1).unwrap();
        assert!(model.origin);
        assert_eq!(model.grid.c, 3);
    }

    #[test]
    fn test_load_missing_values() {
        let err = load_model_str(r#"<one in="B" out="W"/>"#, 4, 4, 1).unwrap_err();
        assert_eq!(
            err,
            LoadError::MissingAttribute {
                element: "one".to_string(),
                attribute: "values".to_string()
            }
        );
    }

    #[test]
    fn test_load_unknown_node() {
        let err = load_model_str(r#"<sequence values="BW"><wfc/></sequence>"#, 4, 4, 1).unwrap_err();
        assert_eq!(err, LoadError::UnknownNodeType("wfc".to_string()));
    }

    #[test]
    fn test_load_unknown_character_in_rule() {
        let err = load_model_str(r#"<one values="BW" in="B" out="Q"/>"#, 4, 4, 1).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Rule {
                source: RuleParseError::UnknownCharacter('Q'),
                ..
            }
        ));
    }

    #[test]
    fn test_load_symmetry_by_dimension() {
        let xml = r#"<one values="BW" in="B" out="W" symmetry="(xyz)"/>"#;
        assert_eq!(
            load_model_str(xml, 4, 4, 1).unwrap_err(),
            LoadError::UnknownSymmetry("(xyz)".to_string())
        );
        assert!(load_model_str(xml, 4, 4, 4).is_ok());
    }

    #[test]
    fn test_load_union_symbol() {
        let xml = r#"
            <sequence values="BRW">
              <union symbol="?" values="RW"/>
              <all in="?" out="B"/>
            </sequence>"#;
        let model = load_model_str(xml, 3, 3, 1).unwrap();
        assert_eq!(model.grid.waves[&'?'], 0b110);
    }

    #[test]
    fn test_load_rejects_empty_rule_node() {
        let err = load_model_str(r#"<sequence values="BW"><all/></sequence>"#, 4, 4, 1).unwrap_err();
        assert_eq!(err, LoadError::NoRules("all".to_string()));
    }

    #[test]
    fn test_load_invalid_dimensions() {
        let err = load_model_str(r#"<one values="BW" in="B" out="W"/>"#, 0, 4, 1).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDimensions { .. }));
    }
}
