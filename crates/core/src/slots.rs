//! Discovery of the parameters that receive external input images.
//!
//! Workflows are authored externally and carry no schema, so slots are
//! found heuristically. Each heuristic is a [`SlotMatchRule`]; a
//! [`SlotLocator`] walks nodes in document order and asks its rules, in
//! priority order, whether a node holds a slot. The first rule that
//! answers wins and at most one slot is taken per node.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::{GraphDocument, Node};

/// Parameter names treated as image inputs.
pub const IMAGE_PARAMETER_KEYS: &[&str] = &["image", "filename", "path", "file", "input_image"];

/// Terms a node kind must all contain (case-insensitive) to be an image loader.
pub const IMAGE_LOADER_TERMS: &[&str] = &["load", "image"];

/// A `(node id, parameter name)` position that accepts an asset reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetSlot {
    pub node_id: String,
    pub parameter: String,
}

impl AssetSlot {
    pub fn new(node_id: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            parameter: parameter.into(),
        }
    }
}

impl std::fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.node_id, self.parameter)
    }
}

/// Fewer than two slots were discovered. Not a failure by itself: the
/// caller decides whether explicit slots or an error follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoSlotsFound {
    /// Whatever was found (zero or one slot).
    pub found: Vec<AssetSlot>,
}

/// A heuristic deciding whether a node carries an asset slot.
pub trait SlotMatchRule: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns the slot parameter name when the node matches.
    fn match_node(&self, node_id: &str, node: &Node) -> Option<String>;
}

/// Matches image-loader nodes by their kind, e.g. `LoadImage`,
/// `LoadImageFromUrl`, `Image Load`.
#[derive(Debug, Clone)]
pub struct KindFamilyRule {
    terms: Vec<String>,
    parameter_keys: Vec<String>,
}

impl KindFamilyRule {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
            parameter_keys: IMAGE_PARAMETER_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn kind_matches(&self, kind: &str) -> bool {
        let kind = kind.to_lowercase();
        self.terms.iter().all(|term| kind.contains(term.as_str()))
    }
}

impl Default for KindFamilyRule {
    fn default() -> Self {
        Self::new(IMAGE_LOADER_TERMS)
    }
}

impl SlotMatchRule for KindFamilyRule {
    fn name(&self) -> &str {
        "kind_family"
    }

    fn match_node(&self, _node_id: &str, node: &Node) -> Option<String> {
        if !self.kind_matches(&node.kind) {
            return None;
        }
        // Prefer an image-like key; fall back to the first literal string.
        first_string_parameter(node, |name| self.parameter_keys.iter().any(|k| k == name))
            .or_else(|| first_string_parameter(node, |_| true))
    }
}

/// Matches any node holding a literal string under an image-like key.
#[derive(Debug, Clone)]
pub struct ImageKeyRule {
    keys: Vec<String>,
}

impl ImageKeyRule {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for ImageKeyRule {
    fn default() -> Self {
        Self::new(IMAGE_PARAMETER_KEYS.iter().copied())
    }
}

impl SlotMatchRule for ImageKeyRule {
    fn name(&self) -> &str {
        "image_key"
    }

    fn match_node(&self, _node_id: &str, node: &Node) -> Option<String> {
        first_string_parameter(node, |name| self.keys.iter().any(|k| k == name))
    }
}

/// First parameter, in document order, whose name passes `accept` and
/// whose value is a literal string. Links (`[id, index]`) never qualify.
fn first_string_parameter(node: &Node, accept: impl Fn(&str) -> bool) -> Option<String> {
    node.parameters
        .iter()
        .find(|(name, value)| accept(name) && matches!(value, Value::String(_)))
        .map(|(name, _)| name.clone())
}

/// Walks a graph and collects asset slots using an ordered rule list.
pub struct SlotLocator {
    rules: Vec<Box<dyn SlotMatchRule>>,
}

impl Default for SlotLocator {
    /// Kind-family match first, then image-like parameter keys.
    fn default() -> Self {
        Self::with_rules(vec![
            Box::new(KindFamilyRule::default()),
            Box::new(ImageKeyRule::default()),
        ])
    }
}

impl std::fmt::Debug for SlotLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.rules.iter().map(|r| r.name()).collect();
        f.debug_struct("SlotLocator").field("rules", &names).finish()
    }
}

impl SlotLocator {
    /// Build a locator from rules listed highest priority first.
    pub fn with_rules(rules: Vec<Box<dyn SlotMatchRule>>) -> Self {
        Self { rules }
    }

    /// Append a lower-priority rule.
    pub fn push_rule(&mut self, rule: Box<dyn SlotMatchRule>) {
        self.rules.push(rule);
    }

    /// Every slot in the document, in node order, at most one per node.
    pub fn scan(&self, doc: &GraphDocument) -> Vec<AssetSlot> {
        let mut slots = Vec::new();
        for (node_id, node) in doc.nodes() {
            for rule in &self.rules {
                if let Some(parameter) = rule.match_node(node_id, node) {
                    tracing::trace!(
                        node_id,
                        parameter = %parameter,
                        rule = rule.name(),
                        "Asset slot matched",
                    );
                    slots.push(AssetSlot::new(node_id, parameter));
                    break;
                }
            }
        }
        slots
    }

    /// Slots in discovery order, or [`NoSlotsFound`] when fewer than two.
    pub fn find_asset_slots(&self, doc: &GraphDocument) -> Result<Vec<AssetSlot>, NoSlotsFound> {
        let slots = self.scan(doc);
        if slots.len() < 2 {
            return Err(NoSlotsFound { found: slots });
        }
        Ok(slots)
    }
}

/// [`SlotLocator::find_asset_slots`] with the default rule set.
pub fn find_asset_slots(doc: &GraphDocument) -> Result<Vec<AssetSlot>, NoSlotsFound> {
    SlotLocator::default().find_asset_slots(doc)
}
