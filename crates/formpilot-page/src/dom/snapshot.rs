//! JSON DOM snapshots taken inside a live browser.
//!
//! The snapshot script stamps every element with a numeric id and records the
//! computed style facts and live form state, so the Rust model sees what the
//! user sees rather than what the markup says.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Document, NodeId, Style};

/// One node of a snapshot tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    Text {
        text: String,
    },
    Element {
        tag: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<SnapshotNode>,
        /// Live `value` property (form controls only).
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        checked: bool,
        #[serde(default)]
        selected: bool,
        #[serde(default)]
        style: SnapshotStyle,
        /// Stamp written by the snapshot script (`data-formpilot-node`).
        #[serde(default)]
        node: Option<u64>,
    },
}

/// Computed style as reported by `getComputedStyle` plus a layout flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStyle {
    #[serde(default = "default_display")]
    pub display: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default = "default_position")]
    pub position: String,
    /// `offsetParent !== null` or a non-empty client rect.
    #[serde(default = "default_layout")]
    pub layout: bool,
}

fn default_display() -> String {
    "block".into()
}

fn default_visibility() -> String {
    "visible".into()
}

fn default_opacity() -> f32 {
    1.0
}

fn default_position() -> String {
    "static".into()
}

fn default_layout() -> bool {
    true
}

impl Default for SnapshotStyle {
    fn default() -> Self {
        Self {
            display: default_display(),
            visibility: default_visibility(),
            opacity: default_opacity(),
            position: default_position(),
            layout: default_layout(),
        }
    }
}

impl From<&SnapshotStyle> for Style {
    fn from(s: &SnapshotStyle) -> Self {
        Style {
            display_none: s.display == "none",
            visibility_hidden: Some(s.visibility == "hidden" || s.visibility == "collapse"),
            opacity: s.opacity,
            fixed: s.position == "fixed",
            has_layout: s.layout,
        }
    }
}

pub(super) fn build(root: SnapshotNode) -> Document {
    let mut doc = Document::new();
    let parent = doc.root();
    append(&mut doc, parent, root);
    doc.sync_selects();
    doc
}

fn append(doc: &mut Document, parent: NodeId, node: SnapshotNode) {
    match node {
        SnapshotNode::Text { text } => {
            doc.append_text(parent, text);
        }
        SnapshotNode::Element {
            tag,
            attrs,
            children,
            value,
            checked,
            selected,
            style,
            node,
        } => {
            let id = doc.append_element(parent, &tag, attrs, Style::from(&style), node);
            if let Some(el) = doc.element_mut(id) {
                el.value = value.unwrap_or_default();
                el.checked = checked;
                el.selected = selected;
            }
            for child in children {
                append(doc, id, child);
            }
        }
    }
}
