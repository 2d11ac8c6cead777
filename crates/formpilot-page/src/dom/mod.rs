//! Arena document model.
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`]. Form state
//! (value, checkedness, option selection) is kept apart from content
//! attributes, the same split a browser makes between IDL properties and
//! markup. Every write is appended to a mutation journal so a live page can
//! replay it.

mod html;
mod snapshot;

pub use snapshot::{SnapshotNode, SnapshotStyle};

use std::collections::BTreeMap;

use crate::{collapse_whitespace, Result};

/// Handle to a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena. Document order for parsed pages.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Computed style facts for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub display_none: bool,
    /// `None` inherits from the parent.
    pub visibility_hidden: Option<bool>,
    pub opacity: f32,
    pub fixed: bool,
    /// Whether the element produces a layout box.
    pub has_layout: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            display_none: false,
            visibility_hidden: None,
            opacity: 1.0,
            fixed: false,
            has_layout: true,
        }
    }
}

impl Style {
    /// Derive style facts from a `style` attribute.
    pub fn from_inline(css: &str) -> Self {
        let mut style = Style::default();
        let mut zero_width = false;
        let mut zero_height = false;

        for decl in css.split(';') {
            let Some((prop, value)) = decl.split_once(':') else {
                continue;
            };
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.to_ascii_lowercase();
            let value = value.trim().trim_end_matches("!important").trim();
            match prop.as_str() {
                "display" => style.display_none = value == "none",
                "visibility" => {
                    style.visibility_hidden = Some(value == "hidden" || value == "collapse")
                }
                "opacity" => style.opacity = value.parse().unwrap_or(1.0),
                "position" => style.fixed = value == "fixed",
                "width" => zero_width = is_zero_length(value),
                "height" => zero_height = is_zero_length(value),
                _ => {}
            }
        }

        if zero_width && zero_height {
            style.has_layout = false;
        }
        style
    }
}

fn is_zero_length(value: &str) -> bool {
    value
        .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%')
        .trim()
        .parse::<f32>()
        .map(|n| n == 0.0)
        .unwrap_or(false)
}

/// DOM events the page side dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Input,
    Change,
    KeyDown,
    KeyUp,
    Blur,
    Click,
}

impl EventKind {
    /// DOM event type name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Change => "change",
            Self::KeyDown => "keydown",
            Self::KeyUp => "keyup",
            Self::Blur => "blur",
            Self::Click => "click",
        }
    }
}

/// One recorded write, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Attribute set (`Some`) or removed (`None`).
    Attribute {
        node: NodeId,
        name: String,
        value: Option<String>,
    },
    /// Plain property assignment (`el.value = v`).
    Value { node: NodeId, value: String },
    /// Write through the prototype's native value setter.
    NativeValue { node: NodeId, value: String },
    Checked { node: NodeId, checked: bool },
    /// Option at `index` became the selection of a `<select>`.
    Selected { node: NodeId, index: usize },
    Event { node: NodeId, kind: EventKind },
}

impl Mutation {
    /// Node the mutation applies to.
    pub fn node(&self) -> NodeId {
        match self {
            Self::Attribute { node, .. }
            | Self::Value { node, .. }
            | Self::NativeValue { node, .. }
            | Self::Checked { node, .. }
            | Self::Selected { node, .. }
            | Self::Event { node, .. } => *node,
        }
    }
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    value: String,
    checked: bool,
    selected: bool,
    style: Style,
    live_id: Option<u64>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// A page's DOM plus its form state and mutation journal.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    journal: Vec<Mutation>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            journal: Vec::new(),
        }
    }

    /// Parse an HTML fragment or page. Style facts come from inline `style`,
    /// the `hidden` attribute and closed `<dialog>` elements.
    pub fn parse_html(html: &str) -> Result<Self> {
        html::parse(html)
    }

    /// Build a document from a snapshot taken inside a live browser.
    pub fn from_snapshot(root: SnapshotNode) -> Self {
        snapshot::build(root)
    }

    /// Parse a JSON snapshot (see [`SnapshotNode`]).
    pub fn from_snapshot_json(json: &str) -> Result<Self> {
        let root: SnapshotNode = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(root))
    }

    /// The document node. Scope resolution falls back to it.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    // =========================================================================
    // Construction
    // =========================================================================

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: BTreeMap<String, String>,
        style: Style,
        live_id: Option<u64>,
    ) -> NodeId {
        self.push_node(
            parent,
            NodeKind::Element(Element {
                tag: tag.to_ascii_lowercase(),
                attrs,
                value: String::new(),
                checked: false,
                selected: false,
                style,
                live_id,
            }),
        )
    }

    pub(crate) fn append_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.push_node(parent, NodeKind::Text(text))
    }

    /// Seed form state from markup: `value`/`checked` attributes, textarea
    /// text and `<option selected>`.
    pub(crate) fn init_form_state(&mut self) {
        for id in self.descendants(self.root()) {
            let tag = self.tag(id).unwrap_or_default().to_string();
            match tag.as_str() {
                "input" => {
                    let toggle = matches!(self.input_type(id).as_str(), "checkbox" | "radio");
                    let value = match self.attr(id, "value") {
                        Some(v) => v.to_string(),
                        None if toggle => "on".to_string(),
                        None => String::new(),
                    };
                    let checked = self.has_attr(id, "checked");
                    if let Some(el) = self.element_mut(id) {
                        el.value = value;
                        el.checked = checked;
                    }
                }
                "textarea" => {
                    let text = self.text_content(id);
                    let text = text.strip_prefix('\n').unwrap_or(&text).to_string();
                    if let Some(el) = self.element_mut(id) {
                        el.value = text;
                    }
                }
                "option" => {
                    let selected = self.has_attr(id, "selected");
                    if let Some(el) = self.element_mut(id) {
                        el.selected = selected;
                    }
                }
                _ => {}
            }
        }
        self.sync_selects();
    }

    /// Make every `<select>` agree with its options: single selects get
    /// their first option when nothing is selected, and the select's value
    /// mirrors the selected option.
    pub(crate) fn sync_selects(&mut self) {
        let selects: Vec<NodeId> = self
            .descendants(self.root())
            .into_iter()
            .filter(|&id| self.tag(id) == Some("select"))
            .collect();

        for select in selects {
            let options = self.options(select);
            let multiple = self.has_attr(select, "multiple");
            let mut chosen = options.iter().position(|&o| self.selected(o));
            if chosen.is_none() && !multiple && !options.is_empty() {
                chosen = Some(0);
                if let Some(el) = self.element_mut(options[0]) {
                    el.selected = true;
                }
            }
            let value = chosen
                .map(|i| self.option_value(options[i]))
                .unwrap_or_default();
            if let Some(el) = self.element_mut(select) {
                el.value = value;
            }
        }
    }

    // =========================================================================
    // Reading
    // =========================================================================

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Whether `id` is an element (not text or the document node).
    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Lowercase tag name.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|el| el.attrs.get(name))
            .map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.element(id)
            .is_some_and(|el| el.attrs.contains_key(name))
    }

    /// Lowercase `type` of an `<input>`, defaulting to `text`.
    pub fn input_type(&self, id: NodeId) -> String {
        self.attr(id, "type")
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "text".to_string())
    }

    /// Whitespace-separated class tokens.
    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or_default().split_whitespace()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Element children only.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
    }

    /// Proper ancestors, nearest first. Stops before the document node.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&n| self.parent(n))
            .filter(|&n| self.is_element(n))
    }

    /// Element descendants of `id` in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.is_element(node) {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        std::iter::successors(self.parent(id), |&n| self.parent(n)).any(|n| n == ancestor)
    }

    /// First element in document order matching `pred`.
    pub fn find(&self, pred: impl Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&id| pred(self, id))
    }

    /// First element whose `id` attribute equals `id`.
    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.find(|doc, n| doc.attr(n, "id") == Some(id))
    }

    /// Raw concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &|_, _| false, &mut out);
        out
    }

    /// Whitespace-collapsed text content.
    pub fn text(&self, id: NodeId) -> String {
        collapse_whitespace(&self.text_content(id))
    }

    /// Whitespace-collapsed text content, skipping subtrees for which `skip`
    /// returns true.
    pub fn text_without(&self, id: NodeId, skip: impl Fn(&Document, NodeId) -> bool) -> String {
        let mut out = String::new();
        self.collect_text(id, &skip, &mut out);
        collapse_whitespace(&out)
    }

    fn collect_text(
        &self,
        id: NodeId,
        skip: &dyn Fn(&Document, NodeId) -> bool,
        out: &mut String,
    ) {
        for &child in self.children(id) {
            match &self.nodes[child.0].kind {
                NodeKind::Text(text) => {
                    out.push_str(text);
                }
                NodeKind::Element(el) => {
                    if skip(self, child) || matches!(el.tag.as_str(), "script" | "style") {
                        continue;
                    }
                    out.push(' ');
                    self.collect_text(child, skip, out);
                    out.push(' ');
                }
                NodeKind::Document => {}
            }
        }
    }

    /// Current value (IDL property, not the attribute).
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.value.as_str())
    }

    pub fn checked(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|el| el.checked)
    }

    pub fn selected(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|el| el.selected)
    }

    /// `<option>` elements of a `<select>`, including those in optgroups.
    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|&id| self.tag(id) == Some("option"))
            .collect()
    }

    /// An option's value: its `value` attribute, else its text.
    pub fn option_value(&self, option: NodeId) -> String {
        match self.attr(option, "value") {
            Some(v) => v.to_string(),
            None => self.text(option),
        }
    }

    /// Index of the first selected option.
    pub fn selected_index(&self, select: NodeId) -> Option<usize> {
        self.options(select).iter().position(|&o| self.selected(o))
    }

    pub fn style(&self, id: NodeId) -> Option<&Style> {
        self.element(id).map(|el| &el.style)
    }

    /// Node stamp assigned by the live snapshot script.
    pub fn live_id(&self, id: NodeId) -> Option<u64> {
        self.element(id).and_then(|el| el.live_id)
    }

    /// Computed visibility: not display:none or fully transparent (itself or
    /// any ancestor), not visibility:hidden (inherited), and either laid out
    /// or fixed-positioned.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let Some(style) = self.style(id) else {
            return false;
        };
        if std::iter::once(id)
            .chain(self.ancestors(id))
            .any(|n| self.style(n).is_some_and(|s| s.display_none || s.opacity <= 0.0))
        {
            return false;
        }
        let hidden = std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|n| self.style(n).and_then(|s| s.visibility_hidden))
            .unwrap_or(false);
        if hidden {
            return false;
        }
        style.has_layout || style.fixed
    }

    // =========================================================================
    // Writing (journaled)
    // =========================================================================

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.insert(name.to_string(), value.to_string());
            self.journal.push(Mutation::Attribute {
                node: id,
                name: name.to_string(),
                value: Some(value.to_string()),
            });
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            if el.attrs.remove(name).is_some() {
                self.journal.push(Mutation::Attribute {
                    node: id,
                    name: name.to_string(),
                    value: None,
                });
            }
        }
    }

    /// Direct property assignment.
    pub fn set_value(&mut self, id: NodeId, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.value = value.to_string();
            self.journal.push(Mutation::Value {
                node: id,
                value: value.to_string(),
            });
        }
    }

    /// Assignment through the native setter, bypassing framework wrappers.
    pub fn set_native_value(&mut self, id: NodeId, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.value = value.to_string();
            self.journal.push(Mutation::NativeValue {
                node: id,
                value: value.to_string(),
            });
        }
    }

    /// Set checkedness. Checking a radio unchecks the rest of its group.
    pub fn set_checked(&mut self, id: NodeId, checked: bool) {
        if self.element(id).is_none() {
            return;
        }
        if checked && self.input_type(id) == "radio" {
            if let Some(name) = self.attr(id, "name").map(str::to_string) {
                let others: Vec<NodeId> = self
                    .descendants(self.root())
                    .into_iter()
                    .filter(|&n| {
                        n != id
                            && self.tag(n) == Some("input")
                            && self.input_type(n) == "radio"
                            && self.attr(n, "name") == Some(name.as_str())
                            && self.checked(n)
                    })
                    .collect();
                for other in others {
                    if let Some(el) = self.element_mut(other) {
                        el.checked = false;
                    }
                    self.journal.push(Mutation::Checked {
                        node: other,
                        checked: false,
                    });
                }
            }
        }
        if let Some(el) = self.element_mut(id) {
            el.checked = checked;
        }
        self.journal.push(Mutation::Checked { node: id, checked });
    }

    /// Make the option at `index` the selection of `select`.
    pub fn select_index(&mut self, select: NodeId, index: usize) {
        let options = self.options(select);
        let Some(&chosen) = options.get(index) else {
            return;
        };
        for &option in &options {
            if let Some(el) = self.element_mut(option) {
                el.selected = option == chosen;
            }
        }
        let value = self.option_value(chosen);
        if let Some(el) = self.element_mut(select) {
            el.value = value;
        }
        self.journal.push(Mutation::Selected {
            node: select,
            index,
        });
    }

    /// Record an event dispatched at `id`.
    pub fn dispatch(&mut self, id: NodeId, kind: EventKind) {
        if self.is_element(id) {
            self.journal.push(Mutation::Event { node: id, kind });
        }
    }

    /// Activate an element the way `el.click()` does.
    pub fn click(&mut self, id: NodeId) {
        self.dispatch(id, EventKind::Click);
    }

    /// Writes recorded since the last [`take_journal`](Self::take_journal).
    pub fn journal(&self) -> &[Mutation] {
        &self.journal
    }

    pub fn take_journal(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.journal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_style() {
        let style = Style::from_inline("display: none; opacity: 0.5");
        assert!(style.display_none);
        assert_eq!(style.opacity, 0.5);

        let style = Style::from_inline("position:fixed;width:0;height:0px");
        assert!(style.fixed);
        assert!(!style.has_layout);

        let style = Style::from_inline("visibility: hidden !important");
        assert_eq!(style.visibility_hidden, Some(true));
    }

    #[test]
    fn test_visibility_rules() {
        let doc = Document::parse_html(
            r#"<div id="gone" style="display:none"><input id="inner"></div>
               <div style="visibility:hidden"><input id="ghost">
                 <input id="shown" style="visibility:visible"></div>
               <input id="clear" style="opacity:0">
               <div style="opacity:0"><input id="faded"></div>
               <div style="opacity:0.05"><input id="dim"></div>
               <input id="flat" style="width:0;height:0">
               <input id="pinned" style="position:fixed;width:0;height:0">
               <input id="plain">"#,
        )
        .unwrap();

        let visible = |id| doc.is_visible(doc.by_id(id).unwrap());
        assert!(!visible("gone"));
        assert!(!visible("inner"));
        assert!(!visible("ghost"));
        assert!(visible("shown"));
        assert!(!visible("clear"));
        assert!(!visible("faded"));
        assert!(visible("dim"));
        assert!(!visible("flat"));
        assert!(visible("pinned"));
        assert!(visible("plain"));
    }

    #[test]
    fn test_select_state() {
        let mut doc = Document::parse_html(
            r#"<select id="s"><option value="a">A</option><option selected>B</option></select>"#,
        )
        .unwrap();
        let select = doc.by_id("s").unwrap();
        assert_eq!(doc.value(select), Some("B"));
        assert_eq!(doc.selected_index(select), Some(1));

        doc.select_index(select, 0);
        assert_eq!(doc.value(select), Some("a"));
        assert_eq!(doc.selected_index(select), Some(0));
        assert_eq!(
            doc.journal().last(),
            Some(&Mutation::Selected {
                node: select,
                index: 0
            })
        );
    }

    #[test]
    fn test_radio_group_exclusive() {
        let mut doc = Document::parse_html(
            r#"<input type="radio" name="r" id="a" value="a" checked>
               <input type="radio" name="r" id="b" value="b">"#,
        )
        .unwrap();
        let a = doc.by_id("a").unwrap();
        let b = doc.by_id("b").unwrap();
        assert!(doc.checked(a));

        doc.set_checked(b, true);
        assert!(!doc.checked(a));
        assert!(doc.checked(b));
    }

    #[test]
    fn test_text_without_skips_subtrees() {
        let doc = Document::parse_html(
            r#"<label id="l">Country <select><option>Canada</option></select></label>"#,
        )
        .unwrap();
        let label = doc.by_id("l").unwrap();
        assert_eq!(doc.text(label), "Country Canada");
        assert_eq!(
            doc.text_without(label, |d, n| d.tag(n) == Some("select")),
            "Country"
        );
    }

    #[test]
    fn test_take_journal_drains() {
        let mut doc = Document::parse_html(r#"<input id="x">"#).unwrap();
        let x = doc.by_id("x").unwrap();
        doc.set_value(x, "hi");
        doc.click(x);
        assert_eq!(doc.take_journal().len(), 2);
        assert!(doc.journal().is_empty());
        assert_eq!(doc.value(x), Some("hi"));
    }
}
