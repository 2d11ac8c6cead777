//! Field extraction: turn the controls of a scope into [`FormField`]s.

use std::collections::HashSet;

use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::navigate::reads_forward;
use crate::protocol::{FieldOption, FormField};
use crate::scope;

/// Attribute carrying positional identifiers between extraction and filling.
pub const STAMP_ATTR: &str = "data-formpilot-id";

/// Input types that never take a value from a profile.
const EXCLUDED_INPUT_TYPES: &[&str] = &["hidden", "submit", "button", "image", "reset"];

/// Elements that may act as a visual label for a following control.
const LABEL_LIKE: &[&str] = &[
    "label", "span", "div", "p", "legend", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// How far up the tree context lookup goes before falling back to the group.
const CONTEXT_DEPTH: usize = 5;

/// Wrapper levels searched for a preceding label-like sibling.
const SIBLING_LABEL_DEPTH: usize = 2;

/// Extract fields from the active scope (see [`scope::resolve`]).
pub fn extract_active(doc: &mut Document) -> impl Iterator<Item = FormField> {
    let root = scope::resolve(doc);
    extract(doc, root)
}

/// Extract every eligible, visible control under `root`.
///
/// Identifiers are unique within one call. Controls without a usable `id`
/// get a positional `field_<n>` identifier, stamped onto the element as
/// [`STAMP_ATTR`] so the filler can find it again; stamps from earlier passes
/// are cleared first.
pub fn extract(doc: &mut Document, root: NodeId) -> impl Iterator<Item = FormField> {
    clear_stamps(doc);

    let mut used: HashSet<String> = HashSet::new();
    let mut seen_radio_groups: HashSet<String> = HashSet::new();
    let mut fields = Vec::new();
    let mut stamps = Vec::new();

    for node in doc.descendants(root) {
        if !is_eligible(doc, node) || !doc.is_visible(node) {
            continue;
        }

        let kind = control_kind(doc, node);
        let name = doc.attr(node, "name").unwrap_or_default().to_string();

        // One field per radio group.
        if kind == "radio" && !name.is_empty() && !seen_radio_groups.insert(name.clone()) {
            continue;
        }

        let position = fields.len();
        let id = match doc.attr(node, "id").filter(|id| !id.is_empty()) {
            Some(id) if !used.contains(id) => id.to_string(),
            _ => {
                let id = fallback_id(position, &used);
                stamps.push((node, id.clone()));
                id
            }
        };
        used.insert(id.clone());

        let options = match kind.as_str() {
            "select" => select_options(doc, node),
            "radio" if !name.is_empty() => radio_options(doc, root, &name),
            _ => Vec::new(),
        };

        fields.push(FormField {
            id,
            name,
            placeholder: non_empty(doc.attr(node, "placeholder")),
            label: if kind == "button" {
                non_empty(Some(doc.text(node).as_str())).or_else(|| resolve_label(doc, node))
            } else {
                resolve_label(doc, node)
            },
            aria_label: non_empty(doc.attr(node, "aria-label")),
            autocomplete: non_empty(doc.attr(node, "autocomplete")),
            required: doc.has_attr(node, "required")
                || doc
                    .attr(node, "aria-required")
                    .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            context: resolve_context(doc, node),
            section: resolve_section(doc, node),
            kind,
            options,
        });
    }

    for (node, id) in stamps {
        doc.set_attr(node, STAMP_ATTR, &id);
    }

    debug!("extract: {} fields", fields.len());
    fields.into_iter()
}

fn clear_stamps(doc: &mut Document) {
    let stamped: Vec<NodeId> = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|&n| doc.has_attr(n, STAMP_ATTR))
        .collect();
    for node in stamped {
        doc.remove_attr(node, STAMP_ATTR);
    }
}

fn fallback_id(position: usize, used: &HashSet<String>) -> String {
    let base = format!("field_{}", position);
    if !used.contains(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or(base)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|v| crate::collapse_whitespace(v))
        .filter(|v| !v.is_empty())
}

pub(crate) fn is_control(doc: &Document, node: NodeId) -> bool {
    matches!(
        doc.tag(node),
        Some("input" | "select" | "textarea" | "button")
    )
}

fn is_eligible(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        Some("input") => !EXCLUDED_INPUT_TYPES.contains(&doc.input_type(node).as_str()),
        Some("select" | "textarea") => true,
        // Buttons are offered as trigger-add targets; navigation owns the
        // forward-progress ones.
        Some("button") => {
            let submit = doc
                .attr(node, "type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("submit"));
            !submit && !reads_forward(doc, node)
        }
        _ => false,
    }
}

fn control_kind(doc: &Document, node: NodeId) -> String {
    match doc.tag(node) {
        Some("input") => doc.input_type(node),
        Some(tag) => tag.to_string(),
        None => String::new(),
    }
}

// =============================================================================
// Labels
// =============================================================================

fn resolve_label(doc: &Document, node: NodeId) -> Option<String> {
    explicit_label(doc, node)
        .or_else(|| enclosing_label(doc, node))
        .or_else(|| labelled_by(doc, node))
        .or_else(|| preceding_label(doc, node))
        .map(|text| clean_label(&text))
        .filter(|text| !text.is_empty())
}

/// Strip the decorations forms put after label text ("Email *", "Name:").
fn clean_label(text: &str) -> String {
    text.trim_end_matches(|c: char| c == '*' || c == ':' || c.is_whitespace())
        .to_string()
}

fn explicit_label(doc: &Document, node: NodeId) -> Option<String> {
    let id = doc.attr(node, "id").filter(|id| !id.is_empty())?;
    let label = doc.find(|d, n| d.tag(n) == Some("label") && d.attr(n, "for") == Some(id))?;
    Some(doc.text(label)).filter(|t| !t.is_empty())
}

fn enclosing_label(doc: &Document, node: NodeId) -> Option<String> {
    let label = doc.ancestors(node).find(|&a| doc.tag(a) == Some("label"))?;
    Some(doc.text_without(label, is_control)).filter(|t| !t.is_empty())
}

fn labelled_by(doc: &Document, node: NodeId) -> Option<String> {
    let ids = doc.attr(node, "aria-labelledby")?;
    let text = ids
        .split_whitespace()
        .filter_map(|id| doc.by_id(id))
        .map(|n| doc.text(n))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Some(text).filter(|t| !t.is_empty())
}

/// Nearest preceding label-like sibling of the control or of one of its
/// wrappers. Stops at the first sibling that holds another control.
fn preceding_label(doc: &Document, node: NodeId) -> Option<String> {
    let mut current = node;
    for _ in 0..=SIBLING_LABEL_DEPTH {
        for sibling in preceding_siblings(doc, current) {
            if is_control(doc, sibling) || doc.descendants(sibling).iter().any(|&d| is_control(doc, d)) {
                return None;
            }
            let is_label_like = doc.tag(sibling).is_some_and(|t| LABEL_LIKE.contains(&t));
            if is_label_like {
                let text = doc.text(sibling);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
        current = doc.parent(current).filter(|&p| doc.is_element(p))?;
    }
    None
}

/// Element siblings before `node`, nearest first.
fn preceding_siblings(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let Some(parent) = doc.parent(node) else {
        return Vec::new();
    };
    doc.element_children(parent)
        .take_while(|&c| c != node)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

// =============================================================================
// Context and section
// =============================================================================

fn is_heading(doc: &Document, node: NodeId) -> bool {
    matches!(
        doc.tag(node),
        Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "legend")
    ) || doc.attr(node, "role") == Some("heading")
}

fn is_group(doc: &Document, node: NodeId) -> bool {
    matches!(doc.tag(node), Some("fieldset" | "section")) || doc.attr(node, "role") == Some("group")
}

/// Nearest heading or legend above the control: a heading child of one of
/// the first few ancestors that comes before the branch holding the control,
/// else the first heading of the enclosing group.
fn resolve_context(doc: &Document, node: NodeId) -> Option<String> {
    let mut branch = node;
    for ancestor in doc.ancestors(node).take(CONTEXT_DEPTH) {
        let heading = doc
            .element_children(ancestor)
            .take_while(|&c| c != branch)
            .filter(|&c| is_heading(doc, c))
            .last();
        if let Some(heading) = heading {
            let text = doc.text(heading);
            if !text.is_empty() {
                return Some(text);
            }
        }
        branch = ancestor;
    }

    let group = doc.ancestors(node).find(|&a| is_group(doc, a))?;
    doc.descendants(group)
        .into_iter()
        .find(|&d| is_heading(doc, d))
        .map(|h| doc.text(h))
        .filter(|t| !t.is_empty())
}

/// Stable identifier of the nearest enclosing group that has one.
fn resolve_section(doc: &Document, node: NodeId) -> Option<String> {
    doc.ancestors(node)
        .filter(|&a| is_group(doc, a) || doc.tag(a) == Some("form"))
        .find_map(|a| {
            ["id", "data-section", "name"]
                .iter()
                .find_map(|attr| non_empty(doc.attr(a, attr)))
        })
}

// =============================================================================
// Options
// =============================================================================

fn select_options(doc: &Document, select: NodeId) -> Vec<FieldOption> {
    doc.options(select)
        .into_iter()
        .map(|o| FieldOption {
            label: doc.text(o),
            value: doc.option_value(o),
        })
        .collect()
}

fn radio_options(doc: &Document, root: NodeId, name: &str) -> Vec<FieldOption> {
    doc.descendants(root)
        .into_iter()
        .filter(|&n| {
            doc.tag(n) == Some("input")
                && doc.input_type(n) == "radio"
                && doc.attr(n, "name") == Some(name)
        })
        .map(|n| {
            let value = doc.value(n).unwrap_or_default().to_string();
            FieldOption {
                label: resolve_label(doc, n).unwrap_or_else(|| value.clone()),
                value,
            }
        })
        .collect()
}
