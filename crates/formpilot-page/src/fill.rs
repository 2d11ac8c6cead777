//! Field filling: apply one mapping to one control.
//!
//! A value write is followed by the notification sequence reactive
//! frameworks listen for. Plain text controls are also written through the
//! native value setter, since instrumented setters can miss a direct
//! assignment.

use tracing::debug;

use crate::dom::{Document, EventKind, NodeId};
use crate::extract::STAMP_ATTR;
use crate::protocol::{FieldMapping, MappingAction};

/// Events dispatched after every value write, in order.
const NOTIFY_SEQUENCE: &[EventKind] = &[
    EventKind::Input,
    EventKind::Change,
    EventKind::KeyDown,
    EventKind::KeyUp,
    EventKind::Blur,
];

/// Input types written through the native setter as well.
const TEXT_LIKE: &[&str] = &["text", "email", "tel", "url", "search", "password"];

/// Locate the target of a mapping: extraction stamp, then `id`, then `name`.
pub fn locate(doc: &Document, mapping: &FieldMapping) -> Option<NodeId> {
    let id = mapping.id.as_str();
    if !id.is_empty() {
        if let Some(node) = doc.find(|d, n| d.attr(n, STAMP_ATTR) == Some(id)) {
            return Some(node);
        }
        if let Some(node) = doc.by_id(id) {
            return Some(node);
        }
    }
    let name = mapping.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(id);
    if name.is_empty() {
        return None;
    }
    doc.find(|d, n| d.attr(n, "name") == Some(name))
}

/// Apply `mapping` with `value`. Returns false only when the target is not
/// found; a value that matches no option is still a success.
pub fn fill(doc: &mut Document, mapping: &FieldMapping, value: &str) -> bool {
    if mapping.action == MappingAction::TriggerAdd {
        return trigger(doc, mapping);
    }

    let Some(node) = locate(doc, mapping) else {
        debug!("fill: {} not found", mapping.id);
        return false;
    };

    match doc.tag(node) {
        Some("select") => fill_select(doc, node, value),
        Some("textarea") => write_text(doc, node, value, true),
        Some("input") => match doc.input_type(node).as_str() {
            "checkbox" => doc.set_checked(node, is_truthy(value)),
            "radio" => fill_radio(doc, node, value),
            kind => {
                let text_like = TEXT_LIKE.contains(&kind);
                write_text(doc, node, value, text_like)
            }
        },
        _ => {
            debug!("fill: {} is not a value control", mapping.id);
            return true;
        }
    }

    notify(doc, node);
    debug!("fill: {} = '{}'", mapping.id, value);
    true
}

/// Activate the button of a trigger-add mapping.
pub fn trigger(doc: &mut Document, mapping: &FieldMapping) -> bool {
    match locate(doc, mapping) {
        Some(node) => {
            debug!("trigger-add: {}", mapping.id);
            doc.click(node);
            true
        }
        None => {
            debug!("trigger-add: {} not found", mapping.id);
            false
        }
    }
}

fn write_text(doc: &mut Document, node: NodeId, value: &str, native: bool) {
    doc.set_value(node, value);
    if native {
        doc.set_native_value(node, value);
    }
}

/// First option whose value or label equals `value`, ignoring case.
fn fill_select(doc: &mut Document, select: NodeId, value: &str) {
    let wanted = value.trim();
    let index = doc.options(select).iter().position(|&o| {
        doc.option_value(o).trim().eq_ignore_ascii_case(wanted)
            || doc.text(o).eq_ignore_ascii_case(wanted)
    });
    match index {
        Some(index) => doc.select_index(select, index),
        None => debug!("fill: no option matches '{}'", value),
    }
}

/// Check the radio of the same group whose value matches.
fn fill_radio(doc: &mut Document, node: NodeId, value: &str) {
    let wanted = value.trim();
    let target = match doc.attr(node, "name") {
        Some(name) => doc.find(|d, n| {
            d.tag(n) == Some("input")
                && d.input_type(n) == "radio"
                && d.attr(n, "name") == Some(name)
                && d.value(n).is_some_and(|v| v.eq_ignore_ascii_case(wanted))
        }),
        None => Some(node).filter(|&n| doc.value(n).is_some_and(|v| v.eq_ignore_ascii_case(wanted))),
    };
    match target {
        Some(radio) => doc.set_checked(radio, true),
        None => debug!("fill: no radio matches '{}'", value),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

fn notify(doc: &mut Document, node: NodeId) {
    for &kind in NOTIFY_SEQUENCE {
        doc.dispatch(node, kind);
    }
}
