//! Scope resolution: confine extraction and navigation to the surface the
//! user is looking at.
//!
//! Multi-step application flows often render the next step in an overlay
//! instead of navigating, and the stale page behind it keeps its fields. The
//! resolver picks the most recently opened visible overlay (the last one in
//! document order) and falls back to the whole document.

use tracing::debug;

use crate::dom::{Document, NodeId};

/// Class tokens that mark an overlay container.
const OVERLAY_MARKERS: &[&str] = &["modal", "dialog", "overlay", "drawer", "popup"];

/// Find the active scope root. Recomputed on every call.
pub fn resolve(doc: &Document) -> NodeId {
    let root = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|&n| is_overlay(doc, n) && doc.is_visible(n))
        .last();

    match root {
        Some(node) => {
            debug!(
                "scope: overlay <{}> id={:?}",
                doc.tag(node).unwrap_or_default(),
                doc.attr(node, "id")
            );
            node
        }
        None => doc.root(),
    }
}

/// Whether an element looks like a dialog or overlay surface.
pub fn is_overlay(doc: &Document, node: NodeId) -> bool {
    if matches!(doc.attr(node, "role"), Some("dialog" | "alertdialog")) {
        return true;
    }
    if doc
        .attr(node, "aria-modal")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return true;
    }
    if doc.tag(node) == Some("dialog") && doc.has_attr(node, "open") {
        return true;
    }
    doc.classes(node).any(is_overlay_class)
}

/// `modal`, `app-modal`, `modal-dialog` and `side_drawer` match;
/// `modal-footer` and `modal-backdrop` do not.
fn is_overlay_class(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    OVERLAY_MARKERS.iter().any(|marker| {
        token == *marker
            || token.ends_with(&format!("-{}", marker))
            || token.ends_with(&format!("_{}", marker))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_overlay_falls_back_to_document() {
        let doc = Document::parse_html(r#"<form><input id="a"></form>"#).unwrap();
        assert_eq!(resolve(&doc), doc.root());
    }

    #[test]
    fn test_picks_visible_dialog() {
        let doc = Document::parse_html(
            r#"<form><input id="bg"></form>
               <div id="d" role="dialog"><input id="fg"></div>"#,
        )
        .unwrap();
        assert_eq!(resolve(&doc), doc.by_id("d").unwrap());
    }

    #[test]
    fn test_ignores_hidden_overlays() {
        let doc = Document::parse_html(
            r#"<div id="open" class="modal"><input></div>
               <div id="closed" class="modal" style="display:none"><input></div>
               <div id="faded" aria-modal="true" style="opacity:0"></div>"#,
        )
        .unwrap();
        assert_eq!(resolve(&doc), doc.by_id("open").unwrap());
    }

    #[test]
    fn test_last_visible_overlay_wins() {
        let doc = Document::parse_html(
            r#"<div id="first" role="dialog"></div>
               <dialog id="second" open></dialog>"#,
        )
        .unwrap();
        assert_eq!(resolve(&doc), doc.by_id("second").unwrap());
    }

    #[test]
    fn test_fixed_overlay_without_layout_counts() {
        let doc = Document::parse_html(
            r#"<div id="sheet" class="bottom-drawer" style="position:fixed;width:0;height:0"></div>"#,
        )
        .unwrap();
        assert_eq!(resolve(&doc), doc.by_id("sheet").unwrap());
    }

    #[test]
    fn test_overlay_class_tokens() {
        assert!(is_overlay_class("modal"));
        assert!(is_overlay_class("Modal-Dialog"));
        assert!(is_overlay_class("side_drawer"));
        assert!(!is_overlay_class("modal-footer"));
        assert!(!is_overlay_class("modal-backdrop"));
        assert!(!is_overlay_class("popupish"));
    }

    #[test]
    fn test_structural_children_do_not_steal_scope() {
        let doc = Document::parse_html(
            r#"<div id="m" class="modal"><div class="modal-body"><input></div>
               <div class="modal-footer"><button>Next</button></div></div>
               <div class="modal-backdrop"></div>"#,
        )
        .unwrap();
        assert_eq!(resolve(&doc), doc.by_id("m").unwrap());
    }
}
