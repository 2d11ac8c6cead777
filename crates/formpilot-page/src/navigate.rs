//! Forward-progress detection.
//!
//! Finds the control that moves a multi-step flow to its next step. Matching
//! is keyword based: "Finish Application" or a pagination "2" never match.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::{collapse_whitespace, scope};

/// Keywords that mark a forward-progress control.
pub const FORWARD_KEYWORDS: &[&str] = &["next", "continue", "proceed", "review", "submit application"];

/// Labels up to this many characters may match by containment.
const SHORT_LABEL_MAX: usize = 30;

/// Outcome of an activation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationResult {
    pub success: bool,
    pub message: String,
}

/// Whether `label` reads as a forward-progress action.
///
/// Exact keyword match after lowercasing and whitespace collapse, or for
/// short labels any keyword contained in the label ("Next step", "Save and
/// continue", "NextStep").
pub fn is_forward_progress(label: &str) -> bool {
    let label = collapse_whitespace(label).to_lowercase();
    if label.is_empty() {
        return false;
    }
    if FORWARD_KEYWORDS.contains(&label.as_str()) {
        return true;
    }
    label.chars().count() <= SHORT_LABEL_MAX
        && FORWARD_KEYWORDS.iter().any(|kw| label.contains(kw))
}

/// Find the forward-progress control in the active scope.
pub fn find_next(doc: &Document) -> Option<NodeId> {
    find_next_in(doc, scope::resolve(doc))
}

/// Find the first forward-progress control under `root`, in document order.
pub fn find_next_in(doc: &Document, root: NodeId) -> Option<NodeId> {
    doc.descendants(root)
        .into_iter()
        .filter(|&n| is_candidate(doc, n) && doc.is_visible(n))
        .find(|&n| reads_forward(doc, n))
}

/// Whether the visible text or the accessible label of `node` is a forward
/// keyword.
pub(crate) fn reads_forward(doc: &Document, node: NodeId) -> bool {
    is_forward_progress(&candidate_text(doc, node))
        || doc.attr(node, "aria-label").is_some_and(is_forward_progress)
}

/// Activate the forward-progress control, if any. Does not check whether the
/// page actually moved on.
pub fn activate(doc: &mut Document) -> NavigationResult {
    match find_next(doc) {
        Some(node) => {
            let text = candidate_text(doc, node);
            debug!("navigate: activating \"{}\"", text);
            doc.click(node);
            NavigationResult {
                success: true,
                message: format!("activated \"{}\"", text),
            }
        }
        None => NavigationResult {
            success: false,
            message: "no forward-progress control found".into(),
        },
    }
}

/// Buttons, button-like inputs and anything with `role="button"`, unless
/// disabled.
pub(crate) fn is_candidate(doc: &Document, node: NodeId) -> bool {
    if doc.has_attr(node, "disabled")
        || doc
            .attr(node, "aria-disabled")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return false;
    }
    match doc.tag(node) {
        Some("button") => true,
        Some("input") => matches!(doc.input_type(node).as_str(), "submit" | "button"),
        _ => doc.attr(node, "role") == Some("button"),
    }
}

/// Visible text of a candidate; `value` for inputs.
pub(crate) fn candidate_text(doc: &Document, node: NodeId) -> String {
    if doc.tag(node) == Some("input") {
        let value = doc.value(node).unwrap_or_default();
        collapse_whitespace(value)
    } else {
        doc.text(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_exact_and_short_containment() {
        assert!(is_forward_progress("Next"));
        assert!(is_forward_progress("  CONTINUE "));
        assert!(is_forward_progress("Submit Application"));
        assert!(is_forward_progress("Next step"));
        assert!(is_forward_progress("Save and continue"));
        assert!(is_forward_progress("Review →"));
        assert!(is_forward_progress("NextStep"));

        assert!(!is_forward_progress("Finish Application"));
        assert!(!is_forward_progress("Back"));
        assert!(!is_forward_progress(""));
        assert!(!is_forward_progress(
            "Please read the terms before you continue with the process"
        ));
    }

    #[test]
    fn test_first_match_in_document_order() {
        let doc = Document::parse_html(
            r#"<button id="back">Back</button>
               <button id="a">Continue</button>
               <input id="b" type="submit" value="Next">"#,
        )
        .unwrap();
        assert_eq!(find_next(&doc), doc.by_id("a"));
    }

    #[test]
    fn test_accessible_label_and_role_button() {
        let doc = Document::parse_html(
            r#"<div id="arrow" role="button" aria-label="Next page">›</div>"#,
        )
        .unwrap();
        assert_eq!(find_next(&doc), doc.by_id("arrow"));
    }

    #[test]
    fn test_skips_hidden_and_disabled() {
        let doc = Document::parse_html(
            r#"<button style="display:none">Next</button>
               <button disabled>Next</button>
               <a href="/x">Next</a>"#,
        )
        .unwrap();
        assert!(find_next(&doc).is_none());
    }

    #[test]
    fn test_scoped_to_overlay() {
        let doc = Document::parse_html(
            r#"<button id="bg">Next</button>
               <div role="dialog"><button id="close">Close</button></div>"#,
        )
        .unwrap();
        assert!(find_next(&doc).is_none());
    }

    #[test]
    fn test_activate_records_click() {
        let mut doc = Document::parse_html(r#"<button id="n">Next</button>"#).unwrap();
        let result = activate(&mut doc);
        assert!(result.success);
        assert_eq!(
            doc.journal().last(),
            Some(&crate::Mutation::Event {
                node: doc.by_id("n").unwrap(),
                kind: crate::EventKind::Click,
            })
        );

        let mut doc = Document::parse_html(r#"<button>Finish Application</button>"#).unwrap();
        let result = activate(&mut doc);
        assert!(!result.success);
        assert!(doc.journal().is_empty());
    }
}
