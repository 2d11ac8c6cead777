//! Page-side request dispatch.

use tracing::debug;

use crate::dom::Document;
use crate::protocol::{
    AnalyzeResponse, FieldMapping, FillResponse, MappingAction, PageRequest, PageResponse,
};
use crate::{extract, fill, navigate, scope};

/// Answers control-side requests against one document.
///
/// Stateless: scope is resolved afresh on every request, and every request
/// produces exactly one response.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRouter;

impl MessageRouter {
    pub fn handle(&self, doc: &mut Document, request: PageRequest) -> PageResponse {
        debug!("router: {}", request.name());
        match request {
            PageRequest::Analyze => PageResponse::Analyze(self.analyze(doc)),
            PageRequest::Fill { mappings } => PageResponse::Fill(self.fill(doc, &mappings)),
            PageRequest::Advance => PageResponse::Advance(navigate::activate(doc)),
        }
    }

    fn analyze(&self, doc: &mut Document) -> AnalyzeResponse {
        let root = scope::resolve(doc);
        AnalyzeResponse {
            success: true,
            fields: extract::extract(doc, root).collect(),
        }
    }

    /// Apply a batch in order. Fill mappings without a value are skipped and
    /// do not count as filled.
    fn fill(&self, doc: &mut Document, mappings: &[FieldMapping]) -> FillResponse {
        let filled = mappings
            .iter()
            .filter(|m| match (m.action, m.value.as_deref()) {
                (MappingAction::TriggerAdd, _) => fill::trigger(doc, m),
                (MappingAction::Fill, Some(value)) => fill::fill(doc, m, value),
                (MappingAction::Fill, None) => {
                    debug!("router: {} has no value", m.id);
                    false
                }
            })
            .count();
        debug!("router: filled {}/{}", filled, mappings.len());
        FillResponse {
            success: true,
            filled,
            requested: mappings.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <form><input id="bg" name="bg"></form>
        <div class="modal">
          <label for="first_name">First Name</label><input id="first_name">
          <button type="button" id="add">Add Experience</button>
          <button>Next</button>
        </div>"#;

    #[test]
    fn test_analyze_scopes_to_overlay() {
        let mut doc = Document::parse_html(PAGE).unwrap();
        let PageResponse::Analyze(res) = MessageRouter.handle(&mut doc, PageRequest::Analyze) else {
            panic!("expected analyze response");
        };
        assert!(res.success);
        let ids: Vec<_> = res.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["first_name", "add"]);
    }

    #[test]
    fn test_fill_counts() {
        let mut doc = Document::parse_html(PAGE).unwrap();
        let mappings = vec![
            FieldMapping::fill("first_name", "first_name").with_value("Jane"),
            FieldMapping::trigger_add("add"),
            FieldMapping::fill("ghost", "email").with_value("x@y.z"),
            FieldMapping::fill("bg", "email"),
        ];
        let res = MessageRouter.handle(&mut doc, PageRequest::Fill { mappings });
        assert_eq!(
            res,
            PageResponse::Fill(FillResponse {
                success: true,
                filled: 2,
                requested: 4
            })
        );
        assert_eq!(doc.value(doc.by_id("first_name").unwrap()), Some("Jane"));
    }

    #[test]
    fn test_advance() {
        let mut doc = Document::parse_html(PAGE).unwrap();
        let PageResponse::Advance(res) = MessageRouter.handle(&mut doc, PageRequest::Advance) else {
            panic!("expected advance response");
        };
        assert!(res.success);
    }
}
