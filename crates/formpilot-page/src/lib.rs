//! # formpilot-page
//!
//! The page side of form automation: everything that needs the DOM.
//!
//! ## Quick Start
//!
//! ```rust
//! use formpilot_page::{Document, MessageRouter, PageRequest, PageResponse};
//!
//! # fn main() -> formpilot_page::Result<()> {
//! let mut doc = Document::parse_html(
//!     r#"<div role="dialog">
//!          <label for="email">Email</label><input id="email" type="email">
//!          <button>Next</button>
//!        </div>"#,
//! )?;
//!
//! let router = MessageRouter;
//! match router.handle(&mut doc, PageRequest::Analyze) {
//!     PageResponse::Analyze(res) => assert_eq!(res.fields.len(), 1),
//!     other => panic!("unexpected response: {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```

pub mod dom;
pub mod extract;
pub mod fill;
pub mod navigate;
pub mod protocol;
pub mod router;
pub mod scope;

pub use dom::{Document, EventKind, Mutation, NodeId, SnapshotNode, Style};
pub use navigate::NavigationResult;
pub use protocol::{
    AdvanceResponse, AnalyzeResponse, FieldMapping, FieldOption, FillResponse, FormField,
    MappingAction, PageRequest, PageResponse, CUSTOM_QUESTION,
};
pub use router::MessageRouter;

/// Result type for formpilot-page operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building a [`Document`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("html parse error: {0}")]
    Html(String),

    #[error("snapshot parse error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Collapse runs of whitespace and trim.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  First\n   Name \t"), "First Name");
        assert_eq!(collapse_whitespace(""), "");
    }
}
