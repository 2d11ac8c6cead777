//! AI collaborators: field mapping, question answering and resume parsing.
//!
//! The driver only sees the traits, so tests substitute scripted fakes for
//! the HTTP client.

pub mod client;
pub mod json;
pub mod prompts;

use async_trait::async_trait;
use formpilot_page::{FieldMapping, FormField};

use crate::profile::Profile;
use crate::Result;

pub use client::AiClient;
pub use json::parse_mappings;
pub use prompts::INSUFFICIENT_DATA;

/// Assigns profile slots (or actions) to extracted fields.
#[async_trait]
pub trait FieldMapper: Send + Sync {
    /// Whether a credential is available. Checked once before a run.
    fn is_configured(&self) -> bool {
        true
    }

    async fn map_fields(&self, fields: &[FormField], profile: &Profile)
        -> Result<Vec<FieldMapping>>;
}

/// Writes free-text answers to open-ended questions.
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    /// Answer `question` from the profile, or return [`INSUFFICIENT_DATA`].
    async fn answer(&self, question: &str, profile: &Profile) -> Result<String>;
}

/// Turns resume text into a structured profile.
#[async_trait]
pub trait ResumeParser: Send + Sync {
    async fn parse_resume(&self, text: &str) -> Result<Profile>;
}
