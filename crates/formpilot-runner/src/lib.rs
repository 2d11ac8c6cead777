//! # formpilot-runner
//!
//! The control side of form automation. Holds the profile, talks to the AI
//! service and drives a page through analyze, map, answer, fill and advance
//! cycles until the flow ends or the step cap trips.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use formpilot_page::Document;
//! use formpilot_runner::{bridge, AiClient, Config, Profile, StaticPage, StepDriver};
//!
//! # #[tokio::main]
//! # async fn main() -> formpilot_runner::Result<()> {
//! let config = Config::load("formpilot.yaml")?;
//! let profile = Profile::load("profile.yaml")?;
//! let ai = Arc::new(AiClient::new(&config.ai)?);
//!
//! let page = Document::parse_html(&std::fs::read_to_string("step1.html")?)?;
//! let (client, host) = bridge::spawn(StaticPage::new(page));
//!
//! let mut driver = StepDriver::new(client, ai.clone(), ai, profile).with_config(&config);
//! let report = driver.run().await?;
//! println!("steps: {}, filled: {}", report.steps, report.filled);
//! # drop(host);
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod bridge;
mod config;
pub mod document;
mod driver;
mod profile;

pub use ai::{
    parse_mappings, AiClient, FieldMapper, QuestionAnswerer, ResumeParser, INSUFFICIENT_DATA,
};
pub use bridge::{PageClient, PageHost, ScriptedFlow, StaticPage};
pub use config::{AiConfig, BrowserConfig, Config, TimingConfig, Viewport};
pub use document::{DocumentKind, PlainTextParser};
pub use driver::{Completion, RunPhase, RunReport, RunStatus, StepDriver, StepState, MAX_STEPS};
pub use profile::{Education, Experience, Profile, PROFILE_SLOTS};

/// Result type for formpilot-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised on the control side.
///
/// Only [`Error::Configuration`] and [`Error::Communication`] end a run. The
/// driver absorbs [`Error::Mapping`] and [`Error::Answer`] per step.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("page context unreachable: {0}")]
    Communication(String),

    #[error("mapping failed: {0}")]
    Mapping(String),

    #[error("answer failed: {0}")]
    Answer(String),

    #[error("resume parse failed: {0}")]
    ResumeParse(String),

    #[error("unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("AI service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("page error: {0}")]
    Page(#[from] formpilot_page::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
