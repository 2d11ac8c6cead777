//! # formpilot
//!
//! Fills multi-step web forms from a profile with AI-assisted field mapping.
//! The page side lives in [`formpilot_page`], the driver and AI client in
//! [`formpilot_runner`]. This crate adds the live browser host and the CLI.

pub mod live;

pub use formpilot_page as page;
pub use formpilot_runner as runner;
pub use live::LivePage;
