pub mod env;
pub mod schema;

pub use schema::{AiConfig, BrowserConfig, Config, TimingConfig, Viewport};
