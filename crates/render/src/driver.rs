//! The browser transport the coordinator drives

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RenderResult;
use crate::outcome::RenderOutcome;
use crate::program::ListenerProgram;

/// Result of one accessibility scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResults {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub passes: Vec<Value>,
    #[serde(default)]
    pub violations: Vec<Value>,
}

/// A browser session able to load a story and run scripts in it.
#[async_trait]
pub trait Driver: Send {
    async fn navigate(&mut self, url: &str) -> RenderResult<()>;

    /// Evaluate the listener program in the current page and await its outcome.
    async fn run_listener(&mut self, program: &ListenerProgram) -> RenderResult<RenderOutcome>;

    /// Hand control to an interactive debugger.
    async fn debug(&mut self) -> RenderResult<()>;

    /// Hold the page open for inspection.
    async fn pause(&mut self) -> RenderResult<()>;

    /// Inject the scanner if needed and scan `scope` with `options`.
    async fn scan_accessibility(&mut self, scope: &str, options: &Value) -> RenderResult<ScanResults>;
}
