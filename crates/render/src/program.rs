//! The listener program shipped into the story page
//!
//! The page-side listener is plain JavaScript templated from primitives only,
//! so it can be evaluated by any driver that can run a script and await the
//! promise it returns.

use std::time::Duration;

use serde::Serialize;

use crate::error::RenderResult;
use crate::outcome::{RenderRequest, ViewMode};

const LISTENER_TEMPLATE: &str = include_str!("../assets/listener.js");
const OPTIONS_PLACEHOLDER: &str = "__STORYSYNC_OPTIONS__";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgramOptions<'a> {
    story_id: &'a str,
    view_mode: ViewMode,
    base_url: &'a str,
    settle_ms: u64,
}

/// A self-contained script expression that resolves to one `RenderOutcome`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerProgram {
    story_id: String,
    view_mode: ViewMode,
    settle_delay: Duration,
    source: String,
}

impl ListenerProgram {
    pub fn new(request: &RenderRequest, settle_delay: Duration) -> RenderResult<Self> {
        let options = ProgramOptions {
            story_id: request.story_id(),
            view_mode: request.view_mode(),
            base_url: request.base_url(),
            settle_ms: settle_delay.as_millis() as u64,
        };
        let literal = serde_json::to_string(&options)?;

        Ok(Self {
            story_id: request.story_id().to_string(),
            view_mode: request.view_mode(),
            settle_delay,
            source: LISTENER_TEMPLATE.replace(OPTIONS_PLACEHOLDER, &literal),
        })
    }

    pub fn story_id(&self) -> &str {
        &self.story_id
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// Quiet period the program waits after the last success event.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// The script expression; evaluating it yields a promise.
    pub fn source(&self) -> &str {
        &self.source
    }
}
