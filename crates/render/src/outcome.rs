//! Render requests, outcomes and the Storybook channel vocabulary

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::urls;

/// Storybook channel event names.
pub mod events {
    pub const STORY_RENDERED: &str = "storyRendered";
    pub const DOCS_RENDERED: &str = "docsRendered";
    pub const STORY_UNCHANGED: &str = "storyUnchanged";
    pub const STORY_MISSING: &str = "storyMissing";
    pub const STORY_ERRORED: &str = "storyErrored";
    pub const STORY_THREW_EXCEPTION: &str = "storyThrewException";
    pub const PLAY_FUNCTION_THREW_EXCEPTION: &str = "playFunctionThrewException";
    pub const FORCE_REMOUNT: &str = "forceRemount";
}

pub const OUTCOME_ERROR_NAME: &str = "RenderError";

pub const CHANNEL_UNAVAILABLE_MESSAGE: &str =
    "The test runner could not access the Storybook channel.";

pub const STORY_MISSING_MESSAGE: &str = "The story was missing when trying to access it.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Story,
    Docs,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Story => "story",
            ViewMode::Docs => "docs",
        }
    }

    /// The channel event that marks a finished render in this mode.
    pub fn rendered_event(&self) -> &'static str {
        match self {
            ViewMode::Story => events::STORY_RENDERED,
            ViewMode::Docs => events::DOCS_RENDERED,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "story" => Ok(ViewMode::Story),
            "docs" => Ok(ViewMode::Docs),
            other => Err(RenderError::InvalidRequest(format!(
                "unknown view mode '{}', expected 'story' or 'docs'",
                other
            ))),
        }
    }
}

/// Everything the page side needs to render one story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    story_id: String,
    view_mode: ViewMode,
    base_url: String,
}

impl RenderRequest {
    pub fn new(
        story_id: impl Into<String>,
        view_mode: ViewMode,
        base_url: impl Into<String>,
    ) -> Result<Self, RenderError> {
        let story_id = story_id.into();
        if story_id.trim().is_empty() {
            return Err(RenderError::InvalidRequest("story id must not be empty".into()));
        }
        Ok(Self {
            story_id,
            view_mode,
            base_url: base_url.into(),
        })
    }

    pub fn story_id(&self) -> &str {
        &self.story_id
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn story_url(&self) -> String {
        urls::story_url(&self.base_url, &self.story_id, self.view_mode)
    }

    /// Payload of the `forceRemount` message.
    pub fn remount_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "storyId": self.story_id,
            "viewMode": self.view_mode.as_str(),
        })
    }

    /// Error payload pointing a human at the failing story.
    pub fn outcome_error(&self, cause: &str) -> OutcomeError {
        let link = urls::deep_link(&self.base_url, &self.story_id);
        OutcomeError {
            name: OUTCOME_ERROR_NAME.to_string(),
            message: format!(
                "\nAn error occurred in the following story. Access the link for full output:\n{}\n\nMessage:\n {}",
                link, cause
            ),
        }
    }
}

/// Opaque handle to the rendered root node, as serialized by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootRef(serde_json::Value);

impl RootRef {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<&str> for RootRef {
    fn from(s: &str) -> Self {
        Self(serde_json::Value::String(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub name: String,
    pub message: String,
}

/// Where an `exception` outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionOrigin {
    Channel,
    Story,
    PlayFunction,
}

/// The single result the listener hands back for one render attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderOutcome {
    Rendered {
        #[serde(default)]
        root: Option<RootRef>,
    },
    Unchanged {
        #[serde(default)]
        root: Option<RootRef>,
    },
    Missing {
        error: OutcomeError,
    },
    Errored {
        error: OutcomeError,
    },
    Exception {
        origin: ExceptionOrigin,
        error: OutcomeError,
    },
    Timeout,
}

impl RenderOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            RenderOutcome::Rendered { .. } => "rendered",
            RenderOutcome::Unchanged { .. } => "unchanged",
            RenderOutcome::Missing { .. } => "missing",
            RenderOutcome::Errored { .. } => "errored",
            RenderOutcome::Exception { .. } => "exception",
            RenderOutcome::Timeout => "timeout",
        }
    }

    /// Whether this outcome must resolve the listener without waiting to settle.
    ///
    /// A successful event without a root counts as terminal: the page could
    /// not be read, and waiting longer will not change that.
    pub fn is_terminal(&self) -> bool {
        match self {
            RenderOutcome::Rendered { root } | RenderOutcome::Unchanged { root } => root.is_none(),
            _ => true,
        }
    }
}
