//! storysync render synchronization
//!
//! Renders a single Storybook story through a browser driver and waits for
//! the story's channel to report a settled render:
//! - Builds the story URL from the configured or live preview base URL
//! - Ships a listener into the page that debounces render events
//! - Classifies the outcome into an artifact or a typed error
//! - Optionally runs an accessibility scan and reports the results
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐        ┌───────────────────────────────┐
//! │ RenderCoordinator            │        │ story page (iframe.html)      │
//! │   navigate(story_url) ───────┼──────▶ │                               │
//! │   run_listener(program) ─────┼──────▶ │ Listener                      │
//! │                              │        │   on(storyRendered, ...)      │
//! │                              │        │   emit(forceRemount)          │
//! │   classify(outcome) ◀────────┼─────── │   debounce ─▶ RenderOutcome   │
//! │   scan_accessibility("body") │        │                               │
//! └──────────────────────────────┘        └───────────────────────────────┘
//! ```

pub mod artifact;
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod listener;
pub mod outcome;
pub mod playwright;
pub mod program;
pub mod report;
pub mod server;
pub mod urls;

pub use artifact::Artifact;
pub use config::StorybookSettings;
pub use coordinator::{A11yConfig, RenderCoordinator, RenderOptions};
pub use driver::{Driver, ScanResults};
pub use error::{ErrorKind, RenderError, RenderResult};
pub use listener::{ChannelContext, Listener, PendingOutcome};
pub use outcome::{RenderOutcome, RenderRequest, RootRef, ViewMode};
pub use program::ListenerProgram;
pub use report::{Assertion, AxeReport, ConsoleReporter, Reporter};
