//! Drives one story render from the controlling process
//!
//! Navigation, the listener await, the optional interactive pause and the
//! accessibility scan run strictly in sequence for one invocation.

use std::ffi::OsStr;
use std::io::IsTerminal;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::artifact::{component_identity, Artifact};
use crate::config::StorybookSettings;
use crate::driver::Driver;
use crate::error::{RenderError, RenderResult};
use crate::outcome::{ExceptionOrigin, RenderOutcome, RenderRequest, ViewMode};
use crate::program::ListenerProgram;
use crate::report::{Assertion, AxeReport, Reporter};

/// Scope scanned for accessibility issues.
pub const A11Y_SCOPE: &str = "body";

/// Accessibility scan settings supplied by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct A11yConfig {
    /// Options passed to the scanner, merged over `{"runAssertions": false}`
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl A11yConfig {
    pub fn scan_options(&self) -> Value {
        let mut options = Map::new();
        options.insert("runAssertions".to_string(), Value::Bool(false));
        for (key, value) in &self.config {
            options.insert(key.clone(), value.clone());
        }
        Value::Object(options)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub export_name: Option<String>,
    pub a11y: Option<A11yConfig>,
}

pub struct RenderCoordinator<D, R> {
    driver: D,
    reporter: R,
    settings: StorybookSettings,
    /// Debug and preview pauses only happen when someone can resume them
    interactive: bool,
}

impl<D: Driver, R: Reporter> RenderCoordinator<D, R> {
    pub fn new(driver: D, reporter: R, settings: StorybookSettings) -> Self {
        Self {
            driver,
            reporter,
            settings,
            interactive: is_interactive(),
        }
    }

    /// Override terminal/CI detection for the debug and preview pauses.
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn settings(&self) -> &StorybookSettings {
        &self.settings
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_parts(self) -> (D, R) {
        (self.driver, self.reporter)
    }

    /// Render one story and return a handle to its root node.
    pub async fn render(
        &mut self,
        story_id: &str,
        view_mode: ViewMode,
        options: &RenderOptions,
    ) -> RenderResult<Artifact> {
        let request = RenderRequest::new(story_id, view_mode, self.settings.base_url())?;
        let url = request.story_url();

        info!("Rendering {} ({})", story_id, view_mode);
        debug!("Navigating to {}", url);
        self.driver.navigate(&url).await.map_err(|e| match e {
            RenderError::Navigation(_) => e,
            other => RenderError::Navigation(other.to_string()),
        })?;

        let outcome = self.await_outcome(&request).await?;
        let artifact = classify(outcome, &request, options.export_name.clone(), &self.settings)?;

        self.reporter.record_assertion(Assertion {
            name: format!("\"{}\" story was rendered successfully.", artifact.identity()),
            passed: true,
        });

        if !self.interactive {
            if self.settings.debug || self.settings.preview {
                debug!("Skipping debug/preview pause in a non-interactive run");
            }
        } else if self.settings.debug {
            self.driver.debug().await?;
        } else if self.settings.preview {
            self.driver.pause().await?;
        }

        match &options.a11y {
            Some(a11y) => self.check_accessibility(artifact, a11y).await,
            None => Ok(artifact),
        }
    }

    async fn await_outcome(&mut self, request: &RenderRequest) -> RenderResult<RenderOutcome> {
        let program = ListenerProgram::new(request, self.settings.settle_delay())?;

        match self.settings.render_timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.driver.run_listener(&program)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("No render outcome for {} after {:?}", request.story_id(), limit);
                    Ok(RenderOutcome::Timeout)
                }
            },
            None => self.driver.run_listener(&program).await,
        }
    }

    async fn check_accessibility(&mut self, artifact: Artifact, a11y: &A11yConfig) -> RenderResult<Artifact> {
        let results = self
            .driver
            .scan_accessibility(A11Y_SCOPE, &a11y.scan_options())
            .await?;

        if let Some(error) = results.error {
            return Err(RenderError::AccessibilityScanFailed(error));
        }

        let count = results.violations.len();
        self.reporter.set_axe_results(AxeReport {
            component: artifact.identity(),
            passes: results.passes,
            violations: results.violations,
        });
        self.reporter.print_a11y_report();

        if count > 0 {
            return Err(RenderError::AccessibilityViolationsFound {
                artifact: Box::new(artifact),
                count,
            });
        }

        Ok(artifact)
    }
}

/// True outside CI when stdin is a terminal.
pub fn is_interactive() -> bool {
    interactive_from(std::env::var_os("CI").as_deref(), std::io::stdin().is_terminal())
}

fn interactive_from(ci: Option<&OsStr>, stdin_is_terminal: bool) -> bool {
    let in_ci = ci.is_some_and(|value| !value.is_empty() && value != "false" && value != "0");
    !in_ci && stdin_is_terminal
}

fn classify(
    outcome: RenderOutcome,
    request: &RenderRequest,
    export_name: Option<String>,
    settings: &StorybookSettings,
) -> RenderResult<Artifact> {
    match outcome {
        RenderOutcome::Rendered { root: Some(root) } | RenderOutcome::Unchanged { root: Some(root) } => {
            Ok(Artifact::new(request.story_id(), export_name, root))
        }
        RenderOutcome::Rendered { root: None } | RenderOutcome::Unchanged { root: None } => {
            warn!(
                "Story {} rendered but its root was not found",
                component_identity(request.story_id(), export_name.as_deref())
            );
            Err(RenderError::RootNotFound)
        }
        RenderOutcome::Missing { error } => Err(RenderError::StoryMissing(error.message)),
        RenderOutcome::Errored { error } => Err(RenderError::StoryErrored(error.message)),
        RenderOutcome::Exception {
            origin: ExceptionOrigin::Channel,
            error,
        } => Err(RenderError::ChannelUnavailable(error.message)),
        RenderOutcome::Exception { error, .. } => Err(RenderError::StoryException(error.message)),
        RenderOutcome::Timeout => Err(RenderError::RenderTimeout {
            story_id: request.story_id().to_string(),
            millis: settings.render_timeout_ms,
        }),
    }
}
