//! Playwright browser automation
//!
//! A small Node bridge script keeps one Playwright page open and answers
//! JSON-line requests. Responses carry the request id, so a reply that
//! arrives after its caller gave up is discarded.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, trace};

use crate::driver::{Driver, ScanResults};
use crate::error::{RenderError, RenderResult};
use crate::outcome::RenderOutcome;
use crate::program::ListenerProgram;

const BRIDGE_SCRIPT: &str = include_str!("../assets/bridge.js");
const READY_ID: u64 = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(RenderError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Directory whose `node_modules` provides `playwright` and `axe-core`
    pub project_dir: PathBuf,
    /// axe-core bundle injected before accessibility scans
    pub axe_path: PathBuf,
    pub node_binary: PathBuf,
    pub launch_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            project_dir: PathBuf::from("."),
            axe_path: PathBuf::from("node_modules/axe-core/axe.min.js"),
            node_binary: PathBuf::from("node"),
            launch_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

fn parse_response(line: &str) -> Option<BridgeResponse> {
    serde_json::from_str(line).ok()
}

/// Playwright browser session
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    _workdir: TempDir,
}

impl PlaywrightDriver {
    /// Start the bridge and wait until the browser page is open
    pub async fn launch(config: PlaywrightConfig) -> RenderResult<Self> {
        Self::check_playwright_installed(&config).await?;

        let workdir = tempfile::tempdir()?;
        let script_path = workdir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let project_dir = std::fs::canonicalize(&config.project_dir)?;
        let axe_path = project_dir.join(&config.axe_path);
        let bridge_config = json!({
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "viewportWidth": config.viewport_width,
            "viewportHeight": config.viewport_height,
            "axePath": axe_path,
        });

        info!("Launching {} via Playwright", config.browser.as_str());

        let mut child = Command::new(&config.node_binary)
            .arg(&script_path)
            .arg(bridge_config.to_string())
            .current_dir(&project_dir)
            .env("NODE_PATH", project_dir.join("node_modules"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Transport("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RenderError::Transport("bridge stdout unavailable".into()))?;

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: READY_ID + 1,
            _workdir: workdir,
        };

        match tokio::time::timeout(config.launch_timeout, driver.read_response(READY_ID)).await {
            Ok(ready) => {
                ready?;
            }
            Err(_) => {
                return Err(RenderError::Transport(format!(
                    "browser did not start within {:?}",
                    config.launch_timeout
                )))
            }
        }

        debug!("Playwright bridge ready");
        Ok(driver)
    }

    /// Check if Playwright is installed
    async fn check_playwright_installed(config: &PlaywrightConfig) -> RenderResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(&config.project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(RenderError::PlaywrightNotFound),
        }
    }

    async fn call(&mut self, mut request: Value) -> RenderResult<BridgeResponse> {
        let id = self.next_id;
        self.next_id += 1;
        request["id"] = json!(id);

        trace!(id, op = %request["op"], "Bridge request");
        let mut line = request.to_string();
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        self.read_response(id).await
    }

    async fn read_response(&mut self, id: u64) -> RenderResult<BridgeResponse> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| RenderError::Transport("Playwright bridge exited".into()))?;

            match parse_response(&line) {
                Some(response) if response.id == id => return Ok(response),
                Some(response) => debug!(stale = response.id, expected = id, "Discarding stale bridge response"),
                None => trace!("Bridge output: {}", line),
            }
        }
    }

    fn into_value(response: BridgeResponse) -> RenderResult<Value> {
        if response.ok {
            Ok(response.value)
        } else {
            Err(RenderError::Transport(
                response.error.unwrap_or_else(|| "unknown bridge error".into()),
            ))
        }
    }

    /// Close the browser and wait for the bridge to exit
    pub async fn close(mut self) -> RenderResult<()> {
        self.stdin.shutdown().await?;
        let status = self.child.wait().await?;
        debug!("Playwright bridge exited with {}", status);
        Ok(())
    }
}

#[async_trait]
impl Driver for PlaywrightDriver {
    async fn navigate(&mut self, url: &str) -> RenderResult<()> {
        let response = self.call(json!({"op": "navigate", "url": url})).await?;
        if !response.ok {
            return Err(RenderError::Navigation(format!(
                "{}: {}",
                url,
                response.error.unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn run_listener(&mut self, program: &ListenerProgram) -> RenderResult<RenderOutcome> {
        debug!("Waiting for {} to settle", program.story_id());
        let response = self.call(json!({"op": "render", "source": program.source()})).await?;
        let value = Self::into_value(response)?;
        Ok(serde_json::from_value(value)?)
    }

    async fn debug(&mut self) -> RenderResult<()> {
        info!("Opening the Playwright inspector; resume it to continue");
        let response = self.call(json!({"op": "debug"})).await?;
        Self::into_value(response).map(|_| ())
    }

    async fn pause(&mut self) -> RenderResult<()> {
        info!("Paused for preview; close the page to continue");
        let response = self.call(json!({"op": "pause"})).await?;
        Self::into_value(response).map(|_| ())
    }

    async fn scan_accessibility(&mut self, scope: &str, options: &Value) -> RenderResult<ScanResults> {
        let response = self
            .call(json!({"op": "axe", "scope": scope, "options": options}))
            .await?;
        let value = Self::into_value(response)?;
        Ok(serde_json::from_value(value)?)
    }
}
