//! Storybook dev server management - spawning and health checking

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{RenderError, RenderResult};

/// Handle to a running Storybook process
pub struct StorybookServer {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

impl StorybookServer {
    /// Spawn Storybook in dev mode and wait until it answers
    pub async fn spawn(config: &ServerConfig) -> RenderResult<Self> {
        let base_url = format!("http://localhost:{}", config.port);

        info!("Starting Storybook on port {}", config.port);

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .args(["--port", &config.port.to_string(), "--ci", "--no-open"])
            .current_dir(&config.project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            RenderError::ServerStartup(format!("Failed to spawn {}: {}", config.command, e))
        })?;

        if let Some(stderr) = child.stderr.take() {
            drain_stderr(stderr);
        }

        let server = StorybookServer {
            child,
            base_url,
            port: config.port,
        };

        server.wait_for_healthy(config.startup_timeout()).await?;

        info!("Storybook is up at {}", server.base_url);
        Ok(server)
    }

    /// Poll the index page until Storybook responds
    async fn wait_for_healthy(&self, timeout_duration: Duration) -> RenderResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&self.base_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Storybook health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for Storybook to start...");
                    }
                    // Refused while the dev server is still compiling
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(RenderError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server
    pub fn stop(&mut self) -> RenderResult<()> {
        info!("Stopping Storybook (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for StorybookServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Forward the dev server's stderr to the log so the pipe never fills up.
fn drain_stderr<R: Read + Send + 'static>(stderr: R) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for line in BufReader::new(stderr).lines() {
            match line {
                Ok(line) => debug!(target: "storybook", "{}", line),
                Err(_) => break,
            }
        }
    })
}

/// Configuration for launching Storybook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Launcher executable
    pub command: String,

    /// Arguments before the port flags
    pub args: Vec<String>,

    /// Port to listen on
    pub port: u16,

    /// Directory containing the Storybook project
    pub project_dir: PathBuf,

    /// Seconds to wait for the first successful response
    pub startup_timeout_secs: u64,
}

impl ServerConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            args: vec!["storybook".to_string(), "dev".to_string()],
            port: 6006,
            project_dir: PathBuf::from("."),
            startup_timeout_secs: 120,
        }
    }
}
