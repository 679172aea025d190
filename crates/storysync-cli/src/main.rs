//! storysync CLI - Main Entry Point
//!
//! Renders one Storybook story in a real browser, waits for it to settle and
//! optionally runs an accessibility scan against it.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use storysync_render::config::default_settings_path;
use storysync_render::playwright::{Browser, PlaywrightConfig, PlaywrightDriver};
use storysync_render::server::StorybookServer;
use storysync_render::{
    A11yConfig, ConsoleReporter, ErrorKind, RenderCoordinator, RenderError, RenderOptions,
    StorybookSettings, ViewMode,
};

/// storysync - render Storybook stories from the command line
#[derive(Parser)]
#[command(name = "storysync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, env = "STORYSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a story and wait for it to settle
    Render(RenderArgs),

    /// Print the effective settings
    Settings,
}

#[derive(Args)]
struct RenderArgs {
    /// Story id, e.g. button--primary
    story_id: String,

    /// View mode: story or docs
    #[arg(long, default_value = "story")]
    view_mode: String,

    /// Export name used to label the rendered component
    #[arg(long)]
    export_name: Option<String>,

    /// Storybook base URL
    #[arg(long, env = "STORYSYNC_STORYBOOK_URL")]
    storybook_url: Option<String>,

    /// Live preview URL; overrides --storybook-url
    #[arg(long, env = "STORYSYNC_LIVE_URL")]
    live_url: Option<String>,

    /// Start a Storybook dev server first
    #[arg(long)]
    start_storybook: bool,

    /// Run an accessibility scan after rendering
    #[arg(long)]
    a11y: bool,

    /// JSON file with accessibility scan settings (implies --a11y)
    #[arg(long)]
    a11y_config: Option<PathBuf>,

    /// Open the Playwright inspector after rendering
    #[arg(long)]
    debug: bool,

    /// Keep the page open after rendering
    #[arg(long)]
    preview: bool,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: String,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Directory containing node_modules with playwright and axe-core
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let code = match e.downcast_ref::<RenderError>().map(RenderError::kind) {
                Some(ErrorKind::Assertion) => 1,
                _ => 2,
            };
            error!("{}", e);
            std::process::exit(code);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = cli.config.clone().unwrap_or_else(default_settings_path);
    let settings = StorybookSettings::load(&path)?;

    match cli.command {
        Commands::Settings => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Commands::Render(args) => render(args, settings).await,
    }
}

async fn render(args: RenderArgs, mut settings: StorybookSettings) -> anyhow::Result<()> {
    if let Some(url) = args.storybook_url {
        settings.storybook_url = url;
    }
    if args.live_url.is_some() {
        settings.live_url = args.live_url;
    }
    settings.start_storybook |= args.start_storybook;
    settings.debug |= args.debug;
    settings.preview |= args.preview;
    settings.validate()?;

    let view_mode: ViewMode = args.view_mode.parse()?;
    let browser: Browser = args.browser.parse()?;

    let a11y = match args.a11y_config {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            Some(serde_json::from_str::<A11yConfig>(&content)?)
        }
        None if args.a11y => Some(A11yConfig::default()),
        None => None,
    };

    // Held until the render finishes; dropping it stops Storybook
    let _server = if settings.start_storybook {
        let server = StorybookServer::spawn(&settings.server).await?;
        settings.storybook_url = server.base_url().to_string();
        Some(server)
    } else {
        None
    };

    let driver = PlaywrightDriver::launch(PlaywrightConfig {
        browser,
        headless: !args.headed && !settings.debug && !settings.preview,
        project_dir: args.project_dir,
        ..Default::default()
    })
    .await?;

    let mut coordinator = RenderCoordinator::new(driver, ConsoleReporter::new(), settings);
    let options = RenderOptions {
        export_name: args.export_name,
        a11y,
    };

    let result = coordinator.render(&args.story_id, view_mode, &options).await;

    let (driver, _) = coordinator.into_parts();
    if let Err(e) = driver.close().await {
        warn!("Failed to close the browser: {}", e);
    }

    let artifact = result?;
    info!("Rendered {}", artifact);
    Ok(())
}
