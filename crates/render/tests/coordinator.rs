//! Render coordinator behaviour against a scripted driver

use async_trait::async_trait;
use serde_json::{json, Value};

use storysync_render::outcome::{ExceptionOrigin, OutcomeError};
use storysync_render::{
    A11yConfig, Assertion, AxeReport, Driver, ErrorKind, ListenerProgram, RenderCoordinator,
    RenderError, RenderOptions, RenderOutcome, RenderResult, Reporter, RootRef, ScanResults,
    StorybookSettings, ViewMode,
};

#[derive(Default)]
struct FakeDriver {
    outcome: Option<RenderOutcome>,
    hang: bool,
    hang_pause: bool,
    navigate_error: Option<String>,
    scan: ScanResults,
    calls: Vec<String>,
    scan_options: Option<Value>,
}

impl FakeDriver {
    fn rendering(outcome: RenderOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn navigate(&mut self, url: &str) -> RenderResult<()> {
        self.calls.push(format!("navigate {}", url));
        match &self.navigate_error {
            Some(error) => Err(RenderError::Transport(error.clone())),
            None => Ok(()),
        }
    }

    async fn run_listener(&mut self, program: &ListenerProgram) -> RenderResult<RenderOutcome> {
        self.calls.push(format!("listen {}", program.story_id()));
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.outcome
            .clone()
            .ok_or_else(|| RenderError::Transport("no outcome scripted".into()))
    }

    async fn debug(&mut self) -> RenderResult<()> {
        self.calls.push("debug".into());
        Ok(())
    }

    async fn pause(&mut self) -> RenderResult<()> {
        self.calls.push("pause".into());
        if self.hang_pause {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn scan_accessibility(&mut self, scope: &str, options: &Value) -> RenderResult<ScanResults> {
        self.calls.push(format!("scan {}", scope));
        self.scan_options = Some(options.clone());
        Ok(self.scan.clone())
    }
}

#[derive(Default)]
struct RecordingReporter {
    events: Vec<String>,
    assertions: Vec<Assertion>,
    axe: Option<AxeReport>,
}

impl Reporter for RecordingReporter {
    fn record_assertion(&mut self, assertion: Assertion) {
        self.events.push("assert".into());
        self.assertions.push(assertion);
    }

    fn set_axe_results(&mut self, report: AxeReport) {
        self.events.push("axe".into());
        self.axe = Some(report);
    }

    fn print_a11y_report(&mut self) {
        self.events.push("print".into());
    }
}

fn rendered(html: &str) -> RenderOutcome {
    RenderOutcome::Rendered {
        root: Some(RootRef::from(html)),
    }
}

fn primary() -> RenderOptions {
    RenderOptions {
        export_name: Some("primary".into()),
        a11y: None,
    }
}

fn coordinator(driver: FakeDriver) -> RenderCoordinator<FakeDriver, RecordingReporter> {
    RenderCoordinator::new(driver, RecordingReporter::default(), StorybookSettings::default())
}

fn outcome_error(message: &str) -> OutcomeError {
    OutcomeError {
        name: "RenderError".into(),
        message: message.into(),
    }
}

#[tokio::test]
async fn test_rendered_story_returns_artifact() {
    let mut coordinator = coordinator(FakeDriver::rendering(rendered("<button>Primary</button>")));

    let artifact = coordinator
        .render("Button.primary", ViewMode::Story, &primary())
        .await
        .unwrap();

    assert_eq!(artifact.to_string(), "Button.primary.primary");
    assert_eq!(artifact.root(), &RootRef::from("<button>Primary</button>"));

    let (driver, reporter) = coordinator.into_parts();
    assert_eq!(
        driver.calls,
        vec![
            "navigate http://localhost:6006/iframe.html?viewMode=story&id=Button.primary",
            "listen Button.primary",
        ]
    );
    assert_eq!(
        reporter.assertions,
        vec![Assertion {
            name: "\"Button.primary.primary\" story was rendered successfully.".into(),
            passed: true,
        }]
    );
    assert!(reporter.axe.is_none());
}

#[tokio::test]
async fn test_unchanged_story_is_success() {
    let mut coordinator = coordinator(FakeDriver::rendering(RenderOutcome::Unchanged {
        root: Some(RootRef::from("<div/>")),
    }));

    let artifact = coordinator
        .render("card--default", ViewMode::Docs, &RenderOptions::default())
        .await
        .unwrap();

    assert_eq!(artifact.to_string(), "card--default");
    let (driver, _) = coordinator.into_parts();
    assert_eq!(driver.calls[0], "navigate http://localhost:6006/iframe.html?viewMode=docs&id=card--default");
}

#[tokio::test]
async fn test_missing_root_asks_for_debugging() {
    let mut coordinator = coordinator(FakeDriver::rendering(RenderOutcome::Rendered { root: None }));

    let err = coordinator
        .render("Button.primary", ViewMode::Story, &primary())
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::RootNotFound));
    assert_eq!(err.kind(), ErrorKind::Fatal);
    assert!(err.to_string().contains("--debug"));
    assert!(coordinator.reporter().assertions.is_empty());
}

#[tokio::test]
async fn test_story_failures_are_classified() {
    let cases = vec![
        (
            RenderOutcome::Missing { error: outcome_error("missing story") },
            "StoryMissing",
        ),
        (
            RenderOutcome::Errored { error: outcome_error("errored story") },
            "StoryErrored",
        ),
        (
            RenderOutcome::Exception {
                origin: ExceptionOrigin::Story,
                error: outcome_error("story threw"),
            },
            "StoryException",
        ),
        (
            RenderOutcome::Exception {
                origin: ExceptionOrigin::PlayFunction,
                error: outcome_error("play threw"),
            },
            "StoryException",
        ),
        (
            RenderOutcome::Exception {
                origin: ExceptionOrigin::Channel,
                error: outcome_error("no channel"),
            },
            "ChannelUnavailable",
        ),
    ];

    for (outcome, expected) in cases {
        let message = match &outcome {
            RenderOutcome::Missing { error }
            | RenderOutcome::Errored { error }
            | RenderOutcome::Exception { error, .. } => error.message.clone(),
            _ => unreachable!(),
        };
        let mut coordinator = coordinator(FakeDriver::rendering(outcome));
        let err = coordinator
            .render("form--invalid", ViewMode::Story, &RenderOptions::default())
            .await
            .unwrap_err();

        let variant = match &err {
            RenderError::StoryMissing(_) => "StoryMissing",
            RenderError::StoryErrored(_) => "StoryErrored",
            RenderError::StoryException(_) => "StoryException",
            RenderError::ChannelUnavailable(_) => "ChannelUnavailable",
            other => panic!("unexpected error {:?}", other),
        };
        assert_eq!(variant, expected);
        assert_eq!(err.to_string(), message);
        assert!(!err.is_assertion());
    }
}

#[tokio::test]
async fn test_navigation_failure_stops_before_listening() {
    let mut coordinator = coordinator(FakeDriver {
        navigate_error: Some("net::ERR_CONNECTION_REFUSED".into()),
        ..Default::default()
    });

    let err = coordinator
        .render("Button.primary", ViewMode::Story, &primary())
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::Navigation(ref m) if m.contains("ERR_CONNECTION_REFUSED")));
    let (driver, _) = coordinator.into_parts();
    assert_eq!(driver.calls.len(), 1);
}

#[tokio::test]
async fn test_empty_story_id_rejected_before_navigation() {
    let mut coordinator = coordinator(FakeDriver::rendering(rendered("<div/>")));

    let err = coordinator
        .render("", ViewMode::Story, &RenderOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::InvalidRequest(_)));
    let (driver, _) = coordinator.into_parts();
    assert!(driver.calls.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hung_listener_times_out() {
    let settings = StorybookSettings {
        render_timeout_ms: 2_000,
        ..Default::default()
    };
    let driver = FakeDriver {
        hang: true,
        ..Default::default()
    };
    let mut coordinator = RenderCoordinator::new(driver, RecordingReporter::default(), settings);

    let err = coordinator
        .render("Button.primary", ViewMode::Story, &primary())
        .await
        .unwrap_err();

    match err {
        RenderError::RenderTimeout { story_id, millis } => {
            assert_eq!(story_id, "Button.primary");
            assert_eq!(millis, 2_000);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_live_url_drives_navigation() {
    let settings = StorybookSettings {
        storybook_url: "http://ignored:9009/".into(),
        live_url: Some("https://live.example.dev/preview?session=1".into()),
        ..Default::default()
    };
    let mut coordinator =
        RenderCoordinator::new(FakeDriver::rendering(rendered("<div/>")), RecordingReporter::default(), settings);

    coordinator
        .render("button--primary", ViewMode::Story, &RenderOptions::default())
        .await
        .unwrap();

    let (driver, _) = coordinator.into_parts();
    assert_eq!(
        driver.calls[0],
        "navigate https://live.example.dev/preview?session=1&url=http://localhost:6006/iframe.html?viewMode=story&id=button--primary"
    );
}

#[tokio::test]
async fn test_debug_takes_precedence_over_preview() {
    let settings = StorybookSettings {
        debug: true,
        preview: true,
        ..Default::default()
    };
    let mut coordinator =
        RenderCoordinator::new(FakeDriver::rendering(rendered("<div/>")), RecordingReporter::default(), settings)
            .with_interactive(true);
    coordinator
        .render("button--primary", ViewMode::Story, &RenderOptions::default())
        .await
        .unwrap();
    let (driver, _) = coordinator.into_parts();
    assert!(driver.calls.contains(&"debug".to_string()));
    assert!(!driver.calls.contains(&"pause".to_string()));

    let settings = StorybookSettings {
        preview: true,
        ..Default::default()
    };
    let mut coordinator =
        RenderCoordinator::new(FakeDriver::rendering(rendered("<div/>")), RecordingReporter::default(), settings)
            .with_interactive(true);
    coordinator
        .render("button--primary", ViewMode::Story, &RenderOptions::default())
        .await
        .unwrap();
    let (driver, _) = coordinator.into_parts();
    assert_eq!(driver.calls.last().map(String::as_str), Some("pause"));
}

#[tokio::test(start_paused = true)]
async fn test_pauses_are_skipped_when_not_interactive() {
    let settings = StorybookSettings {
        debug: true,
        preview: true,
        ..Default::default()
    };
    let driver = FakeDriver {
        outcome: Some(rendered("<div/>")),
        hang_pause: true,
        ..Default::default()
    };
    let mut coordinator =
        RenderCoordinator::new(driver, RecordingReporter::default(), settings).with_interactive(false);

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        coordinator.render("button--primary", ViewMode::Story, &RenderOptions::default()),
    )
    .await;

    assert!(matches!(result, Ok(Ok(_))), "render blocked on a pause nobody can resume");
    let (driver, _) = coordinator.into_parts();
    assert!(!driver.calls.iter().any(|c| c == "debug" || c == "pause"));
}

#[tokio::test]
async fn test_violations_are_reported_then_asserted() {
    let driver = FakeDriver {
        outcome: Some(rendered("<button/>")),
        scan: ScanResults {
            error: None,
            passes: vec![json!({"id": "aria-allowed-attr"})],
            violations: vec![json!({"id": "color-contrast"}), json!({"id": "button-name"})],
        },
        ..Default::default()
    };
    let options = RenderOptions {
        export_name: Some("primary".into()),
        a11y: Some(A11yConfig::default()),
    };
    let mut coordinator = coordinator(driver);

    let err = coordinator
        .render("Button.primary", ViewMode::Story, &options)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Assertion);
    assert!(matches!(err, RenderError::AccessibilityViolationsFound { count: 2, .. }));
    let artifact = err.into_artifact().unwrap();
    assert_eq!(artifact.to_string(), "Button.primary.primary");

    let (driver, reporter) = coordinator.into_parts();
    assert_eq!(reporter.events, vec!["assert", "axe", "print"]);
    let axe = reporter.axe.unwrap();
    assert_eq!(axe.component, "Button.primary.primary");
    assert_eq!(axe.violations.len(), 2);
    assert_eq!(axe.passes.len(), 1);
    assert_eq!(driver.calls.last().map(String::as_str), Some("scan body"));
    assert_eq!(driver.scan_options, Some(json!({"runAssertions": false})));
}

#[tokio::test]
async fn test_clean_scan_returns_artifact() {
    let driver = FakeDriver {
        outcome: Some(rendered("<button/>")),
        scan: ScanResults {
            passes: vec![json!({"id": "button-name"})],
            ..Default::default()
        },
        ..Default::default()
    };
    let a11y: A11yConfig = serde_json::from_value(json!({"config": {"runOnly": ["wcag2aa"]}})).unwrap();
    let options = RenderOptions {
        export_name: Some("Primary".into()),
        a11y: Some(a11y),
    };
    let mut coordinator = coordinator(driver);

    let artifact = coordinator
        .render("button--primary", ViewMode::Story, &options)
        .await
        .unwrap();

    assert_eq!(artifact.to_string(), "button--primary.Primary");
    let (driver, reporter) = coordinator.into_parts();
    assert_eq!(reporter.events, vec!["assert", "axe", "print"]);
    assert_eq!(
        driver.scan_options,
        Some(json!({"runAssertions": false, "runOnly": ["wcag2aa"]}))
    );
}

#[tokio::test]
async fn test_scan_error_is_fatal_and_unreported() {
    let driver = FakeDriver {
        outcome: Some(rendered("<button/>")),
        scan: ScanResults {
            error: Some("axe.run is not a function".into()),
            ..Default::default()
        },
        ..Default::default()
    };
    let options = RenderOptions {
        export_name: None,
        a11y: Some(A11yConfig::default()),
    };
    let mut coordinator = coordinator(driver);

    let err = coordinator
        .render("button--primary", ViewMode::Story, &options)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fatal);
    assert_eq!(
        err.to_string(),
        "Error while running accessibility tests: axeRun(): axe.run is not a function"
    );
    assert!(coordinator.reporter().axe.is_none());
}
