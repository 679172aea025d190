//! Reporting of render assertions and accessibility results

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

/// A named check the caller's verification layer should see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assertion {
    pub name: String,
    pub passed: bool,
}

/// Accessibility results for one rendered component.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AxeReport {
    pub component: String,
    pub passes: Vec<Value>,
    pub violations: Vec<Value>,
}

pub trait Reporter: Send {
    fn record_assertion(&mut self, assertion: Assertion);

    fn set_axe_results(&mut self, report: AxeReport);

    fn print_a11y_report(&mut self);
}

/// Logs assertions and prints accessibility violations as a table.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    assertions: Vec<Assertion>,
    axe: Option<AxeReport>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn failed(&self) -> usize {
        self.assertions.iter().filter(|a| !a.passed).count()
    }

    /// Violations rendered as a table, one row per rule.
    pub fn violations_table(report: &AxeReport) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Rule", "Impact", "Nodes", "Description"]);

        for violation in &report.violations {
            let text = |key: &str| {
                violation
                    .get(key)
                    .and_then(Value::as_str)
                    .unwrap_or("-")
                    .to_string()
            };
            let nodes = violation
                .get("nodes")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            table.add_row(vec![text("id"), text("impact"), nodes.to_string(), text("help")]);
        }

        table
    }
}

impl Reporter for ConsoleReporter {
    fn record_assertion(&mut self, assertion: Assertion) {
        if assertion.passed {
            info!("✓ {}", assertion.name);
        } else {
            error!("✗ {}", assertion.name);
        }
        self.assertions.push(assertion);
    }

    fn set_axe_results(&mut self, report: AxeReport) {
        self.axe = Some(report);
    }

    fn print_a11y_report(&mut self) {
        let Some(report) = &self.axe else {
            warn!("No accessibility results to print");
            return;
        };

        println!(
            "Accessibility report for {}: {} passed, {} violations",
            report.component,
            report.passes.len(),
            report.violations.len()
        );
        if !report.violations.is_empty() {
            println!("{}", Self::violations_table(report));
        }
    }
}
