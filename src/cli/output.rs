//! Output formatters for matchgate CLI
//!
//! - **Human**: Colored, readable output for terminal use
//! - **JSON**: Structured output for scripting and jq

use serde::Serialize;
use std::io::{self, Write};

use super::commands::CliOutputFormat;
use crate::guard::{Decision, Stage};
use crate::route::RouteLocation;
use crate::screen::Screen;
use crate::status::UserStatus;

// =============================================================================
// Output Format Enum
// =============================================================================

/// Available output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Human => OutputFormat::Human,
            CliOutputFormat::Json => OutputFormat::Json,
        }
    }
}

// =============================================================================
// Serializable Output Types
// =============================================================================

/// One routing decision
#[derive(Debug, Serialize)]
pub struct DecisionOutput {
    pub location: String,
    pub stage: Stage,
    pub decision: Decision,
}

impl DecisionOutput {
    pub fn new(status: &UserStatus, location: &RouteLocation, decision: Decision) -> Self {
        Self {
            location: location.to_string(),
            stage: Stage::of(status),
            decision,
        }
    }
}

/// One row of the decision table
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub status: UserStatus,
    pub stage: Stage,
    pub decision: Decision,
}

/// Full replay log
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub identity: Option<String>,
    pub start: String,
    pub navigations: Vec<Screen>,
    pub final_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Output Formatter Trait
// =============================================================================

/// Trait for output formatters
pub trait OutputFormatter: Send + Sync {
    fn format_decision(&self, output: &DecisionOutput, writer: &mut dyn Write) -> io::Result<()>;

    fn format_table(
        &self,
        location: &RouteLocation,
        rows: &[TableRow],
        writer: &mut dyn Write,
    ) -> io::Result<()>;

    fn format_replay(&self, report: &ReplayReport, writer: &mut dyn Write) -> io::Result<()>;

    fn format_error(&self, error: &str, writer: &mut dyn Write) -> io::Result<()>;
}

// =============================================================================
// Human Formatter
// =============================================================================

/// Human-readable output formatter
pub struct HumanFormatter {
    use_color: bool,
}

impl HumanFormatter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color_code: &str) -> String {
        if self.use_color {
            format!("\x1b[{}m{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }

    fn format_decision_text(&self, decision: &Decision) -> String {
        let color = match decision {
            Decision::Stay => "32",        // Green
            Decision::Loading => "90",     // Gray
            Decision::Redirect(_) => "33", // Yellow
            Decision::SignOut => "31",     // Red
        };
        self.colorize(&decision.to_string(), color)
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "y"
    } else {
        "-"
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_decision(&self, output: &DecisionOutput, writer: &mut dyn Write) -> io::Result<()> {
        writeln!(
            writer,
            "{} {}",
            self.colorize("location:", "1"),
            output.location
        )?;
        writeln!(writer, "{} {}", self.colorize("stage:", "1"), output.stage.as_str())?;
        writeln!(
            writer,
            "{} {}",
            self.colorize("decision:", "1"),
            self.format_decision_text(&output.decision)
        )
    }

    fn format_table(
        &self,
        location: &RouteLocation,
        rows: &[TableRow],
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        let header = self.colorize(&format!("Decisions at {}:", location), "1;36");
        writeln!(writer, "{}", header)?;
        writeln!(
            writer,
            "  {:<9} {:>4} {:>4} {:>4} {:>4}  {:<27} decision",
            "status", "prof", "paid", "aff", "refs", "stage"
        )?;
        for row in rows {
            let s = &row.status;
            writeln!(
                writer,
                "  {:<9} {:>4} {:>4} {:>4} {:>4}  {:<27} {}",
                s.application_status.as_str(),
                flag(s.has_profile),
                flag(s.paid),
                flag(s.has_affiliation),
                flag(s.has_references),
                row.stage.as_str(),
                self.format_decision_text(&row.decision)
            )?;
        }
        Ok(())
    }

    fn format_replay(&self, report: &ReplayReport, writer: &mut dyn Write) -> io::Result<()> {
        writeln!(
            writer,
            "{} {}",
            self.colorize("identity:", "1"),
            report.identity.as_deref().unwrap_or("(none)")
        )?;
        writeln!(writer, "{} {}", self.colorize("start:", "1"), report.start)?;
        if report.navigations.is_empty() {
            writeln!(writer, "  {}", self.colorize("no navigation", "90"))?;
        }
        for (i, screen) in report.navigations.iter().enumerate() {
            writeln!(writer, "  {}. replace -> {}", i + 1, screen.path())?;
        }
        writeln!(
            writer,
            "{} {}",
            self.colorize("final:", "1;32"),
            report.final_location
        )?;
        if let Some(error) = &report.error {
            self.format_error(error, writer)?;
        }
        Ok(())
    }

    fn format_error(&self, error: &str, writer: &mut dyn Write) -> io::Result<()> {
        writeln!(writer, "{} {}", self.colorize("error:", "1;31"), error)
    }
}

// =============================================================================
// JSON Formatter
// =============================================================================

/// JSON output formatter
pub struct JsonFormatter;

impl JsonFormatter {
    fn write_json<T: Serialize>(value: &T, writer: &mut dyn Write) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{}", json)
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_decision(&self, output: &DecisionOutput, writer: &mut dyn Write) -> io::Result<()> {
        Self::write_json(output, writer)
    }

    fn format_table(
        &self,
        location: &RouteLocation,
        rows: &[TableRow],
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        Self::write_json(
            &serde_json::json!({ "location": location.to_string(), "rows": rows }),
            writer,
        )
    }

    fn format_replay(&self, report: &ReplayReport, writer: &mut dyn Write) -> io::Result<()> {
        Self::write_json(report, writer)
    }

    fn format_error(&self, error: &str, writer: &mut dyn Write) -> io::Result<()> {
        Self::write_json(&serde_json::json!({ "error": error }), writer)
    }
}

/// Colors are only emitted for the human format, and only when enabled.
pub fn should_colorize(format: OutputFormat, color_enabled: bool) -> bool {
    color_enabled && format == OutputFormat::Human
}

/// Create a formatter for the given format
pub fn create_formatter(format: OutputFormat, use_color: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter::new(use_color)),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}
