//! Report Aggregator
//!
//! Collects test records and detail sections for one run and renders them
//! into a static HTML summary.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::paths::{ensure_dir, SUMMARY_FILE_NAME};
use crate::common::{truncate_chars, Result};

/// Longest message shown in the summary table
pub const MESSAGE_PREVIEW_CHARS: usize = 100;

/// Appended to truncated messages
pub const ELLIPSIS: &str = "...";

/// Outcome of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
        }
    }
}

/// One finished test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRecord {
    pub name: String,
    pub status: Status,
    pub message: String,
    pub log_file: Option<PathBuf>,
}

impl TestRecord {
    pub fn pass(name: impl Into<String>, message: impl Into<String>, log_file: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            status: Status::Pass,
            message: message.into(),
            log_file,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>, log_file: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            status: Status::Fail,
            message: message.into(),
            log_file,
        }
    }
}

/// Detail sections of one test, in first-insertion order
#[derive(Debug, Default, Clone)]
struct TestDetails {
    name: String,
    sections: Vec<(String, String)>,
}

/// Accumulates records and details for a run
#[derive(Debug, Default)]
pub struct ReportAggregator {
    records: Vec<TestRecord>,
    details: Vec<TestDetails>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; duplicates are kept
    pub fn record(&mut self, record: TestRecord) {
        self.records.push(record);
    }

    /// Attach text under (test, section), replacing an earlier blob for the same key
    pub fn attach_detail(&mut self, test_name: &str, section_name: &str, text: impl Into<String>) {
        let text = text.into();
        let idx = match self.details.iter().position(|d| d.name == test_name) {
            Some(idx) => idx,
            None => {
                self.details.push(TestDetails {
                    name: test_name.to_string(),
                    sections: Vec::new(),
                });
                self.details.len() - 1
            }
        };
        let details = &mut self.details[idx];

        match details.sections.iter_mut().find(|(name, _)| name == section_name) {
            Some((_, existing)) => *existing = text,
            None => details.sections.push((section_name.to_string(), text)),
        }
    }

    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn passed(&self) -> usize {
        self.records.iter().filter(|r| r.status == Status::Pass).count()
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.status == Status::Fail).count()
    }

    /// Render the summary document
    pub fn render_html(&self, package: &str) -> String {
        let mut html = String::new();
        html.push_str("<html><head><title>Receiver Test Summary</title>");
        html.push_str("<style>table {border-collapse: collapse; width: 100%;} ");
        html.push_str("th, td {border: 1px solid #ddd; padding: 8px; text-align: left;} ");
        html.push_str("tr:nth-child(even){background-color: #f2f2f2} ");
        html.push_str("th {background-color: #4CAF50; color: white;} ");
        html.push_str(".PASS {color: green;} .FAIL {color: red;} .SKIP {color: orange;}");
        html.push_str(".details {background-color: #f9f9f9; padding: 10px; margin: 5px; border: 1px solid #ddd;}</style></head>");
        html.push_str("<body><h2>Test Summary</h2>");
        let _ = write!(html, "<p><strong>App Package:</strong> {}</p>", package);
        html.push_str("<table><tr><th>Test Name</th><th>Status</th><th>Message/Error</th><th>Log File</th></tr>");

        for record in &self.records {
            html.push_str(&render_row(record));
        }

        html.push_str("</table>");
        html.push_str("<h2>Detailed Reports</h2>");
        for details in &self.details {
            let _ = write!(html, "<h3>Test: {}</h3>", details.name);
            for (section, content) in &details.sections {
                html.push_str("<div class='details'>");
                let _ = write!(html, "<h4>{}</h4>", section);
                let _ = write!(html, "<pre>{}</pre>", content);
                html.push_str("</div>");
            }
        }
        html.push_str("</body></html>");
        html
    }

    /// Write `receiver_test_summary.html` into `dir` and return its path
    pub fn finalize(&self, package: &str, dir: &Path) -> Result<PathBuf> {
        ensure_dir(dir)?;
        let path = dir.join(SUMMARY_FILE_NAME);
        std::fs::write(&path, self.render_html(package))?;

        tracing::info!("HTML summary generated: {}", path.display());
        println!("[INFO] HTML summary generated: {}", path.display());
        Ok(path)
    }
}

/// Message cell text: at most 100 chars, then `...` if anything was cut
pub fn message_preview(message: &str) -> String {
    let (head, truncated) = truncate_chars(message, MESSAGE_PREVIEW_CHARS);
    if truncated {
        format!("{}{}", head, ELLIPSIS)
    } else {
        head.to_string()
    }
}

fn render_row(record: &TestRecord) -> String {
    let status = record.status.as_str();
    let mut row = String::new();
    let _ = write!(row, "<tr><td>{}</td>", record.name);
    let _ = write!(row, "<td class='{}'>{}</td>", status, status);
    let _ = write!(row, "<td>{}</td>", message_preview(&record.message));
    match record.log_file.as_deref().and_then(Path::file_name) {
        Some(file_name) => {
            let _ = write!(
                row,
                "<td><a href='{}'>View Log</a></td></tr>",
                file_name.to_string_lossy()
            );
        }
        None => row.push_str("<td>N/A</td></tr>"),
    }
    row
}
