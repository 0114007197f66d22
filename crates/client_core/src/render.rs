//! Typed table rows for the operator and admin views.
//!
//! Server-supplied strings are plain text here and only become markup in
//! [`TableBody::to_html`], where every cell is escaped.

use chrono::DateTime;
use shared::{
    domain::{format_percent, Label},
    protocol::{FeedbackRecord, LogRecord},
};

pub const NOT_AVAILABLE: &str = "N/A";

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Renders RFC 2822 (the backend's default) or RFC 3339 timestamps as
/// `YYYY-MM-DD HH:MM:SS`; anything else is passed through.
pub fn format_timestamp(raw: &str) -> String {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .map(|parsed| parsed.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| trimmed.to_string())
}

fn or_not_available(text: String) -> String {
    if text.trim().is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Image { src: String, alt: &'static str },
}

impl Cell {
    fn to_html(&self) -> String {
        match self {
            Cell::Text(text) => format!("<td>{}</td>", escape_html(text)),
            Cell::Image { src, alt } => format!(
                "<td><img src=\"{}\" alt=\"{}\" width=\"100\"></td>",
                escape_html(src),
                escape_html(alt)
            ),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Image { src, .. } => format!("<image {} bytes>", src.len()),
        }
    }
}

pub trait TableRow {
    const COLUMNS: usize;
    fn cells(&self) -> Vec<Cell>;
}

/// Either the rows of a table or a single explanatory row replacing them.
#[derive(Debug, Clone, PartialEq)]
pub enum TableBody<R> {
    Rows(Vec<R>),
    Fallback(String),
}

impl<R: TableRow> TableBody<R> {
    pub fn rows(&self) -> &[R] {
        match self {
            TableBody::Rows(rows) => rows,
            TableBody::Fallback(_) => &[],
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, TableBody::Fallback(_))
    }

    /// Rendered `<tr>` count; a fallback counts as one.
    pub fn rendered_rows(&self) -> usize {
        match self {
            TableBody::Rows(rows) => rows.len(),
            TableBody::Fallback(_) => 1,
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            TableBody::Rows(rows) => rows
                .iter()
                .map(|row| {
                    let cells: String = row.cells().iter().map(Cell::to_html).collect();
                    format!("<tr>{cells}</tr>")
                })
                .collect(),
            TableBody::Fallback(message) => format!(
                "<tr><td colspan=\"{}\">{}</td></tr>",
                R::COLUMNS,
                escape_html(message)
            ),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            TableBody::Rows(rows) => rows
                .iter()
                .map(|row| {
                    row.cells()
                        .iter()
                        .map(Cell::to_text)
                        .collect::<Vec<_>>()
                        .join(" | ")
                })
                .collect::<Vec<_>>()
                .join("\n"),
            TableBody::Fallback(message) => message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    pub source_address: String,
    pub request_time: String,
    pub filename: String,
    pub prediction: String,
    pub confidence: String,
}

impl From<&LogRecord> for LogRow {
    fn from(record: &LogRecord) -> Self {
        Self {
            source_address: or_not_available(record.ip_address.clone()),
            request_time: or_not_available(format_timestamp(&record.request_time)),
            filename: record
                .filename
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            prediction: record
                .prediction
                .as_ref()
                .map(Label::to_string)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            confidence: record
                .confidence
                .filter(|value| value.is_finite())
                .map(format_percent)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        }
    }
}

impl TableRow for LogRow {
    const COLUMNS: usize = 5;

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.source_address.clone()),
            Cell::Text(self.request_time.clone()),
            Cell::Text(self.filename.clone()),
            Cell::Text(self.prediction.clone()),
            Cell::Text(self.confidence.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRow {
    pub submitted_at: String,
    pub image_uri: String,
    pub label: String,
}

impl From<&FeedbackRecord> for FeedbackRow {
    fn from(record: &FeedbackRecord) -> Self {
        // Postgres' encode(.., 'base64') wraps lines every 76 characters.
        let payload: String = record
            .image_data
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect();
        Self {
            submitted_at: format_timestamp(&record.created_at),
            image_uri: format!("data:image/png;base64,{payload}"),
            label: record.label.to_string(),
        }
    }
}

impl TableRow for FeedbackRow {
    const COLUMNS: usize = 3;

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.submitted_at.clone()),
            Cell::Image {
                src: self.image_uri.clone(),
                alt: "Feedback image",
            },
            Cell::Text(self.label.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRow {
    pub label: String,
    pub count: u64,
}

impl TableRow for StatsRow {
    const COLUMNS: usize = 2;

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.label.clone()),
            Cell::Text(self.count.to_string()),
        ]
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
