use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Server-issued identifier correlating a prediction with later feedback.
///
/// The backend emits it as a JSON integer today; it is kept opaque so a string
/// id would decode the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawRequestId", into = "String")]
pub struct RequestId(String);

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RequestId> for String {
    fn from(value: RequestId) -> Self {
        value.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRequestId {
    Int(i64),
    Text(String),
}

impl From<RawRequestId> for RequestId {
    fn from(value: RawRequestId) -> Self {
        match value {
            RawRequestId::Int(id) => Self(id.to_string()),
            RawRequestId::Text(id) => Self(id),
        }
    }
}

/// Lesion class reported by the classifier or chosen as a correction.
///
/// Ordering follows declaration order, which is also the display order of the
/// admin stats table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Label {
    Bcc,
    Scc,
    Mel,
    Other(String),
}

impl Label {
    /// Labels an operator may pick when correcting a prediction.
    pub const CORRECTABLE: [Label; 3] = [Label::Bcc, Label::Scc, Label::Mel];

    /// Spelling the backend validates feedback labels against.
    pub fn wire_name(&self) -> &str {
        match self {
            Label::Bcc => "BCC",
            Label::Scc => "SCC",
            Label::Mel => "Mel",
            Label::Other(raw) => raw,
        }
    }

    pub fn is_correctable(&self) -> bool {
        !matches!(self, Label::Other(_))
    }
}

impl FromStr for Label {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_uppercase().as_str() {
            "BCC" => Label::Bcc,
            "SCC" => Label::Scc,
            "MEL" => Label::Mel,
            _ => Label::Other(trimmed.to_string()),
        })
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(label) => label,
            Err(never) => match never {},
        }
    }
}

impl From<Label> for String {
    fn from(value: Label) -> Self {
        match value {
            Label::Other(raw) => raw,
            known => known.wire_name().to_string(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Classifier confidence, guaranteed to be a finite value in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// `0.91234` renders as `91.23%`.
    pub fn as_percent(self) -> String {
        format_percent(self.0)
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
