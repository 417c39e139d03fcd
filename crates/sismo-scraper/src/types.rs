//! Core data types for seismic reports and their stored form.

use serde::{Deserialize, Serialize};

/// Upper bound on reports produced by a single fetch.
pub const MAX_REPORTS: usize = 10;

/// One row of the IGP seismic report table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeismicReport {
    /// Identifier as printed on the source, e.g. `IGP/CENSIS/RS 2025-0111`.
    pub report_code: String,
    /// Free-text location description.
    pub reference: String,
    /// Local date and time, in whatever format the source printed.
    pub local_timestamp: String,
    pub magnitude: String,
    /// Link to the supplementary document, verbatim. May be empty or relative.
    pub report_url: String,
}

/// Content produced by a fetch strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum RawContent {
    /// Page markup that still needs extraction.
    Markup(String),
    /// Reports already structured by the source.
    Records(Vec<SeismicReport>),
}

/// Successful fetch, tagged with the strategy that produced it.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub strategy: &'static str,
    pub content: RawContent,
}

/// A report as written to the key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReport {
    pub id: String,
    /// 1-based position within the batch that wrote it.
    #[serde(rename = "#")]
    pub position: u32,
    #[serde(flatten)]
    pub report: SeismicReport,
}

impl StoredReport {
    pub fn new(id: impl Into<String>, position: u32, report: SeismicReport) -> Self {
        Self {
            id: id.into(),
            position,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_report_json_is_flat() {
        let stored = StoredReport::new(
            "2025-0111",
            1,
            SeismicReport {
                report_code: "IGP/CENSIS/RS 2025-0111".into(),
                reference: "10 km al SE de Lima".into(),
                local_timestamp: "05/11/2025 14:23:10".into(),
                magnitude: "4.5".into(),
                report_url: "/report/0111.pdf".into(),
            },
        );

        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["id"], "2025-0111");
        assert_eq!(value["#"], 1);
        assert_eq!(value["report_code"], "IGP/CENSIS/RS 2025-0111");
        assert_eq!(value["report_url"], "/report/0111.pdf");

        let back: StoredReport = serde_json::from_value(value).unwrap();
        assert_eq!(back, stored);
    }
}
