//! Strategy C: the dated JSON endpoint behind the report page.
//!
//! The endpoint returns every report of a year as a JSON array. Entries are
//! mapped onto [`SeismicReport`] with the same text conventions as the HTML
//! table, and only the ten most recent are kept, newest first.

use super::http_client::PageClient;
use super::FetchStrategy;
use crate::error::StrategyError;
use crate::types::{RawContent, SeismicReport, MAX_REPORTS};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use tracing::debug;

const REPORT_PREFIX: &str = "IGP/CENSIS/RS";
const PERU_UTC_OFFSET_SECS: i32 = 5 * 3600;

/// Fetches reports from the JSON API.
pub struct ApiFeed {
    client: PageClient,
    url_template: String,
}

impl ApiFeed {
    /// `url_template` may contain `{year}`, replaced with the current year on each fetch.
    pub fn new(client: PageClient, url_template: &str) -> Self {
        Self {
            client,
            url_template: url_template.to_string(),
        }
    }

    pub fn url_for_year(&self, year: i32) -> String {
        self.url_template.replace("{year}", &year.to_string())
    }
}

#[async_trait]
impl FetchStrategy for ApiFeed {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn fetch(&self) -> Result<RawContent, StrategyError> {
        let url = self.url_for_year(report_year(Utc::now()));
        let resp = self
            .client
            .get_with_accept(&url, Some("application/json"))
            .await?;

        let reports = parse_payload(&resp.body)?;
        debug!(url = %url, reports = reports.len(), "API payload parsed");
        Ok(RawContent::Records(reports))
    }
}

/// Year of `now` in Peru local time (UTC-05:00, no daylight saving), which
/// is how the endpoint buckets its reports.
fn report_year(now: DateTime<Utc>) -> i32 {
    FixedOffset::west_opt(PERU_UTC_OFFSET_SECS)
        .map_or(now.year(), |peru| now.with_timezone(&peru).year())
}

/// Turn an API response body into at most ten reports, newest first.
pub fn parse_payload(body: &str) -> Result<Vec<SeismicReport>, StrategyError> {
    if body.trim().is_empty() {
        return Err(StrategyError::EmptyBody);
    }

    let payload: Value = serde_json::from_str(body)?;
    let entries = payload.as_array().ok_or(StrategyError::NotASequence)?;

    let mut dated: Vec<(Option<NaiveDateTime>, SeismicReport)> =
        entries.iter().filter_map(report_from_entry).collect();

    // Stable: entries without a parseable date keep payload order, after dated ones.
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(dated
        .into_iter()
        .take(MAX_REPORTS)
        .map(|(_, report)| report)
        .collect())
}

fn report_from_entry(entry: &Value) -> Option<(Option<NaiveDateTime>, SeismicReport)> {
    let code = text(entry, "codigo");
    if code.is_empty() {
        return None;
    }
    let report_code = if code.starts_with("IGP") {
        code
    } else {
        format!("{REPORT_PREFIX} {code}")
    };

    let (when, local_timestamp) =
        local_timestamp(&text(entry, "fecha_local"), &text(entry, "hora_local"));

    Some((
        when,
        SeismicReport {
            report_code,
            reference: text(entry, "referencia"),
            local_timestamp,
            magnitude: text(entry, "magnitud"),
            report_url: text(entry, "reporte_acelerometrico_pdf"),
        },
    ))
}

fn text(entry: &Value, key: &str) -> String {
    match entry.get(key) {
        Some(Value::String(s)) => s.split_whitespace().collect::<Vec<_>>().join(" "),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Combine the API's date and time fields into `dd/mm/YYYY HH:MM:SS`.
///
/// Dates arrive as `YYYY-MM-DD[THH:MM:SS...]`; times either bare or as an
/// ISO timestamp on 1970-01-01. Anything unparseable is passed through.
fn local_timestamp(date: &str, time: &str) -> (Option<NaiveDateTime>, String) {
    let parsed_date = date
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    let time_part = time.split_once('T').map(|(_, t)| t).unwrap_or(time);
    let parsed_time = time_part
        .get(..8)
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M:%S").ok());

    let date_text = parsed_date
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| date.to_string());
    let time_text = parsed_time
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| time_part.to_string());

    let when = match (parsed_date, parsed_time) {
        (Some(d), Some(t)) => Some(d.and_time(t)),
        (Some(d), None) => Some(d.and_time(NaiveTime::MIN)),
        _ => None,
    };

    (when, format!("{date_text} {time_text}").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(code: &str, date: &str, time: &str) -> Value {
        json!({
            "codigo": code,
            "referencia": "45 km al SO de Chilca, Cañete - Lima",
            "fecha_local": date,
            "hora_local": time,
            "magnitud": 4.1,
            "reporte_acelerometrico_pdf": format!("https://ultimosismo.igp.gob.pe/{code}.pdf"),
        })
    }

    #[test]
    fn test_maps_entry_fields() {
        let body = json!([entry(
            "2025-0111",
            "2025-11-05T00:00:00.000Z",
            "1970-01-01T14:23:10.000Z"
        )])
        .to_string();

        let reports = parse_payload(&body).unwrap();
        assert_eq!(reports.len(), 1);
        let r = &reports[0];
        assert_eq!(r.report_code, "IGP/CENSIS/RS 2025-0111");
        assert_eq!(r.reference, "45 km al SO de Chilca, Cañete - Lima");
        assert_eq!(r.local_timestamp, "05/11/2025 14:23:10");
        assert_eq!(r.magnitude, "4.1");
        assert_eq!(r.report_url, "https://ultimosismo.igp.gob.pe/2025-0111.pdf");
    }

    #[test]
    fn test_keeps_ten_newest_first() {
        let entries: Vec<Value> = (1..=15)
            .map(|day| {
                entry(
                    &format!("2025-{day:04}"),
                    &format!("2025-10-{day:02}"),
                    "08:00:00",
                )
            })
            .collect();

        let reports = parse_payload(&Value::Array(entries).to_string()).unwrap();
        assert_eq!(reports.len(), 10);
        assert_eq!(reports[0].report_code, "IGP/CENSIS/RS 2025-0015");
        assert_eq!(reports[9].report_code, "IGP/CENSIS/RS 2025-0006");
    }

    #[test]
    fn test_entries_without_code_are_skipped() {
        let body = json!([{ "referencia": "sin codigo" }, entry("2025-0002", "2025-01-02", "")])
            .to_string();
        let reports = parse_payload(&body).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].local_timestamp, "02/01/2025");
    }

    #[test]
    fn test_report_year_follows_peru_time() {
        let at = |s: &str| s.parse::<DateTime<Utc>>().unwrap();
        assert_eq!(report_year(at("2026-01-01T03:00:00Z")), 2025);
        assert_eq!(report_year(at("2026-01-01T05:00:00Z")), 2026);
        assert_eq!(report_year(at("2025-12-31T23:59:59Z")), 2025);
    }

    #[test]
    fn test_recoverable_payload_errors() {
        assert!(matches!(parse_payload("  \n"), Err(StrategyError::EmptyBody)));
        assert!(matches!(
            parse_payload("<html>mantenimiento</html>"),
            Err(StrategyError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_payload(r#"{"data": []}"#),
            Err(StrategyError::NotASequence)
        ));
    }

    #[tokio::test]
    async fn test_fetches_dated_url() {
        let server = MockServer::start().await;
        let year = report_year(Utc::now());
        Mock::given(method("GET"))
            .and(path(format!("/api/ajaxb/{year}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([entry(
                "2025-0200",
                "2025-06-01",
                "10:00:00"
            )])))
            .expect(1)
            .mount(&server)
            .await;

        let client = PageClient::new(&HttpSettings::default()).unwrap();
        let feed = ApiFeed::new(client, &format!("{}/api/ajaxb/{{year}}", server.uri()));

        match feed.fetch().await.unwrap() {
            RawContent::Records(reports) => {
                assert_eq!(reports[0].report_code, "IGP/CENSIS/RS 2025-0200")
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_body_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = PageClient::new(&HttpSettings::default()).unwrap();
        let feed = ApiFeed::new(client, &server.uri());
        assert!(matches!(feed.fetch().await, Err(StrategyError::EmptyBody)));
    }
}
