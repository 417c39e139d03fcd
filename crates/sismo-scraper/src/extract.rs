//! Tolerant extraction of seismic reports from the IGP table markup.
//!
//! Only the first `<table>` of the document is considered. Its body rows map
//! onto [`SeismicReport`] by fixed column position; rows that are too short
//! are skipped and reported as diagnostics rather than failing the page.

use crate::error::ExtractError;
use crate::types::{SeismicReport, MAX_REPORTS};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

/// Columns a row must have to produce a report.
pub const EXPECTED_CELLS: usize = 5;

/// A body row that was skipped because it had too few cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 0-based index among the body rows considered.
    pub index: usize,
    /// Number of `<td>` cells found.
    pub cells: usize,
}

/// Reports extracted from a page plus the rows that were skipped.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub reports: Vec<SeismicReport>,
    pub skipped: Vec<SkippedRow>,
}

/// Extract up to ten reports from page markup.
pub fn extract(markup: &str) -> Result<Vec<SeismicReport>, ExtractError> {
    extract_with_diagnostics(markup).map(|e| e.reports)
}

/// Extract up to ten reports, keeping diagnostics for skipped rows.
pub fn extract_with_diagnostics(markup: &str) -> Result<Extraction, ExtractError> {
    let document = Html::parse_document(markup);

    let table = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
        .ok_or(ExtractError::NoTable)?;

    let body = child_elements(table, "tbody")
        .next()
        .ok_or(ExtractError::NoBody)?;

    let mut extraction = Extraction::default();

    for (index, row) in child_elements(body, "tr").take(MAX_REPORTS).enumerate() {
        let cells: Vec<ElementRef<'_>> = child_elements(row, "td").collect();
        if cells.len() < EXPECTED_CELLS {
            warn!(
                row = index,
                cells = cells.len(),
                "skipping malformed row (expected {EXPECTED_CELLS} cells)"
            );
            extraction.skipped.push(SkippedRow {
                index,
                cells: cells.len(),
            });
            continue;
        }

        extraction.reports.push(SeismicReport {
            report_code: cell_text(cells[0]),
            reference: cell_text(cells[1]),
            local_timestamp: cell_text(cells[2]),
            magnitude: cell_text(cells[3]),
            report_url: first_link(cells[4]).unwrap_or_default(),
        });
    }

    if extraction.reports.is_empty() {
        return Err(ExtractError::NoRows);
    }

    debug!(
        reports = extraction.reports.len(),
        skipped = extraction.skipped.len(),
        "extracted seismic table"
    );
    Ok(extraction)
}

/// Count the body rows of the first table that carry a full set of cells.
///
/// Used by the static fetch strategy to tell a page shell (empty body or a
/// "Cargando..." placeholder row) from a page that already carries its data.
pub fn populated_rows(markup: &str) -> usize {
    let document = Html::parse_document(markup);
    let table = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table");
    let Some(body) = table.and_then(|t| child_elements(t, "tbody").next()) else {
        return 0;
    };

    let rows = child_elements(body, "tr")
        .filter(|row| child_elements(*row, "td").count() >= EXPECTED_CELLS)
        .count();
    rows
}

fn child_elements<'a>(
    parent: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == name)
}

/// Plain text of a cell with markup dropped and whitespace collapsed.
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_link(cell: ElementRef<'_>) -> Option<String> {
    cell.descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .map(|a| a.value().attr("href").unwrap_or_default().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(i: usize) -> String {
        format!(
            "<tr><td>IGP/CENSIS/RS 2025-{i:04}</td><td>Ref {i}</td>\
             <td>05/11/2025 14:{i:02}:00</td><td>4.{i}</td>\
             <td><a href=\"/report/{i:04}.pdf\">ver</a></td></tr>"
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            "<html><body><table><thead><tr><th>Reporte</th></tr></thead>\
             <tbody>{}</tbody></table></body></html>",
            rows.concat()
        )
    }

    #[test]
    fn test_ten_rows_in_document_order() {
        let rows: Vec<String> = (0..10).map(row).collect();
        let reports = extract(&page(&rows)).unwrap();

        assert_eq!(reports.len(), 10);
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.report_code, format!("IGP/CENSIS/RS 2025-{i:04}"));
        }
    }

    #[test]
    fn test_more_than_ten_rows_truncated() {
        let rows: Vec<String> = (0..14).map(row).collect();
        let reports = extract(&page(&rows)).unwrap();

        assert_eq!(reports.len(), 10);
        assert_eq!(reports[9].report_code, "IGP/CENSIS/RS 2025-0009");
    }

    #[test]
    fn test_empty_body_is_no_rows() {
        let err = extract("<table><tbody></tbody></table>").unwrap_err();
        assert_eq!(err, ExtractError::NoRows);
    }

    #[test]
    fn test_missing_table() {
        let err = extract("<html><body><p>Cargando...</p></body></html>").unwrap_err();
        assert_eq!(err, ExtractError::NoTable);
    }

    #[test]
    fn test_table_without_body() {
        let err = extract("<table></table>").unwrap_err();
        assert_eq!(err, ExtractError::NoBody);
    }

    #[test]
    fn test_short_row_skipped_and_order_kept() {
        let mut rows: Vec<String> = (0..10).map(row).collect();
        rows[4] = "<tr><td>a</td><td>b</td><td>c</td><td>d</td></tr>".to_string();

        let extraction = extract_with_diagnostics(&page(&rows)).unwrap();

        assert_eq!(extraction.reports.len(), 9);
        assert_eq!(extraction.skipped, vec![SkippedRow { index: 4, cells: 4 }]);
        let codes: Vec<&str> = extraction
            .reports
            .iter()
            .map(|r| r.report_code.as_str())
            .collect();
        assert_eq!(codes[3], "IGP/CENSIS/RS 2025-0003");
        assert_eq!(codes[4], "IGP/CENSIS/RS 2025-0005");
    }

    #[test]
    fn test_only_short_rows_is_no_rows() {
        let rows = vec!["<tr><td>only</td></tr>".to_string()];
        assert_eq!(extract(&page(&rows)).unwrap_err(), ExtractError::NoRows);
    }

    #[test]
    fn test_single_row_maps_every_field() {
        let markup = "<table><tbody><tr>\
            <td>IGP/CENSIS/RS 2025-0111</td>\
            <td>10 km al SE de Lima</td>\
            <td>05/11/2025 14:23:10</td>\
            <td>4.5</td>\
            <td><a href='/report/0111.pdf'>ver</a></td>\
            </tr></tbody></table>";

        let reports = extract(markup).unwrap();
        assert_eq!(
            reports,
            vec![SeismicReport {
                report_code: "IGP/CENSIS/RS 2025-0111".into(),
                reference: "10 km al SE de Lima".into(),
                local_timestamp: "05/11/2025 14:23:10".into(),
                magnitude: "4.5".into(),
                report_url: "/report/0111.pdf".into(),
            }]
        );
    }

    #[test]
    fn test_inner_markup_dropped_and_whitespace_trimmed() {
        let markup = "<table><tbody><tr>\
            <td>\n   <span>IGP/CENSIS/RS</span> 2025-0112  </td>\
            <td> 25 km al <b>N</b> de\n  Ica </td>\
            <td>06/11/2025 01:02:03</td>\
            <td><strong>3.9</strong></td>\
            <td>sin reporte</td>\
            </tr></tbody></table>";

        let report = &extract(markup).unwrap()[0];
        assert_eq!(report.report_code, "IGP/CENSIS/RS 2025-0112");
        assert_eq!(report.reference, "25 km al N de Ica");
        assert_eq!(report.magnitude, "3.9");
        assert_eq!(report.report_url, "");
    }

    #[test]
    fn test_only_first_table_is_used() {
        let markup = "<table><tbody></tbody></table>\
            <table><tbody><tr><td>1</td><td>2</td><td>3</td><td>4</td><td>5</td></tr></tbody></table>";
        assert_eq!(extract(markup).unwrap_err(), ExtractError::NoRows);
    }

    #[test]
    fn test_populated_rows() {
        let rows: Vec<String> = (0..3).map(row).collect();
        assert_eq!(populated_rows(&page(&rows)), 3);
        assert_eq!(populated_rows("<table><tbody></tbody></table>"), 0);
        assert_eq!(populated_rows("<table></table>"), 0);
        assert_eq!(populated_rows("<div>no table</div>"), 0);
    }

    #[test]
    fn test_placeholder_row_is_not_populated() {
        let shell = page(&["<tr><td colspan=\"5\">Cargando...</td></tr>".to_string()]);
        assert_eq!(populated_rows(&shell), 0);

        let mut rows = vec!["<tr><td colspan=\"5\">Cargando...</td></tr>".to_string()];
        rows.push(row(1));
        assert_eq!(populated_rows(&page(&rows)), 1);
    }
}
