//! Turns raw spreadsheet rows into canonical [`Tender`] records.
//!
//! The source sheet is hand-maintained: header names drift, dates arrive in
//! half a dozen shapes, and the same status is often reported in two
//! columns. Everything here degrades instead of erroring — malformed cells
//! become empty strings, zero values, or `None` dates.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::domain::tender::{submission_near, Tender, TenderId};

/// Ordered keyword variants per logical field; the first header cell that
/// contains any of them (case-insensitively) wins.
const REF_NO_KEYWORDS: &[&str] = &["TENDER NO", "TENDER NUMBER", "REF NO", "REF. NO"];
const TENDER_TYPE_KEYWORDS: &[&str] = &["TENDER TYPE", "TYPE"];
const CLIENT_KEYWORDS: &[&str] = &["CLIENT"];
const TENDER_NAME_KEYWORDS: &[&str] = &["TENDER NAME", "NAME", "DESCRIPTION"];
const YEAR_KEYWORDS: &[&str] = &["YEAR"];
const DATE_RECEIVED_KEYWORDS: &[&str] =
    &["DATE TENDER RECD", "DATE RECEIVED", "RFP RECEIVED", "TENDER RECEIVED"];
const LEAD_KEYWORDS: &[&str] = &["LEAD", "INTERNAL LEAD", "ASSIGNED"];
const VALUE_KEYWORDS: &[&str] = &["TENDER VALUE", "VALUE", "OPPORTUNITY VALUE"];
const AVENIR_STATUS_KEYWORDS: &[&str] = &["AVENIR STATUS", "STATUS"];
const TENDER_RESULT_KEYWORDS: &[&str] = &["TENDER RESULT", "RESULT"];
const TENDER_STATUS_KEYWORDS: &[&str] = &["TENDER STATUS"];
const REMARKS_KEYWORDS: &[&str] = &["REMARKS", "REASON", "REMARKS/REASON"];
const GROUP_KEYWORDS: &[&str] = &["GROUP CLASSIFICATION", "GROUP"];

#[derive(Clone, Copy, Debug, Default)]
struct ColumnIndices {
    ref_no: Option<usize>,
    tender_type: Option<usize>,
    client: Option<usize>,
    tender_name: Option<usize>,
    year: Option<usize>,
    date_received: Option<usize>,
    lead: Option<usize>,
    value: Option<usize>,
    avenir_status: Option<usize>,
    tender_result: Option<usize>,
    tender_status: Option<usize>,
    remarks: Option<usize>,
    group: Option<usize>,
}

impl ColumnIndices {
    fn resolve(headers: &[String]) -> Self {
        let normalized: Vec<String> =
            headers.iter().map(|h| h.trim().to_uppercase()).collect();
        let find = |keywords: &[&str]| {
            normalized.iter().position(|h| keywords.iter().any(|k| h.contains(k)))
        };

        Self {
            ref_no: find(REF_NO_KEYWORDS),
            tender_type: find(TENDER_TYPE_KEYWORDS),
            client: find(CLIENT_KEYWORDS),
            tender_name: find(TENDER_NAME_KEYWORDS),
            year: find(YEAR_KEYWORDS),
            date_received: find(DATE_RECEIVED_KEYWORDS),
            lead: find(LEAD_KEYWORDS),
            value: find(VALUE_KEYWORDS),
            avenir_status: find(AVENIR_STATUS_KEYWORDS),
            tender_result: find(TENDER_RESULT_KEYWORDS),
            tender_status: find(TENDER_STATUS_KEYWORDS),
            remarks: find(REMARKS_KEYWORDS),
            group: find(GROUP_KEYWORDS),
        }
    }
}

/// Parse a rectangular grid of string cells into tender records. `rows[0]`
/// is the header row; column order is irrelevant. `today` anchors the
/// submission-near flag and the default year for dates without one.
pub fn parse_grid(rows: &[Vec<String>], today: NaiveDate) -> Vec<Tender> {
    let Some(headers) = rows.first() else {
        return Vec::new();
    };
    let columns = ColumnIndices::resolve(headers);
    let default_year = today.year();

    let mut tenders = Vec::new();
    for (index, row) in rows.iter().enumerate().skip(1) {
        let has_content = row.iter().any(|cell| !cell.trim().is_empty());
        if !has_content {
            continue;
        }

        let cell = |column: Option<usize>| -> String {
            column
                .and_then(|idx| row.get(idx))
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };

        let ref_no = cell(columns.ref_no);
        let client = cell(columns.client);
        let tender_name = cell(columns.tender_name);
        if ref_no.is_empty() && client.is_empty() && tender_name.is_empty() {
            continue;
        }

        let year = cell(columns.year);
        let raw_date_received = cell(columns.date_received);
        let rfp_received_date =
            parse_received_date(&year, &raw_date_received, default_year);

        tenders.push(Tender {
            id: TenderId::from_row_index(index),
            ref_no,
            tender_name,
            client,
            tender_type: cell(columns.tender_type),
            lead: cell(columns.lead),
            value: parse_value(&cell(columns.value)),
            avenir_status: cell(columns.avenir_status),
            tender_result: cell(columns.tender_result),
            tender_status_remark: cell(columns.tender_status),
            remarks_reason: cell(columns.remarks),
            group_classification: cell(columns.group),
            rfp_received_date,
            is_submission_near: submission_near(rfp_received_date, today),
            year,
            raw_date_received,
        });
    }

    tenders
}

/// Monetary cell parser: strip everything but digits, `.` and `-`, then
/// parse; unparseable degrades to zero. Never errors.
pub fn parse_value(raw: &str) -> Decimal {
    let cleaned: String =
        raw.chars().filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-').collect();
    cleaned.parse().unwrap_or(Decimal::ZERO)
}

/// Combine a year cell and a date cell into a calendar date.
///
/// Supported shapes: `D-Mon`, `D Mon`, `Mon-D`, `Mon D` (month name or
/// 3-letter abbreviation, any case) and `D/M` or `M/D` (first number above
/// 12 is treated as the day). Placeholders and unrecognized shapes resolve
/// to `None`; a missing year falls back to `default_year`.
pub fn parse_received_date(year: &str, date: &str, default_year: i32) -> Option<NaiveDate> {
    let cleaned = date.trim();
    if cleaned.is_empty() || cleaned == "-" || cleaned.eq_ignore_ascii_case("undefined") {
        return None;
    }

    let year = match year.trim() {
        "" | "-" => default_year,
        value => value.parse().unwrap_or(default_year),
    };

    let tokens: Vec<&str> =
        cleaned.split(|c: char| c == ' ' || c == '-').filter(|t| !t.is_empty()).collect();
    if let [first, second] = tokens.as_slice() {
        // D-Mon / D Mon
        if let (Ok(day), Some(month)) = (first.parse::<u32>(), month_number(second)) {
            return NaiveDate::from_ymd_opt(year, month, day);
        }
        // Mon-D / Mon D
        if let (Some(month), Ok(day)) = (month_number(first), second.parse::<u32>()) {
            return NaiveDate::from_ymd_opt(year, month, day);
        }
    }

    let slash: Vec<&str> = cleaned.split('/').collect();
    if let [first, second] = slash.as_slice() {
        if let (Ok(a), Ok(b)) = (first.parse::<u32>(), second.parse::<u32>()) {
            // Past 12 the first number can only be a day; otherwise M/D.
            return if a > 12 {
                NaiveDate::from_ymd_opt(year, b, a)
            } else {
                NaiveDate::from_ymd_opt(year, a, b)
            };
        }
    }

    None
}

fn month_number(token: &str) -> Option<u32> {
    let key = token.to_ascii_lowercase();
    let abbreviated = key.get(..3).unwrap_or(&key);
    match abbreviated {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
    .filter(|_| {
        // Reject things like "janitor": only the full month name or the
        // exact 3-letter abbreviation qualify.
        matches!(
            key.as_str(),
            "jan" | "feb" | "mar" | "apr" | "may" | "jun" | "jul" | "aug" | "sep" | "oct"
                | "nov" | "dec" | "january" | "february" | "march" | "april" | "june"
                | "july" | "august" | "september" | "october" | "november" | "december"
        )
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{parse_grid, parse_received_date, parse_value};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|row| row.iter().map(|s| s.to_string()).collect()).collect()
    }

    const HEADERS: &[&str] = &[
        "TENDER NO",
        "TENDER NAME",
        "CLIENT",
        "TENDER TYPE",
        "GROUP CLASSIFICATION",
        "INTERNAL LEAD",
        "TENDER VALUE",
        "YEAR",
        "DATE TENDER RECD",
        "AVENIR STATUS",
        "TENDER RESULT",
        "TENDER STATUS",
        "REMARKS/REASON",
    ];

    #[test]
    fn day_month_shapes_parse() {
        assert_eq!(parse_received_date("2024", "6-May", 2026), Some(date(2024, 5, 6)));
        assert_eq!(parse_received_date("2024", "15 Jul", 2026), Some(date(2024, 7, 15)));
        assert_eq!(parse_received_date("2024", "May 6", 2026), Some(date(2024, 5, 6)));
        assert_eq!(parse_received_date("2024", "September-3", 2026), Some(date(2024, 9, 3)));
    }

    #[test]
    fn slash_shapes_use_day_first_heuristic() {
        // First number above 12 must be the day.
        assert_eq!(parse_received_date("2024", "23/5", 2026), Some(date(2024, 5, 23)));
        // Otherwise month/day.
        assert_eq!(parse_received_date("2024", "5/23", 2026), Some(date(2024, 5, 23)));
        assert_eq!(parse_received_date("2024", "6/3", 2026), Some(date(2024, 6, 3)));
    }

    #[test]
    fn placeholders_and_garbage_resolve_to_none() {
        assert_eq!(parse_received_date("2024", "", 2026), None);
        assert_eq!(parse_received_date("2024", "-", 2026), None);
        assert_eq!(parse_received_date("2024", "undefined", 2026), None);
        assert_eq!(parse_received_date("2024", "sometime soon", 2026), None);
        assert_eq!(parse_received_date("2024", "30-Feb", 2026), None);
    }

    #[test]
    fn missing_year_defaults_to_current() {
        assert_eq!(parse_received_date("", "6-May", 2026), Some(date(2026, 5, 6)));
        assert_eq!(parse_received_date("-", "6-May", 2026), Some(date(2026, 5, 6)));
    }

    #[test]
    fn value_parsing_strips_currency_noise() {
        assert_eq!(parse_value("AED 1,250,000.50"), Decimal::new(125_000_050, 2));
        assert_eq!(parse_value("-"), Decimal::ZERO);
        assert_eq!(parse_value(""), Decimal::ZERO);
        assert_eq!(parse_value("TBD"), Decimal::ZERO);
    }

    #[test]
    fn rows_without_identifying_fields_are_dropped() {
        let rows = grid(&[
            HEADERS,
            &["T-1", "Metro extension", "Transit Authority", "", "GES", "", "100", "2026", "6-May", "WORKING", "", "", ""],
            &["", "", "", "", "", "", "", "", "", "", "", "", ""],
            &["", "", "", "note only", "", "", "", "", "", "", "", "", ""],
        ]);

        let tenders = parse_grid(&rows, date(2026, 8, 29));
        assert_eq!(tenders.len(), 1);
        assert_eq!(tenders[0].ref_no, "T-1");
        assert_eq!(tenders[0].id.0, "tender-1");
        assert_eq!(tenders[0].group_classification, "GES");
        assert_eq!(tenders[0].rfp_received_date, Some(date(2026, 5, 6)));
    }

    #[test]
    fn header_aliases_resolve_the_same_field() {
        let rows = grid(&[
            &["REF. NO", "DESCRIPTION", "CLIENT", "OPPORTUNITY VALUE"],
            &["T-9", "Harbor dredging", "Port Co", "2,000"],
        ]);

        let tenders = parse_grid(&rows, date(2026, 8, 29));
        assert_eq!(tenders.len(), 1);
        assert_eq!(tenders[0].ref_no, "T-9");
        assert_eq!(tenders[0].tender_name, "Harbor dredging");
        assert_eq!(tenders[0].value, Decimal::new(2000, 0));
    }

    #[test]
    fn short_rows_degrade_to_empty_cells() {
        let rows = grid(&[HEADERS, &["T-2"]]);

        let tenders = parse_grid(&rows, date(2026, 8, 29));
        assert_eq!(tenders.len(), 1);
        assert_eq!(tenders[0].client, "");
        assert_eq!(tenders[0].value, Decimal::ZERO);
        assert_eq!(tenders[0].rfp_received_date, None);
        assert!(!tenders[0].is_submission_near);
    }

    #[test]
    fn empty_grid_yields_no_records() {
        assert!(parse_grid(&[], date(2026, 8, 29)).is_empty());
        assert!(parse_grid(&grid(&[HEADERS]), date(2026, 8, 29)).is_empty());
    }
}
