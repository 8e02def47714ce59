//! Flat row projection for an external spreadsheet-writer collaborator.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::domain::tender::Tender;

/// Column order for renderers; the rows themselves are keyed maps.
pub const EXPORT_COLUMNS: [&str; 13] = [
    "Ref No",
    "Tender Name",
    "Client",
    "Type",
    "Group",
    "Lead",
    "Value",
    "Avenir Status",
    "Tender Result",
    "Status Remark",
    "Remarks",
    "RFP Received",
    "Submission Near",
];

/// One keyed record per tender. Dates render ISO-8601, a missing date is
/// `null`, the value stays numeric-typed for the spreadsheet writer.
pub fn flat_rows(data: &[Tender]) -> Vec<BTreeMap<String, Value>> {
    data.iter()
        .map(|tender| {
            let mut row = BTreeMap::new();
            row.insert("Ref No".to_owned(), json!(tender.ref_no));
            row.insert("Tender Name".to_owned(), json!(tender.tender_name));
            row.insert("Client".to_owned(), json!(tender.client));
            row.insert("Type".to_owned(), json!(tender.tender_type));
            row.insert("Group".to_owned(), json!(tender.group_classification));
            row.insert("Lead".to_owned(), json!(tender.lead));
            row.insert("Value".to_owned(), json!(tender.value));
            row.insert("Avenir Status".to_owned(), json!(tender.avenir_status));
            row.insert("Tender Result".to_owned(), json!(tender.tender_result));
            row.insert("Status Remark".to_owned(), json!(tender.tender_status_remark));
            row.insert("Remarks".to_owned(), json!(tender.remarks_reason));
            row.insert(
                "RFP Received".to_owned(),
                tender
                    .rfp_received_date
                    .map(|date| json!(date.format("%Y-%m-%d").to_string()))
                    .unwrap_or(Value::Null),
            );
            row.insert("Submission Near".to_owned(), json!(tender.is_submission_near));
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    use crate::domain::tender::{Tender, TenderId};

    use super::{flat_rows, EXPORT_COLUMNS};

    fn tender() -> Tender {
        Tender {
            id: TenderId("tender-1".to_owned()),
            ref_no: "T-42".to_owned(),
            tender_name: "Substation refit".to_owned(),
            client: "Power Co".to_owned(),
            tender_type: "RFP".to_owned(),
            lead: "A. Rahman".to_owned(),
            value: Decimal::new(1250, 1),
            avenir_status: "SUBMITTED".to_owned(),
            tender_result: "ONGOING".to_owned(),
            tender_status_remark: "awaiting clarification".to_owned(),
            remarks_reason: "resubmitted once".to_owned(),
            group_classification: "GTN".to_owned(),
            rfp_received_date: NaiveDate::from_ymd_opt(2026, 2, 3),
            is_submission_near: true,
            year: "2026".to_owned(),
            raw_date_received: "3-Feb".to_owned(),
        }
    }

    #[test]
    fn rows_carry_the_full_column_set() {
        let rows = flat_rows(&[tender()]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];

        assert_eq!(row.len(), EXPORT_COLUMNS.len());
        for column in EXPORT_COLUMNS {
            assert!(row.contains_key(column), "missing column {column}");
        }
        assert_eq!(row["Ref No"], json!("T-42"));
        assert_eq!(row["Type"], json!("RFP"));
        assert_eq!(row["Status Remark"], json!("awaiting clarification"));
        assert_eq!(row["Remarks"], json!("resubmitted once"));
        assert_eq!(row["RFP Received"], json!("2026-02-03"));
        assert_eq!(row["Submission Near"], json!(true));
    }

    #[test]
    fn missing_date_renders_null() {
        let mut record = tender();
        record.rfp_received_date = None;
        record.is_submission_near = false;

        let rows = flat_rows(&[record]);
        assert_eq!(rows[0]["RFP Received"], Value::Null);
        assert_eq!(rows[0]["Submission Near"], json!(false));
    }
}
