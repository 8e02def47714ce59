use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stable identifier for one pipeline item, assigned at ingestion from the
/// source row position. Also the join key for approval state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenderId(pub String);

impl TenderId {
    pub fn from_row_index(index: usize) -> Self {
        Self(format!("tender-{index}"))
    }
}

impl std::fmt::Display for TenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed organizational group codes that scope SVP reviewer authority.
/// Source data carries them with inconsistent casing, so comparisons go
/// through [`same_group`] rather than `==`.
pub const GROUP_CLASSIFICATIONS: [&str; 4] = ["GES", "GDS", "GTN", "GTS"];

/// One ingested pipeline item. Immutable once normalized; a refresh produces
/// a whole new generation of records rather than mutating in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tender {
    pub id: TenderId,
    pub ref_no: String,
    pub tender_name: String,
    pub client: String,
    pub tender_type: String,
    pub lead: String,
    /// Monetary amount; zero means "unknown / not entered", not "free".
    pub value: Decimal,
    /// Canonical status column from the source.
    pub avenir_status: String,
    /// Secondary status column, prone to duplicating `avenir_status`.
    pub tender_result: String,
    pub tender_status_remark: String,
    pub remarks_reason: String,
    pub group_classification: String,
    pub rfp_received_date: Option<NaiveDate>,
    /// Derived at normalization time from `rfp_received_date`, never stored
    /// independently of it.
    pub is_submission_near: bool,
    pub year: String,
    pub raw_date_received: String,
}

/// Trim + uppercase; the comparison form for every loosely-typed status cell.
pub fn normalize_status(status: &str) -> String {
    status.trim().to_uppercase()
}

/// De-duplicate the status pair: when both columns normalize to the same
/// string, the secondary collapses to empty so aggregation counts one
/// logical state once.
pub fn unique_status(avenir_status: &str, tender_result: &str) -> (String, String) {
    let avenir = normalize_status(avenir_status);
    let result = normalize_status(tender_result);

    if avenir == result {
        (avenir, String::new())
    } else {
        (avenir, result)
    }
}

/// Case-insensitive group-code equality, applied everywhere groups meet.
pub fn same_group(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

/// A record is submission-near iff its deadline (`rfp_received_date` + 7
/// days) falls within `today..today+7` inclusive. No date, never near.
pub fn submission_near(rfp_received_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    let Some(received) = rfp_received_date else {
        return false;
    };

    let deadline = received + chrono::Duration::days(7);
    let days_until = (deadline - today).num_days();
    (0..=7).contains(&days_until)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{normalize_status, same_group, submission_near, unique_status, TenderId};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn id_is_stable_per_row_index() {
        assert_eq!(TenderId::from_row_index(4), TenderId("tender-4".to_string()));
    }

    #[test]
    fn status_normalization_trims_and_uppercases() {
        assert_eq!(normalize_status("  awarded "), "AWARDED");
        assert_eq!(normalize_status(""), "");
    }

    #[test]
    fn duplicate_status_pair_collapses_secondary() {
        assert_eq!(
            unique_status("AWARDED", " awarded "),
            ("AWARDED".to_string(), String::new())
        );
        assert_eq!(
            unique_status("WORKING", "ONGOING"),
            ("WORKING".to_string(), "ONGOING".to_string())
        );
    }

    #[test]
    fn group_comparison_ignores_case_and_whitespace() {
        assert!(same_group("GES", "ges "));
        assert!(!same_group("GES", "GDS"));
    }

    #[test]
    fn received_today_is_submission_near() {
        let today = date(2026, 8, 29);
        assert!(submission_near(Some(today), today));
    }

    #[test]
    fn received_seven_days_ago_is_still_near() {
        let today = date(2026, 8, 29);
        assert!(submission_near(Some(date(2026, 8, 22)), today));
    }

    #[test]
    fn received_eight_days_ago_is_not_near() {
        let today = date(2026, 8, 29);
        assert!(!submission_near(Some(date(2026, 8, 21)), today));
    }

    #[test]
    fn missing_date_is_never_near() {
        assert!(!submission_near(None, date(2026, 8, 29)));
    }
}
