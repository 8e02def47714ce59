//! Compound predicate filters over the record set: AND across dimensions,
//! OR within a multi-select dimension.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::tender::{normalize_status, same_group, Tender};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TenderFilter {
    /// Case-insensitive substring over name, client, ref no, and lead.
    pub search: Option<String>,
    pub statuses: Vec<String>,
    pub groups: Vec<String>,
    pub leads: Vec<String>,
    pub clients: Vec<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_value: Option<Decimal>,
    pub max_value: Option<Decimal>,
    pub submission_near_only: bool,
}

impl TenderFilter {
    pub fn matches(&self, tender: &Tender) -> bool {
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let needle = search.trim().to_lowercase();
            let haystacks =
                [&tender.tender_name, &tender.client, &tender.ref_no, &tender.lead];
            if !haystacks.iter().any(|field| field.to_lowercase().contains(&needle)) {
                return false;
            }
        }

        if !self.statuses.is_empty() && !self.statuses.iter().any(|s| status_matches(s, tender))
        {
            return false;
        }

        // Group codes arrive with inconsistent casing from the source sheet.
        if !self.groups.is_empty()
            && !self.groups.iter().any(|g| same_group(g, &tender.group_classification))
        {
            return false;
        }

        if !self.leads.is_empty() && !self.leads.contains(&tender.lead) {
            return false;
        }

        if !self.clients.is_empty() && !self.clients.contains(&tender.client) {
            return false;
        }

        if self.date_from.is_some() || self.date_to.is_some() {
            // A record without a usable date never matches an active range.
            let Some(date) = tender.rfp_received_date else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }

        if self.min_value.is_some_and(|min| tender.value < min) {
            return false;
        }
        if self.max_value.is_some_and(|max| tender.value > max) {
            return false;
        }

        if self.submission_near_only && !tender.is_submission_near {
            return false;
        }

        true
    }

    pub fn apply(&self, data: &[Tender]) -> Vec<Tender> {
        data.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

/// LOST and ONGOING are reported in either status column, so those filters
/// match both; every other status filter matches the canonical column only.
fn status_matches(selected: &str, tender: &Tender) -> bool {
    let selected = normalize_status(selected);
    let avenir = normalize_status(&tender.avenir_status);
    let result = normalize_status(&tender.tender_result);

    match selected.as_str() {
        "LOST" | "ONGOING" => avenir == selected || result == selected,
        _ => avenir == selected,
    }
}
