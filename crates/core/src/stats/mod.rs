//! KPI, funnel, and leaderboard aggregation.
//!
//! Pure functions of a record slice; deterministic and re-invoked on every
//! filter change. Classification runs on the de-duplicated status pair so a
//! state reported in both source columns counts once.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::tender::{normalize_status, unique_status, Tender};

pub const FUNNEL_STAGES: [&str; 4] = ["TO START", "WORKING", "SUBMITTED", "AWARDED"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiStats {
    /// In-progress + submitted + awarded, counted once per record.
    pub active_tenders: u64,
    /// Sum of value over awarded records.
    pub total_active_value: Decimal,
    pub awarded_count: u64,
    pub awarded_value: Decimal,
    pub lost_count: u64,
    pub lost_value: Decimal,
    pub regretted_count: u64,
    pub regretted_value: Decimal,
    pub working_count: u64,
    pub working_value: Decimal,
    pub to_start_count: u64,
    pub to_start_value: Decimal,
    pub ongoing_count: u64,
    pub ongoing_value: Decimal,
    pub submission_near_count: u64,
}

/// Signed accumulator; the WORKING → ONGOING merge subtracts a provisional
/// working count back out, so totals can dip below zero mid-pass and are
/// clamped on finish.
#[derive(Default)]
struct KpiAccumulator {
    active_tenders: u64,
    total_active_value: Decimal,
    awarded_count: i64,
    awarded_value: Decimal,
    lost_count: i64,
    lost_value: Decimal,
    regretted_count: i64,
    regretted_value: Decimal,
    working_count: i64,
    working_value: Decimal,
    to_start_count: i64,
    to_start_value: Decimal,
    ongoing_count: i64,
    ongoing_value: Decimal,
    submission_near_count: u64,
}

impl KpiAccumulator {
    fn finish(self) -> KpiStats {
        let clamp_count = |count: i64| count.max(0) as u64;
        let clamp_value = |value: Decimal| value.max(Decimal::ZERO);

        KpiStats {
            active_tenders: self.active_tenders,
            total_active_value: clamp_value(self.total_active_value),
            awarded_count: clamp_count(self.awarded_count),
            awarded_value: clamp_value(self.awarded_value),
            lost_count: clamp_count(self.lost_count),
            lost_value: clamp_value(self.lost_value),
            regretted_count: clamp_count(self.regretted_count),
            regretted_value: clamp_value(self.regretted_value),
            working_count: clamp_count(self.working_count),
            working_value: clamp_value(self.working_value),
            to_start_count: clamp_count(self.to_start_count),
            to_start_value: clamp_value(self.to_start_value),
            ongoing_count: clamp_count(self.ongoing_count),
            ongoing_value: clamp_value(self.ongoing_value),
            submission_near_count: self.submission_near_count,
        }
    }
}

pub fn calculate_kpi_stats(data: &[Tender]) -> KpiStats {
    let mut acc = KpiAccumulator::default();
    let mut counted_for_active: HashSet<&str> = HashSet::new();

    for tender in data {
        let (avenir, result) = unique_status(&tender.avenir_status, &tender.tender_result);

        let is_in_progress = avenir == "WORKING" || avenir == "ONGOING" || result == "ONGOING";
        let is_submitted = avenir == "SUBMITTED";
        let is_awarded = avenir == "AWARDED" || result == "AWARDED";

        if (is_in_progress || is_submitted || is_awarded)
            && counted_for_active.insert(tender.id.0.as_str())
        {
            acc.active_tenders += 1;
        }

        if is_awarded {
            acc.total_active_value += tender.value;
        }

        match avenir.as_str() {
            "AWARDED" => {
                acc.awarded_count += 1;
                acc.awarded_value += tender.value;
            }
            "LOST" => {
                acc.lost_count += 1;
                acc.lost_value += tender.value;
            }
            "REGRETTED" => {
                acc.regretted_count += 1;
                acc.regretted_value += tender.value;
            }
            "WORKING" => {
                acc.working_count += 1;
                acc.working_value += tender.value;
            }
            "TO START" => {
                acc.to_start_count += 1;
                acc.to_start_value += tender.value;
            }
            _ => {}
        }

        if result == "ONGOING" && avenir != "WORKING" && avenir != "ONGOING" {
            acc.ongoing_count += 1;
            acc.ongoing_value += tender.value;
        } else if avenir == "ONGOING" || avenir == "WORKING" {
            // WORKING and ONGOING merge into a single ongoing bucket; the
            // provisional working count from above is subtracted back out.
            acc.ongoing_count += 1;
            acc.ongoing_value += tender.value;
            if avenir == "WORKING" {
                acc.working_count -= 1;
                acc.working_value -= tender.value;
            }
        }

        if tender.is_submission_near {
            acc.submission_near_count += 1;
        }
    }

    acc.finish()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub stage: String,
    pub count: u64,
    pub value: Decimal,
    /// Percentage of the previous stage's count; 100 for the first stage or
    /// when the previous stage is empty.
    pub conversion_rate: u64,
}

pub fn calculate_funnel(data: &[Tender]) -> Vec<FunnelStage> {
    let mut counts = [0u64; FUNNEL_STAGES.len()];
    let mut values = [Decimal::ZERO; FUNNEL_STAGES.len()];

    for tender in data {
        let status = normalize_status(&tender.avenir_status);
        let stage = match status.as_str() {
            "TO START" => Some(0),
            // The working stage absorbs both in-progress labels.
            "WORKING" | "ONGOING" => Some(1),
            "SUBMITTED" => Some(2),
            "AWARDED" => Some(3),
            _ => None,
        };
        if let Some(index) = stage {
            counts[index] += 1;
            values[index] += tender.value;
        }
    }

    FUNNEL_STAGES
        .iter()
        .enumerate()
        .map(|(index, stage)| {
            let conversion_rate = if index == 0 || counts[index - 1] == 0 {
                100
            } else {
                ((counts[index] as f64 / counts[index - 1] as f64) * 100.0).round() as u64
            };
            FunnelStage {
                stage: stage.to_string(),
                count: counts[index],
                value: values[index],
                conversion_rate,
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientTotals {
    pub name: String,
    pub count: u64,
    pub value: Decimal,
}

/// Per-client totals sorted by value descending (ties broken by name so the
/// ordering is deterministic). Callers slice for presentation — the
/// dashboard takes ten, the compact widget eight.
pub fn client_leaderboard(data: &[Tender]) -> Vec<ClientTotals> {
    let mut totals: HashMap<&str, (u64, Decimal)> = HashMap::new();
    for tender in data {
        if tender.client.is_empty() {
            continue;
        }
        let entry = totals.entry(tender.client.as_str()).or_default();
        entry.0 += 1;
        entry.1 += tender.value;
    }

    let mut leaderboard: Vec<ClientTotals> = totals
        .into_iter()
        .map(|(name, (count, value))| ClientTotals { name: name.to_string(), count, value })
        .collect();
    leaderboard.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    leaderboard
}

/// Submission-near records, soonest deadline first, capped. Records with no
/// resolvable date cannot be near, so the sort key never sees `None` — but
/// treat it as earliest anyway rather than panicking on a bad flag.
pub fn submission_near_tenders(data: &[Tender], cap: usize) -> Vec<Tender> {
    let mut near: Vec<Tender> =
        data.iter().filter(|t| t.is_submission_near).cloned().collect();
    near.sort_by_key(|t| t.rfp_received_date.unwrap_or(chrono::NaiveDate::MIN));
    near.truncate(cap);
    near
}
