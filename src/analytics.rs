//! Aggregate statistics across the whole record corpus.
//! Any authenticated principal may read these; the numbers are counts and
//! ratios over all records, so nothing record-level leaks through them.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::AppResult;
use crate::policy::Actor;
use crate::store::SharedStore;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CountEntry {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineEntry {
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitShare {
    pub unit: String,
    pub members: usize,
    pub certifications: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_users: usize,
    pub total_certifications: usize,
    pub total_categories: usize,
    pub total_issuers: usize,
    pub average_per_user: f64,
    pub top_categories: Vec<CountEntry>,
    pub top_issuers: Vec<CountEntry>,
}

const TOP_N: usize = 5;

fn counts_desc(values: impl Iterator<Item = String>) -> Vec<CountEntry> {
    let mut map: BTreeMap<String, usize> = BTreeMap::new();
    for v in values {
        *map.entry(v).or_default() += 1;
    }
    let mut entries: Vec<CountEntry> = map
        .into_iter()
        .map(|(name, count)| CountEntry { name, count })
        .collect();
    // BTreeMap iteration gives the alphabetical tie order; the sort is stable.
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}

pub fn category_stats(store: &SharedStore, actor: &Actor) -> AppResult<Vec<CountEntry>> {
    actor.require_id()?;
    Ok(counts_desc(store.list_certs().into_iter().map(|c| c.category)))
}

pub fn issuer_stats(store: &SharedStore, actor: &Actor) -> AppResult<Vec<CountEntry>> {
    actor.require_id()?;
    Ok(counts_desc(store.list_certs().into_iter().map(|c| c.issuer)))
}

/// Completions per calendar month of the completion date, oldest first.
pub fn timeline_stats(store: &SharedStore, actor: &Actor) -> AppResult<Vec<TimelineEntry>> {
    actor.require_id()?;
    let mut map: BTreeMap<String, usize> = BTreeMap::new();
    for c in store.list_certs() {
        let month = c.completion_date.format("%Y-%m").to_string();
        *map.entry(month).or_default() += 1;
    }
    Ok(map
        .into_iter()
        .map(|(month, count)| TimelineEntry { month, count })
        .collect())
}

/// Per-unit share of all certifications. Records are attributed to their own
/// denormalized unit, members to their current one.
pub fn unit_stats(store: &SharedStore, actor: &Actor) -> AppResult<Vec<UnitShare>> {
    actor.require_id()?;
    let total = store.count_certs();
    let mut members: BTreeMap<String, usize> = BTreeMap::new();
    for u in store.list_users() {
        *members.entry(u.unit).or_default() += 1;
    }
    let mut certs: BTreeMap<String, usize> = BTreeMap::new();
    for c in store.list_certs() {
        *certs.entry(c.unit).or_default() += 1;
    }
    let mut units: Vec<String> = members.keys().chain(certs.keys()).cloned().collect();
    units.sort();
    units.dedup();
    Ok(units
        .into_iter()
        .map(|unit| {
            let certifications = certs.get(&unit).copied().unwrap_or(0);
            let percentage = if total == 0 {
                0.0
            } else {
                round2(certifications as f64 * 100.0 / total as f64)
            };
            UnitShare {
                members: members.get(&unit).copied().unwrap_or(0),
                certifications,
                percentage,
                unit,
            }
        })
        .collect())
}

pub fn overview(store: &SharedStore, actor: &Actor) -> AppResult<Overview> {
    actor.require_id()?;
    let total_users = store.count_users();
    let total_certifications = store.count_certs();
    let categories = counts_desc(store.list_certs().into_iter().map(|c| c.category));
    let issuers = counts_desc(store.list_certs().into_iter().map(|c| c.issuer));
    let average_per_user = if total_users == 0 {
        0.0
    } else {
        round2(total_certifications as f64 / total_users as f64)
    };
    Ok(Overview {
        total_users,
        total_certifications,
        total_categories: categories.len(),
        total_issuers: issuers.len(),
        average_per_user,
        top_categories: categories.into_iter().take(TOP_N).collect(),
        top_issuers: issuers.into_iter().take(TOP_N).collect(),
    })
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
