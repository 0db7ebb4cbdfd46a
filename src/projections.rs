//! Pure derived views over approval items. Nothing here caches or mutates;
//! every call recomputes from the items it is handed.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};

use crate::workflow::types::{ApprovalItem, OverallStatus};

/// Fraction of stages resolved (approved or skipped), in `0.0..=1.0`.
pub fn progress(item: &ApprovalItem) -> f64 {
    if item.stage_outcomes.is_empty() {
        return 0.0;
    }
    let resolved = item
        .stage_outcomes
        .iter()
        .filter(|o| o.is_resolved())
        .count();
    resolved as f64 / item.stage_outcomes.len() as f64
}

/// Tally per overall status, for dashboard badges.
pub fn counts_by_status<'a, I>(items: I) -> BTreeMap<OverallStatus, usize>
where
    I: IntoIterator<Item = &'a ApprovalItem>,
{
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(item.overall_status).or_insert(0) += 1;
    }
    counts
}

/// Pending items whose due date falls within the next `within_hours`.
pub fn due_soon<'a, I>(items: I, within_hours: i64) -> Vec<&'a ApprovalItem>
where
    I: IntoIterator<Item = &'a ApprovalItem>,
{
    let now = Utc::now();
    let horizon = now + Duration::hours(within_hours);
    items
        .into_iter()
        .filter(|item| {
            item.overall_status == OverallStatus::Pending
                && item
                    .due_date
                    .is_some_and(|due| due > now && due <= horizon)
        })
        .collect()
}

/// Pending items whose due date has already passed. Classification only;
/// escalation is the host application's business.
pub fn overdue<'a, I>(items: I) -> Vec<&'a ApprovalItem>
where
    I: IntoIterator<Item = &'a ApprovalItem>,
{
    let now = Utc::now();
    items
        .into_iter()
        .filter(|item| {
            item.overall_status == OverallStatus::Pending
                && item.due_date.is_some_and(|due| due < now)
        })
        .collect()
}
