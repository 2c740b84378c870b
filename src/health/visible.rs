//! Suppression evaluation and severity aggregation.
//!
//! Pure functions over a raw active set: no locking here. The tracker
//! clones its state under the lock and evaluates outside it, so a single
//! root cause (say, "network down") collapses every downstream symptom it
//! implies without holding up producers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::{Catalog, Severity};
use super::tracker::ActiveWarning;

/// A warning that survived suppression, rendered and ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleWarning {
    /// The warnable's unique code.
    pub code: String,
    /// Short human label.
    pub title: String,
    /// Severity of the condition.
    pub severity: Severity,
    /// Final rendered message.
    pub text: String,
    /// Whether this condition signals a likely reachability disruption.
    pub impacts_connectivity: bool,
    /// When the producer last reported the condition.
    pub since: DateTime<Utc>,
}

/// Aggregate health across the visible set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallHealth {
    /// Highest severity among visible warnings; `None` when healthy.
    pub severity: Option<Severity>,
    /// Whether any visible warning impacts connectivity.
    pub connectivity_impacted: bool,
}

/// Point-in-time view delivered to subscribers and returned by queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Visible warnings, severity descending then code ascending.
    pub warnings: Vec<VisibleWarning>,
    /// Aggregate over `warnings`.
    pub overall: OverallHealth,
}

impl HealthSnapshot {
    /// Whether two snapshots present the same picture to an observer.
    ///
    /// Ignores `since` timestamps: a producer refreshing an already-active
    /// warnable with identical arguments is not an externally visible
    /// change and must not re-notify subscribers.
    pub fn same_picture(&self, other: &Self) -> bool {
        self.overall == other.overall
            && self.warnings.len() == other.warnings.len()
            && self
                .warnings
                .iter()
                .zip(&other.warnings)
                .all(|(a, b)| a.code == b.code && a.text == b.text && a.severity == b.severity)
    }
}

/// Project the raw active set into the visible, rendered, ordered form.
///
/// A warnable is suppressed when at least one of its direct dependencies is
/// also active. Survivors are sorted severity descending, then code
/// ascending so equal-severity warnings come out in a stable order.
pub(crate) fn evaluate(catalog: &Catalog, active: &HashMap<usize, ActiveWarning>) -> HealthSnapshot {
    let mut warnings: Vec<VisibleWarning> = active
        .iter()
        .filter(|(slot, _)| {
            !catalog
                .deps_at(**slot)
                .iter()
                .any(|dep| active.contains_key(dep))
        })
        .map(|(slot, record)| {
            let definition = catalog.definition_at(*slot);
            VisibleWarning {
                code: definition.code.to_owned(),
                title: definition.title.to_owned(),
                severity: definition.severity,
                text: definition.text.render(&record.args),
                impacts_connectivity: definition.impacts_connectivity,
                since: record.since,
            }
        })
        .collect();

    warnings.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.code.cmp(&b.code)));

    let overall = OverallHealth {
        severity: warnings.iter().map(|w| w.severity).max(),
        connectivity_impacted: warnings.iter().any(|w| w.impacts_connectivity),
    };

    HealthSnapshot { warnings, overall }
}
