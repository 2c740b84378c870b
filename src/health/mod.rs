//! Warning registry, state tracking, suppression, and change notification.
//!
//! The engine is assembled once at startup: build a [`Catalog`] of warnable
//! definitions with [`CatalogBuilder`], freeze it, and hand the resulting
//! [`HealthTracker`] to every producer and consumer by dependency injection.
//! There is no process-wide registry.
//!
//! Producers mark conditions unhealthy or healthy; the tracker recomputes
//! the visible warning set (active warnings minus suppressed symptoms),
//! aggregates overall severity, and notifies subscribers when the visible
//! picture changes.

pub mod args;
pub mod catalog;
pub mod tracker;
pub mod visible;
pub mod warnables;

pub use args::{ArgKey, Args};
pub use catalog::{
    Catalog, CatalogBuilder, CatalogError, Severity, Text, Warnable, WarnableHandle,
};
pub use tracker::{ActiveWarning, HealthTracker, SubscriptionToken, WarningCallback};
pub use visible::{HealthSnapshot, OverallHealth, VisibleWarning};
pub use warnables::{builtin_tracker, register_builtins, BuiltinWarnables};
