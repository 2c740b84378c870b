//! Vigil — health-signal engine for a long-running network agent.
//!
//! A registry of named warning conditions ("warnables"), a concurrency-safe
//! store of which ones are currently firing, a suppression pass that hides
//! symptoms whose root cause is already reported, and change notifications
//! for status surfaces.
//!
//! Producers (network watchers, relay clients, config loaders) call
//! [`health::HealthTracker::set_unhealthy`] and
//! [`health::HealthTracker::set_healthy`]; consumers query
//! [`health::HealthTracker::warnings`] or subscribe for push updates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod health;
pub mod logging;
