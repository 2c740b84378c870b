//! Warnable definitions and the frozen catalog built at startup.
//!
//! The catalog is append-only while building and read-only once frozen.
//! Dependencies between warnables are kept as a string-keyed adjacency
//! (code to dependency codes); the builder rejects duplicate codes and
//! dependency cycles at registration time, and [`CatalogBuilder::freeze`]
//! verifies every dependency resolves. Both failure modes are wiring
//! mistakes and fatal at startup, never runtime conditions.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::args::Args;

/// Warning severity, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational; nothing is functionally broken.
    Low,
    /// Degraded behaviour the user should know about.
    Medium,
    /// A condition likely to break the agent's core function.
    High,
}

/// Message text for a warnable: a fixed string, or a pure function of the
/// captured arguments.
///
/// Rendering is total by construction — templated functions receive an
/// [`Args`] whose lookups fall back to the empty string, so a missing key
/// degrades the message instead of failing the health-reporting path.
#[derive(Clone, Copy)]
pub enum Text {
    /// Constant message; supplied arguments are ignored.
    Static(&'static str),
    /// Message computed from the arguments captured at activation.
    Templated(fn(&Args) -> String),
}

impl Text {
    /// Render the final message for the given arguments.
    pub fn render(&self, args: &Args) -> String {
        match self {
            Text::Static(message) => (*message).to_owned(),
            Text::Templated(template) => template(args),
        }
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Text::Static(message) => f.debug_tuple("Static").field(message).finish(),
            Text::Templated(_) => f.write_str("Templated(..)"),
        }
    }
}

/// Definition of a warning condition, immutable once registered.
#[derive(Debug, Clone)]
pub struct Warnable {
    /// Globally unique identifier, e.g. `"network-status"`.
    pub code: &'static str,
    /// Short human label.
    pub title: &'static str,
    /// How bad this condition is when firing.
    pub severity: Severity,
    /// How the final message is produced.
    pub text: Text,
    /// Codes of warnables whose simultaneous activity suppresses this one.
    /// Direct dependencies only; the relation is not transitively closed.
    pub depends_on: &'static [&'static str],
    /// Whether this condition signals a likely disruption to reachability.
    pub impacts_connectivity: bool,
}

/// Opaque reference to a registered warnable.
///
/// The only way to obtain one is [`CatalogBuilder::register`], so a producer
/// can never hand the tracker a stale or malformed code string. Passing a
/// handle to a tracker built from a *different* catalog is a wiring mistake
/// and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WarnableHandle {
    catalog_id: u64,
    slot: usize,
}

/// Catalog construction errors. All of them are programmer errors in wiring
/// the catalog and should abort startup.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The same code was registered twice.
    #[error("warnable code {0:?} is already registered")]
    DuplicateCode(&'static str),
    /// Registering this warnable closed a dependency cycle.
    #[error("dependency cycle through warnable {code:?}: {path}")]
    DependencyCycle {
        /// Code whose registration closed the cycle.
        code: &'static str,
        /// The cycle, rendered as `a -> b -> a`.
        path: String,
    },
    /// A `depends_on` entry names a code that was never registered.
    #[error("warnable {code:?} depends on unknown code {dependency:?}")]
    UnknownDependency {
        /// Code of the warnable with the dangling edge.
        code: &'static str,
        /// The unresolved dependency code.
        dependency: &'static str,
    },
}

/// Distinguishes catalogs within a process so a handle cannot be replayed
/// against a tracker built from another catalog instance.
static NEXT_CATALOG_ID: AtomicU64 = AtomicU64::new(1);

/// Append-only builder for a [`Catalog`].
#[derive(Debug)]
pub struct CatalogBuilder {
    catalog_id: u64,
    entries: Vec<Warnable>,
    index: HashMap<&'static str, usize>,
}

impl CatalogBuilder {
    /// Create an empty builder with a fresh catalog identity.
    pub fn new() -> Self {
        Self {
            catalog_id: NEXT_CATALOG_ID.fetch_add(1, Ordering::Relaxed),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a warnable definition.
    ///
    /// Dependencies may name codes registered later; they are resolved at
    /// [`freeze`](Self::freeze). A cycle is rejected as soon as the edge
    /// that closes it is registered.
    ///
    /// # Errors
    ///
    /// [`CatalogError::DuplicateCode`] if the code is already present,
    /// [`CatalogError::DependencyCycle`] if this registration closes a
    /// cycle among the codes registered so far.
    pub fn register(&mut self, warnable: Warnable) -> Result<WarnableHandle, CatalogError> {
        if self.index.contains_key(warnable.code) {
            return Err(CatalogError::DuplicateCode(warnable.code));
        }

        let code = warnable.code;
        let slot = self.entries.len();
        self.entries.push(warnable);
        self.index.insert(code, slot);

        if let Some(cycle) = self.find_cycle(code) {
            // Roll back so the builder stays usable after the error.
            self.entries.pop();
            self.index.remove(code);
            return Err(CatalogError::DependencyCycle {
                code,
                path: cycle.join(" -> "),
            });
        }

        Ok(WarnableHandle {
            catalog_id: self.catalog_id,
            slot,
        })
    }

    /// Walk `depends_on` edges from `start` over the registered codes.
    /// Any new cycle must pass through the most recently added node, so a
    /// path returning to `start` is exactly a new cycle. Edges to codes not
    /// yet registered cannot participate and are skipped.
    fn find_cycle(&self, start: &'static str) -> Option<Vec<&'static str>> {
        let mut stack: Vec<(usize, Vec<&'static str>)> = Vec::new();
        let start_slot = *self.index.get(start)?;
        stack.push((start_slot, vec![start]));

        while let Some((slot, path)) = stack.pop() {
            for &dep in self.entries[slot].depends_on {
                if dep == start {
                    let mut cycle = path.clone();
                    cycle.push(dep);
                    return Some(cycle);
                }
                let Some(dep_slot) = self.index.get(dep) else {
                    continue;
                };
                if path.contains(&dep) {
                    continue;
                }
                let mut next = path.clone();
                next.push(dep);
                stack.push((*dep_slot, next));
            }
        }
        None
    }

    /// Resolve all dependency edges and freeze the catalog.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownDependency`] if any `depends_on` entry names
    /// a code that was never registered.
    pub fn freeze(self) -> Result<Catalog, CatalogError> {
        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let mut resolved = Vec::with_capacity(entry.depends_on.len());
            for &dep in entry.depends_on {
                let slot = self.index.get(dep).ok_or(CatalogError::UnknownDependency {
                    code: entry.code,
                    dependency: dep,
                })?;
                resolved.push(*slot);
            }
            deps.push(resolved);
        }

        info!(warnables = self.entries.len(), "health catalog frozen");

        Ok(Catalog {
            id: self.catalog_id,
            entries: self.entries,
            index: self.index,
            deps,
        })
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen, read-only table of warnable definitions.
///
/// Lives for the process lifetime; built once at startup and shared with
/// the tracker behind an `Arc`.
#[derive(Debug)]
pub struct Catalog {
    id: u64,
    entries: Vec<Warnable>,
    index: HashMap<&'static str, usize>,
    /// Resolved `depends_on` slots, parallel to `entries`.
    deps: Vec<Vec<usize>>,
}

impl Catalog {
    /// Number of registered warnables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a definition by code.
    pub fn get(&self, code: &str) -> Option<&Warnable> {
        self.index.get(code).map(|slot| &self.entries[*slot])
    }

    /// Look up a handle by code, for consumers that only know the string.
    pub fn handle(&self, code: &str) -> Option<WarnableHandle> {
        self.index.get(code).map(|slot| WarnableHandle {
            catalog_id: self.id,
            slot: *slot,
        })
    }

    /// The definition behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued by a different catalog instance.
    pub fn definition(&self, handle: WarnableHandle) -> &Warnable {
        &self.entries[self.slot_for(handle)]
    }

    /// Translate a handle into a slot index, enforcing catalog identity.
    pub(crate) fn slot_for(&self, handle: WarnableHandle) -> usize {
        assert!(
            handle.catalog_id == self.id,
            "warnable handle was issued by a different catalog (wiring mistake)"
        );
        handle.slot
    }

    pub(crate) fn definition_at(&self, slot: usize) -> &Warnable {
        &self.entries[slot]
    }

    pub(crate) fn code_at(&self, slot: usize) -> &'static str {
        self.entries[slot].code
    }

    pub(crate) fn deps_at(&self, slot: usize) -> &[usize] {
        &self.deps[slot]
    }
}
