//! Domain Set Resolver
//!
//! [`DomainMap`] holds the desired state: record names keyed by zone. It is
//! built in two phases. Startup owns a mutable map, seeds it from
//! configuration and optionally augments it once with discovered routes. It
//! then calls [`DomainMap::freeze`], handing an immutable [`FrozenDomains`]
//! to the reconciler, which only ever reads it.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::discovery::RouteObservation;

/// Record name denoting the zone apex
pub const APEX: &str = "@";

/// A single (zone, name) pair, the unit of work of one update attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ReconciliationTarget {
    /// DNS zone
    pub zone: String,
    /// Local record name within the zone
    pub name: String,
}

impl ReconciliationTarget {
    /// Create a new target
    pub fn new(zone: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            name: name.into(),
        }
    }

    /// Fully-qualified name of the record
    pub fn fqdn(&self) -> String {
        if self.name == APEX {
            self.zone.clone()
        } else {
            format!("{}.{}", self.name, self.zone)
        }
    }
}

impl fmt::Display for ReconciliationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (zone {})", self.name, self.zone)
    }
}

/// Record names keyed by zone, with set semantics
///
/// Iteration is ordered by zone, then by name, so every resolution of the
/// same map yields the same target order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainMap {
    zones: BTreeMap<String, BTreeSet<String>>,
}

impl DomainMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from the configured `domains` table
    ///
    /// A zone listed without any names stands for its apex.
    pub fn from_config(domains: &HashMap<String, Vec<String>>) -> Self {
        let mut map = Self::new();
        for (zone, names) in domains {
            let names: Vec<&str> = names
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .collect();

            if names.is_empty() {
                map.insert(zone.as_str(), APEX);
            } else {
                map.extend_zone(zone.as_str(), names);
            }
        }
        map
    }

    /// Insert one name. Returns `false` if it was already present.
    pub fn insert(&mut self, zone: impl Into<String>, name: impl Into<String>) -> bool {
        self.zones
            .entry(zone.into())
            .or_default()
            .insert(name.into())
    }

    /// Insert several names for one zone
    pub fn extend_zone<I, S>(&mut self, zone: impl Into<String>, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zones
            .entry(zone.into())
            .or_default()
            .extend(names.into_iter().map(Into::into));
    }

    /// Merge discovered route hostnames into the map
    ///
    /// Returns the number of names that were not already present, so applying
    /// the same observations twice adds nothing the second time.
    pub fn augment<I>(&mut self, observations: I) -> usize
    where
        I: IntoIterator<Item = RouteObservation>,
    {
        observations
            .into_iter()
            .filter(|obs| self.insert(obs.zone.clone(), obs.name.clone()))
            .count()
    }

    /// Whether the pair is part of the desired state
    pub fn contains(&self, zone: &str, name: &str) -> bool {
        self.zones
            .get(zone)
            .is_some_and(|names| names.contains(name))
    }

    /// Configured zones, in order
    pub fn zones(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    /// Number of (zone, name) pairs
    pub fn len(&self) -> usize {
        self.zones.values().map(BTreeSet::len).sum()
    }

    /// Whether there is nothing to reconcile
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The desired state as a zone → names mapping
    pub fn resolve(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.zones
    }

    /// The desired state flattened into targets, in resolver order
    pub fn targets(&self) -> Vec<ReconciliationTarget> {
        self.zones
            .iter()
            .flat_map(|(zone, names)| {
                names
                    .iter()
                    .map(move |name| ReconciliationTarget::new(zone.as_str(), name.as_str()))
            })
            .collect()
    }

    /// End the build phase
    pub fn freeze(self) -> FrozenDomains {
        FrozenDomains(Arc::new(self))
    }
}

/// Immutable, cheaply clonable snapshot of a [`DomainMap`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenDomains(Arc<DomainMap>);

impl Deref for FrozenDomains {
    type Target = DomainMap;

    fn deref(&self) -> &DomainMap {
        &self.0
    }
}

impl From<DomainMap> for FrozenDomains {
    fn from(map: DomainMap) -> Self {
        map.freeze()
    }
}
