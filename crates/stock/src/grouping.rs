//! Grouping key resolution and the grouping → cache-kind registry.

use serde::{Deserialize, Serialize};

/// Shape of the key tuple used to bucket move quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// The host's base grouping: per product only.
    Product,
    /// This module's contribution: per (product, lot, party).
    ProductLotParty,
}

impl Grouping {
    /// Attribute names used to bucket moves under this grouping.
    pub const fn attributes(self) -> &'static [&'static str] {
        match self {
            Grouping::Product => &["product"],
            Grouping::ProductLotParty => &["product", "lot", "party"],
        }
    }
}

/// Kind of cache record a grouping's aggregation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    PerProduct,
    PerLotParty,
}

/// Explicit registry from grouping to cache record kind.
///
/// Built once at startup and passed by reference to the period-close driver;
/// there is no global registry resolved by name.
#[derive(Debug, Clone, Default)]
pub struct GroupingRegistry {
    entries: Vec<(Grouping, CacheKind)>,
}

impl GroupingRegistry {
    /// The host's base registry: product-only grouping.
    pub fn base() -> Self {
        let mut registry = Self::default();
        registry.register(Grouping::Product, CacheKind::PerProduct);
        registry
    }

    /// Base registry plus this module's (product, lot, party) grouping.
    pub fn standard() -> Self {
        let mut registry = Self::base();
        registry.register(Grouping::ProductLotParty, CacheKind::PerLotParty);
        registry
    }

    /// Register a grouping, replacing any previous entry for it.
    pub fn register(&mut self, grouping: Grouping, kind: CacheKind) {
        if let Some(entry) = self.entries.iter_mut().find(|(g, _)| *g == grouping) {
            entry.1 = kind;
        } else {
            self.entries.push((grouping, kind));
        }
    }

    /// Cache record kind for a grouping, if registered.
    pub fn cache_kind(&self, grouping: Grouping) -> Option<CacheKind> {
        self.entries
            .iter()
            .find(|(g, _)| *g == grouping)
            .map(|(_, kind)| *kind)
    }

    /// Registered groupings, in registration order.
    pub fn groupings(&self) -> impl Iterator<Item = Grouping> + '_ {
        self.entries.iter().map(|(g, _)| *g)
    }

    /// Registered (grouping, cache kind) pairs, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (Grouping, CacheKind)> + '_ {
        self.entries.iter().copied()
    }
}
