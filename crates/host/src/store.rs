//! In-memory record store with copy-on-write transactions.
//!
//! The host ERP owns the records and the transaction model; this store mimics
//! both for tests and embedding. A transaction clones the current state,
//! hands the working copy to a closure, and swaps it in only on `Ok` — an
//! `Err` discards every partial write, matching the host's commit/rollback
//! atomicity.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use lotparty_core::{
    DomainError, DomainResult, LocationId, LotId, MoveId, PartyId, PeriodId, ProductId,
};
use lotparty_stock::{
    Location, Lot, LotPartyCache, Move, Party, Period, PeriodWindow, Product, ProductCache,
};

/// Complete record state of the host, cloneable for copy-on-write.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    pub(crate) parties: HashMap<PartyId, Party>,
    pub(crate) products: HashMap<ProductId, Product>,
    pub(crate) locations: HashMap<LocationId, Location>,
    pub(crate) lots: HashMap<LotId, Lot>,
    pub(crate) moves: HashMap<MoveId, Move>,
    pub(crate) periods: HashMap<PeriodId, Period>,
    pub(crate) product_caches: HashMap<PeriodId, Vec<ProductCache>>,
    pub(crate) lot_party_caches: HashMap<PeriodId, Vec<LotPartyCache>>,
}

impl HostState {
    pub fn insert_party(&mut self, party: Party) {
        self.parties.insert(party.id, party);
    }

    pub fn insert_product(&mut self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn insert_location(&mut self, location: Location) {
        self.locations.insert(location.id, location);
    }

    pub fn insert_lot(&mut self, lot: Lot) {
        self.lots.insert(lot.id, lot);
    }

    pub fn insert_period(&mut self, period: Period) {
        self.periods.insert(period.id, period);
    }

    pub(crate) fn insert_move(&mut self, mv: Move) {
        self.moves.insert(mv.id, mv);
    }

    pub fn lot(&self, id: LotId) -> DomainResult<&Lot> {
        self.lots.get(&id).ok_or_else(DomainError::not_found)
    }

    pub(crate) fn lot_mut(&mut self, id: LotId) -> DomainResult<&mut Lot> {
        self.lots.get_mut(&id).ok_or_else(DomainError::not_found)
    }

    pub fn stock_move(&self, id: MoveId) -> DomainResult<&Move> {
        self.moves.get(&id).ok_or_else(DomainError::not_found)
    }

    pub(crate) fn move_mut(&mut self, id: MoveId) -> DomainResult<&mut Move> {
        self.moves.get_mut(&id).ok_or_else(DomainError::not_found)
    }

    pub fn period(&self, id: PeriodId) -> DomainResult<&Period> {
        self.periods.get(&id).ok_or_else(DomainError::not_found)
    }

    pub(crate) fn period_mut(&mut self, id: PeriodId) -> DomainResult<&mut Period> {
        self.periods.get_mut(&id).ok_or_else(DomainError::not_found)
    }

    pub(crate) fn moves_snapshot(&self) -> Vec<Move> {
        self.moves.values().cloned().collect()
    }

    /// Aggregation window for a closing period: from the latest already
    /// closed period strictly before it (exclusive) up to its own end date.
    pub(crate) fn window_for(&self, period: &Period) -> PeriodWindow {
        let start = self
            .periods
            .values()
            .filter(|p| p.is_closed() && p.date < period.date)
            .map(|p| p.date)
            .max();
        PeriodWindow {
            start,
            end: period.date,
        }
    }

    /// Display name of a lot, falling back to the raw id for dangling refs.
    pub fn lot_display(&self, id: LotId) -> String {
        self.lots
            .get(&id)
            .map(|lot| lot.number.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Display name of a party, falling back to the raw id.
    pub fn party_display(&self, id: PartyId) -> String {
        self.parties
            .get(&id)
            .map(|party| party.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Cache rows of the base per-product grouping for a period.
    pub fn product_cache_rows(&self, period: PeriodId) -> Vec<ProductCache> {
        self.product_caches.get(&period).cloned().unwrap_or_default()
    }

    /// Cache rows of the (product, lot, party) grouping for a period.
    pub fn lot_party_cache_rows(&self, period: PeriodId) -> Vec<LotPartyCache> {
        self.lot_party_caches
            .get(&period)
            .cloned()
            .unwrap_or_default()
    }

    /// Delete a period and, by cascade, all its cache rows.
    pub fn delete_period(&mut self, id: PeriodId) {
        self.periods.remove(&id);
        self.product_caches.remove(&id);
        self.lot_party_caches.remove(&id);
    }

    /// Delete a lot; cache rows referencing it go with it (FK cascade).
    pub fn delete_lot(&mut self, id: LotId) {
        self.lots.remove(&id);
        for rows in self.lot_party_caches.values_mut() {
            rows.retain(|row| row.lot != Some(id));
        }
    }

    /// Delete a party; cache rows referencing it go with it (FK cascade).
    pub fn delete_party(&mut self, id: PartyId) {
        self.parties.remove(&id);
        for rows in self.lot_party_caches.values_mut() {
            rows.retain(|row| row.party != Some(id));
        }
    }
}

/// In-memory host store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: RwLock<HostState>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against a working copy of the state.
    ///
    /// `Ok` commits the copy atomically; `Err` discards it, leaving the
    /// store exactly as before the call.
    pub fn in_transaction<T, E>(
        &self,
        f: impl FnOnce(&mut HostState) -> Result<T, E>,
    ) -> Result<T, E> {
        // State is only ever replaced whole, so a poisoned lock still holds
        // a consistent snapshot and can be recovered.
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut work = guard.clone();
        match f(&mut work) {
            Ok(value) => {
                *guard = work;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }

    /// Read-only access to the committed state.
    pub fn read<T>(&self, f: impl FnOnce(&HostState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}
