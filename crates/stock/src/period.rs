//! Periods and the cached quantity aggregations produced when one closes.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lotparty_core::{DomainError, DomainResult, LocationId, LotId, PartyId, PeriodId, ProductId};

use crate::movement::Move;

/// Period lifecycle: open → closed, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodState {
    Open,
    Closed,
}

/// A closed accounting window over which quantities are aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: PeriodId,
    /// End date of the period; moves effective on/before it are in scope.
    pub date: NaiveDate,
    pub state: PeriodState,
}

impl Period {
    pub fn new(id: PeriodId, date: NaiveDate) -> Self {
        Self {
            id,
            date,
            state: PeriodState::Open,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == PeriodState::Closed
    }

    /// Transition open → closed. Closing twice is a conflict; a closed
    /// period's caches are read-only afterward.
    pub fn close(&mut self) -> DomainResult<()> {
        if self.is_closed() {
            return Err(DomainError::conflict("period is already closed"));
        }
        self.state = PeriodState::Closed;
        Ok(())
    }
}

/// Date window a closing period aggregates over.
///
/// A move is in scope when `start < effective_date <= end`; `start` is `None`
/// for the first period (everything up to `end` counts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl PeriodWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date <= self.end && self.start.is_none_or(|start| date > start)
    }
}

/// Cached net quantity per (location, product) — the host's base grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCache {
    pub period: PeriodId,
    pub location: LocationId,
    pub product: ProductId,
    pub internal_quantity: f64,
}

/// Cached net quantity per (location, product, lot, party).
///
/// `lot`/`party` being `None` is a distinct bucket (moves without a lot or
/// without a resolved party), not a wildcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotPartyCache {
    pub period: PeriodId,
    pub location: LocationId,
    pub product: ProductId,
    pub lot: Option<LotId>,
    pub party: Option<PartyId>,
    pub internal_quantity: f64,
}

/// Aggregate in-window moves per (location, product).
///
/// Each move contributes `+quantity` to its destination and `-quantity` to
/// its source. One row per non-empty bucket, deterministically ordered.
pub fn aggregate_by_product(
    period: PeriodId,
    moves: &[Move],
    window: PeriodWindow,
) -> Vec<ProductCache> {
    let mut buckets: HashMap<(LocationId, ProductId), f64> = HashMap::new();
    for mv in moves {
        if !window.contains(mv.effective_date) {
            continue;
        }
        for (location, quantity) in mv.contributions() {
            *buckets.entry((location, mv.product)).or_insert(0.0) += quantity;
        }
    }

    let mut rows: Vec<ProductCache> = buckets
        .into_iter()
        .map(|((location, product), internal_quantity)| ProductCache {
            period,
            location,
            product,
            internal_quantity,
        })
        .collect();
    rows.sort_by_key(|row| (row.location, row.product));
    rows
}

/// Aggregate in-window moves per (location, product, lot, party).
///
/// The party dimension is the move's *effective* party (`party_used`).
pub fn aggregate_by_lot_party(
    period: PeriodId,
    moves: &[Move],
    window: PeriodWindow,
) -> Vec<LotPartyCache> {
    type Key = (LocationId, ProductId, Option<LotId>, Option<PartyId>);

    let mut buckets: HashMap<Key, f64> = HashMap::new();
    for mv in moves {
        if !window.contains(mv.effective_date) {
            continue;
        }
        for (location, quantity) in mv.contributions() {
            let key = (location, mv.product, mv.lot, mv.effective_party());
            *buckets.entry(key).or_insert(0.0) += quantity;
        }
    }

    let mut rows: Vec<LotPartyCache> = buckets
        .into_iter()
        .map(
            |((location, product, lot, party), internal_quantity)| LotPartyCache {
                period,
                location,
                product,
                lot,
                party,
                internal_quantity,
            },
        )
        .collect();
    rows.sort_by_key(|row| (row.location, row.product, row.lot, row.party));
    rows
}
