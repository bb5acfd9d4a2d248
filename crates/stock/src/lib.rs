//! `lotparty-stock` — lot/party stock domain.
//!
//! Extends a stock data model with per-lot party tracking: lots carry an
//! optional party, moves inherit or validate that party, and closed periods
//! snapshot net quantities per (location, product, lot, party).

pub mod error;
pub mod grouping;
pub mod lot;
pub mod movement;
pub mod period;
pub mod records;

pub use error::{BatchError, StockError, StockResult};
pub use grouping::{CacheKind, Grouping, GroupingRegistry};
pub use lot::{Lot, LotExternal};
pub use movement::{CreateMove, Move, MoveChange, MoveExternal, UpdateMove};
pub use period::{
    LotPartyCache, Period, PeriodState, PeriodWindow, ProductCache, aggregate_by_lot_party,
    aggregate_by_product,
};
pub use records::{Location, Party, PartyKind, Product};
