//! Move records, their party extension, and typed batch change requests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use lotparty_core::{LocationId, LotId, MoveId, PartyId, ProductId};

/// Fields this module adds to the host's move record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveExternal {
    /// Party as declared on the move.
    pub party: Option<PartyId>,
    /// Effective party; may be inherited from the move's lot.
    pub party_used: Option<PartyId>,
}

/// A recorded transfer of product quantity between two locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub id: MoveId,
    pub product: ProductId,
    pub quantity: f64,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub lot: Option<LotId>,
    pub effective_date: NaiveDate,
    pub external: MoveExternal,
}

impl Move {
    /// Effective party of the move (the inherited/validated one).
    pub fn effective_party(&self) -> Option<PartyId> {
        self.external.party_used
    }

    /// Signed quantity contributions of the move: positive into the
    /// destination, negative out of the source.
    pub fn contributions(&self) -> [(LocationId, f64); 2] {
        [
            (self.to_location, self.quantity),
            (self.from_location, -self.quantity),
        ]
    }
}

/// Change request: create a move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMove {
    pub id: MoveId,
    pub product: ProductId,
    pub quantity: f64,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub lot: Option<LotId>,
    pub party: Option<PartyId>,
    pub party_used: Option<PartyId>,
    pub effective_date: NaiveDate,
}

impl CreateMove {
    /// The party supplied by the caller, effective field taking precedence
    /// over the declared one.
    pub fn supplied_party(&self) -> Option<PartyId> {
        self.party_used.or(self.party)
    }
}

/// Change request: update a move.
///
/// Patch semantics per field: `None` leaves the field untouched,
/// `Some(None)` clears it, `Some(Some(v))` sets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateMove {
    pub id: MoveId,
    pub lot: Option<Option<LotId>>,
    pub party: Option<Option<PartyId>>,
    pub party_used: Option<Option<PartyId>>,
    pub quantity: Option<f64>,
    pub effective_date: Option<NaiveDate>,
}

impl UpdateMove {
    /// Empty patch for the given move.
    pub fn new(id: MoveId) -> Self {
        Self {
            id,
            lot: None,
            party: None,
            party_used: None,
            quantity: None,
            effective_date: None,
        }
    }

    /// The party supplied by this patch, if any.
    ///
    /// An explicit clear counts as "no party supplied", so lot-derived
    /// backfill rules still apply.
    pub fn supplied_party(&self) -> Option<PartyId> {
        self.party_used.flatten().or(self.party.flatten())
    }

    /// Whether the patch touches the lot reference.
    pub fn changes_lot(&self) -> bool {
        self.lot.is_some()
    }
}

/// One entry of an ordered batch of move mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MoveChange {
    Create(CreateMove),
    Update(UpdateMove),
}

impl MoveChange {
    /// Identifier of the move this change targets (or creates).
    pub fn move_id(&self) -> MoveId {
        match self {
            MoveChange::Create(c) => c.id,
            MoveChange::Update(u) => u.id,
        }
    }
}
