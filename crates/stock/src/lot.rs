//! Lot records and their party extension.

use serde::{Deserialize, Serialize};

use lotparty_core::{LotId, PartyId, ProductId};

/// Fields this module adds to the host's lot record (composition instead of
/// reopening the host type).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotExternal {
    /// Owning party, assigned the first time a move carries both this lot and
    /// a party. Once set it never changes.
    pub party: Option<PartyId>,
}

/// A tracked batch of a product with its own identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub product: ProductId,
    pub number: String,
    pub external: LotExternal,
}

impl Lot {
    pub fn new(id: LotId, product: ProductId, number: impl Into<String>) -> Self {
        Self {
            id,
            product,
            number: number.into(),
            external: LotExternal::default(),
        }
    }

    pub fn party(&self) -> Option<PartyId> {
        self.external.party
    }

    /// Assign a party with first-writer-wins semantics.
    ///
    /// Returns `true` if the party was assigned, `false` if the lot already
    /// had one (the existing assignment is kept untouched).
    pub fn assign_party(&mut self, party: PartyId) -> bool {
        if self.external.party.is_some() {
            return false;
        }
        self.external.party = Some(party);
        true
    }
}
