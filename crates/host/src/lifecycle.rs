//! Move lifecycle: batch dispatch through registered pipeline stages.
//!
//! The lot/party rules are not overridden methods on a record class; they are
//! explicit stages registered with a dispatcher. A batch runs in three
//! phases, all inside one transaction:
//!
//! 1. **Resolve + write**: pre-create/pre-update stages rewrite each change
//!    request against the state as of batch start, then the record is
//!    written. A lot party assigned later in the same batch never leaks into
//!    an earlier change's resolution.
//! 2. **Post-write**: supplied parties are written through to `party_used`
//!    and backfilled onto lots that have none yet (first writer wins).
//! 3. **Validate**: every touched move is checked; the first failure aborts
//!    the whole batch, indexed back to the offending change request.

use lotparty_core::{MoveId, PartyId};
use lotparty_stock::{
    BatchError, CreateMove, Move, MoveChange, MoveExternal, StockError, StockResult, UpdateMove,
};

use crate::store::{HostState, InMemoryHost};

pub type PreCreateStage = fn(&HostState, &mut CreateMove) -> StockResult<()>;
pub type PreUpdateStage = fn(&HostState, &Move, &mut UpdateMove) -> StockResult<()>;
pub type PostWriteStage = fn(&mut HostState, MoveId, Option<PartyId>) -> StockResult<()>;
pub type ValidateStage = fn(&HostState, &Move) -> StockResult<()>;

/// Registered pipeline stages for move mutations.
#[derive(Debug, Clone)]
pub struct MoveLifecycle {
    pre_create: Vec<PreCreateStage>,
    pre_update: Vec<PreUpdateStage>,
    post_write: Vec<PostWriteStage>,
    validate: Vec<ValidateStage>,
}

impl MoveLifecycle {
    /// A lifecycle with no stages registered.
    pub fn empty() -> Self {
        Self {
            pre_create: Vec::new(),
            pre_update: Vec::new(),
            post_write: Vec::new(),
            validate: Vec::new(),
        }
    }

    /// The standard lifecycle: all lot/party stages registered.
    pub fn standard() -> Self {
        let mut lifecycle = Self::empty();
        lifecycle.register_pre_create(inherit_party_from_lot);
        lifecycle.register_pre_update(rederive_party_on_lot_change);
        lifecycle.register_post_write(apply_supplied_party);
        lifecycle.register_validate(check_lot_party);
        lifecycle
    }

    pub fn register_pre_create(&mut self, stage: PreCreateStage) {
        self.pre_create.push(stage);
    }

    pub fn register_pre_update(&mut self, stage: PreUpdateStage) {
        self.pre_update.push(stage);
    }

    pub fn register_post_write(&mut self, stage: PostWriteStage) {
        self.post_write.push(stage);
    }

    pub fn register_validate(&mut self, stage: ValidateStage) {
        self.validate.push(stage);
    }
}

impl Default for MoveLifecycle {
    fn default() -> Self {
        Self::standard()
    }
}

/// Pre-create: a move carrying a lot but no party inherits the lot's party.
fn inherit_party_from_lot(state: &HostState, create: &mut CreateMove) -> StockResult<()> {
    if create.supplied_party().is_some() {
        return Ok(());
    }
    let Some(lot_id) = create.lot else {
        return Ok(());
    };
    if let Some(party) = state.lot(lot_id)?.party() {
        create.party_used = Some(party);
    }
    Ok(())
}

/// Pre-update: a patch changing the lot without supplying a party re-derives
/// the effective party from the new lot; clearing the lot clears it.
fn rederive_party_on_lot_change(
    state: &HostState,
    _current: &Move,
    patch: &mut UpdateMove,
) -> StockResult<()> {
    if !patch.changes_lot() || patch.supplied_party().is_some() {
        return Ok(());
    }
    match patch.lot {
        Some(Some(lot_id)) => {
            if let Some(party) = state.lot(lot_id)?.party() {
                patch.party_used = Some(Some(party));
            }
        }
        Some(None) => patch.party_used = Some(None),
        None => {}
    }
    Ok(())
}

/// Post-write: a party supplied with the change becomes the move's effective
/// party, and is backfilled onto the move's lot if the lot has none yet.
fn apply_supplied_party(
    state: &mut HostState,
    move_id: MoveId,
    supplied: Option<PartyId>,
) -> StockResult<()> {
    let Some(party) = supplied else {
        return Ok(());
    };
    let lot = state.stock_move(move_id)?.lot;
    if let Some(lot_id) = lot {
        if state.lot_mut(lot_id)?.assign_party(party) {
            tracing::debug!(%lot_id, %party, "backfilled lot party from move");
        }
    }
    state.move_mut(move_id)?.external.party_used = Some(party);
    Ok(())
}

/// Validate: a move's effective party must match its lot's assigned party.
///
/// A lot with no party yet is always compatible.
fn check_lot_party(state: &HostState, mv: &Move) -> StockResult<()> {
    let (Some(lot_id), Some(move_party)) = (mv.lot, mv.effective_party()) else {
        return Ok(());
    };
    let Some(lot_party) = state.lot(lot_id)?.party() else {
        return Ok(());
    };
    if lot_party != move_party {
        return Err(StockError::ConflictingLotParty {
            lot: state.lot_display(lot_id),
            lot_party: state.party_display(lot_party),
            move_party: state.party_display(move_party),
        });
    }
    Ok(())
}

/// Executes ordered batches of move changes against a host store.
#[derive(Debug)]
pub struct MoveDispatcher<'a> {
    host: &'a InMemoryHost,
    lifecycle: MoveLifecycle,
}

impl<'a> MoveDispatcher<'a> {
    pub fn new(host: &'a InMemoryHost, lifecycle: MoveLifecycle) -> Self {
        Self { host, lifecycle }
    }

    /// Execute an ordered batch of changes in a single transaction.
    ///
    /// Returns the touched move ids aligned with the batch by index. Any
    /// failure rolls back the entire batch; `BatchError::index` points at the
    /// offending change request.
    pub fn execute(&self, batch: &[MoveChange]) -> Result<Vec<MoveId>, BatchError> {
        self.host.in_transaction(|state| {
            let mut touched: Vec<(usize, MoveId, Option<PartyId>)> =
                Vec::with_capacity(batch.len());

            for (index, change) in batch.iter().enumerate() {
                match change {
                    MoveChange::Create(create) => {
                        let mut create = create.clone();
                        for stage in &self.lifecycle.pre_create {
                            stage(state, &mut create).map_err(|e| BatchError::new(index, e))?;
                        }
                        let supplied = create.supplied_party();
                        state.insert_move(Move {
                            id: create.id,
                            product: create.product,
                            quantity: create.quantity,
                            from_location: create.from_location,
                            to_location: create.to_location,
                            lot: create.lot,
                            effective_date: create.effective_date,
                            external: MoveExternal {
                                party: create.party,
                                party_used: create.party_used,
                            },
                        });
                        touched.push((index, create.id, supplied));
                    }
                    MoveChange::Update(patch) => {
                        let mut patch = patch.clone();
                        let current = state
                            .stock_move(patch.id)
                            .map_err(|e| BatchError::new(index, StockError::from(e)))?
                            .clone();
                        for stage in &self.lifecycle.pre_update {
                            stage(state, &current, &mut patch)
                                .map_err(|e| BatchError::new(index, e))?;
                        }
                        let supplied = patch.supplied_party();
                        apply_patch(state, &patch).map_err(|e| BatchError::new(index, e))?;
                        touched.push((index, patch.id, supplied));
                    }
                }
            }

            for (index, move_id, supplied) in &touched {
                for stage in &self.lifecycle.post_write {
                    stage(state, *move_id, *supplied).map_err(|e| BatchError::new(*index, e))?;
                }
            }

            for (index, move_id, _) in &touched {
                let mv = state
                    .stock_move(*move_id)
                    .map_err(|e| BatchError::new(*index, StockError::from(e)))?
                    .clone();
                for stage in &self.lifecycle.validate {
                    stage(state, &mv).map_err(|e| BatchError::new(*index, e))?;
                }
            }

            Ok(touched.into_iter().map(|(_, id, _)| id).collect())
        })
    }

    /// Batch side effect: set the effective party of a set of moves.
    ///
    /// Mirrors an externally-driven party update: lots without a party are
    /// backfilled first (first writer wins), then each move's declared and
    /// effective party are set to the value. Validation runs afterward; a
    /// failure rolls the whole operation back.
    pub fn set_party_used(&self, move_ids: &[MoveId], party: PartyId) -> Result<(), BatchError> {
        self.host.in_transaction(|state| {
            for (index, move_id) in move_ids.iter().enumerate() {
                state
                    .move_mut(*move_id)
                    .map_err(|e| BatchError::new(index, StockError::from(e)))?
                    .external
                    .party = Some(party);
                for stage in &self.lifecycle.post_write {
                    stage(state, *move_id, Some(party))
                        .map_err(|e| BatchError::new(index, e))?;
                }
            }

            for (index, move_id) in move_ids.iter().enumerate() {
                let mv = state
                    .stock_move(*move_id)
                    .map_err(|e| BatchError::new(index, StockError::from(e)))?
                    .clone();
                for stage in &self.lifecycle.validate {
                    stage(state, &mv).map_err(|e| BatchError::new(index, e))?;
                }
            }

            Ok(())
        })
    }
}

fn apply_patch(state: &mut HostState, patch: &UpdateMove) -> StockResult<()> {
    let mv = state.move_mut(patch.id)?;
    if let Some(lot) = patch.lot {
        mv.lot = lot;
    }
    if let Some(party) = patch.party {
        mv.external.party = party;
    }
    if let Some(party_used) = patch.party_used {
        mv.external.party_used = party_used;
    }
    if let Some(quantity) = patch.quantity {
        mv.quantity = quantity;
    }
    if let Some(effective_date) = patch.effective_date {
        mv.effective_date = effective_date;
    }
    Ok(())
}
