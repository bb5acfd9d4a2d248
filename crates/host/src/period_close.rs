//! Period close: aggregate quantities and persist cache rows atomically.

use lotparty_core::PeriodId;
use lotparty_stock::{
    CacheKind, GroupingRegistry, StockResult, aggregate_by_lot_party, aggregate_by_product,
};

use crate::store::InMemoryHost;

/// Close a period: transition it to closed and persist one cache row per
/// distinct grouping key, for every grouping in the registry.
///
/// Runs as one transaction; if any aggregation fails, the period stays open
/// and no cache rows survive. Closing an already-closed period is rejected.
pub fn close_period(
    host: &InMemoryHost,
    registry: &GroupingRegistry,
    period_id: PeriodId,
) -> StockResult<()> {
    host.in_transaction(|state| {
        state.period_mut(period_id)?.close()?;

        let period = state.period(period_id)?.clone();
        let window = state.window_for(&period);
        let moves = state.moves_snapshot();

        let mut row_count = 0usize;
        for (_grouping, kind) in registry.entries() {
            match kind {
                CacheKind::PerProduct => {
                    let rows = aggregate_by_product(period_id, &moves, window);
                    row_count += rows.len();
                    state.product_caches.insert(period_id, rows);
                }
                CacheKind::PerLotParty => {
                    let rows = aggregate_by_lot_party(period_id, &moves, window);
                    row_count += rows.len();
                    state.lot_party_caches.insert(period_id, rows);
                }
            }
        }

        tracing::info!(
            %period_id,
            end = %period.date,
            start = ?window.start,
            rows = row_count,
            "period closed"
        );
        Ok(())
    })
}

/// Delete a period; its cache rows are deleted by cascade.
///
/// This is the host's escape hatch for re-closing: a closed period cannot be
/// reopened, it must be destroyed (with its caches) and recreated.
pub fn delete_period(host: &InMemoryHost, period_id: PeriodId) -> StockResult<()> {
    host.in_transaction(|state| {
        state.period(period_id)?;
        state.delete_period(period_id);
        tracing::debug!(%period_id, "period deleted with its caches");
        Ok(())
    })
}
