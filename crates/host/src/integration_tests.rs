//! Integration tests for the full pipeline.
//!
//! Change batch → lifecycle stages → store → period close → cache rows.

use chrono::NaiveDate;

use lotparty_core::{LocationId, LotId, MoveId, PartyId, PeriodId, ProductId};
use lotparty_stock::{
    BatchError, CreateMove, Grouping, GroupingRegistry, Location, Lot, MoveChange, Party,
    PartyKind, Period, Product, StockError, UpdateMove,
};

use crate::lifecycle::{MoveDispatcher, MoveLifecycle};
use crate::period_close::{close_period, delete_period};
use crate::store::InMemoryHost;

struct Fixture {
    host: InMemoryHost,
    product: ProductId,
    supplier_dock: LocationId,
    storage: LocationId,
    party1: PartyId,
    party2: PartyId,
    lot1: LotId,
    lot2: LotId,
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn setup() -> Fixture {
    lotparty_observability::init();

    let fixture = Fixture {
        host: InMemoryHost::new(),
        product: ProductId::new(),
        supplier_dock: LocationId::new(),
        storage: LocationId::new(),
        party1: PartyId::new(),
        party2: PartyId::new(),
        lot1: LotId::new(),
        lot2: LotId::new(),
    };

    fixture
        .host
        .in_transaction::<_, StockError>(|state| {
            state.insert_party(Party::new(fixture.party1, PartyKind::Customer, "Customer"));
            state.insert_party(Party::new(fixture.party2, PartyKind::Customer, "Customer 2"));
            state.insert_product(Product::new(fixture.product, "Widget"));
            state.insert_location(Location::new(fixture.supplier_dock, "Supplier Dock"));
            state.insert_location(Location::new(fixture.storage, "Storage"));
            state.insert_lot(Lot::new(fixture.lot1, fixture.product, "1"));
            state.insert_lot(Lot::new(fixture.lot2, fixture.product, "2"));
            Ok(())
        })
        .unwrap();

    fixture
}

fn create_move(fx: &Fixture, quantity: f64, lot: Option<LotId>, party: Option<PartyId>) -> CreateMove {
    CreateMove {
        id: MoveId::new(),
        product: fx.product,
        quantity,
        from_location: fx.supplier_dock,
        to_location: fx.storage,
        lot,
        party,
        party_used: None,
        effective_date: date(15),
    }
}

fn dispatcher(fx: &Fixture) -> MoveDispatcher<'_> {
    MoveDispatcher::new(&fx.host, MoveLifecycle::standard())
}

#[test]
fn move_with_party_backfills_lot_and_later_moves_inherit_it() {
    let fx = setup();
    let dispatcher = dispatcher(&fx);

    // First move carries both the lot and a party: the lot gets the party.
    let first = dispatcher
        .execute(&[MoveChange::Create(create_move(
            &fx,
            5.0,
            Some(fx.lot1),
            Some(fx.party1),
        ))])
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(
        fx.host.read(|s| s.lot(fx.lot1).unwrap().party()),
        Some(fx.party1)
    );
    assert_eq!(
        fx.host
            .read(|s| s.stock_move(first[0]).unwrap().effective_party()),
        Some(fx.party1)
    );

    // A later move on the same lot with no party inherits it.
    let second = dispatcher
        .execute(&[MoveChange::Create(create_move(&fx, 5.0, Some(fx.lot1), None))])
        .unwrap();
    assert_eq!(
        fx.host
            .read(|s| s.stock_move(second[0]).unwrap().effective_party()),
        Some(fx.party1)
    );

    // The lot's party did not change along the way.
    assert_eq!(
        fx.host.read(|s| s.lot(fx.lot1).unwrap().party()),
        Some(fx.party1)
    );
}

#[test]
fn move_on_a_partyless_lot_keeps_no_party() {
    let fx = setup();
    let ids = dispatcher(&fx)
        .execute(&[MoveChange::Create(create_move(&fx, 5.0, Some(fx.lot2), None))])
        .unwrap();

    fx.host.read(|s| {
        let mv = s.stock_move(ids[0]).unwrap();
        assert_eq!(mv.external.party, None);
        assert_eq!(mv.effective_party(), None);
        assert_eq!(s.lot(fx.lot2).unwrap().party(), None);
    });
}

#[test]
fn set_party_used_backfills_the_lot_and_the_move() {
    let fx = setup();
    let dispatcher = dispatcher(&fx);
    let ids = dispatcher
        .execute(&[MoveChange::Create(create_move(&fx, 5.0, Some(fx.lot2), None))])
        .unwrap();

    dispatcher.set_party_used(&ids, fx.party2).unwrap();

    fx.host.read(|s| {
        let mv = s.stock_move(ids[0]).unwrap();
        assert_eq!(mv.effective_party(), Some(fx.party2));
        assert_eq!(mv.external.party, Some(fx.party2));
        assert_eq!(s.lot(fx.lot2).unwrap().party(), Some(fx.party2));
    });

    // First writer wins: a later batch for another party must not steal the lot.
    let err = dispatcher
        .execute(&[MoveChange::Create(create_move(
            &fx,
            5.0,
            Some(fx.lot2),
            Some(fx.party1),
        ))])
        .unwrap_err();
    assert!(matches!(err.error, StockError::ConflictingLotParty { .. }));
    assert_eq!(
        fx.host.read(|s| s.lot(fx.lot2).unwrap().party()),
        Some(fx.party2)
    );
}

#[test]
fn conflicting_party_aborts_the_whole_batch() {
    let fx = setup();
    let dispatcher = dispatcher(&fx);
    dispatcher
        .execute(&[MoveChange::Create(create_move(
            &fx,
            5.0,
            Some(fx.lot1),
            Some(fx.party1),
        ))])
        .unwrap();

    let mut conflicting = create_move(&fx, 5.0, Some(fx.lot1), None);
    conflicting.party_used = Some(fx.party2);
    let batch = vec![
        MoveChange::Create(create_move(&fx, 2.0, None, None)),
        MoveChange::Create(conflicting),
    ];

    let err: BatchError = dispatcher.execute(&batch).unwrap_err();
    assert_eq!(err.index, 1);
    let message = err.error.to_string();
    assert!(message.contains("Customer"));
    assert!(message.contains("Customer 2"));
    match &err.error {
        StockError::ConflictingLotParty { lot, .. } => assert_eq!(lot, "1"),
        other => panic!("expected ConflictingLotParty, got {other:?}"),
    }

    // Nothing from the batch survived, not even the valid first change.
    fx.host.read(|s| {
        assert!(s.stock_move(batch[0].move_id()).is_err());
        assert!(s.stock_move(batch[1].move_id()).is_err());
    });
}

#[test]
fn update_rederives_party_when_the_lot_changes() {
    let fx = setup();
    let dispatcher = dispatcher(&fx);
    dispatcher
        .execute(&[MoveChange::Create(create_move(
            &fx,
            5.0,
            Some(fx.lot1),
            Some(fx.party1),
        ))])
        .unwrap();
    let ids = dispatcher
        .execute(&[MoveChange::Create(create_move(&fx, 3.0, None, None))])
        .unwrap();

    // Attach the lot without supplying a party: the lot's party is derived.
    let mut attach = UpdateMove::new(ids[0]);
    attach.lot = Some(Some(fx.lot1));
    dispatcher.execute(&[MoveChange::Update(attach)]).unwrap();
    assert_eq!(
        fx.host
            .read(|s| s.stock_move(ids[0]).unwrap().effective_party()),
        Some(fx.party1)
    );

    // Clear the lot without supplying a party: the effective party clears too.
    let mut detach = UpdateMove::new(ids[0]);
    detach.lot = Some(None);
    dispatcher.execute(&[MoveChange::Update(detach)]).unwrap();
    fx.host.read(|s| {
        let mv = s.stock_move(ids[0]).unwrap();
        assert_eq!(mv.lot, None);
        assert_eq!(mv.effective_party(), None);
    });
}

#[test]
fn conflicting_update_rolls_back_to_the_previous_record() {
    let fx = setup();
    let dispatcher = dispatcher(&fx);
    dispatcher
        .execute(&[MoveChange::Create(create_move(
            &fx,
            5.0,
            Some(fx.lot1),
            Some(fx.party1),
        ))])
        .unwrap();
    let ids = dispatcher
        .execute(&[MoveChange::Create(create_move(&fx, 3.0, None, None))])
        .unwrap();

    let mut patch = UpdateMove::new(ids[0]);
    patch.lot = Some(Some(fx.lot1));
    patch.party_used = Some(Some(fx.party2));
    let err = dispatcher
        .execute(&[MoveChange::Update(patch)])
        .unwrap_err();
    assert_eq!(err.index, 0);
    assert!(matches!(err.error, StockError::ConflictingLotParty { .. }));

    fx.host.read(|s| {
        let mv = s.stock_move(ids[0]).unwrap();
        assert_eq!(mv.lot, None);
        assert_eq!(mv.effective_party(), None);
    });
}

#[test]
fn period_close_snapshots_both_groupings() {
    let fx = setup();
    let dispatcher = dispatcher(&fx);

    // One batch: lot1 has no party at batch start, so the second move does
    // not inherit the party the first move assigns.
    dispatcher
        .execute(&[
            MoveChange::Create(create_move(&fx, 5.0, Some(fx.lot1), Some(fx.party1))),
            MoveChange::Create(create_move(&fx, 10.0, Some(fx.lot1), None)),
            MoveChange::Create(create_move(&fx, 3.0, None, None)),
        ])
        .unwrap();

    let period = PeriodId::new();
    fx.host
        .in_transaction::<_, StockError>(|state| {
            state.insert_period(Period::new(period, date(20)));
            Ok(())
        })
        .unwrap();

    let registry = GroupingRegistry::standard();
    assert_eq!(registry.groupings().count(), 2);
    close_period(&fx.host, &registry, period).unwrap();

    fx.host.read(|s| {
        assert!(s.period(period).unwrap().is_closed());

        let product_rows = s.product_cache_rows(period);
        assert_eq!(product_rows.len(), 2);
        let net = |location| {
            product_rows
                .iter()
                .find(|r| r.location == location)
                .map(|r| r.internal_quantity)
                .unwrap()
        };
        assert_eq!(net(fx.storage), 18.0);
        assert_eq!(net(fx.supplier_dock), -18.0);

        let rows = s.lot_party_cache_rows(period);
        assert_eq!(rows.len(), 6);
        let quantity = |location, lot, party| {
            rows.iter()
                .find(|r| r.location == location && r.lot == lot && r.party == party)
                .map(|r| r.internal_quantity)
                .unwrap()
        };
        assert_eq!(quantity(fx.storage, Some(fx.lot1), Some(fx.party1)), 5.0);
        assert_eq!(quantity(fx.supplier_dock, Some(fx.lot1), Some(fx.party1)), -5.0);
        assert_eq!(quantity(fx.storage, Some(fx.lot1), None), 10.0);
        assert_eq!(quantity(fx.supplier_dock, Some(fx.lot1), None), -10.0);
        assert_eq!(quantity(fx.storage, None, None), 3.0);
        assert_eq!(quantity(fx.supplier_dock, None, None), -3.0);
        for row in &rows {
            assert_eq!(row.product, fx.product);
        }
    });
}

#[test]
fn closing_a_period_twice_is_rejected() {
    let fx = setup();
    let period = PeriodId::new();
    fx.host
        .in_transaction::<_, StockError>(|state| {
            state.insert_period(Period::new(period, date(20)));
            Ok(())
        })
        .unwrap();

    let registry = GroupingRegistry::standard();
    close_period(&fx.host, &registry, period).unwrap();
    let err = close_period(&fx.host, &registry, period).unwrap_err();
    assert!(matches!(
        err,
        StockError::Domain(lotparty_core::DomainError::Conflict(_))
    ));
}

#[test]
fn closing_an_unknown_period_is_not_found() {
    let fx = setup();
    let err = close_period(&fx.host, &GroupingRegistry::standard(), PeriodId::new()).unwrap_err();
    assert!(matches!(
        err,
        StockError::Domain(lotparty_core::DomainError::NotFound)
    ));
}

#[test]
fn later_period_aggregates_only_moves_after_the_prior_close() {
    let fx = setup();
    let dispatcher = dispatcher(&fx);

    let mut early = create_move(&fx, 5.0, None, None);
    early.effective_date = date(5);
    dispatcher.execute(&[MoveChange::Create(early)]).unwrap();

    let first_period = PeriodId::new();
    let second_period = PeriodId::new();
    fx.host
        .in_transaction::<_, StockError>(|state| {
            state.insert_period(Period::new(first_period, date(10)));
            state.insert_period(Period::new(second_period, date(20)));
            Ok(())
        })
        .unwrap();

    let registry = GroupingRegistry::standard();
    close_period(&fx.host, &registry, first_period).unwrap();

    let mut late = create_move(&fx, 7.0, None, None);
    late.effective_date = date(15);
    dispatcher.execute(&[MoveChange::Create(late)]).unwrap();

    close_period(&fx.host, &registry, second_period).unwrap();

    fx.host.read(|s| {
        let first_rows = s.lot_party_cache_rows(first_period);
        let second_rows = s.lot_party_cache_rows(second_period);
        assert_eq!(first_rows.len(), 2);
        assert_eq!(second_rows.len(), 2);

        let storage_net = |rows: &[lotparty_stock::LotPartyCache]| {
            rows.iter()
                .find(|r| r.location == fx.storage)
                .map(|r| r.internal_quantity)
                .unwrap()
        };
        assert_eq!(storage_net(&first_rows), 5.0);
        assert_eq!(storage_net(&second_rows), 7.0);
    });
}

#[test]
fn deleting_a_period_cascades_its_caches() {
    let fx = setup();
    dispatcher(&fx)
        .execute(&[MoveChange::Create(create_move(&fx, 4.0, Some(fx.lot1), None))])
        .unwrap();

    let period = PeriodId::new();
    fx.host
        .in_transaction::<_, StockError>(|state| {
            state.insert_period(Period::new(period, date(20)));
            Ok(())
        })
        .unwrap();
    close_period(&fx.host, &GroupingRegistry::standard(), period).unwrap();
    assert!(!fx.host.read(|s| s.lot_party_cache_rows(period).is_empty()));

    delete_period(&fx.host, period).unwrap();
    fx.host.read(|s| {
        assert!(s.period(period).is_err());
        assert!(s.lot_party_cache_rows(period).is_empty());
        assert!(s.product_cache_rows(period).is_empty());
    });
}

#[test]
fn base_registry_alone_produces_no_lot_party_rows() {
    let fx = setup();
    dispatcher(&fx)
        .execute(&[MoveChange::Create(create_move(&fx, 4.0, Some(fx.lot1), None))])
        .unwrap();

    let period = PeriodId::new();
    fx.host
        .in_transaction::<_, StockError>(|state| {
            state.insert_period(Period::new(period, date(20)));
            Ok(())
        })
        .unwrap();

    let base = GroupingRegistry::base();
    assert_eq!(base.cache_kind(Grouping::ProductLotParty), None);
    close_period(&fx.host, &base, period).unwrap();

    fx.host.read(|s| {
        assert_eq!(s.product_cache_rows(period).len(), 2);
        assert!(s.lot_party_cache_rows(period).is_empty());
    });
}
