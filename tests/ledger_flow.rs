//! End-to-end ledger behaviour against the in-process store.

use mill_ledger::compute::DealInputs;
use mill_ledger::query::{DealResource, ListLimits};
use mill_ledger::{
    Commodity, Deal, DealStatus, DoAllocation, DoEntry, DoKey, LedgerError, LedgerStore,
    LiftingFilter, ListQuery, MemoryStore, MillingRun, MillingYieldCalculator, MutationResponse,
    OverstatedPolicy, Side, SortOrder, YieldInputs,
};
use rust_decimal::Decimal;

fn dec(v: i64) -> Decimal {
    Decimal::from(v)
}

fn paddy_purchase(number: &str, allocations: Vec<DoAllocation>) -> Deal {
    let mut deal = Deal::new(
        Commodity::Paddy,
        Side::Purchase,
        number,
        "Shiv Traders",
        DealInputs {
            rate: dec(2000),
            gst_percent: dec(5),
            ..Default::default()
        },
    );
    deal.set_allocations(allocations);
    deal
}

#[test]
fn test_do_balance_follows_deal_lifecycle() {
    let store = MemoryStore::new();
    store
        .insert_do_entry(DoEntry::new("Rampur", "D1", None, dec(100), dec(150), dec(50)))
        .unwrap();
    let key = DoKey::new("Rampur", "D1");
    assert_eq!(store.remaining_balance(&key).unwrap().remaining, dec(300));

    let x = store
        .create_deal(paddy_purchase("PP-X", vec![DoAllocation::new("Rampur", "D1", dec(120))]))
        .unwrap();
    store
        .create_deal(paddy_purchase("PP-Y", vec![DoAllocation::new("Rampur", "D1", dec(100))]))
        .unwrap();
    let balance = store.remaining_balance(&key).unwrap();
    assert_eq!(balance.consumed, dec(220));
    assert_eq!(balance.remaining, dec(80));

    let err = store
        .create_deal(paddy_purchase("PP-Z", vec![DoAllocation::new("Rampur", "D1", dec(81))]))
        .unwrap_err();
    match err {
        LedgerError::OverAllocated {
            requested,
            remaining,
            ..
        } => {
            assert_eq!(requested, dec(81));
            assert_eq!(remaining, dec(80));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    store.delete_deal(x.id.unwrap()).unwrap();
    assert_eq!(store.remaining_balance(&key).unwrap().remaining, dec(200));
}

#[test]
fn test_allocated_quantity_drives_deal_figures() {
    let store = MemoryStore::new();
    store
        .insert_do_entry(DoEntry::new("Rampur", "D1", None, dec(300), Decimal::ZERO, Decimal::ZERO))
        .unwrap();
    store
        .insert_do_entry(DoEntry::new("Kota", "K7", None, dec(50), Decimal::ZERO, Decimal::ZERO))
        .unwrap();

    let deal = store
        .create_deal(paddy_purchase(
            "PP-1",
            vec![
                DoAllocation::new("Rampur", "D1", dec(30)),
                DoAllocation::new("Kota", "K7", dec(20)),
            ],
        ))
        .unwrap();
    assert_eq!(deal.quantity(), dec(50));
    assert_eq!(deal.figures().amount, dec(100_000));
    assert_eq!(deal.figures().gst_amount, dec(5_000));
    assert_eq!(deal.figures().payable_amount, dec(105_000));
}

#[test]
fn test_unknown_do_is_rejected() {
    let store = MemoryStore::new();
    let err = store
        .create_deal(paddy_purchase("PP-1", vec![DoAllocation::new("Nowhere", "X", dec(1))]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnknownDo(key) if key.do_number == "X"));
    assert!(store
        .list_deals(
            &DealResource::new(Commodity::Paddy, Side::Purchase),
            &ListQuery::default()
        )
        .unwrap()
        .records
        .is_empty());
}

#[test]
fn test_sale_figures() {
    let store = MemoryStore::new();
    let sale = store
        .create_deal(Deal::new(
            Commodity::Rice,
            Side::Sale,
            "RS-1",
            "Agro Mart",
            DealInputs {
                quantity: dec(50),
                rate: dec(500),
                gst_percent: dec(18),
                ..Default::default()
            },
        ))
        .unwrap();
    let figures = sale.figures();
    assert_eq!(figures.amount, dec(25_000));
    assert_eq!(figures.gst_amount, dec(4_500));
    assert_eq!(figures.total_with_gst, dec(29_500));

    let plain = Deal::new(
        Commodity::Rice,
        Side::Sale,
        "RS-2",
        "Agro Mart",
        DealInputs {
            quantity: dec(100),
            rate: dec(2500),
            ..Default::default()
        },
    );
    assert_eq!(plain.figures().amount, dec(250_000));
    assert_eq!(plain.figures().payable_amount, dec(250_000));
}

#[test]
fn test_deal_json_ignores_client_figures() {
    let json = r#"{
        "commodity": "frk",
        "side": "sale",
        "dealNumber": "FS-1",
        "partyName": "Nutri Foods",
        "quantity": "10",
        "rate": "120",
        "amount": "999999",
        "payableAmount": "1"
    }"#;
    let deal: Deal = serde_json::from_str(json).unwrap();
    assert_eq!(deal.figures().amount, dec(1200));
    assert_eq!(deal.figures().payable_amount, dec(1200));
    assert_eq!(deal.resource().path(), "/frk-sales");

    let value = serde_json::to_value(&deal).unwrap();
    assert_eq!(value["dealNumber"], "FS-1");
    assert!(value.get("totalWithGst").is_some());
}

#[test]
fn test_completed_deal_stays_completed() {
    let store = MemoryStore::new();
    let mut sale = Deal::new(
        Commodity::Sack,
        Side::Sale,
        "SS-1",
        "Bag House",
        DealInputs {
            quantity: dec(500),
            rate: dec(30),
            ..Default::default()
        },
    );
    let stored = store.create_deal(sale.clone()).unwrap();
    let id = stored.id.unwrap();

    sale.status = DealStatus::Completed;
    store.update_deal(id, sale.clone()).unwrap();

    sale.status = DealStatus::Active;
    assert!(matches!(
        store.update_deal(id, sale),
        Err(LedgerError::Validation(_))
    ));
    assert_eq!(store.get_deal(id).unwrap().status, DealStatus::Completed);
}

#[test]
fn test_list_query_paging_filter_and_sort() {
    let store = MemoryStore::new();
    let entries = (1..=12)
        .map(|n| {
            let center = if n % 2 == 0 { "Rampur" } else { "Kota" };
            DoEntry::new(center, format!("D{:02}", n), None, dec(n), Decimal::ZERO, Decimal::ZERO)
        })
        .collect();
    store.insert_do_entries(entries).unwrap();

    let query = ListQuery::from_pairs(
        [
            ("page", "2"),
            ("pageSize", "4"),
            ("filter[committeeCenter]", "ram"),
            ("sortBy", "total"),
            ("sortOrder", "desc"),
        ],
        &ListLimits::default(),
    )
    .unwrap();
    assert_eq!(query.sort_order, SortOrder::Desc);

    let page = store.list_do_entries(&query).unwrap();
    assert_eq!(page.total_count, 6);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.current_page, 2);
    assert!(page.has_prev);
    assert!(!page.has_next);
    let totals: Vec<Decimal> = page.records.iter().map(|e| e.total()).collect();
    assert_eq!(totals, vec![dec(4), dec(2)]);

    let bad = ListQuery::default().filter("secret", "x");
    assert!(matches!(
        store.list_do_entries(&bad),
        Err(LedgerError::Validation(errors)) if errors.has("filter[secret]")
    ));
}

#[test]
fn test_remaining_lifting_report() {
    let store = MemoryStore::new();
    store
        .insert_do_entries(vec![
            DoEntry::new("Rampur", "D1", None, dec(100), Decimal::ZERO, Decimal::ZERO),
            DoEntry::new("Rampur", "D2", None, dec(40), Decimal::ZERO, Decimal::ZERO),
            DoEntry::new("Kota", "K1", None, dec(70), Decimal::ZERO, Decimal::ZERO),
        ])
        .unwrap();
    store
        .create_deal(paddy_purchase("PP-1", vec![DoAllocation::new("Rampur", "D2", dec(40))]))
        .unwrap();

    let all = store.remaining_lifting(&LiftingFilter::default()).unwrap();
    let keys: Vec<String> = all.iter().map(|b| b.key.to_string()).collect();
    assert_eq!(keys, vec!["Kota/K1", "Rampur/D1", "Rampur/D2"]);

    let open_rampur = store
        .remaining_lifting(&LiftingFilter::default().committee("rampur").open_only())
        .unwrap();
    assert_eq!(open_rampur.len(), 1);
    assert_eq!(open_rampur[0].key, DoKey::new("Rampur", "D1"));
    assert_eq!(open_rampur[0].remaining, dec(100));
}

#[test]
fn test_milling_run_percentages_sum_to_hundred() {
    let store = MemoryStore::new();
    let run = store
        .insert_milling_run(MillingRun::new(
            chrono::NaiveDate::from_ymd_opt(2024, 12, 2),
            "Sona Masuri",
            YieldInputs {
                hopper_quantity: dec(300),
                rice: dec(197),
                brokens: dec(13),
                bran: dec(21),
                husk_tons: dec(6),
                fine_brokens: dec(4),
            },
        ))
        .unwrap();
    let pct = run.percentages().expect("hopper > 0");
    assert_eq!(pct.rice_percent, Decimal::new(6567, 2));
    assert!(pct.wastage_percent >= Decimal::ZERO);
    assert_eq!(pct.yield_total() + pct.wastage_percent, dec(100));
}

#[test]
fn test_milling_run_with_sixths_is_stored_without_warning() {
    let store = MemoryStore::with_calculator(MillingYieldCalculator::new(
        Decimal::TEN,
        OverstatedPolicy::Reject,
    ));
    let run = store
        .insert_milling_run(MillingRun::new(
            None,
            "IR-64",
            YieldInputs {
                hopper_quantity: dec(6),
                rice: dec(1),
                brokens: dec(1),
                bran: dec(1),
                husk_tons: Decimal::new(2, 1),
                fine_brokens: dec(1),
            },
        ))
        .unwrap();
    let pct = run.percentages().expect("hopper > 0");
    assert!(pct.warnings.is_empty());
    assert_eq!(pct.wastage_percent, Decimal::ZERO);
    assert_eq!(pct.yield_total() + pct.wastage_percent, dec(100));
}

#[test]
fn test_mutation_envelope() {
    let store = MemoryStore::new();
    let created: MutationResponse<DoEntry> = store
        .insert_do_entry(DoEntry::new("Rampur", "D1", None, dec(1), dec(2), dec(3)))
        .into();
    let json = serde_json::to_value(&created).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["total"], "6");

    let duplicate: MutationResponse<DoEntry> = store
        .insert_do_entry(DoEntry::new("Rampur", "D1", None, dec(1), dec(2), dec(3)))
        .into();
    assert!(!duplicate.success);
    assert!(duplicate.message.contains("Rampur/D1"));
    assert!(duplicate.data.is_none());
}
