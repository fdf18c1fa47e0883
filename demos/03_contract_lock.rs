/// contract lock - finalizing freezes the amount due until the contract is voided
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use pawn_ledger_rs::{
    LedgerConfig, LedgerEngine, Money, NewLoan, Rate, SafeTimeProvider, TimeSource,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();
    let engine = LedgerEngine::in_memory(LedgerConfig::default(), time.clone())?;

    let loan = engine.register_loan(
        NewLoan {
            loan_number: "LN-0004".to_string(),
            branch_id: "JKT01".to_string(),
            customer_id: "C-0500".to_string(),
            collateral_ids: vec!["gold-necklace-20g".to_string()],
            principal: Money::from_minor(3_000_000),
            rate: Rate::from_bps(300),
            admin_fee: Money::ZERO,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        },
        "teller-01",
    )?;

    let draft = engine.draft_contract(loan.id, "clerk-01")?;
    println!("draft {}", draft.contract_number);

    let contract = engine.finalize_contract(loan.id, "manager-01")?;
    println!("finalized: {}", serde_json::to_string_pretty(&contract.terms)?);

    controller.advance(Duration::days(10));
    let locked = engine.get_amount_due(loan.id, time.now().date_naive())?;
    println!("ten days later (locked): {}", locked.total_due);

    engine.void_contract(contract.id, "collateral weight misrecorded", "manager-01")?;
    let live = engine.get_amount_due(loan.id, time.now().date_naive())?;
    println!("after void (live): {}", live.total_due);

    let reissued = engine.finalize_contract(loan.id, "manager-01")?;
    println!("reissued as {}", reissued.contract_number);

    Ok(())
}
