/// quick start - register a loan, check what is owed, take a payment
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
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();
    let engine = LedgerEngine::in_memory(LedgerConfig::default(), time.clone())?;

    // 1,000,000 against a gold ring at 3% per 30 days
    let loan = engine.register_loan(
        NewLoan {
            loan_number: "LN-0001".to_string(),
            branch_id: "JKT01".to_string(),
            customer_id: "C-0042".to_string(),
            collateral_ids: vec!["gold-ring-5g".to_string()],
            principal: Money::from_minor(1_000_000),
            rate: Rate::from_bps(300),
            admin_fee: Money::from_minor(10_000),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        },
        "teller-01",
    )?;

    controller.advance(Duration::days(15));
    let today = time.now().date_naive();
    let due = engine.get_amount_due(loan.id, today)?;
    println!("after {} days: {}", due.elapsed_days, serde_json::to_string_pretty(&due)?);

    let payment = engine.apply_payment(loan.id, Money::from_minor(100_000), time.now(), "teller-01")?;
    println!("payment split: {}", serde_json::to_string_pretty(&payment.breakdown)?);
    println!("status: {:?}", engine.get_loan_status(loan.id)?);

    Ok(())
}
