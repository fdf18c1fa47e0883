/// payment reversal - repay in full, reverse after the due date, watch the loan reopen
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use pawn_ledger_rs::{
    LedgerConfig, LedgerEngine, LedgerView, Money, NewLoan, Rate, SafeTimeProvider, TimeSource,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();
    let engine = LedgerEngine::in_memory(LedgerConfig::default(), time.clone())?;

    let loan = engine.register_loan(
        NewLoan {
            loan_number: "LN-0002".to_string(),
            branch_id: "BDG02".to_string(),
            customer_id: "C-0107".to_string(),
            collateral_ids: vec!["laptop-sn-88172".to_string()],
            principal: Money::from_minor(2_000_000),
            rate: Rate::from_bps(250),
            admin_fee: Money::ZERO,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        },
        "teller-02",
    )?;

    let total = engine.get_amount_due(loan.id, time.now().date_naive())?.total_due;
    let payment = engine.apply_payment(loan.id, total, time.now(), "teller-02")?;
    println!("paid {} -> {:?}", payment.amount, engine.get_loan_status(loan.id)?);

    // the transfer is recalled a few weeks later
    controller.advance(Duration::days(21));
    engine.reverse_payment(payment.id, "transfer recalled by the bank", "supervisor-01")?;
    println!("after reversal -> {:?}", engine.get_loan_status(loan.id)?);

    let due = engine.get_amount_due(loan.id, time.now().date_naive())?;
    println!("owed again: {}", due.total_due);

    for entry in engine.cash_entries()? {
        println!(
            "{:?} {:>10} {:?} {:?}",
            entry.entry_type, entry.amount, entry.source, entry.status
        );
    }
    let summary = engine.cash_summary(LedgerView::All)?;
    println!("net {} over {} entries", summary.net, summary.entries);

    Ok(())
}
