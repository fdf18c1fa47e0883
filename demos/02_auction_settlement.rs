/// auction & settlement - an unredeemed loan goes to auction and is settled
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use pawn_ledger_rs::{
    AuctionOutcome, LedgerConfig, LedgerEngine, Money, NewLoan, Rate, SafeTimeProvider,
    TimeSource,
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

    let loan = engine.register_loan(
        NewLoan {
            loan_number: "LN-0003".to_string(),
            branch_id: "SBY01".to_string(),
            customer_id: "C-0311".to_string(),
            collateral_ids: vec!["motorcycle-bpkb-4471".to_string()],
            principal: Money::from_minor(5_000_000),
            rate: Rate::from_bps(200),
            admin_fee: Money::from_minor(25_000),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        },
        "teller-03",
    )?;

    controller.advance(Duration::days(75));
    println!("status on {}: {:?}", time.now().date_naive(), engine.get_loan_status(loan.id)?);

    engine.record_auction_decision(loan.id, "no response to two notices", "manager-03")?;
    let auction = engine.create_auction(loan.id)?;
    println!(
        "listed: debt {} frozen at {} days overdue",
        auction.remaining_debt, auction.days_overdue
    );

    controller.advance(Duration::days(7));
    engine.close_auction(auction.id, AuctionOutcome::Sold, Some("sold at branch auction"))?;

    let settlement = engine.record_settlement(
        auction.id,
        Money::from_minor(5_600_000),
        Money::from_minor(280_000),
        time.now().date_naive(),
        Some("buyer B-204"),
    )?;
    println!(
        "net proceeds {} (balance vs debt {})",
        settlement.net_amount, settlement.balance_vs_debt
    );

    engine.close_loan(loan.id, "manager-03")?;
    println!("final status: {:?}", engine.get_loan_status(loan.id)?);

    for event in engine.events()? {
        println!("{}", serde_json::to_string(&event)?);
    }

    Ok(())
}
