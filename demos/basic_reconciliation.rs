//! Reconciling one month of a creche's bank account against its ledger

use chrono::NaiveDate;
use reconciliation_core::{
    classify_severity, utils::MemorySource, BankStatementEntry, ReconciliationEngine,
    ToleranceConfig, ToleranceOverrides, Transaction, TransactionType,
};
use tracing_subscriber::EnvFilter;

fn cents(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let amount = amount.unsigned_abs();
    format!("{}R{}.{:02}", sign, amount / 100, amount % 100)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🏦 Reconciliation Core - Monthly Bank Reconciliation\n");

    // 1. Resolve tolerances: defaults < RECONCILIATION__* environment < run overrides
    let mut overrides = ToleranceOverrides::default();
    overrides
        .category_overrides
        .insert("bank_charges".to_string(), 250);
    let config = ToleranceConfig::from_env(&overrides)?;

    println!("⚙️  Tolerances:");
    println!("  Amount matching:    {}", cents(config.amount_matching_tolerance));
    println!("  Balance validation: {}", cents(config.balance_validation_tolerance));
    println!("  Bank fee:           {}", cents(config.bank_fee_tolerance));
    println!("  Date:               {} day(s)", config.date_tolerance_days);
    println!("  Percentage:         {}", config.percentage_tolerance);
    println!();

    // 2. Load a month of bank and ledger data
    let source = MemorySource::new();
    let account = "sunshine-creche";
    let at = |d: u32| {
        NaiveDate::from_ymd_opt(2024, 2, d)
            .and_then(|date| date.and_hms_opt(9, 0, 0))
            .ok_or("invalid demo date")
    };

    let statement = [
        (1, 380_000, 380_000, "FNB-2401"),
        (2, 410_000, 790_000, "FNB-2402"),
        (6, -8_950, 781_050, "FNB-2403"),
        (15, -420_000, 361_050, "FNB-2404"),
        (26, 395_500, 756_550, "FNB-2405"),
    ];
    for (d, amount, balance, reference) in statement {
        source.add_bank_entry(account, BankStatementEntry::new(at(d)?, amount, balance, reference))?;
    }

    let ledger = vec![
        Transaction::new("FEE-FEB-001", 380_000, at(1)?).with_type(TransactionType::Credit),
        Transaction::new("FEE-FEB-002", 410_000, at(2)?).with_type(TransactionType::Credit),
        Transaction::new("CHG-FEB", -9_000, at(6)?).with_category("bank_charges"),
        Transaction::new("SAL-FEB", -420_000, at(14)?).with_category("salaries"),
        Transaction::new("FEE-FEB-003", 396_000, at(26)?).with_type(TransactionType::Credit),
    ];
    for transaction in ledger {
        source.add_transaction(account, transaction)?;
    }

    let first_day = NaiveDate::from_ymd_opt(2024, 2, 1).ok_or("invalid demo date")?;
    let last_day = NaiveDate::from_ymd_opt(2024, 2, 29).ok_or("invalid demo date")?;
    source.set_expected_closing_balance(account, last_day, 757_000)?;

    // 3. Run the reconciliation
    let engine = ReconciliationEngine::new(source, config)?;
    let report = engine.run(account, first_day, last_day).await?;

    println!("🔗 Matches:");
    for result in &report.matches {
        println!(
            "  {} -> {:<12} deviation {:>8}  confidence {:>6}  {}",
            result.bank_reference,
            result.transaction_id.as_deref().unwrap_or("-"),
            cents(result.deviation),
            result.confidence_adjustment,
            if result.matched { "✅" } else { "❌" }
        );
    }
    println!();

    println!("⚠️  Discrepancies:");
    if report.discrepancies.is_empty() {
        println!("  none");
    }
    for discrepancy in &report.discrepancies {
        println!(
            "  {:?} {} ({}%) severity {:?}",
            discrepancy.discrepancy_type,
            cents(discrepancy.difference),
            discrepancy.percentage.with_scale(3),
            discrepancy.severity
        );
    }
    println!();

    println!("📊 Ledger totals:");
    println!("  Credits: {}", cents(report.ledger_totals.total_credits));
    println!("  Debits:  {}", cents(report.ledger_totals.total_debits));
    println!("  Net:     {}", cents(report.ledger_totals.net_amount));
    println!();

    // 4. Severity buckets at a glance
    println!("🚦 Severity examples:");
    for (difference, base) in [(99, 100_000), (100, 50), (5_000, 50), (10_000, 50)] {
        println!(
            "  {} on {} -> {:?}",
            cents(difference),
            cents(base),
            classify_severity(difference, base)?
        );
    }

    println!(
        "\n{}",
        if report.is_reconciled() {
            "✅ Period reconciled"
        } else {
            "❌ Period needs review"
        }
    );
    Ok(())
}
