//! Parse a BPI credit card statement from an in-memory text source

use statement_core::utils::{MemoryExporter, MemoryTextSource};
use statement_core::{StatementEngine, VariantRegistry};

const STATEMENT: &str = "BPI\n\
    Statement of Account\n\
    STATEMENT DATE JANUARY 15, 2026\n\
    PAYMENT DUE DATE FEBRUARY 4, 2026\n\
    TOTAL AMOUNT DUE 5,271.10\n\
    MINIMUM AMOUNT DUE 1,100.00\n\
    Previous Balance 10,000.00\n\
    Total 10,000.00 10,000.00 2,450.00 1,000.00 321.10 1,500.00 5,271.10\n\
    Jan 02 Jan 02 Payment - Thank You -10,000.00\n\
    Jan 12 Jan 12 Late Charges 1,500.00\n\
    Finance Charge 321.10\n\
    123456-7-89-0123456-JUAN DELA CRUZ\n\
    Installment Amortization:\n\
    Dec 28 Dec 30 SHOPEE PH 1,950.00\n\
    Jan 05 Jan 07 MERALCO 500.00\n\
    Jan 10 Jan 10 LAPTOP STORE INST:03/12 1,000.00\n\
    S.I.P. BALANCE SUMMARY\n\
    031525 011026 LAPTOP STORE 1,000.00 9,000.00\n\
    Unbilled Installment Amount 9,000.00\n";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Statement Core - Parse Statement Example\n");

    let source = MemoryTextSource::new();
    source.insert_encrypted("january.pdf", STATEMENT, "JUAN0115")?;

    let registry = VariantRegistry::with_builtins()?;
    println!("📚 Registered layouts: {}\n", registry.keys().join(", "));

    let mut engine = StatementEngine::for_variant(&registry, "bpi-credit")?;
    let mut exporter = MemoryExporter::new();

    // A wrong password never reaches the parser
    if let Err(e) = engine
        .parse_and_export(&source, "january.pdf", Some("wrong"), &mut exporter)
        .await
    {
        println!("❌ {}\n", e);
    }

    let statement = engine
        .parse_and_export(&source, "january.pdf", Some("JUAN0115"), &mut exporter)
        .await?;

    println!("📄 Statement {}", statement.id.map(|id| id.to_string()).unwrap_or_default());
    if let Some(date) = statement.statement_date {
        println!("  Statement date:   {}", date);
    }
    if let Some(date) = statement.due_date {
        println!("  Due date:         {}", date);
    }
    println!("  Previous balance: {}", statement.beginning_balance);
    println!("  Total credits:    {}", statement.total_credits);
    println!("  Total debits:     {}", statement.total_debits);
    println!("  Amount due:       {}\n", statement.ending_balance);

    println!("💳 Transactions:");
    for txn in &statement.transactions {
        println!("  {}", txn);
    }

    println!("\n📆 Installments:");
    for txn in &statement.installment_transactions {
        println!("  {}", txn);
    }

    println!("\n✅ Exported {} statement(s)", exporter.exported().len());

    Ok(())
}
