//! Core types and data structures for parsed statements

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::reconciliation::ReconciliationCheck;
use crate::utils::amount::format_amount;

/// Logical fields extracted from statement text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementField {
    StatementDate,
    DueDate,
    MinimumAmountDue,
    PreviousBalance,
    TotalCredits,
    TotalDebits,
    /// Ending balance, printed on credit statements as the total amount due
    EndingBalance,
    UnbilledInstallmentAmount,
    /// The structural region holding the transaction listing
    TransactionRegion,
}

impl StatementField {
    /// Human-readable label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            StatementField::StatementDate => "Statement Date",
            StatementField::DueDate => "Due Date",
            StatementField::MinimumAmountDue => "Minimum Amount Due",
            StatementField::PreviousBalance => "Previous Balance",
            StatementField::TotalCredits => "Total Credits",
            StatementField::TotalDebits => "Total Debits",
            StatementField::EndingBalance => "Total Amount Due",
            StatementField::UnbilledInstallmentAmount => "Unbilled Installment Amount",
            StatementField::TransactionRegion => "Transaction Region",
        }
    }
}

impl fmt::Display for StatementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Variant-specific attributes of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionDetail {
    /// Credit card purchase, advance, payment or charge
    Card {
        /// Date the transaction cleared
        post_date: NaiveDate,
    },
    /// Installment plan amortization row
    Installment {
        last_payment_date: NaiveDate,
        remaining_balance: BigDecimal,
    },
    /// Savings or checking account movement
    Savings { reference: String },
}

/// A single line of a statement listing.
///
/// Transactions are only built by the transaction list extractor and are
/// never mutated afterwards. Credits are positive and debits negative, as
/// printed in the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Date the transaction took place
    pub date: NaiveDate,
    /// Free text as printed on the statement
    pub description: String,
    /// Signed amount
    pub amount: BigDecimal,
    /// Variant-specific attributes
    pub detail: TransactionDetail,
}

impl Transaction {
    /// Create a credit card transaction
    pub fn card(
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
        post_date: NaiveDate,
    ) -> Self {
        Self {
            date,
            description,
            amount,
            detail: TransactionDetail::Card { post_date },
        }
    }

    /// Create an installment transaction
    pub fn installment(
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
        last_payment_date: NaiveDate,
        remaining_balance: BigDecimal,
    ) -> Self {
        Self {
            date,
            description,
            amount,
            detail: TransactionDetail::Installment {
                last_payment_date,
                remaining_balance,
            },
        }
    }

    /// Create a savings or checking transaction
    pub fn savings(
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
        reference: String,
    ) -> Self {
        Self {
            date,
            description,
            amount,
            detail: TransactionDetail::Savings { reference },
        }
    }

    /// Post date for card transactions
    pub fn post_date(&self) -> Option<NaiveDate> {
        match self.detail {
            TransactionDetail::Card { post_date } => Some(post_date),
            _ => None,
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.date.format("%m/%d/%y");
        match &self.detail {
            TransactionDetail::Card { post_date } => write!(
                f,
                "{} | {} - {} - {}",
                date,
                post_date.format("%m/%d/%y"),
                self.description,
                format_amount(&self.amount)
            ),
            TransactionDetail::Installment {
                last_payment_date,
                remaining_balance,
            } => write!(
                f,
                "{} - {} - {} - {} - {}",
                date,
                last_payment_date.format("%m/%d/%y"),
                self.description,
                format_amount(&self.amount),
                format_amount(remaining_balance)
            ),
            TransactionDetail::Savings { reference } => write!(
                f,
                "{} - {} - {} - {}",
                date,
                reference,
                self.description,
                format_amount(&self.amount)
            ),
        }
    }
}

/// Parsed representation of one billing or account period
///
/// A statement is either pristine (every figure zero, no dates, no
/// transactions, `parsed == false`) or fully reconciled. The engine never
/// leaves a mix of the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Identity assigned when the statement is committed
    pub id: Option<Uuid>,
    /// Key of the variant whose grammar produced this statement
    pub variant: String,
    raw_text: String,
    pub beginning_balance: BigDecimal,
    pub total_credits: BigDecimal,
    pub total_debits: BigDecimal,
    pub ending_balance: BigDecimal,
    /// Credit variants only
    pub statement_date: Option<NaiveDate>,
    /// Credit variants only
    pub due_date: Option<NaiveDate>,
    /// Credit variants only
    pub minimum_amount_due: Option<BigDecimal>,
    pub unbilled_installment_amount: Option<BigDecimal>,
    /// Ordinary transactions in document order
    pub transactions: Vec<Transaction>,
    /// Installment rows, kept out of the balance identity
    pub installment_transactions: Vec<Transaction>,
    /// True only after every extraction step and reconciliation succeeded
    pub parsed: bool,
}

impl Statement {
    /// Create a pristine statement holding the text as received
    pub fn new(variant: String, raw_text: String) -> Self {
        Self {
            id: None,
            variant,
            raw_text,
            beginning_balance: BigDecimal::from(0),
            total_credits: BigDecimal::from(0),
            total_debits: BigDecimal::from(0),
            ending_balance: BigDecimal::from(0),
            statement_date: None,
            due_date: None,
            minimum_amount_due: None,
            unbilled_installment_amount: None,
            transactions: Vec::new(),
            installment_transactions: Vec::new(),
            parsed: false,
        }
    }

    /// The text as received from the text source
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Revert every extracted value to its zero state.
    ///
    /// The variant key and raw text are kept.
    pub fn clear(&mut self) {
        let variant = std::mem::take(&mut self.variant);
        let raw_text = std::mem::take(&mut self.raw_text);
        *self = Self::new(variant, raw_text);
    }

    /// Whether every extracted value is still at its zero state
    pub fn is_pristine(&self) -> bool {
        *self == Self::new(self.variant.clone(), self.raw_text.clone())
    }

    /// Net movement of the period (credits minus debits)
    pub fn net_change(&self) -> BigDecimal {
        &self.total_credits - &self.total_debits
    }

    /// Sum of the ordinary transaction amounts
    pub fn transaction_total(&self) -> BigDecimal {
        self.transactions.iter().map(|t| &t.amount).sum()
    }
}

/// Errors that can occur while turning statement text into a [`Statement`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatementError {
    #[error("Text is not a {variant} statement: format signature not found")]
    NotAStatement { variant: String },
    #[error("Cannot find {0} from extracted text. Check updates in statement format")]
    FieldNotFound(StatementField),
    #[error("Malformed amount: {0:?}")]
    MalformedAmount(String),
    #[error("Unparsable date: {0:?}")]
    UnparsableDate(String),
    #[error("Did not find any transaction in the {0} using the current transaction pattern")]
    NoTransactionsMatched(String),
    #[error("Statement has erroneous data: {check} expected {expected}, computed {computed}")]
    ReconciliationFailed {
        check: ReconciliationCheck,
        expected: BigDecimal,
        computed: BigDecimal,
    },
    #[error("Text source error: {0}")]
    Io(String),
    #[error("Invalid statement layout: {0}")]
    InvalidLayout(String),
    #[error("Unknown statement variant: {0}")]
    UnknownVariant(String),
    #[error("Statement has not been reconciled: {0}")]
    NotReconciled(String),
}

/// Result type for statement operations
pub type StatementResult<T> = Result<T, StatementError>;
