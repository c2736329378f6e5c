//! Statement engine: drives one parse from raw text to a reconciled statement

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;
use crate::variant::{Variant, VariantRegistry};

/// Pipeline position of a [`StatementEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Raw,
    TypeValidated,
    Preprocessed,
    FieldsExtracted,
    TransactionsExtracted,
    /// Terminal success: the statement is committed
    Reconciled,
    /// Terminal failure: the statement is back to its pristine state
    Rejected,
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Reconciled | EngineState::Rejected)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Raw => "raw",
            EngineState::TypeValidated => "type validated",
            EngineState::Preprocessed => "preprocessed",
            EngineState::FieldsExtracted => "fields extracted",
            EngineState::TransactionsExtracted => "transactions extracted",
            EngineState::Reconciled => "reconciled",
            EngineState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Parses statements of one variant.
///
/// An engine owns the statement of its current run; it is only handed out as
/// valid once the run reaches [`EngineState::Reconciled`]. Engines share the
/// compiled variant, so several statements can be parsed in parallel by
/// giving each its own engine.
pub struct StatementEngine {
    variant: Arc<Variant>,
    validator: Box<dyn StatementValidator>,
    state: EngineState,
    statement: Statement,
    failures: Vec<StatementError>,
}

impl StatementEngine {
    /// Create an engine with the default reconciliation rules
    pub fn new(variant: Arc<Variant>) -> Self {
        Self::with_validator(variant, Box::new(DefaultStatementValidator))
    }

    /// Create an engine with custom acceptance rules
    pub fn with_validator(variant: Arc<Variant>, validator: Box<dyn StatementValidator>) -> Self {
        let statement = Statement::new(variant.key().to_string(), String::new());
        Self {
            variant,
            validator,
            state: EngineState::Raw,
            statement,
            failures: Vec::new(),
        }
    }

    /// Create an engine for a registered variant
    pub fn for_variant(registry: &VariantRegistry, key: &str) -> StatementResult<Self> {
        Ok(Self::new(registry.get(key)?))
    }

    pub fn variant(&self) -> &Arc<Variant> {
        &self.variant
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The statement of the last run. Pristine unless the run reconciled.
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Every extraction error of the last run, in extraction order
    pub fn failures(&self) -> &[StatementError] {
        &self.failures
    }

    pub fn into_statement(self) -> Statement {
        self.statement
    }

    /// Run the whole pipeline on raw statement text.
    ///
    /// Every run starts over from [`EngineState::Raw`] with a pristine
    /// statement. On failure the statement is cleared, the engine ends in
    /// [`EngineState::Rejected`] and the first error is returned.
    pub fn parse(&mut self, raw_text: &str) -> StatementResult<&Statement> {
        self.statement = Statement::new(self.variant.key().to_string(), raw_text.to_string());
        self.failures.clear();
        self.state = EngineState::Raw;

        match self.run() {
            Ok(()) => Ok(&self.statement),
            Err(e) => {
                warn!(variant = %self.variant.key(), state = %self.state, error = %e, "statement rejected");
                if self.failures.is_empty() {
                    self.failures.push(e.clone());
                }
                self.statement.clear();
                self.state = EngineState::Rejected;
                Err(e)
            }
        }
    }

    fn advance(&mut self, state: EngineState) {
        debug!(from = %self.state, to = %state, "statement engine transition");
        self.state = state;
    }

    fn run(&mut self) -> StatementResult<()> {
        let variant = Arc::clone(&self.variant);

        if !variant.is_statement(self.statement.raw_text()) {
            return Err(StatementError::NotAStatement {
                variant: variant.key().to_string(),
            });
        }
        self.advance(EngineState::TypeValidated);

        let text = variant.preprocess(self.statement.raw_text());
        self.advance(EngineState::Preprocessed);

        let extraction = variant.fields().extract_all(&text);
        if let Some(first) = extraction.failures.first().cloned() {
            self.failures = extraction.failures;
            // the listing is still read so its errors show up alongside the
            // field errors; month/day rows need the statement date for that
            let dated = extraction.values.statement_date;
            if dated.is_some() || !variant.fields().declares_statement_date() {
                if let Err(e) = variant.transactions().extract(&text, dated) {
                    warn!(error = %e, "transaction extraction failed");
                    self.failures.push(e);
                }
            }
            return Err(first);
        }
        let values = extraction.values;
        self.statement.statement_date = values.statement_date;
        self.statement.due_date = values.due_date;
        self.statement.minimum_amount_due = values.minimum_amount_due;
        self.statement.beginning_balance = values.previous_balance.unwrap_or_default();
        self.statement.total_credits = values.total_credits.unwrap_or_default();
        self.statement.total_debits = values.total_debits.unwrap_or_default();
        self.statement.ending_balance = values.ending_balance.unwrap_or_default();
        self.statement.unbilled_installment_amount = values.unbilled_installment_amount;
        self.advance(EngineState::FieldsExtracted);

        let extracted = variant
            .transactions()
            .extract(&text, self.statement.statement_date)?;
        self.statement.transactions = extracted.ordinary;
        self.statement.installment_transactions = extracted.installments;
        self.advance(EngineState::TransactionsExtracted);

        self.validator.validate_statement(&self.statement)?;

        self.statement.parsed = true;
        self.statement.id = Some(Uuid::new_v4());
        self.advance(EngineState::Reconciled);
        info!(
            variant = %variant.key(),
            transactions = self.statement.transactions.len(),
            installments = self.statement.installment_transactions.len(),
            ending_balance = %self.statement.ending_balance,
            "statement reconciled"
        );
        Ok(())
    }

    /// Acquire the text of a document and parse it.
    ///
    /// A text source failure is returned as is and leaves the engine
    /// untouched, since no pipeline run was started.
    pub async fn load_and_parse<S>(
        &mut self,
        source: &S,
        handle: &str,
        credentials: Option<&str>,
    ) -> StatementResult<&Statement>
    where
        S: TextSource + ?Sized,
    {
        let text = source.extract_text(handle, credentials).await?;
        debug!(handle, bytes = text.len(), "statement text acquired");
        self.parse(&text)
    }

    /// Acquire, parse and export a statement. The exporter is only called
    /// for a reconciled statement.
    pub async fn parse_and_export<S, E>(
        &mut self,
        source: &S,
        handle: &str,
        credentials: Option<&str>,
        exporter: &mut E,
    ) -> StatementResult<&Statement>
    where
        S: TextSource + ?Sized,
        E: StatementExporter + ?Sized,
    {
        self.load_and_parse(source, handle, credentials).await?;
        exporter.export_statement(&self.statement).await?;
        Ok(&self.statement)
    }
}
