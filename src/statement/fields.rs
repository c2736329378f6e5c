//! Field extractors: one fixed grammar per logical statement field

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::types::*;
use crate::utils::amount::{parse_amount, AMOUNT_PATTERN};
use crate::utils::date::repair_date;
use crate::variant::{FieldGrammars, FieldRule, FigureLayout, LabelGrammar};

/// Name of the capture group holding a field's value
pub const VALUE_GROUP: &str = "value";

/// Expand the `{amount}` placeholder and compile a grammar
pub(crate) fn compile_pattern(pattern: &str) -> StatementResult<Regex> {
    let expanded = pattern.replace("{amount}", AMOUNT_PATTERN);
    Regex::new(&expanded)
        .map_err(|e| StatementError::InvalidLayout(format!("pattern {pattern:?}: {e}")))
}

pub(crate) fn has_group(re: &Regex, name: &str) -> bool {
    re.capture_names().any(|n| n == Some(name))
}

/// Extractor for a value printed right after a label token
#[derive(Debug, Clone)]
pub struct LabelExtractor {
    field: StatementField,
    pattern: Regex,
}

impl LabelExtractor {
    /// Compile a label grammar; the pattern must capture a `value` group
    pub fn compile(field: StatementField, grammar: &LabelGrammar) -> StatementResult<Self> {
        let pattern = compile_pattern(&grammar.pattern)?;
        if !has_group(&pattern, VALUE_GROUP) {
            return Err(StatementError::InvalidLayout(format!(
                "{field} pattern has no `{VALUE_GROUP}` group"
            )));
        }
        Ok(Self { field, pattern })
    }

    pub fn field(&self) -> StatementField {
        self.field
    }

    fn capture<'t>(&self, text: &'t str) -> StatementResult<&'t str> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.name(VALUE_GROUP))
            .map(|m| m.as_str())
            .ok_or(StatementError::FieldNotFound(self.field))
    }

    /// Extract the first labelled figure
    pub fn extract_amount(&self, text: &str) -> StatementResult<BigDecimal> {
        parse_amount(self.capture(text)?)
    }

    /// Extract the first labelled date
    pub fn extract_date(&self, text: &str) -> StatementResult<NaiveDate> {
        repair_date(self.capture(text)?)
    }

    /// Like [`extract_amount`](Self::extract_amount), but a missing label is
    /// not an error
    pub fn extract_optional_amount(&self, text: &str) -> StatementResult<Option<BigDecimal>> {
        match self.extract_amount(text) {
            Ok(amount) => Ok(Some(amount)),
            Err(StatementError::FieldNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Extractor for a label followed by a run of concatenated figures, where
/// the field is the sum of the figures at fixed positions
#[derive(Debug, Clone)]
pub struct FigureExtractor {
    field: StatementField,
    pattern: Regex,
    offsets: Vec<usize>,
}

impl FigureExtractor {
    /// Compile a figure layout, checking that every offset is in range
    pub fn compile(field: StatementField, layout: &FigureLayout) -> StatementResult<Self> {
        if layout.figures == 0 || layout.offsets.is_empty() {
            return Err(StatementError::InvalidLayout(format!(
                "{field} layout needs at least one figure and one offset"
            )));
        }
        if let Some(bad) = layout.offsets.iter().find(|&&o| o >= layout.figures) {
            return Err(StatementError::InvalidLayout(format!(
                "{field} offset {bad} is outside the {} figures after {:?}",
                layout.figures, layout.label
            )));
        }

        // the run must stop after the last figure, so a line with an extra
        // column does not match
        let figure = format!("({AMOUNT_PATTERN})");
        let source = format!(
            r"{}{}(?:$|[^\d,.])",
            regex::escape(&layout.label),
            figure.repeat(layout.figures)
        );
        let pattern = Regex::new(&source)
            .map_err(|e| StatementError::InvalidLayout(format!("{field} layout: {e}")))?;

        Ok(Self {
            field,
            pattern,
            offsets: layout.offsets.clone(),
        })
    }

    pub fn field(&self) -> StatementField {
        self.field
    }

    /// Sum the figures at the configured offsets.
    ///
    /// Fails with `FieldNotFound` when the label is not followed by exactly
    /// the expected number of figures.
    pub fn extract(&self, text: &str) -> StatementResult<BigDecimal> {
        let caps = self
            .pattern
            .captures(text)
            .ok_or(StatementError::FieldNotFound(self.field))?;

        let mut total = BigDecimal::from(0);
        for offset in &self.offsets {
            let figure = caps
                .get(offset + 1)
                .ok_or(StatementError::FieldNotFound(self.field))?;
            total += parse_amount(figure.as_str())?;
        }
        Ok(total)
    }
}

/// A monetary summary field
#[derive(Debug, Clone)]
pub enum AmountExtractor {
    Label(LabelExtractor),
    Figures(FigureExtractor),
}

impl AmountExtractor {
    pub fn compile(field: StatementField, rule: &FieldRule) -> StatementResult<Self> {
        match rule {
            FieldRule::Label(grammar) => Ok(Self::Label(LabelExtractor::compile(field, grammar)?)),
            FieldRule::Figures(layout) => {
                Ok(Self::Figures(FigureExtractor::compile(field, layout)?))
            }
        }
    }

    pub fn extract(&self, text: &str) -> StatementResult<BigDecimal> {
        match self {
            Self::Label(extractor) => extractor.extract_amount(text),
            Self::Figures(extractor) => extractor.extract(text),
        }
    }
}

/// Values produced by a full field extraction pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryFields {
    pub statement_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub minimum_amount_due: Option<BigDecimal>,
    pub previous_balance: Option<BigDecimal>,
    pub total_credits: Option<BigDecimal>,
    pub total_debits: Option<BigDecimal>,
    pub ending_balance: Option<BigDecimal>,
    pub unbilled_installment_amount: Option<BigDecimal>,
}

/// Outcome of running every field extractor once
#[derive(Debug, Clone, Default)]
pub struct FieldExtraction {
    pub values: SummaryFields,
    /// One entry per extractor that failed, in extraction order
    pub failures: Vec<StatementError>,
}

impl FieldExtraction {
    fn record<T>(&mut self, result: StatementResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "field extraction failed");
                self.failures.push(e);
                None
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Compiled extractors for every field a variant declares
#[derive(Debug, Clone)]
pub struct FieldSet {
    statement_date: Option<LabelExtractor>,
    due_date: Option<LabelExtractor>,
    minimum_amount_due: Option<LabelExtractor>,
    previous_balance: AmountExtractor,
    total_credits: AmountExtractor,
    total_debits: AmountExtractor,
    ending_balance: AmountExtractor,
    unbilled_installment_amount: Option<LabelExtractor>,
}

impl FieldSet {
    pub fn compile(grammars: &FieldGrammars) -> StatementResult<Self> {
        let label = |field: StatementField, grammar: &Option<LabelGrammar>| {
            grammar
                .as_ref()
                .map(|g| LabelExtractor::compile(field, g))
                .transpose()
        };

        Ok(Self {
            statement_date: label(StatementField::StatementDate, &grammars.statement_date)?,
            due_date: label(StatementField::DueDate, &grammars.due_date)?,
            minimum_amount_due: label(
                StatementField::MinimumAmountDue,
                &grammars.minimum_amount_due,
            )?,
            previous_balance: AmountExtractor::compile(
                StatementField::PreviousBalance,
                &grammars.previous_balance,
            )?,
            total_credits: AmountExtractor::compile(
                StatementField::TotalCredits,
                &grammars.total_credits,
            )?,
            total_debits: AmountExtractor::compile(
                StatementField::TotalDebits,
                &grammars.total_debits,
            )?,
            ending_balance: AmountExtractor::compile(
                StatementField::EndingBalance,
                &grammars.ending_balance,
            )?,
            unbilled_installment_amount: label(
                StatementField::UnbilledInstallmentAmount,
                &grammars.unbilled_installment_amount,
            )?,
        })
    }

    pub fn declares_statement_date(&self) -> bool {
        self.statement_date.is_some()
    }

    /// Run every declared extractor against normalized text.
    ///
    /// Each extractor runs regardless of earlier failures so that the caller
    /// sees every field that could not be read.
    pub fn extract_all(&self, text: &str) -> FieldExtraction {
        let mut out = FieldExtraction::default();

        if let Some(extractor) = &self.statement_date {
            out.values.statement_date = out.record(extractor.extract_date(text));
        }
        if let Some(extractor) = &self.due_date {
            out.values.due_date = out.record(extractor.extract_date(text));
        }
        if let Some(extractor) = &self.minimum_amount_due {
            out.values.minimum_amount_due = out.record(extractor.extract_amount(text));
        }

        out.values.previous_balance = out.record(self.previous_balance.extract(text));
        out.values.total_credits = out.record(self.total_credits.extract(text));
        out.values.total_debits = out.record(self.total_debits.extract(text));
        out.values.ending_balance = out.record(self.ending_balance.extract(text));

        if let Some(extractor) = &self.unbilled_installment_amount {
            out.values.unbilled_installment_amount = out
                .record(extractor.extract_optional_amount(text))
                .flatten();
        }

        debug!(failures = out.failures.len(), "field extraction finished");
        out
    }
}
