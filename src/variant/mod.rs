//! Statement variants: one textual layout per institution and account type
//!
//! A variant is described by plain data ([`VariantDescriptor`]) and compiled
//! once into a [`Variant`] holding ready-to-run grammars. Adding an
//! institution means adding a descriptor, not a new type.

pub mod bpi;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::statement::fields::FieldSet;
use crate::statement::transaction::TransactionExtractor;
use crate::types::*;

/// Kind of account a variant describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Credit card: carries statement date, due date and minimum due
    Credit,
    /// Savings or checking account
    Savings,
}

/// Whitespace cleanup applied before any field is extracted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Use the text as received
    #[default]
    None,
    /// Drop every space character; line breaks are kept
    RemoveSpaces,
    /// Collapse runs of spaces and tabs into a single space
    CollapseSpaces,
}

/// A value printed right after a label.
///
/// The pattern must capture the value in a group named `value`. The
/// placeholder `{amount}` expands to the grouped-decimal figure grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelGrammar {
    pub pattern: String,
}

impl LabelGrammar {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

/// A label followed by a run of concatenated figures.
///
/// The field value is the sum of the figures at `offsets` (zero based). The
/// line matches only when exactly `figures` figures follow the label; the
/// run must end at a character that cannot continue a figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureLayout {
    pub label: String,
    pub figures: usize,
    pub offsets: Vec<usize>,
}

/// How a monetary summary field is read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    Label(LabelGrammar),
    Figures(FigureLayout),
}

/// Grammars for every summary field of a variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldGrammars {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_date: Option<LabelGrammar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<LabelGrammar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_amount_due: Option<LabelGrammar>,
    pub previous_balance: FieldRule,
    pub total_credits: FieldRule,
    pub total_debits: FieldRule,
    pub ending_balance: FieldRule,
    /// Optional on the statement itself: a missing label is not an error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unbilled_installment_amount: Option<LabelGrammar>,
}

/// Format of the date tokens captured by a transaction grammar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum DateToken {
    /// `Oct04`: year taken from the statement date
    MonthDay,
    /// `OCTOBER4,2025`
    MonthDayYear,
    /// Fixed-width numeric token parsed with a chrono format string
    Numeric { pattern: String },
}

/// A line-oriented transaction grammar.
///
/// Recognised capture groups: `date`, `post`, `reference`, `desc`, `amount`,
/// and for installment rows `last_payment` and `balance`. A `post` group makes
/// card transactions, a `reference` group savings transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGrammar {
    pub pattern: String,
    pub date_token: DateToken,
}

/// A transaction line that occurs at most once and is searched for in the
/// whole text. Without a `date` group the transaction is dated at the
/// statement date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleLineRule {
    pub pattern: String,
    /// Description given to the produced transaction
    pub description: String,
    /// Leave the line out when its amount is zero
    #[serde(default)]
    pub skip_zero: bool,
}

/// Which match of a [`RegionStart`] pattern the region is cut at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartAnchor {
    /// Keep the text after the last match
    #[default]
    AfterLast,
    /// Keep the text between the first match and the next one, or the end
    /// of the region when the pattern occurs once
    Split,
}

/// Rule moving the start of the transaction region past a preamble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStart {
    pub pattern: String,
    /// Only applies when this pattern also occurs in the region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    #[serde(default)]
    pub anchor: StartAnchor,
}

/// Structural markers around the transaction listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionLayout {
    /// The listing is the text between the first and second match
    pub delimiter: String,
    /// Tried in order; the first applicable rule wins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub starts: Vec<RegionStart>,
    /// When no delimiter occurs, text ending with this pattern has no listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_trailer: Option<String>,
    /// Separates ordinary transactions from the installment sub-section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment_marker: Option<String>,
}

/// Everything needed to read the transaction listing of a variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLayout {
    pub region: RegionLayout,
    pub line: LineGrammar,
    /// Scanned in declaration order after the ordinary lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub singles: Vec<SingleLineRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment: Option<LineGrammar>,
}

/// Data description of one statement layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDescriptor {
    /// Registry key, e.g. `bpi-credit`
    pub key: String,
    pub name: String,
    /// Version of the printed layout these grammars were written against
    pub layout_version: String,
    pub kind: AccountKind,
    /// Pattern that must occur in the received text
    pub signature: String,
    #[serde(default)]
    pub normalization: Normalization,
    pub fields: FieldGrammars,
    pub transactions: TransactionLayout,
}

impl VariantDescriptor {
    /// Load a descriptor from TOML
    pub fn from_toml_str(source: &str) -> StatementResult<Self> {
        toml::from_str(source).map_err(|e| StatementError::InvalidLayout(e.to_string()))
    }

    /// Render the descriptor as TOML
    pub fn to_toml_string(&self) -> StatementResult<String> {
        toml::to_string_pretty(self).map_err(|e| StatementError::InvalidLayout(e.to_string()))
    }
}

/// A compiled variant, ready to be shared between engines
#[derive(Debug, Clone)]
pub struct Variant {
    descriptor: VariantDescriptor,
    signature: Regex,
    fields: FieldSet,
    transactions: TransactionExtractor,
}

impl Variant {
    /// Compile every grammar of a descriptor, failing with `InvalidLayout`
    /// on the first pattern or offset that does not hold up
    pub fn compile(descriptor: VariantDescriptor) -> StatementResult<Self> {
        if descriptor.kind == AccountKind::Credit {
            let grammars = &descriptor.fields;
            let required = [
                (StatementField::StatementDate, grammars.statement_date.is_some()),
                (StatementField::DueDate, grammars.due_date.is_some()),
                (
                    StatementField::MinimumAmountDue,
                    grammars.minimum_amount_due.is_some(),
                ),
            ];
            if let Some((field, _)) = required.iter().find(|(_, present)| !present) {
                return Err(StatementError::InvalidLayout(format!(
                    "credit variant {} has no {} grammar",
                    descriptor.key, field
                )));
            }
        }

        let signature = Regex::new(&descriptor.signature)
            .map_err(|e| StatementError::InvalidLayout(format!("signature: {e}")))?;
        let fields = FieldSet::compile(&descriptor.fields)?;
        let transactions = TransactionExtractor::compile(&descriptor.transactions)?;

        debug!(
            variant = %descriptor.key,
            layout_version = %descriptor.layout_version,
            "compiled statement variant"
        );

        Ok(Self {
            descriptor,
            signature,
            fields,
            transactions,
        })
    }

    pub fn descriptor(&self) -> &VariantDescriptor {
        &self.descriptor
    }

    pub fn key(&self) -> &str {
        &self.descriptor.key
    }

    pub fn kind(&self) -> AccountKind {
        self.descriptor.kind
    }

    /// Whether the text carries this variant's format signature
    pub fn is_statement(&self, text: &str) -> bool {
        self.signature.is_match(text)
    }

    /// Apply the variant's whitespace normalization
    pub fn preprocess(&self, text: &str) -> String {
        match self.descriptor.normalization {
            Normalization::None => text.to_string(),
            Normalization::RemoveSpaces => text.replace(' ', ""),
            Normalization::CollapseSpaces => {
                let mut out = String::with_capacity(text.len());
                let mut in_run = false;
                for c in text.chars() {
                    if c == ' ' || c == '\t' {
                        if !in_run {
                            out.push(' ');
                        }
                        in_run = true;
                    } else {
                        out.push(c);
                        in_run = false;
                    }
                }
                out
            }
        }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn transactions(&self) -> &TransactionExtractor {
        &self.transactions
    }
}

/// Compiled variants keyed by variant key
#[derive(Debug, Clone, Default)]
pub struct VariantRegistry {
    variants: HashMap<String, Arc<Variant>>,
}

impl VariantRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in layout
    pub fn with_builtins() -> StatementResult<Self> {
        let mut registry = Self::new();
        registry.register(bpi::descriptor())?;
        Ok(registry)
    }

    /// Compile and register a descriptor, replacing any variant with the
    /// same key
    pub fn register(&mut self, descriptor: VariantDescriptor) -> StatementResult<Arc<Variant>> {
        let variant = Arc::new(Variant::compile(descriptor)?);
        self.variants
            .insert(variant.key().to_string(), Arc::clone(&variant));
        Ok(variant)
    }

    pub fn get(&self, key: &str) -> StatementResult<Arc<Variant>> {
        self.variants
            .get(key)
            .cloned()
            .ok_or_else(|| StatementError::UnknownVariant(key.to_string()))
    }

    /// Registered keys in sorted order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.variants.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAVINGS_TOML: &str = r#"
key = "demo-savings"
name = "Demo Savings"
layout_version = "1"
kind = "savings"
signature = "Account Summary"
normalization = "collapse_spaces"

[fields.previous_balance]
rule = "label"
pattern = 'Opening Balance (?P<value>{amount})'

[fields.total_credits]
rule = "label"
pattern = 'Total Credits (?P<value>{amount})'

[fields.total_debits]
rule = "label"
pattern = 'Total Debits (?P<value>{amount})'

[fields.ending_balance]
rule = "label"
pattern = 'Closing Balance (?P<value>{amount})'

[transactions.region]
delimiter = 'Transaction History\n'

[transactions.line]
pattern = '(?P<date>\d{4}-\d{2}-\d{2}) (?P<reference>REF\d+) (?P<desc>.+?) (?P<amount>-?{amount})'

[transactions.line.date_token]
format = "numeric"
pattern = "%Y-%m-%d"
"#;

    #[test]
    fn test_descriptor_from_toml() {
        let descriptor = VariantDescriptor::from_toml_str(SAVINGS_TOML).unwrap();
        assert_eq!(descriptor.key, "demo-savings");
        assert_eq!(descriptor.kind, AccountKind::Savings);
        assert_eq!(descriptor.normalization, Normalization::CollapseSpaces);
        assert!(descriptor.fields.statement_date.is_none());
        assert_eq!(
            descriptor.transactions.line.date_token,
            DateToken::Numeric {
                pattern: "%Y-%m-%d".to_string()
            }
        );

        let variant = Variant::compile(descriptor).unwrap();
        assert_eq!(variant.key(), "demo-savings");
    }

    #[test]
    fn test_descriptor_toml_round_trip() {
        let descriptor = bpi::descriptor();
        let rendered = descriptor.to_toml_string().unwrap();
        assert_eq!(VariantDescriptor::from_toml_str(&rendered).unwrap(), descriptor);
    }

    #[test]
    fn test_region_start_anchor_defaults_to_after_last() {
        let source = SAVINGS_TOML.replace(
            "[transactions.line]\n",
            "[[transactions.region.starts]]\npattern = 'Opening'\n\n\
             [[transactions.region.starts]]\npattern = 'Carried'\nanchor = \"split\"\n\n\
             [transactions.line]\n",
        );
        let descriptor = VariantDescriptor::from_toml_str(&source).unwrap();
        let anchors: Vec<StartAnchor> = descriptor
            .transactions
            .region
            .starts
            .iter()
            .map(|start| start.anchor)
            .collect();
        assert_eq!(anchors, vec![StartAnchor::AfterLast, StartAnchor::Split]);
    }

    #[test]
    fn test_malformed_toml_is_invalid_layout() {
        let err = VariantDescriptor::from_toml_str("key = ").unwrap_err();
        assert!(matches!(err, StatementError::InvalidLayout(_)));
    }

    #[test]
    fn test_credit_variant_requires_dates() {
        let mut descriptor = bpi::descriptor();
        descriptor.fields.due_date = None;

        let err = Variant::compile(descriptor).unwrap_err();
        assert!(matches!(err, StatementError::InvalidLayout(ref msg) if msg.contains("Due Date")));
    }

    #[test]
    fn test_bad_signature_is_invalid_layout() {
        let mut descriptor = bpi::descriptor();
        descriptor.signature = "Statement of (Account".to_string();
        assert!(matches!(
            Variant::compile(descriptor),
            Err(StatementError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_preprocess() {
        let mut descriptor = VariantDescriptor::from_toml_str(SAVINGS_TOML).unwrap();
        let collapse = Variant::compile(descriptor.clone()).unwrap();
        assert_eq!(
            collapse.preprocess("Opening  Balance \t 1,000.00\nNext"),
            "Opening Balance 1,000.00\nNext"
        );

        descriptor.normalization = Normalization::RemoveSpaces;
        let remove = Variant::compile(descriptor.clone()).unwrap();
        assert_eq!(
            remove.preprocess("Opening  Balance 1,000.00\nNext line"),
            "OpeningBalance1,000.00\nNextline"
        );

        descriptor.normalization = Normalization::None;
        let keep = Variant::compile(descriptor).unwrap();
        assert_eq!(keep.preprocess("a  b"), "a  b");
    }

    #[test]
    fn test_registry() {
        let mut registry = VariantRegistry::with_builtins().unwrap();
        assert_eq!(registry.keys(), vec!["bpi-credit"]);
        assert_eq!(registry.get("bpi-credit").unwrap().kind(), AccountKind::Credit);
        assert_eq!(
            registry.get("nonexistent").unwrap_err(),
            StatementError::UnknownVariant("nonexistent".to_string())
        );

        registry
            .register(VariantDescriptor::from_toml_str(SAVINGS_TOML).unwrap())
            .unwrap();
        assert_eq!(registry.keys(), vec!["bpi-credit", "demo-savings"]);
    }
}
