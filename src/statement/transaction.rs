//! Transaction list extraction
//!
//! The listing is located structurally (a delimiter, an optional preamble and
//! an optional installment sub-section) and then read line by line with the
//! variant's grammars. Optional single-occurrence lines such as payments and
//! charges are searched for in the whole text.

use bigdecimal::Zero;
use chrono::NaiveDate;
use regex::{Captures, Regex};
use tracing::debug;

use super::fields::{compile_pattern, has_group};
use crate::types::*;
use crate::utils::amount::parse_amount;
use crate::utils::date::{parse_numeric_date, repair_date, repair_month_day};
use crate::variant::{
    DateToken, LineGrammar, RegionLayout, SingleLineRule, StartAnchor, TransactionLayout,
};

const DATE: &str = "date";
const POST: &str = "post";
const REFERENCE: &str = "reference";
const DESCRIPTION: &str = "desc";
const AMOUNT: &str = "amount";
const LAST_PAYMENT: &str = "last_payment";
const BALANCE: &str = "balance";

/// The located parts of a transaction listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Listing<'t> {
    /// Ordinary transaction lines
    pub ordinary: &'t str,
    /// Installment sub-section, when the listing has one
    pub installment: Option<&'t str>,
}

/// Transactions produced by one extraction pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTransactions {
    /// Ordinary lines in document order, followed by single-occurrence lines
    pub ordinary: Vec<Transaction>,
    pub installments: Vec<Transaction>,
}

#[derive(Debug, Clone)]
struct RegionStartRule {
    pattern: Regex,
    guard: Option<Regex>,
    anchor: StartAnchor,
}

impl RegionStartRule {
    /// The part of `segment` this rule keeps, or `None` when the pattern
    /// does not occur
    fn apply<'t>(&self, segment: &'t str) -> Option<&'t str> {
        match self.anchor {
            StartAnchor::AfterLast => {
                let last = self.pattern.find_iter(segment).last()?;
                Some(&segment[last.end()..])
            }
            StartAnchor::Split => {
                let mut found = self.pattern.find_iter(segment);
                let first = found.next()?;
                let end = found.next().map_or(segment.len(), |m| m.start());
                Some(&segment[first.end()..end])
            }
        }
    }
}

#[derive(Debug, Clone)]
struct RegionFinder {
    delimiter: Regex,
    starts: Vec<RegionStartRule>,
    empty_trailer: Option<Regex>,
    installment_marker: Option<Regex>,
}

impl RegionFinder {
    fn compile(layout: &RegionLayout) -> StatementResult<Self> {
        let starts = layout
            .starts
            .iter()
            .map(|start| -> StatementResult<RegionStartRule> {
                Ok(RegionStartRule {
                    pattern: compile_pattern(&start.pattern)?,
                    guard: start.guard.as_deref().map(compile_pattern).transpose()?,
                    anchor: start.anchor,
                })
            })
            .collect::<StatementResult<Vec<_>>>()?;

        Ok(Self {
            delimiter: compile_pattern(&layout.delimiter)?,
            starts,
            empty_trailer: layout.empty_trailer.as_deref().map(compile_pattern).transpose()?,
            installment_marker: layout
                .installment_marker
                .as_deref()
                .map(compile_pattern)
                .transpose()?,
        })
    }

    fn locate<'t>(&self, text: &'t str) -> StatementResult<Listing<'t>> {
        let mut delimiters = self.delimiter.find_iter(text);
        let Some(first) = delimiters.next() else {
            if self.has_no_listing(text) {
                debug!("no transaction listing in statement");
                return Ok(Listing::default());
            }
            return Err(StatementError::FieldNotFound(StatementField::TransactionRegion));
        };
        let end = delimiters.next().map_or(text.len(), |m| m.start());
        let segment = self.skip_preamble(&text[first.end()..end]);

        let listing = match self.installment_marker.as_ref().and_then(|m| m.find(segment)) {
            Some(marker) => Listing {
                ordinary: &segment[..marker.start()],
                installment: Some(&segment[marker.end()..]),
            },
            None => Listing {
                ordinary: segment,
                installment: None,
            },
        };
        Ok(listing)
    }

    fn skip_preamble<'t>(&self, segment: &'t str) -> &'t str {
        for rule in &self.starts {
            if rule.guard.as_ref().is_some_and(|g| !g.is_match(segment)) {
                continue;
            }
            if let Some(kept) = rule.apply(segment) {
                return kept;
            }
        }
        segment
    }

    /// A statement without a listing ends with the trailer line
    fn has_no_listing(&self, text: &str) -> bool {
        let Some(trailer) = &self.empty_trailer else {
            return false;
        };
        let trimmed = text.trim_end();
        trailer
            .find_iter(trimmed)
            .last()
            .is_some_and(|m| m.end() == trimmed.len())
    }
}

fn resolve_date(
    token: &DateToken,
    raw: &str,
    statement_date: Option<NaiveDate>,
) -> StatementResult<NaiveDate> {
    match token {
        DateToken::MonthDay => {
            let statement_date =
                statement_date.ok_or(StatementError::FieldNotFound(StatementField::StatementDate))?;
            repair_month_day(raw.trim(), statement_date)
        }
        DateToken::MonthDayYear => repair_date(raw),
        DateToken::Numeric { pattern } => parse_numeric_date(raw.trim(), pattern),
    }
}

fn require_groups(re: &Regex, groups: &[&str], what: &str) -> StatementResult<()> {
    match groups.iter().find(|g| !has_group(re, g)) {
        Some(missing) => Err(StatementError::InvalidLayout(format!(
            "{what} pattern has no `{missing}` group"
        ))),
        None => Ok(()),
    }
}

/// A compiled line grammar producing card or savings transactions
#[derive(Debug, Clone)]
struct LineExtractor {
    pattern: Regex,
    date_token: DateToken,
}

impl LineExtractor {
    fn compile(pattern: &str, date_token: &DateToken) -> StatementResult<Self> {
        Ok(Self {
            pattern: compile_pattern(pattern)?,
            date_token: date_token.clone(),
        })
    }

    fn date(
        &self,
        caps: &Captures<'_>,
        group: &str,
        statement_date: Option<NaiveDate>,
    ) -> StatementResult<Option<NaiveDate>> {
        caps.name(group)
            .map(|m| resolve_date(&self.date_token, m.as_str(), statement_date))
            .transpose()
    }

    /// Build a transaction from one match. Without a `date` group the
    /// transaction is dated at the statement date; without a `post` group the
    /// post date is the transaction date.
    fn transaction(
        &self,
        caps: &Captures<'_>,
        statement_date: Option<NaiveDate>,
        description: Option<&str>,
    ) -> StatementResult<Transaction> {
        let date = match self.date(caps, DATE, statement_date)? {
            Some(date) => date,
            None => statement_date
                .ok_or(StatementError::FieldNotFound(StatementField::StatementDate))?,
        };
        let amount = parse_amount(&caps[AMOUNT])?;
        let description = description
            .or_else(|| caps.name(DESCRIPTION).map(|m| m.as_str()))
            .unwrap_or_default()
            .to_string();

        if let Some(reference) = caps.name(REFERENCE) {
            return Ok(Transaction::savings(
                date,
                description,
                amount,
                reference.as_str().to_string(),
            ));
        }

        let post_date = self.date(caps, POST, statement_date)?.unwrap_or(date);
        Ok(Transaction::card(date, description, amount, post_date))
    }

    fn installment(
        &self,
        caps: &Captures<'_>,
        statement_date: Option<NaiveDate>,
    ) -> StatementResult<Transaction> {
        let date = resolve_date(&self.date_token, &caps[DATE], statement_date)?;
        let last_payment_date = resolve_date(&self.date_token, &caps[LAST_PAYMENT], statement_date)?;

        Ok(Transaction::installment(
            date,
            caps[DESCRIPTION].to_string(),
            parse_amount(&caps[AMOUNT])?,
            last_payment_date,
            parse_amount(&caps[BALANCE])?,
        ))
    }
}

#[derive(Debug, Clone)]
struct SingleExtractor {
    line: LineExtractor,
    description: String,
    skip_zero: bool,
}

/// Compiled transaction grammars of a variant
#[derive(Debug, Clone)]
pub struct TransactionExtractor {
    region: RegionFinder,
    line: LineExtractor,
    singles: Vec<SingleExtractor>,
    installment: Option<LineExtractor>,
}

impl TransactionExtractor {
    pub fn compile(layout: &TransactionLayout) -> StatementResult<Self> {
        let line = LineExtractor::compile(&layout.line.pattern, &layout.line.date_token)?;
        require_groups(&line.pattern, &[DATE, DESCRIPTION, AMOUNT], "transaction line")?;

        let singles = layout
            .singles
            .iter()
            .map(|rule: &SingleLineRule| -> StatementResult<SingleExtractor> {
                let single = LineExtractor::compile(&rule.pattern, &layout.line.date_token)?;
                require_groups(&single.pattern, &[AMOUNT], &rule.description)?;
                Ok(SingleExtractor {
                    line: single,
                    description: rule.description.clone(),
                    skip_zero: rule.skip_zero,
                })
            })
            .collect::<StatementResult<Vec<_>>>()?;

        let installment = layout
            .installment
            .as_ref()
            .map(|grammar: &LineGrammar| -> StatementResult<LineExtractor> {
                let extractor = LineExtractor::compile(&grammar.pattern, &grammar.date_token)?;
                require_groups(
                    &extractor.pattern,
                    &[DATE, LAST_PAYMENT, DESCRIPTION, AMOUNT, BALANCE],
                    "installment line",
                )?;
                Ok(extractor)
            })
            .transpose()?;

        Ok(Self {
            region: RegionFinder::compile(&layout.region)?,
            line,
            singles,
            installment,
        })
    }

    /// Locate the transaction listing in normalized text
    pub fn listing<'t>(&self, text: &'t str) -> StatementResult<Listing<'t>> {
        self.region.locate(text)
    }

    /// Extract every transaction from normalized text.
    ///
    /// A region that holds any text, whitespace included, but yields no
    /// match is an error; an empty region is not.
    pub fn extract(
        &self,
        text: &str,
        statement_date: Option<NaiveDate>,
    ) -> StatementResult<ExtractedTransactions> {
        let listing = self.listing(text)?;
        let mut out = ExtractedTransactions::default();

        if !listing.ordinary.is_empty() {
            for caps in self.line.pattern.captures_iter(listing.ordinary) {
                out.ordinary
                    .push(self.line.transaction(&caps, statement_date, None)?);
            }
            if out.ordinary.is_empty() {
                return Err(StatementError::NoTransactionsMatched(
                    "transaction region".to_string(),
                ));
            }
        }

        for single in &self.singles {
            let Some(caps) = single.line.pattern.captures(text) else {
                continue;
            };
            let txn = single
                .line
                .transaction(&caps, statement_date, Some(&single.description))?;
            if single.skip_zero && txn.amount.is_zero() {
                debug!(description = %single.description, "skipping zero amount line");
                continue;
            }
            out.ordinary.push(txn);
        }

        if let (Some(grammar), Some(region)) = (&self.installment, listing.installment) {
            if !region.is_empty() {
                for caps in grammar.pattern.captures_iter(region) {
                    out.installments.push(grammar.installment(&caps, statement_date)?);
                }
                if out.installments.is_empty() {
                    return Err(StatementError::NoTransactionsMatched(
                        "installment region".to_string(),
                    ));
                }
            }
        }

        debug!(
            ordinary = out.ordinary.len(),
            installments = out.installments.len(),
            "transaction extraction finished"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::bpi;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn statement_date() -> Option<NaiveDate> {
        Some(date(2025, 10, 30))
    }

    fn extractor() -> TransactionExtractor {
        TransactionExtractor::compile(&bpi::descriptor().transactions).unwrap()
    }

    #[test]
    fn test_listing_between_delimiters() {
        let text = "header\n123456-7-89-0123456-JUANDELACRUZ\nOct04Oct06SHOP100.00\n\
                    654321-7-89-0123456-OTHER\nfooter";
        let listing = extractor().listing(text).unwrap();
        assert_eq!(listing.ordinary, "Oct04Oct06SHOP100.00\n");
        assert_eq!(listing.installment, None);
    }

    #[test]
    fn test_listing_skips_installment_preamble() {
        let amortization = "123456-7-89-0123456-JUAN\nInstallmentAmortization:\nOct04Oct06SHOP100.00\n";
        assert_eq!(
            extractor().listing(amortization).unwrap().ordinary,
            "\nOct04Oct06SHOP100.00\n"
        );

        let purchase = "123456-7-89-0123456-JUAN\nInstallmentPurchase:\n\
                        Mar15Mar15LAPTOPSTORE:(12Mos.)12,000.00\nOct04Oct06SHOP100.00\n";
        assert_eq!(
            extractor().listing(purchase).unwrap().ordinary,
            "\nOct04Oct06SHOP100.00\n"
        );
    }

    #[test]
    fn test_amortization_preamble_keeps_text_up_to_next_marker() {
        let text = "123456-7-89-0123456-JUAN\nInstallmentAmortization:\nOct04Oct06SHOP100.00\n\
                    InstallmentAmortization:\nOct05Oct07OTHER200.00\n";
        assert_eq!(
            extractor().listing(text).unwrap().ordinary,
            "\nOct04Oct06SHOP100.00\n"
        );

        let out = extractor().extract(text, statement_date()).unwrap();
        assert_eq!(out.ordinary.len(), 1);
        assert_eq!(out.ordinary[0].description, "SHOP");
    }

    #[test]
    fn test_purchase_preamble_skips_past_last_term() {
        let text = "123456-7-89-0123456-JUAN\nInstallmentPurchase:\n\
                    Mar15Mar15LAPTOPSTORE:(12Mos.)12,000.00\nOct04Oct06SHOP100.00\n\
                    Jun10Jun10PHONESHOP:(6Mos.)3,000.00\nOct05Oct07OTHER200.00\n";
        assert_eq!(
            extractor().listing(text).unwrap().ordinary,
            "\nOct05Oct07OTHER200.00\n"
        );
    }

    #[test]
    fn test_listing_splits_installment_section() {
        let text = "123456-7-89-0123456-JUAN\nOct04Oct06SHOP100.00\nS.I.P.BALANCESUMMARY\n\
                    031525101525LAPTOPSTORE1,000.009,000.00\n";
        let listing = extractor().listing(text).unwrap();
        assert_eq!(listing.ordinary, "Oct04Oct06SHOP100.00\n");
        assert_eq!(
            listing.installment,
            Some("\n031525101525LAPTOPSTORE1,000.009,000.00\n")
        );
    }

    #[test]
    fn test_missing_delimiter() {
        let err = extractor().listing("StatementofAccount\nnothing").unwrap_err();
        assert_eq!(
            err,
            StatementError::FieldNotFound(StatementField::TransactionRegion)
        );

        let listing = extractor()
            .listing("StatementofAccount\nUnbilledInstallmentAmount0.00\n")
            .unwrap();
        assert_eq!(listing, Listing::default());
    }

    #[test]
    fn test_extract_ordinary_lines() {
        let text = "123456-7-89-0123456-JUAN\n\
                    Oct04Oct06GRABFOODMANILA1,234.50\n\
                    Sep28Oct01NETFLIX.COM549.00\n";
        let out = extractor().extract(text, statement_date()).unwrap();

        assert_eq!(
            out.ordinary,
            vec![
                Transaction::card(
                    date(2025, 10, 4),
                    "GRABFOODMANILA".to_string(),
                    dec("1234.50"),
                    date(2025, 10, 6)
                ),
                Transaction::card(
                    date(2025, 9, 28),
                    "NETFLIX.COM".to_string(),
                    dec("549.00"),
                    date(2025, 10, 1)
                ),
            ]
        );
        assert!(out.installments.is_empty());
    }

    #[test]
    fn test_extract_keeps_time_suffix_in_description() {
        let text = "123456-7-89-0123456-JUAN\nOct04Oct06FOREIGNPURCHASE:10/04100.00\n";
        let out = extractor().extract(text, statement_date()).unwrap();
        assert_eq!(out.ordinary[0].description, "FOREIGNPURCHASE:10/04");
        assert_eq!(out.ordinary[0].amount, dec("100.00"));
    }

    #[test]
    fn test_unmatched_region_is_an_error() {
        let text = "123456-7-89-0123456-JUAN\nsomething that is not a transaction\n";
        assert_eq!(
            extractor().extract(text, statement_date()),
            Err(StatementError::NoTransactionsMatched(
                "transaction region".to_string()
            ))
        );
    }

    #[test]
    fn test_whitespace_only_region_is_an_error() {
        let text = "123456-7-89-0123456-JUAN\nInstallmentAmortization:\nS.I.P.BALANCESUMMARY\n\
                    031525101525LAPTOPSTORE1,000.009,000.00\n";
        assert_eq!(extractor().listing(text).unwrap().ordinary, "\n");
        assert_eq!(
            extractor().extract(text, statement_date()),
            Err(StatementError::NoTransactionsMatched(
                "transaction region".to_string()
            ))
        );

        let installment_only_whitespace = "123456-7-89-0123456-JUAN\nOct04Oct06SHOP100.00\n\
                                           S.I.P.BALANCESUMMARY\n";
        assert_eq!(
            extractor().extract(installment_only_whitespace, statement_date()),
            Err(StatementError::NoTransactionsMatched(
                "installment region".to_string()
            ))
        );
    }

    #[test]
    fn test_single_lines_follow_ordinary_lines() {
        let text = "StatementofAccount\n\
                    Oct10Oct10Payment-ThankYou-5,000.00\n\
                    Oct12Oct12LateCharges1,500.00\n\
                    FinanceCharge321.09\n\
                    123456-7-89-0123456-JUAN\n\
                    Oct04Oct06SHOP100.00\n";
        let out = extractor().extract(text, statement_date()).unwrap();

        let descriptions: Vec<&str> = out.ordinary.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, vec!["SHOP", "Payment", "Late Charges", "Finance Charges"]);
        assert_eq!(out.ordinary[1].amount, dec("-5000.00"));
        assert_eq!(out.ordinary[1].date, date(2025, 10, 10));
        assert_eq!(out.ordinary[2].amount, dec("1500.00"));
        assert_eq!(out.ordinary[3].date, date(2025, 10, 30));
        assert_eq!(out.ordinary[3].post_date(), Some(date(2025, 10, 30)));
    }

    #[test]
    fn test_zero_finance_charge_is_skipped() {
        let text = "FinanceCharge0.00\n123456-7-89-0123456-JUAN\n";
        let out = extractor().extract(text, statement_date()).unwrap();
        assert!(out.ordinary.is_empty());
    }

    #[test]
    fn test_single_line_with_malformed_amount_fails() {
        let text = "FinanceCharge01,000.00\n123456-7-89-0123456-JUAN\n";
        assert_eq!(
            extractor().extract(text, statement_date()),
            Err(StatementError::MalformedAmount("01,000.00".to_string()))
        );
    }

    #[test]
    fn test_installment_rows() {
        let text = "123456-7-89-0123456-JUAN\nOct04Oct06SHOP100.00\nS.I.P.BALANCESUMMARY\n\
                    031525101525LAPTOPSTORE1,000.009,000.00\n\
                    061025101025PHONESHOP500.002,500.00\n";
        let out = extractor().extract(text, statement_date()).unwrap();

        assert_eq!(out.ordinary.len(), 1);
        assert_eq!(
            out.installments,
            vec![
                Transaction::installment(
                    date(2025, 3, 15),
                    "LAPTOPSTORE".to_string(),
                    dec("1000.00"),
                    date(2025, 10, 15),
                    dec("9000.00")
                ),
                Transaction::installment(
                    date(2025, 6, 10),
                    "PHONESHOP".to_string(),
                    dec("500.00"),
                    date(2025, 10, 10),
                    dec("2500.00")
                ),
            ]
        );
    }

    #[test]
    fn test_month_day_without_statement_date() {
        let text = "123456-7-89-0123456-JUAN\nOct04Oct06SHOP100.00\n";
        assert_eq!(
            extractor().extract(text, None),
            Err(StatementError::FieldNotFound(StatementField::StatementDate))
        );
    }

    #[test]
    fn test_line_grammar_requires_amount_group() {
        let mut layout = bpi::descriptor().transactions;
        layout.line.pattern = r"(?P<date>\w+)(?P<desc>.+)".to_string();
        assert!(matches!(
            TransactionExtractor::compile(&layout),
            Err(StatementError::InvalidLayout(_))
        ));
    }
}
