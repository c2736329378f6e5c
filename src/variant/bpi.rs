//! BPI credit card statement layout
//!
//! Text extracted from these statements has every space removed before
//! matching, so labels appear run together (`STATEMENTDATEOCTOBER4,2025`,
//! `PreviousBalance12,320.00`). The summary block prints a `Total` line of
//! seven figures: previous balance, payments, purchases and advances,
//! installment, finance charge, late charge, and the amount due.

use super::*;

/// Registry key of the built-in layout
pub const KEY: &str = "bpi-credit";

/// Layout version the grammars below were written against
pub const LAYOUT_VERSION: &str = "2025-10";

const DATE_TOKEN: &str = r"[A-Z]{3,9}\d\d?,20\d\d";
const MONTH_DAY: &str = r"[a-zA-Z]{3,9}\d{1,2}";

pub fn descriptor() -> VariantDescriptor {
    VariantDescriptor {
        key: KEY.to_string(),
        name: "BPI Credit Card".to_string(),
        layout_version: LAYOUT_VERSION.to_string(),
        kind: AccountKind::Credit,
        signature: "Statement of Account".to_string(),
        normalization: Normalization::RemoveSpaces,
        fields: FieldGrammars {
            statement_date: Some(LabelGrammar::new(format!(
                "STATEMENTDATE(?P<value>{DATE_TOKEN})"
            ))),
            due_date: Some(LabelGrammar::new(format!(
                "PAYMENTDUEDATE(?P<value>{DATE_TOKEN})"
            ))),
            minimum_amount_due: Some(LabelGrammar::new("MINIMUMAMOUNTDUE(?P<value>{amount})")),
            previous_balance: FieldRule::Label(LabelGrammar::new(
                "PreviousBalance(?P<value>{amount})",
            )),
            total_credits: FieldRule::Figures(FigureLayout {
                label: "Total".to_string(),
                figures: 7,
                offsets: vec![2, 3, 4, 5],
            }),
            total_debits: FieldRule::Figures(FigureLayout {
                label: "Total".to_string(),
                figures: 7,
                offsets: vec![1],
            }),
            ending_balance: FieldRule::Label(LabelGrammar::new(
                "TOTALAMOUNTDUE(?P<value>{amount})",
            )),
            unbilled_installment_amount: Some(LabelGrammar::new(
                "UnbilledInstallmentAmount(?P<value>{amount})",
            )),
        },
        transactions: TransactionLayout {
            region: RegionLayout {
                // card number followed by the cardholder name
                delimiter: r"\d{6}-\d-\d{2}-\d{7}-\S*\s".to_string(),
                starts: vec![
                    RegionStart {
                        pattern: "InstallmentAmortization:".to_string(),
                        guard: None,
                        anchor: StartAnchor::Split,
                    },
                    RegionStart {
                        pattern: r"\(\d{1,3}Mos\.\){amount}".to_string(),
                        guard: Some("InstallmentPurchase".to_string()),
                        anchor: StartAnchor::AfterLast,
                    },
                ],
                empty_trailer: Some("UnbilledInstallmentAmount{amount}".to_string()),
                installment_marker: Some(r"S\.I\.P\.BALANCESUMMARY".to_string()),
            },
            line: LineGrammar {
                pattern: format!(
                    r"(?P<date>{MONTH_DAY})(?P<post>{MONTH_DAY})(?P<desc>.+\D{{2}}(?::\d{{2}}/\d{{2}})?)(?P<amount>-?{{amount}})"
                ),
                date_token: DateToken::MonthDay,
            },
            singles: vec![
                SingleLineRule {
                    pattern: format!(
                        "(?P<date>{MONTH_DAY})(?P<post>{MONTH_DAY})Payment-ThankYou(?P<amount>-{{amount}})"
                    ),
                    description: "Payment".to_string(),
                    skip_zero: false,
                },
                SingleLineRule {
                    pattern: format!(
                        "(?P<date>{MONTH_DAY})(?P<post>{MONTH_DAY})LateCharges(?P<amount>{{amount}})"
                    ),
                    description: "Late Charges".to_string(),
                    skip_zero: false,
                },
                SingleLineRule {
                    pattern: "FinanceCharge(?P<amount>{amount})".to_string(),
                    description: "Finance Charges".to_string(),
                    skip_zero: true,
                },
            ],
            installment: Some(LineGrammar {
                pattern: r"(?P<date>\d{6})(?P<last_payment>\d{6})(?P<desc>.+\D{2})(?P<amount>{amount})(?P<balance>{amount})"
                    .to_string(),
                date_token: DateToken::Numeric {
                    pattern: "%m%d%y".to_string(),
                },
            }),
        },
    }
}
