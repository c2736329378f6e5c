//! Statement parsing: field extraction, transaction extraction and the
//! engine that drives them

pub mod core;
pub mod fields;
pub mod transaction;

pub use self::core::*;
pub use fields::{AmountExtractor, FieldExtraction, FieldSet, FigureExtractor, LabelExtractor, SummaryFields};
pub use transaction::{ExtractedTransactions, Listing, TransactionExtractor};
