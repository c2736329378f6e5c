//! Traits for the collaborators around the statement engine

use async_trait::async_trait;

use crate::types::*;

/// Source of statement text.
///
/// Implementations turn a document handle (a path, an object key, an upload
/// id) and optional credentials into the document's text. The engine treats
/// the returned text as opaque and never inspects the document format.
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Extract the text of a document, failing with [`StatementError::Io`]
    async fn extract_text(
        &self,
        handle: &str,
        credentials: Option<&str>,
    ) -> StatementResult<String>;
}

/// Persistence for reconciled statements (spreadsheet, database, ...)
#[async_trait]
pub trait StatementExporter: Send + Sync {
    /// Persist a statement. Implementations must refuse statements whose
    /// `parsed` flag is not set.
    async fn export_statement(&mut self, statement: &Statement) -> StatementResult<()>;
}

/// Trait for implementing the acceptance rules of a parsed statement
pub trait StatementValidator: Send + Sync {
    /// Validate a fully extracted statement before it is committed
    fn validate_statement(&self, statement: &Statement) -> StatementResult<()>;
}

/// Default validator: both reconciliation identities must hold exactly
pub struct DefaultStatementValidator;

impl StatementValidator for DefaultStatementValidator {
    fn validate_statement(&self, statement: &Statement) -> StatementResult<()> {
        crate::reconciliation::reconcile(statement)
    }
}

/// Reject exports of statements that were never committed
pub fn ensure_reconciled(statement: &Statement) -> StatementResult<()> {
    if statement.parsed {
        Ok(())
    } else {
        Err(StatementError::NotReconciled(format!(
            "{} statement was rejected or never parsed",
            statement.variant
        )))
    }
}
