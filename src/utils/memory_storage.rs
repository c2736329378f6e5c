//! In-memory collaborators for testing and development

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Clone)]
struct StoredDocument {
    text: String,
    password: Option<String>,
}

/// In-memory text source keyed by document handle
#[derive(Debug, Clone, Default)]
pub struct MemoryTextSource {
    documents: Arc<RwLock<HashMap<String, StoredDocument>>>,
}

impl MemoryTextSource {
    /// Create an empty text source
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an unencrypted document
    pub fn insert(&self, handle: &str, text: &str) -> StatementResult<()> {
        self.store(handle, text, None)
    }

    /// Register a document that only opens with the given password
    pub fn insert_encrypted(&self, handle: &str, text: &str, password: &str) -> StatementResult<()> {
        self.store(handle, text, Some(password.to_string()))
    }

    fn store(&self, handle: &str, text: &str, password: Option<String>) -> StatementResult<()> {
        self.documents
            .write()
            .map_err(|e| StatementError::Io(e.to_string()))?
            .insert(
                handle.to_string(),
                StoredDocument {
                    text: text.to_string(),
                    password,
                },
            );
        Ok(())
    }
}

#[async_trait]
impl TextSource for MemoryTextSource {
    async fn extract_text(
        &self,
        handle: &str,
        credentials: Option<&str>,
    ) -> StatementResult<String> {
        let documents = self
            .documents
            .read()
            .map_err(|e| StatementError::Io(e.to_string()))?;
        let document = documents
            .get(handle)
            .ok_or_else(|| StatementError::Io(format!("Document does not exist: {handle}")))?;

        match (&document.password, credentials) {
            (None, _) => Ok(document.text.clone()),
            (Some(expected), Some(given)) if expected == given => Ok(document.text.clone()),
            _ => Err(StatementError::Io(format!("Cannot decrypt document: {handle}"))),
        }
    }
}

/// In-memory exporter that keeps every accepted statement
#[derive(Debug, Clone, Default)]
pub struct MemoryExporter {
    statements: Arc<RwLock<Vec<Statement>>>,
}

impl MemoryExporter {
    /// Create an empty exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements exported so far, in export order
    pub fn exported(&self) -> Vec<Statement> {
        self.statements
            .read()
            .map(|statements| statements.clone())
            .unwrap_or_default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        if let Ok(mut statements) = self.statements.write() {
            statements.clear();
        }
    }
}

#[async_trait]
impl StatementExporter for MemoryExporter {
    async fn export_statement(&mut self, statement: &Statement) -> StatementResult<()> {
        ensure_reconciled(statement)?;
        self.statements
            .write()
            .map_err(|e| StatementError::Io(e.to_string()))?
            .push(statement.clone());
        Ok(())
    }
}
