//! Connection and transaction lifecycle shared by every repository.
//!
//! Repositories never talk to the pool directly for multi-statement work.
//! They open a [`Transaction`] at an explicit [`Isolation`] level, mark it
//! for commit once every statement succeeded, and hand the outcome to
//! [`Transaction::finish`], which commits or rolls back exactly once.
//! A transaction dropped without `finish` (panic, cancelled future) is
//! rolled back by SeaORM.

use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait};

use crate::error::{DbResultExt, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// Plain reads where slightly stale data is acceptable.
    ReadCommitted,
    /// Read-modify-write sequences that must not interleave.
    Serializable,
}

impl From<Isolation> for IsolationLevel {
    fn from(isolation: Isolation) -> Self {
        match isolation {
            Isolation::ReadCommitted => IsolationLevel::ReadCommitted,
            Isolation::Serializable => IsolationLevel::Serializable,
        }
    }
}

#[derive(Clone)]
pub(crate) struct Store {
    conn: Arc<DatabaseConnection>,
}

impl Store {
    pub(crate) fn new(conn: Arc<DatabaseConnection>) -> Self {
        Self { conn }
    }

    /// Pooled connection for single-statement work. The pool takes the
    /// underlying connection back when the statement completes.
    pub(crate) fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    pub(crate) async fn begin(
        &self,
        operation: &'static str,
        isolation: Isolation,
    ) -> Result<Transaction> {
        let txn = self
            .conn
            .begin_with_config(Some(isolation.into()), None)
            .await
            .context(format!("{}: starting transaction", operation))?;

        Ok(Transaction {
            txn,
            operation,
            commit: false,
        })
    }
}

pub(crate) struct Transaction {
    txn: DatabaseTransaction,
    operation: &'static str,
    commit: bool,
}

impl Transaction {
    pub(crate) fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Requests a commit when the transaction is finished.
    pub(crate) fn mark_commit(&mut self) {
        self.commit = true;
    }

    /// Commits if the body succeeded and asked for a commit, otherwise rolls
    /// back. The body's error wins over a rollback error.
    pub(crate) async fn finish<T>(self, result: Result<T>) -> Result<T> {
        let Self {
            txn,
            operation,
            commit,
        } = self;

        match result {
            Ok(value) if commit => {
                txn.commit()
                    .await
                    .context(format!("{}: committing transaction", operation))?;
                Ok(value)
            }
            Ok(value) => {
                txn.rollback()
                    .await
                    .context(format!("{}: rolling back transaction", operation))?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = txn.rollback().await {
                    tracing::warn!(
                        operation,
                        error = %rollback_error,
                        "Failed to roll back transaction"
                    );
                }
                Err(error)
            }
        }
    }
}
