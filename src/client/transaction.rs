//! Interactive and batch transactions.

use futures::future::BoxFuture;
use sqlx::{PgConnection, Postgres, Transaction};
use std::time::Duration;
use tracing::{instrument, warn};

use super::conn::Conn;
use super::delegate::Delegate;
use super::error::{ClientError, ClientResult, KnownErrorCode};
use super::model::Model;
use super::Client;
use crate::domain::{Bid, CivilEngineeringDesign, ComplianceCheck, Material, Project, Task, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn statement(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED",
            Self::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            Self::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            Self::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    /// How long to wait for a connection and `BEGIN`.
    pub max_wait: Duration,
    /// Upper bound on the whole transaction body.
    pub timeout: Duration,
    pub isolation_level: Option<IsolationLevel>,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(2000),
            timeout: Duration::from_millis(5000),
            isolation_level: None,
        }
    }
}

impl TransactionOptions {
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }
}

/// Client handle bound to one open transaction.
pub struct TxClient {
    tx: Transaction<'static, Postgres>,
}

impl TxClient {
    /// The transaction's connection, for statements outside the model set.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    pub fn delegate<M: Model>(&mut self) -> Delegate<'_, M> {
        Delegate::new(Conn::Tx(&mut *self.tx))
    }

    pub fn user(&mut self) -> Delegate<'_, User> {
        self.delegate()
    }

    pub fn project(&mut self) -> Delegate<'_, Project> {
        self.delegate()
    }

    pub fn bid(&mut self) -> Delegate<'_, Bid> {
        self.delegate()
    }

    pub fn material(&mut self) -> Delegate<'_, Material> {
        self.delegate()
    }

    pub fn task(&mut self) -> Delegate<'_, Task> {
        self.delegate()
    }

    pub fn design(&mut self) -> Delegate<'_, CivilEngineeringDesign> {
        self.delegate()
    }

    pub fn compliance_check(&mut self) -> Delegate<'_, ComplianceCheck> {
        self.delegate()
    }
}

/// One step of a batch transaction.
pub type TxOperation<T> =
    Box<dyn for<'c> FnOnce(&'c mut TxClient) -> BoxFuture<'c, ClientResult<T>> + Send>;

/// Box a closure as a batch step.
pub fn operation<T, F>(f: F) -> TxOperation<T>
where
    F: for<'c> FnOnce(&'c mut TxClient) -> BoxFuture<'c, ClientResult<T>> + Send + 'static,
{
    Box::new(f)
}

impl Client {
    /// Run `f` inside one transaction.
    ///
    /// Commits when `f` succeeds and rolls back when it fails or runs past
    /// `options.timeout`.
    #[instrument(skip_all, fields(isolation = ?options.isolation_level))]
    pub async fn transaction<T, F>(&self, options: TransactionOptions, f: F) -> ClientResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut TxClient) -> BoxFuture<'c, ClientResult<T>> + Send,
    {
        let tx = match tokio::time::timeout(options.max_wait, self.pool().begin()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ClientError::known(
                    KnownErrorCode::TransactionStartTimeout,
                    format!(
                        "Unable to start a transaction in the given time ({} ms)",
                        options.max_wait.as_millis()
                    ),
                ))
            }
        };

        let mut client = TxClient { tx };
        if let Some(level) = options.isolation_level {
            sqlx::query(level.statement())
                .execute(&mut *client.tx)
                .await?;
        }

        let outcome = tokio::time::timeout(options.timeout, f(&mut client)).await;
        match outcome {
            Ok(Ok(value)) => {
                client.tx.commit().await?;
                Ok(value)
            }
            Ok(Err(err)) => {
                rollback(client).await;
                Err(err)
            }
            Err(_) => {
                rollback(client).await;
                Err(ClientError::known(
                    KnownErrorCode::TransactionTimeout,
                    format!(
                        "Transaction exceeded its timeout of {} ms and was rolled back",
                        options.timeout.as_millis()
                    ),
                ))
            }
        }
    }

    /// Run independent operations in order inside one transaction with the
    /// default options. Any failure rolls back all of them.
    pub async fn batch<T: Send + 'static>(
        &self,
        operations: Vec<TxOperation<T>>,
    ) -> ClientResult<Vec<T>> {
        self.transaction(self.transaction_defaults(), move |tx| {
            Box::pin(async move {
                let mut results = Vec::with_capacity(operations.len());
                for op in operations {
                    results.push(op(&mut *tx).await?);
                }
                Ok(results)
            })
        })
        .await
    }
}

async fn rollback(client: TxClient) {
    if let Err(e) = client.tx.rollback().await {
        warn!(error = %e, "Transaction rollback failed");
    }
}
