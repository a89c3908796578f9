//! Typed data-access client over PostgreSQL.
//!
//! One [`Delegate`] per model exposes the full operation set (lookups, list
//! reads, writes, batch writes, counts, aggregates and group-by). Filters,
//! orderings and inputs are typed per model in [`crate::domain`].

mod aggregate;
mod args;
mod conn;
mod delegate;
mod error;
mod filter;
mod model;
mod transaction;
mod value;

use sqlx::PgPool;
use tracing::instrument;

use crate::domain::{Bid, CivilEngineeringDesign, ComplianceCheck, Material, Project, Task, User};
use conn::Conn;

pub use aggregate::{
    AggregateArgs, AggregateFn, AggregateResult, Aggregates, CountResult, CountSelection,
    GroupByArgs, GroupByRow, GroupOrderBy, Having, ScalarValue,
};
pub use args::{BatchPayload, FindManyArgs, NullsOrder, OrderBy, SortOrder};
pub use delegate::Delegate;
pub use error::{ClientError, ClientResult, KnownErrorCode};
pub use filter::{
    Clause, FieldFilter, Join, JsonFilter, ListRelationFilter, QueryMode, RelationFilter,
    ScalarFilter, StringFilter, StringListFilter,
};
pub use model::{
    CreateInput, FieldKind, Model, ScalarField, UniqueInput, UpdateInput, WhereInput,
};
pub use transaction::{operation, IsolationLevel, TransactionOptions, TxClient, TxOperation};
pub use value::{
    nullable, Assignment, Changes, DecimalOperation, DecimalUpdate, ListOperation, ListUpdate,
    SetExpr, Value, Values,
};

/// Entry point of the data-access client. Clones share one pool.
#[derive(Clone)]
pub struct Client {
    pool: PgPool,
    transaction_defaults: TransactionOptions,
}

impl Client {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            transaction_defaults: TransactionOptions::default(),
        }
    }

    /// Options used by `batch` and as the base for interactive transactions.
    pub fn with_transaction_defaults(mut self, options: TransactionOptions) -> Self {
        self.transaction_defaults = options;
        self
    }

    pub fn transaction_defaults(&self) -> TransactionOptions {
        self.transaction_defaults
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Eagerly check out a connection to verify the database is reachable.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> ClientResult<()> {
        self.pool
            .acquire()
            .await
            .map_err(|e| ClientError::Initialization(e.to_string()))?;
        tracing::debug!("Client connected");
        Ok(())
    }

    /// Close the pool. Later operations fail with an initialization error.
    pub async fn disconnect(&self) {
        self.pool.close().await;
        tracing::info!("Client disconnected");
    }

    pub fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    pub fn delegate<M: Model>(&self) -> Delegate<'_, M> {
        Delegate::new(Conn::Pool(&self.pool))
    }

    pub fn user(&self) -> Delegate<'_, User> {
        self.delegate()
    }

    pub fn project(&self) -> Delegate<'_, Project> {
        self.delegate()
    }

    pub fn bid(&self) -> Delegate<'_, Bid> {
        self.delegate()
    }

    pub fn material(&self) -> Delegate<'_, Material> {
        self.delegate()
    }

    pub fn task(&self) -> Delegate<'_, Task> {
        self.delegate()
    }

    pub fn design(&self) -> Delegate<'_, CivilEngineeringDesign> {
        self.delegate()
    }

    pub fn compliance_check(&self) -> Delegate<'_, ComplianceCheck> {
        self.delegate()
    }
}
