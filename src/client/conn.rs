//! Execution target of a delegate: the shared pool or an open transaction.

use sqlx::{postgres::PgRow, Connection, PgConnection, PgPool, Postgres, QueryBuilder, Transaction};

use super::error::ClientResult;
use super::model::Model;

pub(crate) enum Conn<'a> {
    Pool(&'a PgPool),
    Tx(&'a mut PgConnection),
}

impl<'a> Conn<'a> {
    pub(crate) async fn fetch_all<M: Model>(
        &mut self,
        qb: &mut QueryBuilder<'_, Postgres>,
    ) -> ClientResult<Vec<M>> {
        let query = qb.build_query_as::<M>();
        let rows = match self {
            Conn::Pool(pool) => query.fetch_all(*pool).await?,
            Conn::Tx(conn) => query.fetch_all(&mut **conn).await?,
        };
        Ok(rows)
    }

    pub(crate) async fn fetch_optional<M: Model>(
        &mut self,
        qb: &mut QueryBuilder<'_, Postgres>,
    ) -> ClientResult<Option<M>> {
        let query = qb.build_query_as::<M>();
        let row = match self {
            Conn::Pool(pool) => query.fetch_optional(*pool).await?,
            Conn::Tx(conn) => query.fetch_optional(&mut **conn).await?,
        };
        Ok(row)
    }

    pub(crate) async fn fetch_one<M: Model>(
        &mut self,
        qb: &mut QueryBuilder<'_, Postgres>,
    ) -> ClientResult<M> {
        let query = qb.build_query_as::<M>();
        let row = match self {
            Conn::Pool(pool) => query.fetch_one(*pool).await?,
            Conn::Tx(conn) => query.fetch_one(&mut **conn).await?,
        };
        Ok(row)
    }

    pub(crate) async fn fetch_rows(
        &mut self,
        qb: &mut QueryBuilder<'_, Postgres>,
    ) -> ClientResult<Vec<PgRow>> {
        let query = qb.build();
        let rows = match self {
            Conn::Pool(pool) => query.fetch_all(*pool).await?,
            Conn::Tx(conn) => query.fetch_all(&mut **conn).await?,
        };
        Ok(rows)
    }

    pub(crate) async fn fetch_one_row(
        &mut self,
        qb: &mut QueryBuilder<'_, Postgres>,
    ) -> ClientResult<PgRow> {
        let query = qb.build();
        let row = match self {
            Conn::Pool(pool) => query.fetch_one(*pool).await?,
            Conn::Tx(conn) => query.fetch_one(&mut **conn).await?,
        };
        Ok(row)
    }

    /// Run a statement and return the number of affected rows.
    pub(crate) async fn execute(&mut self, qb: &mut QueryBuilder<'_, Postgres>) -> ClientResult<u64> {
        let query = qb.build();
        let result = match self {
            Conn::Pool(pool) => query.execute(*pool).await?,
            Conn::Tx(conn) => query.execute(&mut **conn).await?,
        };
        Ok(result.rows_affected())
    }

    /// Open a transaction, or a savepoint when already inside one.
    pub(crate) async fn begin(&mut self) -> ClientResult<Transaction<'_, Postgres>> {
        let tx = match self {
            Conn::Pool(pool) => pool.begin().await?,
            Conn::Tx(conn) => conn.begin().await?,
        };
        Ok(tx)
    }
}
