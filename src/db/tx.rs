use std::{ops::Deref, sync::{Arc, atomic::{AtomicU32, Ordering}}};
use postgres_types::{BorrowToSql, ToSql};
use tokio_postgres::{Error, Row, RowStream};

use crate::prelude::*;
use super::util::FromDb;


/// A database transaction that has been started for one API request.
///
/// All queries go through the connection's statement cache and are counted,
/// so that the request log line can report how many queries were needed.
pub(crate) struct Transaction {
    inner: Arc<deadpool_postgres::Transaction<'static>>,
    num_queries: AtomicU32,
}

impl Transaction {
    pub(crate) fn new(inner: Arc<deadpool_postgres::Transaction<'static>>) -> Self {
        Self { inner, num_queries: AtomicU32::new(0) }
    }

    pub(crate) fn num_queries(&self) -> u32 {
        self.num_queries.load(Ordering::Relaxed)
    }

    async fn prepare(&self, query: &str) -> Result<tokio_postgres::Statement, Error> {
        trace!("Executing SQL query: \"{}\"", query);
        let statement = self.inner.prepare_cached(query).await?;
        self.num_queries.fetch_add(1, Ordering::Relaxed);
        Ok(statement)
    }

    // The following methods shadow the ones from `deadpool_postgres::Transaction`
    // so that the statement cache is always used. The few queries we run are
    // all static strings (apart from the per-kind table name), so the cache
    // stays small.

    pub(crate) async fn query_one(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, Error> {
        let statement = self.prepare(query).await?;
        self.inner.query_one(&statement, params).await
    }

    pub(crate) async fn query_opt(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Error> {
        let statement = self.prepare(query).await?;
        self.inner.query_opt(&statement, params).await
    }

    pub(crate) async fn query_raw<P, I>(&self, query: &str, params: I) -> Result<RowStream, Error>
    where
        P: BorrowToSql,
        I: IntoIterator<Item = P> + std::fmt::Debug,
        I::IntoIter: ExactSizeIterator,
    {
        trace!("SQL parameters: {:?}", params);
        let statement = self.prepare(query).await?;
        self.inner.query_raw(&statement, params).await
    }

    /// Runs the query and converts every row with `T::from_row`.
    pub(crate) async fn query_mapped<T, P, I>(&self, query: &str, params: I) -> Result<Vec<T>, Error>
    where
        T: FromDb,
        P: BorrowToSql,
        I: IntoIterator<Item = P> + std::fmt::Debug,
        I::IntoIter: ExactSizeIterator,
    {
        self.query_raw(query, params).await?
            .map_ok(|row| T::from_row(&row))
            .try_collect()
            .await
    }

    /// Like `query_opt`, but converts the row with `T::from_row`.
    pub(crate) async fn query_opt_mapped<T: FromDb>(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<T>, Error> {
        self.query_opt(query, params).await
            .map(|row| row.map(|row| T::from_row(&row)))
    }
}

impl Deref for Transaction {
    type Target = deadpool_postgres::Transaction<'static>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
