use tokio_postgres::Row;


/// Helper macro to pass arguments to `query_raw` and similar calls.
///
/// Helps you with casting to `&dyn ToSql` and type inference. Note: use `[]` for
/// the macro invocation, e.g. `dbargs![]`.
macro_rules! dbargs {
    () => {
        [] as [&(dyn postgres_types::ToSql + Sync); 0]
    };
    ($($arg:expr),+ $(,)?) => {
        [$($arg as &(dyn postgres_types::ToSql + Sync)),+]
    };
}

pub(crate) use dbargs;


/// Types that can be built from one DB row.
///
/// `COLUMNS` is spliced into the `select` clause verbatim and `from_row` reads
/// the columns by name, so both have to agree. Unqualified column names are
/// used so that the selection also works on top of subqueries.
pub(crate) trait FromDb {
    const COLUMNS: &'static str;

    fn from_row(row: &Row) -> Self;
}
