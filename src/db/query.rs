use tokio_postgres::GenericClient;

use crate::prelude::*;


/// Returns the names of all tables in the `public` schema, sorted by name.
pub(super) async fn public_tables(db: &impl GenericClient) -> Result<Vec<String>> {
    let rows = db.query_raw(
            "select tablename::text from pg_catalog.pg_tables \
                where schemaname = 'public' \
                order by tablename",
            dbargs![],
        )
        .await?
        .map_ok(|row| row.get::<_, String>(0));

    Ok(rows.try_collect().await?)
}

/// Checks whether `public.<table_name>` exists.
pub(super) async fn table_exists(db: &impl GenericClient, table_name: &str) -> Result<bool> {
    let row = db.query_one(
        "select to_regclass('public.' || quote_ident($1)) is not null",
        &[&table_name],
    ).await?;

    Ok(row.get::<_, bool>(0))
}
