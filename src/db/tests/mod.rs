use crate::{model::Key, prelude::*};
use super::query;

mod util;

pub(crate) use self::util::TestDb;


async fn applied_migrations(db: &TestDb) -> Result<i64> {
    let row = db.query_one("select count(*) from __db_migrations", &[]).await?;
    Ok(row.get::<_, i64>(0))
}


#[tokio::test(flavor = "multi_thread")]
async fn migrations_create_all_tables() -> Result<()> {
    let db = TestDb::with_migrations().await?;

    for table in [
        "products", "collections", "categories", "attributes", "attribute_values",
        "product_variants", "pages", "shipping_methods", "sales", "vouchers", "menu_items",
        "product_translations", "menu_item_translations", "voucher_translations",
        "apps", "webhooks", "webhook_events", "__db_migrations",
    ] {
        assert!(query::table_exists(&***db, table).await?, "table '{table}' missing");
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn migrating_twice_is_a_no_op() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let before = applied_migrations(&db).await?;
    assert!(before > 0);

    let mut conn = db.pool_conn().await?;
    crate::db::migrate(&mut conn).await?;
    assert_eq!(applied_migrations(&db).await?, before);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn translations_are_unique_per_language() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let product = db.add_product("Shirt", "shirt").await?;

    db.add_product_translation(product, "de", "Hemd").await?;
    db.add_product_translation(product, "fr", "Chemise").await?;
    assert!(db.add_product_translation(product, "de", "Oberteil").await.is_err());

    // Deleting the product removes its translations.
    db.execute("delete from products where id = $1", &[&product]).await?;
    let row = db.query_one("select count(*) from product_translations", &[]).await?;
    assert_eq!(row.get::<_, i64>(0), 0);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn webhook_events_belong_to_webhook() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let app = db.add_app("Shipping").await?;
    let webhook = db.add_webhook(app, "orders", &["order_created", "payment_capture"]).await?;

    let events = db.query("select event_type from webhook_events where webhook_id = $1", &[&webhook])
        .await?
        .into_iter()
        .map(|row| row.get::<_, String>(0))
        .collect::<Vec<_>>();
    assert_eq!(events, ["order_created", "payment_capture"]);

    db.execute("delete from apps where id = $1", &[&app]).await?;
    let row = db.query_one("select count(*) from webhook_events", &[]).await?;
    assert_eq!(row.get::<_, i64>(0), 0);

    // Check the key type round-trips through the DB.
    let key = db.add_app("Other").await?;
    let row = db.query_one("select id from apps where id = $1", &[&key]).await?;
    assert_eq!(row.get::<_, Key>(0), key);

    Ok(())
}
