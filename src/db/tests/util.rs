use std::{ops::Deref, sync::Arc};
use deadpool_postgres::Pool;
use secrecy::ExposeSecret;
use tokio_postgres::{Client, NoTls};

use crate::{config::Config, model::Key, prelude::*};
use super::super::{DbConfig, DbConnection};


const DEV_CONFIG: &str = "util/dev-config/config.toml";

async fn conn(config: &DbConfig) -> Result<Client> {
    let (client, connection) = tokio_postgres::config::Config::new()
        .user(&config.user)
        .password(config.password.expose_secret())
        .dbname(&config.database)
        .host(&config.host)
        .port(config.port)
        .application_name("Shopfront DB tests")
        .connect(NoTls)
        .await
        .context("could not connect to DB in test")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            panic!("PG connection error: {e}");
        }
    });

    Ok(client)
}

/// A temporary DB used for a single unit test. Is removed on drop.
///
/// Be sure to use the multi threaded Tokio runtime or else `drop` will hang
/// indefinitely!
pub(crate) struct TestDb {
    client: Option<DbConnection>,
    pool: Option<Pool>,
    controller: Client,
    db_name: String,
    config: Arc<Config>,
}

impl TestDb {
    /// Creates a new temporary database with connection data from the dev config.
    pub(crate) async fn new() -> Result<Self> {
        let mut config = Config::load_from(DEV_CONFIG).context("failed to load config")?;

        // Connect to the configured database and create a new temporary one.
        let controller = conn(&config.db).await?;
        let db_name = format!("shopfront_test_{}", rand::random::<u64>());
        controller.execute(&format!("create database {db_name}"), &[]).await
            .context("failed to create temporary test DB")?;

        // Everything else uses a pool on the temporary database, like the
        // real server does.
        config.db.database = db_name.clone();
        let pool = super::super::create_pool(&config.db).await?;
        let client = pool.get().await.context("failed to get connection to test DB")?;

        Ok(Self {
            client: Some(client),
            pool: Some(pool),
            controller,
            db_name,
            config: Arc::new(config),
        })
    }

    pub(crate) async fn with_migrations() -> Result<Self> {
        let mut out = Self::new().await?;
        let client = out.client.as_mut().ok_or_else(|| anyhow!("test DB already closed"))?;
        crate::db::migrate(client).await
            .context("failed to run migrations on test DB")?;

        Ok(out)
    }

    /// Returns another connection to the temporary database.
    pub(crate) async fn pool_conn(&self) -> Result<DbConnection> {
        let pool = self.pool.as_ref().ok_or_else(|| anyhow!("test DB already closed"))?;
        pool.get().await.context("failed to get connection to test DB")
    }

    pub(crate) fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    async fn insert(&self, sql: &str, params: &[&(dyn postgres_types::ToSql + Sync)]) -> Result<Key> {
        let row = self.query_one(sql, params).await?;
        Ok(row.get::<_, Key>(0))
    }

    pub(crate) async fn add_category(&self, name: &str, slug: &str) -> Result<Key> {
        self.insert(
            "insert into categories (name, slug) values ($1, $2) returning id",
            &[&name, &slug],
        ).await
    }

    pub(crate) async fn add_product(&self, name: &str, slug: &str) -> Result<Key> {
        let category = self.add_category(&format!("{name} category"), &format!("{slug}-category"))
            .await?;
        self.insert(
            "insert into products (name, slug, category_id) values ($1, $2, $3) returning id",
            &[&name, &slug, &category],
        ).await
    }

    pub(crate) async fn add_voucher(&self, code: &str, name: Option<&str>) -> Result<Key> {
        self.insert(
            "insert into vouchers (code, name) values ($1, $2) returning id",
            &[&code, &name],
        ).await
    }

    pub(crate) async fn add_menu_item(&self, name: &str, sort_order: i32) -> Result<Key> {
        let menu = self.insert(
            "insert into menus (name) values ($1) returning id",
            &[&format!("{name} menu")],
        ).await?;
        self.insert(
            "insert into menu_items (menu_id, name, sort_order) values ($1, $2, $3) returning id",
            &[&menu, &name, &sort_order],
        ).await
    }

    pub(crate) async fn add_product_translation(
        &self,
        product: Key,
        language_code: &str,
        name: &str,
    ) -> Result<Key> {
        self.insert(
            "insert into product_translations (product_id, language_code, name)
                values ($1, $2, $3)
                returning id",
            &[&product, &language_code, &name],
        ).await
    }

    pub(crate) async fn add_app(&self, name: &str) -> Result<Key> {
        self.insert(
            "insert into apps (name, is_active) values ($1, true) returning id",
            &[&name],
        ).await
    }

    /// Adds exactly one row to the source table of every translatable kind.
    pub(crate) async fn add_one_of_each_kind(&self) -> Result<()> {
        self.batch_execute("
            insert into categories (name, slug) values ('Shirts', 'shirts');
            insert into products (name, slug) values ('Shirt', 'shirt');
            insert into product_variants (product_id, name) select id, 'Blue' from products;
            insert into collections (name, slug) values ('Summer', 'summer');
            insert into attributes (name, slug) values ('Color', 'color');
            insert into attribute_values (attribute_id, name, slug)
                select id, 'Blue', 'blue' from attributes;
            insert into pages (title, slug) values ('About us', 'about');
            insert into menus (name) values ('Footer');
            insert into menu_items (menu_id, name) select id, 'About us' from menus;
            insert into shipping_methods (name) values ('Parcel');
            insert into sales (name) values ('Summer sale');
            insert into vouchers (code) values ('SUMMER');
        ").await.context("failed to insert catalog rows")
    }

    /// Adds a webhook with one event per given raw event type, in that order.
    pub(crate) async fn add_webhook(&self, app: Key, name: &str, events: &[&str]) -> Result<Key> {
        let webhook = self.insert(
            "insert into webhooks (app_id, name, target_url, is_active, secret_key)
                values ($1, $2, 'https://example.org/hook', true, 'sekrit')
                returning id",
            &[&app, &name],
        ).await?;

        for event_type in events {
            self.execute(
                "insert into webhook_events (webhook_id, event_type) values ($1, $2)",
                &[&webhook, event_type],
            ).await?;
        }

        Ok(webhook)
    }
}

impl Deref for TestDb {
    type Target = DbConnection;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref().expect("test DB already closed")
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        // Since there is no "async drop" in Rust yet, this is a bit annoying.
        // First we need to close all connections to the temporary database.
        // Then we drop the database within `block_on`.
        //
        // This code requires the multi threaded Tokio runtime! :(
        drop(self.client.take());
        if let Some(pool) = self.pool.take() {
            pool.close();
        }
        futures::executor::block_on(async move {
            self.controller.execute(&format!("drop database {} with (force)", self.db_name), &[])
                .await
                .expect("failed to drop temporary test DB");
        });
    }
}
