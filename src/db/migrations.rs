use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::{collections::BTreeMap, time::Duration, num::NonZeroU64};
use tokio_postgres::{Client, IsolationLevel, Transaction, error::SqlState};

use crate::prelude::*;
use super::query;


/// What needs to happen to bring the database schema up to date.
#[derive(Debug, PartialEq, Eq)]
enum MigrationPlan {
    /// Nothing exists yet: create the meta table and apply all migrations.
    EmptyDb,

    /// All known migrations are applied.
    UpToDate,

    /// The last `new_migrations` known migrations are missing.
    Migrate {
        new_migrations: NonZeroU64,
    },
}

/// A migration as recorded in `__db_migrations`.
#[derive(Debug)]
struct AppliedMigration {
    id: u64,
    name: String,
    applied_on: DateTime<Utc>,
    script: String,
}

impl MigrationPlan {
    /// Inspects the DB and decides what to do. Fails if the DB is in a state
    /// we cannot handle automatically. Does not modify anything.
    async fn build(tx: &Transaction<'_>) -> Result<Self> {
        if !query::table_exists(tx, "__db_migrations").await? {
            let tables = query::public_tables(tx).await?;
            if !tables.is_empty() {
                bail!(
                    "migration table '__db_migrations' does not exist, but some other \
                        tables ({}) do exist. Refusing to touch this database.",
                    tables.join(", "),
                );
            }

            return Ok(Self::EmptyDb);
        }

        debug!("Checking DB migrations");
        let applied = tx
            .query_raw(
                "select id, name, applied_on, script from __db_migrations order by id",
                dbargs![],
            )
            .await
            .context("failed to query meta migrations table")?
            .map_ok(|row| AppliedMigration {
                id: row.get::<_, i64>("id") as u64,
                name: row.get("name"),
                applied_on: row.get("applied_on"),
                script: row.get("script"),
            })
            .try_collect::<Vec<_>>()
            .await?;

        Self::compare(&applied, &MIGRATIONS)
    }

    /// Compares the applied migrations with the known ones.
    fn compare(applied: &[AppliedMigration], known: &BTreeMap<u64, Migration>) -> Result<Self> {
        if !applied.iter().map(|m| m.id).eq(1..=applied.len() as u64) {
            bail!("The IDs of the applied migrations are not consecutive. This is unexpected.");
        }

        for actual in applied {
            let Some(expected) = known.get(&actual.id) else {
                bail!(
                    "The migration '{}-{}' is applied in the database (on {}), but this \
                        version of Shopfront does not know it. Are you running an older \
                        version than before?",
                    actual.id,
                    actual.name,
                    actual.applied_on,
                );
            };

            if actual.script != expected.script {
                debug!("Expected script for '{}-{}':\n{}", actual.id, expected.name, expected.script);
                debug!("Script in database for '{}-{}':\n{}", actual.id, actual.name, actual.script);
                bail!(
                    "The script of applied migration '{}-{}' (applied on {}) does not match the \
                        expected script for that migration. This is unexpected.",
                    actual.id,
                    actual.name,
                    actual.applied_on,
                );
            }
        }

        // Every applied migration is known, so this cannot underflow.
        match NonZeroU64::new(known.len() as u64 - applied.len() as u64) {
            None => Ok(Self::UpToDate),
            Some(new_migrations) => Ok(Self::Migrate { new_migrations }),
        }
    }

    async fn execute(&self, tx: &Transaction<'_>) -> Result<()> {
        let new_migrations = match self {
            Self::UpToDate => {
                info!("All migrations are already applied: database schema is up to date.");
                return Ok(());
            }
            Self::EmptyDb => {
                info!("Database is empty. Creating table '__db_migrations'...");
                tx.batch_execute(include_str!("db-migrations.sql"))
                    .await
                    .context("could not create migrations meta table")?;
                MIGRATIONS.len() as u64
            }
            Self::Migrate { new_migrations } => new_migrations.get(),
        };

        info!("The database is missing {new_migrations} migrations. Applying them now.");
        let first_new = MIGRATIONS.len() as u64 - new_migrations + 1;
        for (id, migration) in MIGRATIONS.range(first_new..) {
            debug!("Applying migration '{}-{}' ...", id, migration.name);
            trace!("Executing:\n{}", migration.script);

            tx.batch_execute(migration.script)
                .await
                .with_context(|| format!("failed to run script for '{}-{}'", id, migration.name))?;

            tx.execute(
                "insert into __db_migrations (id, name, applied_on, script) \
                    values ($1, $2, now(), $3)",
                &[&(*id as i64), &migration.name, &migration.script],
            )
                .await
                .context("failed to update __db_migrations")?;
        }

        info!("Applied {new_migrations} migrations. DB is up to date now.");
        Ok(())
    }
}


/// Makes sure the database schema is up to date by checking the applied
/// migrations and applying all missing ones.
pub(crate) async fn migrate(db: &mut Client) -> Result<()> {
    // Everything happens in one serializable transaction so that only one
    // node ever migrates. Such a transaction might fail to commit if another
    // node did the same concurrently, in which case we retry and should then
    // see the other node's result.
    loop {
        let tx = db.build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await?;

        let plan = MigrationPlan::build(&tx).await?;
        plan.execute(&tx).await?;

        match tx.commit().await {
            Ok(_) => return Ok(()),

            Err(e) if e.code() == Some(&SqlState::T_R_SERIALIZATION_FAILURE) => {
                let backoff_duration = Duration::from_millis(500);
                warn!(
                    "Database migration transaction failed to commit, likely because another \
                        node migrated concurrently. Will try again in {:?}.",
                    backoff_duration,
                );

                tokio::time::sleep(backoff_duration).await;
            }

            Err(e) => return Err(e.into()),
        }
    }
}

// Includes the scripts from the `migrations` folder, keyed by their ID. The
// panics should ideally be compile errors, but they trigger on first access,
// which is at startup anyway.
macro_rules! include_migrations {
    ( $( $id:literal : $name:literal ,)+ ) => {
        Lazy::new(|| {
            let mut m = BTreeMap::new();
            $(
                let prev = m.insert($id, Migration {
                    name: $name,
                    script: include_str!(
                        concat!("migrations/", stringify!($id), "-", $name, ".sql")
                    ),
                });

                assert!(prev.is_none(), "duplicate key in `include_migrations!`");
            )+

            if !m.keys().copied().eq(1..m.len() as u64 + 1) {
                panic!("migration IDs in `include_migrations!` are not consecutive");
            }

            m
        })
    };
}

#[derive(Debug)]
struct Migration {
    name: &'static str,
    script: &'static str,
}

static MIGRATIONS: Lazy<BTreeMap<u64, Migration>> = include_migrations![
    01: "catalog",
    02: "content",
    03: "translations",
    04: "webhooks",
];


#[cfg(test)]
mod tests {
    use super::*;

    fn applied(id: u64) -> AppliedMigration {
        let known = &MIGRATIONS[&id];
        AppliedMigration {
            id,
            name: known.name.into(),
            applied_on: Utc::now(),
            script: known.script.into(),
        }
    }

    #[test]
    fn known_migrations_are_consistent() {
        assert_eq!(MIGRATIONS.len(), 4);
        assert!(MIGRATIONS.values().all(|m| !m.script.trim().is_empty()));
    }

    #[test]
    fn compare_plans() {
        let plan = MigrationPlan::compare(&[], &MIGRATIONS).unwrap();
        assert_eq!(plan, MigrationPlan::Migrate { new_migrations: NonZeroU64::new(4).unwrap() });

        let plan = MigrationPlan::compare(&[applied(1), applied(2)], &MIGRATIONS).unwrap();
        assert_eq!(plan, MigrationPlan::Migrate { new_migrations: NonZeroU64::new(2).unwrap() });

        let all = (1..=4).map(applied).collect::<Vec<_>>();
        assert_eq!(MigrationPlan::compare(&all, &MIGRATIONS).unwrap(), MigrationPlan::UpToDate);
    }

    #[test]
    fn compare_rejects_unexpected_state() {
        // Gap in IDs
        assert!(MigrationPlan::compare(&[applied(1), applied(3)], &MIGRATIONS).is_err());

        // Modified script
        let mut modified = applied(1);
        modified.script.push_str("\n-- changed");
        assert!(MigrationPlan::compare(&[modified], &MIGRATIONS).is_err());

        // Unknown migration
        let mut all = (1..=4).map(applied).collect::<Vec<_>>();
        all.push(AppliedMigration {
            id: 5,
            name: "from-the-future".into(),
            applied_on: Utc::now(),
            script: String::new(),
        });
        assert!(MigrationPlan::compare(&all, &MIGRATIONS).is_err());
    }
}
