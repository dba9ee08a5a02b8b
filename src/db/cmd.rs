use std::{
    convert::Infallible,
    io,
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::Command,
};
use tokio_postgres::{Client as Db, IsolationLevel};

use secrecy::ExposeSecret;

use crate::{prelude::*, config::Config};
use super::{DbConfig, create_pool, query};


#[derive(Debug, clap::Subcommand)]
pub(crate) enum DbCommand {
    /// Removes all data and tables from the database.
    Clear {
        /// Don't ask for confirmation. Careful!
        #[clap(long)]
        yes_absolutely_clear_db: bool,
    },

    /// Runs an `.sql` script with the configured database connection.
    Script {
        /// Path to a file containing an SQL script.
        script: PathBuf,
    },

    /// Runs the database migrations that also automatically run when starting
    /// the server.
    Migrate,

    /// Connects to the database and gives you an SQL prompt.
    /// This just starts the `psql` client, so make sure that is installed
    /// and accessible in your `PATH`.
    Console,

    /// Equivalent to `db clear` followed by `db migrate`.
    Reset {
        /// Don't ask for confirmation. Careful!
        #[clap(long)]
        yes_absolutely_reset: bool,
    },
}

/// Entry point for `db` commands.
pub(crate) async fn run(cmd: &DbCommand, config: &Config) -> Result<()> {
    if let DbCommand::Console = cmd {
        return console(&config.db).map(|never| match never {});
    }

    let pool = create_pool(&config.db).await?;
    let mut db = pool.get().await?;

    match cmd {
        DbCommand::Clear { yes_absolutely_clear_db } => {
            clear(&mut db, config, *yes_absolutely_clear_db).await?;
        }
        DbCommand::Migrate => super::migrate(&mut db).await?,
        DbCommand::Reset { yes_absolutely_reset } => {
            clear(&mut db, config, *yes_absolutely_reset).await?;
            super::migrate(&mut db).await?;
        }
        DbCommand::Script { script } => run_script(&db, script).await?,
        DbCommand::Console => unreachable!("already handled above"),
    }

    Ok(())
}


/// Clears the whole database by removing and re-creating the `public` schema.
/// Unless `skip_confirmation` is set, the user has to confirm interactively.
async fn clear(db: &mut Db, config: &Config, skip_confirmation: bool) -> Result<()> {
    let tx = db.build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await?;

    if !skip_confirmation {
        warn!("You are about to delete all existing data, tables, types and everything in \
            the 'public' schema of the database!");

        println!();
        if let Ok(Ok(hostname)) = hostname::get().map(|n| n.into_string()) {
            println!("Hostname: {}", hostname);
        }
        println!("Database host: {}", config.db.host);
        println!("Database name: {}", config.db.database);

        println!();
        println!("The database currently holds these tables:");
        for name in query::public_tables(&tx).await? {
            let num_rows = tx.query_one(&*format!("select count(*) from \"{}\"", name), &[])
                .await?
                .get::<_, i64>(0);
            println!(" - {} ({} rows)", name, num_rows);
        }

        println!();
        println!("Are you sure you want to completely remove everything in this database? \
            This completely drops the 'public' schema. \
            Please double-check the server you are running this on!\n\
            Type 'yes' to proceed to delete the data.");
        crate::cmd::prompt_for_yes()?;
    }

    // Dropping the whole schema also gets rid of types, functions and
    // everything else.
    tx.execute("drop schema public cascade", &[]).await?;
    tx.execute("create schema public", &[]).await?;
    tx.execute(&*format!("grant all on schema public to \"{}\"", config.db.user), &[]).await?;
    tx.execute("grant all on schema public to public", &[]).await?;
    tx.execute("comment on schema public is 'standard public schema'", &[]).await?;
    tx.commit().await.context("failed to commit clear transaction")?;

    info!("Dropped and recreated schema 'public'");
    Ok(())
}

async fn run_script(db: &Db, script_path: &Path) -> Result<()> {
    let script = tokio::fs::read_to_string(script_path)
        .await
        .with_context(|| format!("failed to read script file '{}'", script_path.display()))?;

    db.batch_execute(&script).await.context("failed to execute script")?;
    info!("Successfully ran SQL script");

    Ok(())
}

/// Replaces the current process with `psql`, so this only returns on error.
fn console(config: &DbConfig) -> Result<Infallible> {
    use percent_encoding::{utf8_percent_encode, PercentEncode, NON_ALPHANUMERIC};
    fn encode(s: &str) -> PercentEncode<'_> {
        utf8_percent_encode(s, NON_ALPHANUMERIC)
    }

    let connection_uri = format!(
        "postgresql://{}:{}@{}:{}/{}",
        encode(&config.user),
        encode(config.password.expose_secret()),
        config.host,
        config.port,
        encode(&config.database),
    );
    let error = Command::new("psql").arg(connection_uri).exec();
    let message = match error.kind() {
        io::ErrorKind::NotFound => "`psql` was not found in your `PATH`",
        io::ErrorKind::PermissionDenied => "you don't have sufficient permissions to execute `psql`",
        _ => "an error occured while trying to execute `psql`",
    };
    Err(error).context(message)
}
