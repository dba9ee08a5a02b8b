//! A subcommand making sure various things are working. Useful when deploying
//! or updating Shopfront, to find as many problems as early as possible.

use crate::{
    args::{self, Args},
    load_config_and_init_logger,
    config::Config,
    prelude::*,
    db,
};


pub(crate) async fn run(shared: &args::Shared, args: &Args) -> Result<()> {
    let config = load_config_and_init_logger(shared, args)
        .context("failed to load config: cannot proceed with `check` command")?;


    // Perform main checks
    info!("Starting to verify various things...");
    let referenced_files = check_referenced_files(&config).await;
    let db = check_db(&config).await;
    info!("Done verifing various things");


    // Print summary after all log output
    let mut any_errors = false;
    println!();
    bunt::println!("{$bold+blue+intense}Summary{/$}");
    println!();
    print_outcome(&mut any_errors, "Load and validate configuration", &Ok(()));
    print_outcome(&mut any_errors, "Checking all referenced files", &referenced_files);
    print_outcome(&mut any_errors, "Connection to DB", &db);

    println!();
    if any_errors {
        bunt::println!("{$red+intense}➡  Errors have occured!{/$}");
        std::process::exit(1);
    } else {
        bunt::println!("{$green+intense}⮕  Everything OK{/$} \
            {$dimmed}(Shopfront probably works in this environment){/$}");
        Ok(())
    }
}

fn print_outcome<T>(any_errors: &mut bool, label: &str, result: &Result<T>) {
    match result {
        Ok(_) => {
            bunt::println!(" ▸ {[bold+intense]}  {$green+bold}✔ ok{/$}", label);
        }
        Err(e) => {
            *any_errors = true;
            bunt::println!(" ▸ {[bold+intense]}  {$red+bold}✘ error{/$}", label);
            bunt::println!("      {$red}▶▶▶ {$bold}Error:{/$}{/$} {[yellow+intense]}", e);
            println!();
            bunt::println!("      {$red+italic}Caused by:{/$}");

            for (i, cause) in e.chain().skip(1).enumerate() {
                print!("       {: >1$}", "", i * 2);
                println!("‣ {cause}");
            }
            println!();
        }
    }
}

async fn check_referenced_files(config: &Config) -> Result<()> {
    config.db.check_server_cert()?;

    // The log file is only created when logging starts, so we just check its
    // directory.
    if let Some(dir) = config.log.file.as_ref().and_then(|p| p.parent()) {
        debug!("Checking that log directory '{}' exists...", dir.display());
        tokio::fs::metadata(dir)
            .await
            .with_context(|| format!("log directory '{}' is not accessible", dir.display()))?;
    }

    Ok(())
}

async fn check_db(config: &Config) -> Result<()> {
    let pool = db::create_pool(&config.db).await?;
    let conn = pool.get().await.context("failed to get DB connection")?;
    let row = conn.query_one("select count(*) from __db_migrations", &[]).await
        .context("failed to read applied migrations (did you run `db migrate`?)")?;
    debug!("Database has {} applied migrations", row.get::<_, i64>(0));
    Ok(())
}
