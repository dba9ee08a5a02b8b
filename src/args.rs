//! This module defines the command line arguments Shopfront accepts.

use std::{io::IsTerminal, path::PathBuf};
use termcolor::ColorChoice;

use crate::{cmd, db::cmd::DbCommand};


#[derive(Debug, clap::Parser)]
#[clap(about = "GraphQL API for translations and webhooks of a shop database.", version)]
pub(crate) struct Args {
    #[clap(subcommand)]
    pub(crate) cmd: Command,

    /// Whether to use colors in the output.
    #[clap(long, value_enum, global = true, default_value_t = ColorMode::Auto)]
    pub(crate) color: ColorMode,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Starts the HTTP server serving the GraphQL API.
    Serve {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Database operations.
    Db {
        #[clap(subcommand)]
        cmd: DbCommand,

        #[clap(flatten)]
        shared: Shared,
    },

    /// Checks config and DB connection to find problems in Shopfront's
    /// environment.
    ///
    /// Exits with 0 if everything is Ok, and with 1 otherwise.
    Check {
        #[clap(flatten)]
        shared: Shared,
    },

    /// Outputs a template for the configuration file (which includes
    /// descriptions or all options).
    WriteConfig {
        /// Target file. If not specified, the template is written to stdout.
        target: Option<PathBuf>,
    },

    /// Exports the API as GraphQL schema.
    ExportApiSchema {
        #[clap(flatten)]
        args: cmd::export_api_schema::Args,
    },
}

impl Command {
    /// Name used for `${cmd}` in the log file path.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Serve { .. } => "serve",
            Self::Db { .. } => "db",
            Self::Check { .. } => "check",
            Self::WriteConfig { .. } | Self::ExportApiSchema { .. } => "other",
        }
    }
}

#[derive(Debug, clap::Args)]
pub(crate) struct Shared {
    /// Path to the configuration file. If this is not specified, Shopfront
    /// checks `SHOPFRONT_CONFIG_PATH`, then tries opening `config.toml` or
    /// `/etc/shopfront/config.toml`.
    #[clap(short, long)]
    pub(crate) config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ColorMode {
    Auto,
    Always,
    Never,
}

impl Args {
    pub(crate) fn stdout_color(&self) -> ColorChoice {
        self.color.choice(std::io::stdout().is_terminal())
    }

    pub(crate) fn stderr_color(&self) -> ColorChoice {
        self.color.choice(std::io::stderr().is_terminal())
    }
}

impl ColorMode {
    fn choice(self, is_terminal: bool) -> ColorChoice {
        match self {
            Self::Always => ColorChoice::Always,
            Self::Never => ColorChoice::Never,
            Self::Auto if is_terminal => ColorChoice::Auto,
            Self::Auto => ColorChoice::Never,
        }
    }
}


#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use super::*;

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_db_subcommands() {
        let args = Args::try_parse_from(["shopfront", "db", "migrate", "-c", "foo.toml"]).unwrap();
        match args.cmd {
            Command::Db { cmd: DbCommand::Migrate, shared } => {
                assert_eq!(shared.config, Some(PathBuf::from("foo.toml")));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let args = Args::try_parse_from(["shopfront", "--color", "never", "serve"]).unwrap();
        assert_eq!(args.color, ColorMode::Never);
        assert_eq!(args.cmd.name(), "serve");
    }
}
