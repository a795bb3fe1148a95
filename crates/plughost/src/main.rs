// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! plughost - a plugin host.
//!
//! This is the binary entry point.

mod builtin;
mod commands;
mod fetch;
mod host;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use plughost_config::PlughostConfig;

/// plughost - load, reload and unload plugins from a directory.
#[derive(Parser, Debug)]
#[command(name = "plughost", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the layered lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the plugins directory and keep it in sync until interrupted.
    Serve,
    /// Show the artifacts found in the plugins directory, grouped by name.
    Scan,
    /// Load the plugins directory once and print what is running.
    List {
        /// Include disabled plugins.
        #[arg(long)]
        all: bool,
        /// Only plugins whose name matches this regular expression.
        #[arg(long)]
        regex: Option<String>,
    },
    /// Install a plugin from a file or an http(s) URL.
    Install {
        /// Plugin file name, e.g. `replication.plugin`.
        name: String,
        /// Path or URL of the artifact.
        source: String,
    },
    /// Validate the configuration and print the effective values.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> PlughostConfig {
    let loaded = match path {
        Some(path) => plughost_config::load_and_validate_path(path),
        None => plughost_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            plughost_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Scan) => commands::run_scan(&config),
        Some(Commands::List { all, regex }) => commands::run_list(config, all, regex).await,
        Some(Commands::Install { name, source }) => {
            commands::run_install(config, &name, &source).await
        }
        Some(Commands::CheckConfig) => commands::run_check_config(&config),
        None => {
            println!("plughost: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("plughost: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["plughost", "list", "--all", "--regex", "re.*"]).unwrap();
        match cli.command {
            Some(Commands::List { all, regex }) => {
                assert!(all);
                assert_eq!(regex.as_deref(), Some("re.*"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["plughost", "--config", "/tmp/p.toml", "check-config"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
    }

    #[test]
    fn install_needs_a_source() {
        assert!(Cli::try_parse_from(["plughost", "install", "a.plugin"]).is_err());
    }
}
