//! Twinscript CLI
//!
//! Command-line inspector for rule expressions:
//! - Parse an expression and print its canonical form
//! - Run unit analysis
//! - Compile a twin filter into its server/client split

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use twinscript::config::Config;
use twinscript::expr::{parse, unit_of};
use twinscript::twin::{filter_twins, DefaultClassifier, FilterOptions};

#[derive(Parser)]
#[command(name = "twinscript")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Building-automation rule expression compiler")]
#[command(
    long_about = "Twinscript parses building-automation rule expressions, checks their \
                  physical units, and compiles twin selections into server queries and \
                  client residuals."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse an expression and print its canonical form
    Parse {
        /// The rule expression
        expression: String,
    },

    /// Run unit analysis over an expression
    Units {
        /// The rule expression
        expression: String,
    },

    /// Split a twin-selection expression into server query and client
    /// residual
    Filter {
        /// The twin filter expression
        expression: String,
    },
}

fn main() -> anyhow::Result<()> {
    let config = Config::load_default();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { expression } => {
            let expr = parse(&expression)
                .with_context(|| format!("could not parse: {}", expression))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&expr)?);
            } else {
                println!("{}", expr.serialize());
                let variables: Vec<String> = expr.unbound_variables().into_iter().collect();
                if !variables.is_empty() {
                    println!("variables: {}", variables.join(", "));
                }
            }
        }

        Commands::Units { expression } => {
            let expr = parse(&expression)
                .with_context(|| format!("could not parse: {}", expression))?;
            let unit = unit_of(&expr);
            if cli.json {
                println!("{}", serde_json::json!({ "unit": unit }));
            } else if unit.is_empty() {
                println!("(dimensionless)");
            } else {
                println!("{}", unit);
            }
        }

        Commands::Filter { expression } => {
            let expr = parse(&expression)
                .with_context(|| format!("could not parse: {}", expression))?;
            let result = filter_twins(&expr, &DefaultClassifier, &FilterOptions::default());
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": result.status,
                        "server_query": result.server_query,
                        "client_residual": result.client_residual.map(|e| e.serialize()),
                        "combined": result.combined.map(|e| e.serialize()),
                    })
                );
            } else {
                println!("status: {:?}", result.status);
                if let Some(query) = &result.server_query {
                    println!("server query: {}", query);
                }
                if let Some(residual) = &result.client_residual {
                    println!("client residual: {}", residual.serialize());
                }
            }
        }
    }

    Ok(())
}
