//! netconfd CLI
//!
//! Runs one commit pipeline per feature instance against a configuration
//! tree loaded from a JSON document. Exits 0 on success with no output,
//! or prints a single diagnostic line and exits 1.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use netconfd_commit::{commit, commit_each, HostSystem};
use netconfd_handlers::{SshHandler, WwanHandler};
use netconfd_tree::ConfigTree;

#[derive(Parser)]
#[command(name = "netconfd")]
#[command(about = "Commit network feature configuration to the running system")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short = 'V', long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the commit pipeline for one feature
    Commit {
        /// Feature to commit (ssh, wirelessmodem)
        #[arg(short, long)]
        feature: String,

        /// Instance identifier; may be given several times for tag
        /// features with multiple instances
        #[arg(short, long)]
        instance: Vec<String>,

        /// Configuration tree as a JSON document
        #[arg(short, long)]
        config: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    log::info!("commit completed");
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Commit {
            feature,
            instance,
            config,
        } => {
            let text = tokio::fs::read_to_string(&config)
                .await
                .with_context(|| format!("reading configuration {}", config))?;
            let doc: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("parsing configuration {}", config))?;
            let tree = ConfigTree::from_json(&doc);
            let system = HostSystem::new();

            match feature.as_str() {
                "ssh" => {
                    let identifier = instance.first().map(String::as_str).unwrap_or("ssh");
                    commit(&SshHandler::new(), &tree, &system, identifier).await?;
                }
                "wirelessmodem" => {
                    if instance.is_empty() {
                        bail!("feature 'wirelessmodem' requires at least one --instance");
                    }
                    let handler = WwanHandler::new();
                    let identifiers: Vec<&str> = instance.iter().map(String::as_str).collect();
                    let outcomes = commit_each(&handler, &tree, &system, &identifiers).await;

                    let failures: Vec<String> = outcomes
                        .into_iter()
                        .filter_map(|(id, outcome)| {
                            outcome.err().map(|e| format!("{}: {}", id, e))
                        })
                        .collect();
                    if !failures.is_empty() {
                        bail!("{}", failures.join("; "));
                    }
                }
                other => bail!("unknown feature '{}'", other),
            }
        }
    }

    Ok(())
}
