//! Headless plugin maintenance for the LostCity client.
//!
//! `plugin-sync update` runs one update cycle against the plugin repository;
//! `plugin-sync list` shows what the client would load from the plugin dir.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lostcity_client_lib::config::ConfigStore;
use lostcity_client_lib::fetcher::HttpFetcher;
use lostcity_client_lib::updater::PluginUpdateStatus;
use lostcity_client_lib::{logging, PluginCatalog, PluginRegistry, PluginUpdater};

#[derive(Parser, Debug)]
#[command(name = "plugin-sync")]
#[command(about = "Download and inspect LostCity client plugins")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the manifest and download changed plugins
    Update {
        /// Plugin repository base URL (defaults to the configured one)
        #[arg(long)]
        base_url: Option<String>,

        /// Plugin directory (defaults to the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Load local plugins and print descriptors as JSON
    List {
        /// Plugin directory (defaults to the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();

    let config = ConfigStore::default_location().load_app_config();

    match args.command {
        Command::Update { base_url, dir } => {
            let dir = dir.unwrap_or_else(|| config.resolved_plugin_dir());
            let base_url = base_url.unwrap_or(config.plugin_base_url.clone());
            let fetcher = HttpFetcher::new(Duration::from_secs(config.request_timeout_secs))
                .context("Failed to create HTTP client")?;

            let report = PluginUpdater::new(Arc::new(fetcher), base_url, &dir).update().await;
            for outcome in &report.outcomes {
                match &outcome.status {
                    PluginUpdateStatus::Updated { hash } => {
                        println!("updated    {:<24} {}", outcome.name, &hash[..12])
                    }
                    PluginUpdateStatus::Unchanged { hash } => {
                        println!("unchanged  {:<24} {}", outcome.name, &hash[..12])
                    }
                    PluginUpdateStatus::Failed { error } => {
                        println!("failed     {:<24} {error}", outcome.name)
                    }
                }
            }

            let failed: Vec<&str> = report.failed_names().collect();
            println!(
                "{} updated, {} failed{}",
                report.updated().count(),
                failed.len(),
                if failed.is_empty() { String::new() } else { format!(": {}", failed.join(", ")) }
            );

            if let Some(error) = report.error {
                anyhow::bail!("Plugin update failed: {error}");
            }
        }
        Command::List { dir } => {
            let dir = dir.unwrap_or_else(|| config.resolved_plugin_dir());
            let load = PluginRegistry::new(&dir, PluginCatalog::builtin()).load_all();
            let output = serde_json::json!({
                "plugins": load.descriptors(),
                "skipped": load.skipped,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to render plugin list")?
            );
        }
    }

    Ok(())
}
