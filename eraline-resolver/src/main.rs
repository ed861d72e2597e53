//! eraline-resolver command line
//!
//! Resolves subjects through the full tier cascade and manages the
//! attribution cache.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use eraline_common::config::{load_config, TomlConfig};
use eraline_resolver::models::{SubjectMetadata, UserOverride};
use eraline_resolver::services::MetadataProvider;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for eraline-resolver
#[derive(Parser, Debug)]
#[command(name = "eraline-resolver")]
#[command(about = "Resolve the in-story time period of films")]
#[command(version)]
struct Args {
    /// Configuration file (overrides ERALINE_CONFIG and the platform default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve one or more subjects
    Resolve {
        /// Subject ids to fetch from the metadata provider
        #[arg(long = "subject-id")]
        subject_ids: Vec<String>,

        /// JSON file with one subject or an array of subjects (skips the metadata provider)
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// Write a user-supplied period (graded verified)
    Override {
        #[arg(long = "subject-id")]
        subject_id: String,
        #[arg(long)]
        start_year: Option<i32>,
        #[arg(long)]
        end_year: Option<i32>,
        /// NO_PERIOD, LONG_AGO or NEAR_FUTURE when no start year applies
        #[arg(long)]
        label: Option<String>,
    },
    /// Print the cached entry for a subject
    Show { subject_id: String },
    /// Print every durable entry
    List,
    /// Drop the ephemeral cache and its snapshot file
    ClearCache,
    /// Print the effective configuration
    Config,
}

fn init_tracing(config: &TomlConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(config.logging.ansi)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn read_subjects(path: &Path) -> Result<Vec<SubjectMetadata>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text).context("Invalid metadata JSON")?;
    let subjects = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(subjects)
}

async fn fetch_subjects(config: &TomlConfig, subject_ids: &[String]) -> Result<Vec<SubjectMetadata>> {
    let Some(provider) = eraline_resolver::build_metadata_provider(config)? else {
        bail!("No metadata provider configured (set ERALINE_TMDB_API_KEY or [metadata].api_key)");
    };

    let mut subjects = Vec::with_capacity(subject_ids.len());
    for id in subject_ids {
        match provider.fetch(id).await {
            Ok(subject) => subjects.push(subject),
            Err(e) => warn!(subject_id = %id, error = %e, "Skipping subject without metadata"),
        }
    }
    Ok(subjects)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting eraline-resolver"
    );

    if let Command::Config = args.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let resolver = eraline_resolver::build_resolver(&config)
        .await
        .context("Failed to initialize resolver")?;
    let store = resolver.store().clone();

    match args.command {
        Command::Resolve {
            subject_ids,
            metadata,
        } => {
            let mut subjects = match &metadata {
                Some(path) => read_subjects(path)?,
                None => Vec::new(),
            };
            if !subject_ids.is_empty() {
                subjects.extend(fetch_subjects(&config, &subject_ids).await?);
            }
            if subjects.is_empty() {
                bail!("Nothing to resolve: pass --subject-id or --metadata");
            }

            let ids: Vec<String> = subjects.iter().map(|s| s.subject_id.clone()).collect();
            resolver.prefetch(&ids).await;

            let mut tasks: FuturesUnordered<_> = subjects
                .iter()
                .map(|subject| resolver.resolve(subject))
                .collect();
            let mut entries = Vec::with_capacity(subjects.len());
            while let Some(entry) = tasks.next().await {
                entries.push(entry);
            }
            drop(tasks);
            entries.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
            print_json(&entries)?;
        }
        Command::Override {
            subject_id,
            start_year,
            end_year,
            label,
        } => {
            let entry = resolver
                .apply_override(UserOverride {
                    subject_id,
                    start_year,
                    end_year,
                    period_label: label,
                })
                .await?;
            print_json(&entry)?;
        }
        Command::Show { subject_id } => match store.get(&subject_id).await {
            Some(entry) => print_json(&entry)?,
            None => bail!("No cached entry for subject {}", subject_id),
        },
        Command::List => print_json(&store.all_durable().await?)?,
        Command::ClearCache => {
            store.clear().await?;
            info!("Ephemeral cache cleared");
            return Ok(());
        }
        Command::Config => {}
    }

    store.flush().await;
    if let Err(e) = store.save_snapshot().await {
        warn!(error = %e, "Failed to save cache snapshot");
    }
    Ok(())
}
