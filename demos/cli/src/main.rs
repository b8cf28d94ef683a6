use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use records_chart::ChartHelper;
use records_core::{
    FetchError, RecordsConfig, RecordsConfigOverrides, RemotePatient, RemotePatientSource,
};
use records_store::{ChangeBus, MemoryStore};
use records_sync::Reconciler;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "records-cli",
    about = "Sync and inspect an offline patient record cache."
)]
struct Args {
    /// Path to the local store JSON file.
    #[arg(short, long)]
    store: PathBuf,

    /// Optional JSON settings file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile the local patients with a remote patient list.
    Sync {
        /// Path to the remote patient list (JSON array).
        #[arg(short, long)]
        remote: PathBuf,
    },
    /// Print a patient's chart.
    Chart {
        #[arg(short, long)]
        patient: String,
        #[arg(short, long)]
        locale: Option<String>,
        /// Only the latest value for each concept.
        #[arg(long)]
        latest: bool,
    },
}

/// Remote patient list read from a file exported by the server.
struct FileRemote(PathBuf);

impl RemotePatientSource for FileRemote {
    fn fetch_patients(&self, _timeout: Duration) -> Result<Vec<RemotePatient>, FetchError> {
        let data = std::fs::read_to_string(&self.0)
            .map_err(|err| FetchError::Unreachable(format!("{}: {err}", self.0.display())))?;
        serde_json::from_str(&data).map_err(|err| FetchError::Malformed(err.to_string()))
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RecordsConfig> {
    let Some(path) = path else {
        return Ok(RecordsConfig::default());
    };
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read config file {path:?}"))?;
    let overrides: RecordsConfigOverrides =
        serde_json::from_str(&data).with_context(|| format!("Invalid config file {path:?}"))?;
    Ok(overrides.into())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("records=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let store = MemoryStore::load_json(&args.store)
        .with_context(|| format!("Could not load local store {:?}", args.store))?;
    tracing::debug!(store = %args.store.display(), "local store loaded");

    match args.command {
        Command::Sync { remote } => {
            let reconciler =
                Reconciler::new(FileRemote(remote), store.clone(), ChangeBus::new(), &config);
            let report = reconciler.sync()?;
            store
                .save_json(&args.store)
                .with_context(|| format!("Could not save local store {:?}", args.store))?;

            println!(
                "Local entries: {}\nInserts: {}\nUpdates: {}\nDeletes: {}",
                report.stats.entries,
                report.stats.inserts,
                report.stats.updates,
                report.stats.deletes
            );
        }
        Command::Chart {
            patient,
            locale,
            latest,
        } => {
            let helper = ChartHelper::with_config(store, &config);
            let locale = locale.unwrap_or_else(|| helper.default_locale().to_string());

            let rows = if latest {
                helper
                    .most_recent_per_concept(&patient, &locale)
                    .into_values()
                    .collect::<Vec<_>>()
            } else {
                helper.list_all(&patient, &locale)
            };
            if rows.is_empty() {
                println!("No observations yet; chart layout:");
                for row in helper.empty_chart(&locale) {
                    println!("  {} / {}", row.group_name, row.concept_name);
                }
            }
            for row in rows {
                println!("{row}");
            }
        }
    }

    Ok(())
}
