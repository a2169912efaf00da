//! Electrode Viewer - Rust Implementation
//!
//! CLI commands:
//! - view: Launch the native viewer
//! - probe: Check a subject's dataset exists
//! - inspect: Print a dataset summary
//! - snapshot: Render the electrode scene to PNG

mod color;
mod config;
mod dataset;
mod entity;
mod gui;
mod interval;
mod loader;
mod logging;
mod ports;
mod primitive;
mod query;
mod scene;
mod snapshot;
mod source;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use query::{LaunchParams, Mode};
use source::{DatasetSource, SourceError};

#[derive(Parser)]
#[command(name = "electrode_viewer")]
#[command(about = "3D viewer for intracranial electrode datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to viewer.yaml config
    #[arg(short, long, default_value = "viewer.yaml")]
    config: PathBuf,
}

/// Which dataset to open
#[derive(Args, Debug, Clone)]
struct LaunchArgs {
    /// Launch query string, e.g. "?mode=nyu&subject=NY394"
    #[arg(short, long)]
    query: Option<String>,

    /// Dataset source, overrides the query string
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Subject id, overrides the query string
    #[arg(short, long)]
    subject: Option<String>,
}

impl LaunchArgs {
    fn params(&self) -> LaunchParams {
        let mut params = LaunchParams::from_query(self.query.as_deref().unwrap_or_default());
        if let Some(mode) = self.mode {
            params.mode = mode;
        }
        if let Some(subject) = &self.subject {
            params.subject = Some(subject.clone());
        }
        params
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Launch native viewer
    View {
        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Check that a subject's dataset exists
    Probe {
        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Load a dataset and print what the viewer would show
    Inspect {
        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Render the electrode scene to a PNG
    Snapshot {
        #[command(flatten)]
        launch: LaunchArgs,

        /// Output file (default: snapshots/<subject>_<timestamp>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Image width and height in pixels
        #[arg(long, default_value = "512")]
        size: u32,

        /// Label-set used to color the electrodes
        #[arg(long)]
        label_set: Option<String>,

        /// Connection set to show
        #[arg(long)]
        connections: Option<String>,

        /// Electrode to highlight
        #[arg(long)]
        select: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Secrets first: LOG_DIR decides where logging goes
    let secrets = config::Secrets::load();
    logging::init_logging(&secrets.log_dir);
    tracing::info!("Electrode Viewer starting up");

    let cli = Cli::parse();
    tracing::debug!("CLI args parsed: config={:?}", cli.config);

    let mut config = if cli.config.exists() {
        tracing::info!("Loading config from {:?}", cli.config);
        config::Config::load(&cli.config)?
    } else {
        tracing::warn!("Config file not found: {:?}, using defaults", cli.config);
        config::Config::default()
    };
    config.apply_secrets(&secrets);
    let timeout = Duration::from_secs(config.fetch_timeout_secs);

    match cli.command {
        Commands::View { launch } => {
            let params = launch.params();
            let source = DatasetSource::resolve(&config, &params)?;
            tracing::info!("Launching viewer for {}", source.describe());
            gui::run_viewer(config, source)?;
        }

        Commands::Probe { launch } => {
            let params = launch.params();
            let source = DatasetSource::resolve(&config, &params)?;
            match source::probe(&source, timeout).await {
                Ok(()) => println!("{}", params.to_query()),
                Err(SourceError::NotFound(what)) => {
                    anyhow::bail!("Data not found! ({})", what);
                }
                Err(e) => return Err(e).context("probing dataset"),
            }
        }

        Commands::Inspect { launch } => {
            let source = DatasetSource::resolve(&config, &launch.params())?;
            let dataset = source::fetch_dataset(&source, timeout)
                .await
                .with_context(|| format!("loading {}", source.describe()))?;
            inspect(&config, &dataset)?;
        }

        Commands::Snapshot {
            launch,
            output,
            size,
            label_set,
            connections,
            select,
        } => {
            let source = DatasetSource::resolve(&config, &launch.params())?;
            let dataset = source::fetch_dataset(&source, timeout)
                .await
                .with_context(|| format!("loading {}", source.describe()))?;
            let options = snapshot::SnapshotOptions {
                output: output.unwrap_or_else(|| snapshot::default_output(&dataset.subj_id)),
                size,
                label_set,
                connection_set: connections,
                select,
            };
            snapshot::render(&config, &dataset, &options)?;
        }
    }

    Ok(())
}

/// Print the subject labels, counts and menu entries
fn inspect(config: &config::Config, dataset: &dataset::ElectrodeDataset) -> anyhow::Result<()> {
    let data = scene::SceneData::from_dataset(
        dataset,
        config.bounding_box_offset,
        &config.connection_sets,
    )?;
    let menus = loader::menu_options(&data);
    if dataset.is_empty() {
        tracing::warn!("Dataset '{}' has no electrodes", data.subject_id);
    }

    println!("Subject:        {}", data.subject_id);
    println!("Seizure types:  {}", data.total_seizure_types);
    println!("Electrodes:     {}", data.electrodes.len());
    println!("Connections:    {}", data.connections.len());
    println!("Label-sets:     {}", menus.label_sets.join(", "));
    println!("Connection sets: {}", menus.connection_sets.join(", "));

    let small = data.electrodes.iter().filter(|e| e.is_small()).count();
    println!("Small contacts: {}", small);
    Ok(())
}
