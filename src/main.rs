use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod beacon;
mod catalog;
mod controller;
mod domain;
mod filter;
mod model;
mod prompt;
mod render;
mod ui;

use controller::Controller;
use domain::{LvConfig, LvError, Message};
use model::{Model, Status};
use ui::CatalogUI;

#[derive(Parser)]
#[command(name = "lv", version, about = "A tui based link catalog viewer.")]
struct Cli {
    /// Path to the catalog json file
    path: String,

    /// Append log output to this file, verbosity is controlled via RUST_LOG
    #[arg(long)]
    log: Option<PathBuf>,

    /// Base url of a visit counting service. Visits are not tracked when unset.
    #[arg(long)]
    track_url: Option<String>,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn run() -> Result<(), LvError> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref())?;

    let path = shellexpand::full(&cli.path)
        .map_err(|e| LvError::LoadingFailed(format!("Can not expand path: {e}")))?
        .into_owned();

    let cfg = LvConfig::default().track_url(cli.track_url);

    let mut model = Model::new(&cfg);
    model.load_catalog(Path::new(&path))?;

    if let Some(base_url) = cfg.track_url.clone() {
        beacon::spawn(
            base_url,
            path.clone(),
            Duration::from_secs(cfg.beacon_dwell_secs),
        );
    }

    let controller = Controller::new(&cfg);
    let mut ui = CatalogUI::new();

    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    model.update(Message::Resize(size.width as usize, size.height as usize))?;

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}

fn init_tracing(log: Option<&Path>) -> Result<(), LvError> {
    let Some(path) = log else {
        return Ok(());
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    info!("Started lv, logging to {}", path.display());
    Ok(())
}
