use std::fs::{self, OpenOptions};
use std::io::stdout;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
};
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, prelude::*};

use albums::controller::Controller;
use albums::domain::{AlbumsConfig, AlbumsError, default_state_dir, expand_path};
use albums::model::{Model, Status};
use albums::source;
use albums::storage::FileStore;
use albums::ui::TableUI;

/// A sortable table of your albums.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON file with album records. Without it the built-in mock backend is used.
    #[arg(long)]
    data: Option<String>,

    /// Directory for the persisted sort order and the log file.
    #[arg(long)]
    state_dir: Option<String>,

    /// Simulated latency of the mock backend.
    #[arg(long, default_value_t = 600)]
    latency_ms: u64,

    /// Make the mock backend fail.
    #[arg(long)]
    fail: bool,

    #[arg(long, default_value_t = 40)]
    max_column_width: usize,

    /// Log file, defaults to albums.log in the state directory.
    #[arg(long)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn build_config(args: &Args) -> Result<AlbumsConfig, AlbumsError> {
    let state_dir = match &args.state_dir {
        Some(dir) => expand_path(dir)?,
        None => default_state_dir()?,
    };
    let data_file = args.data.as_deref().map(expand_path).transpose()?;

    Ok(AlbumsConfig::default()
        .with_state_dir(state_dir)
        .with_data_file(data_file)
        .with_latency_ms(args.latency_ms)
        .with_fail_fetch(args.fail)
        .with_max_column_width(args.max_column_width))
}

fn configure_logging(log_file: &Path) -> Result<(), AlbumsError> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_line_number(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| AlbumsError::Logging(e.to_string()))
}

async fn run(args: Args) -> Result<(), AlbumsError> {
    let config = build_config(&args)?;
    let log_file = match &args.log_file {
        Some(path) => expand_path(path)?,
        None => config.state_dir.join("albums.log"),
    };
    configure_logging(&log_file)?;
    info!("Starting albums with {:?}", config);

    let store = FileStore::open(&config.state_dir)?;
    info!("Sort order is kept in {}", store.path().display());

    let source = source::from_config(&config);
    let ui = TableUI::new();
    let controller = Controller::new(&config);

    let mut terminal = ratatui::init();
    if let Err(e) = execute!(stdout(), EnableMouseCapture) {
        warn!("Mouse capture unavailable, header clicks are disabled: {e}");
    }

    let result = match terminal.size() {
        Ok(size) => {
            let mut model = Model::init(
                &config,
                Box::new(store),
                size.width as usize,
                size.height as usize,
            );
            model.set_source_name(source.describe());
            model.mount(source);
            event_loop(&mut model, &ui, &controller, &mut terminal)
        }
        Err(e) => Err(e.into()),
    };

    if let Err(e) = execute!(stdout(), DisableMouseCapture) {
        warn!("Failed to disable mouse capture: {e}");
    }
    ratatui::restore();
    info!("Exiting albums");
    result
}

fn event_loop(
    model: &mut Model,
    ui: &TableUI,
    controller: &Controller,
    terminal: &mut ratatui::DefaultTerminal,
) -> Result<(), AlbumsError> {
    while model.status != Status::Quitting {
        model.poll_fetch();

        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event()?;
        model.update(message);
    }
    Ok(())
}
