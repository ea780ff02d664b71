use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::crossterm::execute;
use tracing::{error, info};

mod controller;
mod domain;
mod filter;
mod format;
mod inputter;
mod layout;
mod logging;
mod model;
mod prefs;
mod sort;
mod table;
mod ui;

use controller::Controller;
use domain::{TVConfig, TVError};
use model::{Model, Status};
use prefs::{FileStore, TableIdentity};
use table::TableData;

/// Browse a page of table rows with filtering, sorting and resizable columns
#[derive(Parser, Debug)]
#[command(version, about = "tvgrid")]
struct Args {
    /// JSON document with `columns`, `rows` and `totalRows`
    data_file: String,

    /// Database the table belongs to, defaults to the data file directory
    #[arg(long = "db-path")]
    db_path: Option<String>,

    /// Table name, defaults to the data file stem
    #[arg(long = "table")]
    table: Option<String>,

    /// Where view preferences are kept
    #[arg(long = "prefs-file")]
    prefs_file: Option<String>,

    #[arg(long = "log-file")]
    log_file: Option<String>,

    /// Event poll interval in milliseconds
    #[arg(long = "poll-ms", default_value_t = 100)]
    poll_ms: u64,
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand_path(path: &str) -> Result<PathBuf, TVError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TVError::LoadingFailed(format!("cannot expand {path}: {e}")))
}

fn table_identity(args: &Args, data_file: &Path) -> TableIdentity {
    let db_path = args.db_path.clone().unwrap_or_else(|| {
        data_file
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    });
    let table_name = args.table.clone().unwrap_or_else(|| {
        data_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    TableIdentity::new(db_path, table_name)
}

fn run(args: Args) -> Result<(), TVError> {
    let log_file = match &args.log_file {
        Some(path) => expand_path(path)?,
        None => std::env::temp_dir().join("tvgrid.log"),
    };
    logging::init(&log_file)?;

    let data_file = expand_path(&args.data_file)?;
    let identity = table_identity(&args, &data_file);
    let store = FileStore::new(match &args.prefs_file {
        Some(path) => expand_path(path)?,
        None => FileStore::default_path(),
    });
    info!(
        "Starting tvgrid on {} as {:?}, preferences in {}",
        data_file.display(),
        identity,
        store.path().display()
    );

    let data = TableData::load(&data_file)?;
    let cfg = TVConfig::default().with_event_poll_time(args.poll_ms);

    let mut terminal = ratatui::init();
    let result = execute!(stdout(), EnableMouseCapture)
        .map_err(TVError::from)
        .and_then(|_| event_loop(&mut terminal, &cfg, store, data, identity));
    if let Err(e) = execute!(stdout(), DisableMouseCapture) {
        error!("Failed to disable mouse capture: {e}");
    }
    ratatui::restore();

    if let Err(e) = &result {
        error!("Stopped with error: {e}");
    }
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    cfg: &TVConfig,
    store: FileStore,
    data: TableData,
    identity: TableIdentity,
) -> Result<(), TVError> {
    let size = terminal.size()?;
    let mut model = Model::init(cfg, Box::new(store), size.width, size.height);
    model.set_source(Some(data), false, identity);

    let mut controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui::draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message);
    }
    info!("Bye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_defaults_to_data_file_location() {
        let args = Args::try_parse_from(["tvgrid", "/data/shop/orders.json"]).unwrap();
        let identity = table_identity(&args, Path::new(&args.data_file));
        assert_eq!(identity, TableIdentity::new("/data/shop", "orders"));
        assert_eq!(args.poll_ms, 100);
    }

    #[test]
    fn identity_flags_override_defaults() {
        let args = Args::try_parse_from([
            "tvgrid",
            "/tmp/page.json",
            "--db-path",
            "/lance/db",
            "--table",
            "users",
            "--poll-ms",
            "50",
        ])
        .unwrap();
        let identity = table_identity(&args, Path::new(&args.data_file));
        assert_eq!(identity, TableIdentity::new("/lance/db", "users"));
        assert_eq!(args.poll_ms, 50);
    }

    #[test]
    fn expands_paths() {
        assert_eq!(
            expand_path("/tmp/prefs.json").unwrap(),
            PathBuf::from("/tmp/prefs.json")
        );
        assert!(matches!(
            expand_path("$TVGRID_UNDEFINED_TEST_VAR/prefs.json"),
            Err(TVError::LoadingFailed(_))
        ));
    }
}
