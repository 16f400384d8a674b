use anyhow::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::io;
use std::path::PathBuf;

use cutout::app::App;
use cutout::config::Config;
use cutout::history::HistoryStore;
use cutout::logging;
use cutout::pipeline::U2NetRemover;
use cutout::session::Session;

struct Args {
    config_path: Option<PathBuf>,
    image: Option<PathBuf>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config_path: None,
        image: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("cutout {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            arg => {
                if parsed.image.is_some() {
                    eprintln!("Error: only one image can be opened at a time");
                    std::process::exit(1);
                }
                parsed.image = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"cutout - remove image backgrounds from the terminal

USAGE:
    cutout [OPTIONS] [IMAGE]

ARGS:
    IMAGE               Image to open on startup (jpg, jpeg, png)

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    CUTOUT_CONFIG       Path to config file (overrides default location)
    CUTOUT_LOG          Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/cutout/config.toml"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    let config = match args.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // journald on Linux, file fallback otherwise
    let _ = logging::init(&config.log);

    let store = HistoryStore::new(&config.history);
    store.ensure_blob_dir()?;

    // Load the model before the TUI takes the terminal; a download can take a while
    let remover = U2NetRemover::new(config.model.clone());
    if !config.model.model_path().exists() {
        eprintln!("Downloading background removal model from {}...", config.model.url);
    }
    if let Err(e) = remover.init() {
        tracing::warn!(error = ?e, "Background removal model unavailable, retrying on first use");
        eprintln!("Warning: {:#}", e);
    }
    let session = Session::new(&config, store, Box::new(remover));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, session);
    if let Some(image) = args.image {
        app.request_upload(image);
    }
    let result = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        tracing::error!(error = ?e, "Exited with error");
    }
    result
}
