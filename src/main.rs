//! Quire CLI
//!
//! Usage:
//!   quire [OPTIONS] <VIEW>
//!
//! Options:
//!   -c, --config <FILE>   View configuration (TOML format)
//!   -p, --path <DIR>      Add a view search location (repeatable)
//!   --cache <DIR>         Directory for compiled views
//!   -d, --data <FILE>     JSON object bound as view data
//!   --compile <FILE>      Print the compiled script for a template and exit
//!   -v, --verbose         Log compilation and rendering
//!   -h, --help            Print help

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quire::{compile_string, Data, Environment, Value, ViewConfig, ViewError};

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Render directive view templates")]
struct Cli {
    /// Logical view name, e.g. `pages.home` or `mail::welcome`
    #[arg(required_unless_present = "compile")]
    view: Option<String>,

    /// View configuration (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Add a view search location
    #[arg(short, long = "path")]
    paths: Vec<PathBuf>,

    /// Directory for compiled views
    #[arg(long)]
    cache: Option<PathBuf>,

    /// JSON object bound as view data
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Print the compiled script for a template and exit
    #[arg(long, value_name = "FILE")]
    compile: Option<PathBuf>,

    /// Log compilation and rendering
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &cli.compile {
        match fs::read_to_string(path) {
            Ok(source) => print!("{}", compile_string(&source)),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        }
        return;
    }

    // Load configuration, then apply command-line overrides
    let mut config = match &cli.config {
        Some(path) => match ViewConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ViewConfig::new(),
    };
    config.paths.extend(cli.paths.iter().cloned());
    if config.paths.is_empty() {
        config.paths.push(PathBuf::from("."));
    }
    if let Some(cache) = &cli.cache {
        config.cache = Some(cache.clone());
    }

    let data = match &cli.data {
        Some(path) => match load_data(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Error loading data '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Data::new(),
    };

    let Some(view) = cli.view.as_deref() else {
        eprintln!("Error: no view given");
        std::process::exit(1);
    };

    let env = Environment::from_config(&config);
    match env.render(view, data) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            report(&e);
            std::process::exit(1);
        }
    }
}

fn load_data(path: &Path) -> Result<Data, ViewError> {
    let content = fs::read_to_string(path).map_err(|e| ViewError::io(path, e))?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    match Value::from(json) {
        Value::Map(data) => Ok(data),
        other => Err(ViewError::runtime(format!(
            "view data must be a JSON object, found {}",
            other.type_name()
        ))),
    }
}

/// Print `err`, with a source report when a compiled script failed to parse
fn report(err: &ViewError) {
    eprintln!("Error: {}", err);

    if let ViewError::Script { path, source } = err.root_cause() {
        let Ok(text) = fs::read_to_string(path) else {
            return;
        };
        let script = match path.extension().and_then(|ext| ext.to_str()) {
            Some("quire") => compile_string(&text),
            _ => text,
        };
        eprintln!("{}", source.format(&script, &path.display().to_string()));
    }
}
