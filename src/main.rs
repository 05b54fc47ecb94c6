use clap::Parser;
use std::io::{self, BufRead};
use std::panic::{self, PanicHookInfo};
use tracing_subscriber::EnvFilter;

use victron_listener::app::{self, BleTransport, Engine};
use victron_listener::config;
use victron_listener::decode::victron::VictronDecoder;
use victron_listener::registry::DeviceRegistry;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

#[derive(Parser, Debug)]
#[command(author, about, version)]
struct Options {
    /// Verbose output, log received frames and emitted deltas
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Diagnostics go to stderr only; stdout is reserved for delta documents.
fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "warn,victron_listener=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Read the one-line JSON configuration document from stdin and build the
/// device registry.
fn load_registry() -> Result<DeviceRegistry, String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| format!("reading configuration: {e}"))?;
    let devices = config::parse(&line).map_err(|e| e.to_string())?;
    DeviceRegistry::load(devices).map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd, Signal K server) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    init_logging(options.verbose);

    let registry = match load_registry() {
        Ok(registry) => registry,
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    };
    tracing::info!("configured {} devices", registry.len());

    let mut engine = Engine::new(registry, VictronDecoder, io::stdout());
    match app::supervise(&BleTransport, &mut engine).await {
        Ok(_) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
