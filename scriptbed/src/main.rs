//! Console for the scriptbed turn engine.
//!
//! Reads turns from stdin, runs them through the hook scripts in a scripts
//! directory, and prints what each turn recorded.
//!
//! ```bash
//! cargo run -p scriptbed -- --scripts ./scripts --max-operations 100000
//! ```

mod console;

use scriptbed_core::{SessionConfig, SessionHandle};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only the transcript
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,scriptbed::hook=info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = console::parse_config_from_args(&args, SessionConfig::from_env()?)?;
    info!(
        scripts = %config.scripts_dir.display(),
        max_operations = ?config.hooks.max_operations,
        "starting session"
    );

    let session = SessionHandle::spawn(config.build_engine());
    console::run_console(session).await
}

fn print_help() {
    println!("scriptbed - scripted turn engine console");
    println!();
    println!("Usage: scriptbed [--scripts <dir>] [--max-operations <n>]");
    println!();
    println!("Options:");
    println!("  --scripts <dir>         Directory holding library/input/context/output .rhai");
    println!("                          (env SCRIPTBED_SCRIPTS_DIR, default ./scripts)");
    println!("  --max-operations <n>    Abort a hook after n (> 0) interpreter operations");
    println!("                          (env SCRIPTBED_MAX_OPERATIONS)");
    println!("  -h, --help              Show this help");
    println!();
    println!("Set RUST_LOG to change log output, e.g. RUST_LOG=debug.");
}
