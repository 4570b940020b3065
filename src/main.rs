use chatnav::core::config;
use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;

#[derive(Parser)]
#[command(name = "chatnav", about = "Terminal driver for the chat client's navigation and live data")]
struct Args {
    /// Chat server base URL (overrides config and CHATNAV_SERVER_URL)
    #[arg(short, long)]
    server: Option<String>,

    /// Where auth state is persisted
    #[arg(long)]
    state_file: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Config errors are logged once the logger exists.
    let (file_config, config_error) = match config::load_config() {
        Ok(c) => (c, None),
        Err(e) => (config::ChatnavConfig::default(), Some(e)),
    };
    let resolved = config::resolve(
        &file_config,
        args.server.as_deref(),
        args.state_file.as_deref(),
    );

    // Initialize file logger, writes to chatnav.log in current directory by default
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Ok(log_file) = File::create(&resolved.log_file) {
        let _ = WriteLogger::init(level, log_config, log_file);
    }

    if let Some(e) = config_error {
        log::warn!("{}, using defaults", e);
    }
    log::info!("chatnav starting up against {}", resolved.server_url);

    chatnav::shell::run(resolved).await
}
