use clap::Parser;
use notewidth::cli::commands::Cli;
use notewidth::cli::handlers;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_env("NW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
