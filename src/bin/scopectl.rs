//! Command line interface to the microscope.

use clap::Parser;
use rust_scope::backend::Backend;
use rust_scope::cli::{self, Cli, EXIT_FAILURE};
use rust_scope::config::ScopeConfig;
use rust_scope::logging;

fn main() {
    let cli = Cli::parse();
    std::process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let config = match ScopeConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet.
            eprintln!("scopectl: {e}");
            return EXIT_FAILURE;
        }
    };

    let directive = match cli.log_level {
        Some(verbosity) => logging::verbosity_directive(verbosity),
        None => config.application.log_level.as_str(),
    };
    if let Err(e) = logging::init(directive) {
        eprintln!("scopectl: {e:#}");
    }

    let backend = match Backend::connect(&config) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("Failed to start the back-end: {e:#}");
            return EXIT_FAILURE;
        }
    };

    let code = cli::run(cli, &backend, &mut std::io::stdout().lock());
    if let Err(e) = backend.release() {
        tracing::error!("{e:#}");
    }
    code
}
