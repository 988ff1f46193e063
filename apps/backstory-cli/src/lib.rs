//! Startup shared by the command-line tools.

use backstory_core::config::{Config, Settings};
use tracing_subscriber::EnvFilter;

/// Logs to stderr; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).try_init();
}

/// Reads `.env` when present, then the layered configuration.
pub fn load_settings() -> anyhow::Result<Settings> {
    let _ = dotenvy::dotenv();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    Ok(config.settings()?)
}

/// Value following `args[*i]`, advancing `i`; exits with a usage error when absent.
pub fn flag_value(args: &[String], i: &mut usize) -> String {
    let flag = &args[*i];
    match args.get(*i + 1) {
        Some(v) => {
            *i += 1;
            v.clone()
        }
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(2);
        }
    }
}
