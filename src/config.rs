use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::time::Duration;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub dump_dir: String,
    pub symbols_dir: String,
    pub stackwalk_tool: String,
    pub stackwalk_timeout: Duration,
    pub error_logfile: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Breakpad crash report collector")]
pub struct Args {
    /// Host to bind to (overrides CRASH_COLLECTOR_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CRASH_COLLECTOR_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Location of dumps and corresponding data (overrides CRASH_COLLECTOR_DUMP_DIR)
    #[arg(long)]
    pub dump_directory: Option<String>,

    /// Location of the symbols repository (overrides CRASH_COLLECTOR_SYMBOLS_DIR)
    #[arg(long)]
    pub symbols_directory: Option<String>,

    /// Stack-walking binary to invoke (overrides CRASH_COLLECTOR_STACKWALK_TOOL)
    #[arg(long)]
    pub stackwalk_tool: Option<String>,

    /// Seconds before a stack-walk invocation is abandoned
    /// (overrides CRASH_COLLECTOR_STACKWALK_TIMEOUT_SECS)
    #[arg(long)]
    pub stackwalk_timeout_secs: Option<u64>,

    /// File name of the error log (overrides CRASH_COLLECTOR_ERROR_LOGFILE)
    #[arg(long)]
    pub error_logfile: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("CRASH_COLLECTOR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("CRASH_COLLECTOR_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing CRASH_COLLECTOR_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8080,
            Err(err) => return Err(err).context("reading CRASH_COLLECTOR_PORT"),
        };
        let env_dump_dir = env::var("CRASH_COLLECTOR_DUMP_DIR").unwrap_or_else(|_| "/tmp".into());
        let env_symbols_dir = env::var("CRASH_COLLECTOR_SYMBOLS_DIR")
            .unwrap_or_else(|_| "/opt/breakpad-symbols".into());
        let env_tool = env::var("CRASH_COLLECTOR_STACKWALK_TOOL")
            .unwrap_or_else(|_| "minidump_stackwalk".into());
        let env_timeout = match env::var("CRASH_COLLECTOR_STACKWALK_TIMEOUT_SECS") {
            Ok(value) => Some(value.parse::<u64>().with_context(|| {
                format!(
                    "parsing CRASH_COLLECTOR_STACKWALK_TIMEOUT_SECS value `{}`",
                    value
                )
            })?),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err).context("reading CRASH_COLLECTOR_STACKWALK_TIMEOUT_SECS"),
        };
        let env_logfile = env::var("CRASH_COLLECTOR_ERROR_LOGFILE").ok();

        let timeout_secs = args
            .stackwalk_timeout_secs
            .or(env_timeout)
            .unwrap_or(DEFAULT_STACKWALK_TIMEOUT_SECS);

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            dump_dir: args.dump_directory.unwrap_or(env_dump_dir),
            symbols_dir: args.symbols_directory.unwrap_or(env_symbols_dir),
            stackwalk_tool: args.stackwalk_tool.unwrap_or(env_tool),
            stackwalk_timeout: Duration::from_secs(timeout_secs),
            error_logfile: args.error_logfile.or(env_logfile),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

const DEFAULT_STACKWALK_TIMEOUT_SECS: u64 = 300;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_joins_host_and_port() {
        let cfg = AppConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            dump_dir: "/tmp".into(),
            symbols_dir: "/opt/breakpad-symbols".into(),
            stackwalk_tool: "minidump_stackwalk".into(),
            stackwalk_timeout: Duration::from_secs(300),
            error_logfile: None,
        };
        assert_eq!(cfg.addr(), "127.0.0.1:8080");
    }
}
