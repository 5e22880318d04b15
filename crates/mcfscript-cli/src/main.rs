//! Command-line runner for mcfscript automation scripts.
//!
//! Runs a script file, or reads statements from standard input one at a
//! time, with the HTTP verbs wired to a real client.
//!
//! # Usage
//!
//! ```bash
//! # Run a script, binding the remaining arguments to __args__
//! mcfscript create-job.mcf http://localhost:8345/mcf-api-service/json
//!
//! # Interactive: errors are reported and reading continues
//! mcfscript < statements.mcf
//!
//! # Override the configured base URL (bound to __base__) and timeout
//! mcfscript --base-url http://crawler:8345/mcf-api-service/json --timeout 30 run.mcf
//!
//! # Log to <dir>/mcfscript.log instead of stderr
//! RUST_LOG=mcfscript_core=debug mcfscript --log-dir /tmp/mcf run.mcf
//! ```

mod error;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use mcfscript_core::config::ScriptConfig;
use mcfscript_core::stream::TokenStream;
use mcfscript_core::transport::BlockingTransport;
use mcfscript_core::{ScriptParser, Variable};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// Run mcfscript automation scripts.
#[derive(Parser)]
#[command(name = "mcfscript")]
#[command(about = "Run mcfscript automation scripts against a crawler's REST API")]
#[command(version)]
struct Cli {
    /// Script file to run; statements are read from stdin when omitted
    script: Option<PathBuf>,

    /// Arguments bound to the script variable __args__
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Config file to use instead of ~/.mcfscript/config.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(short, long, env = "MCFSCRIPT_TIMEOUT")]
    timeout: Option<u64>,

    /// Base URL bound to the script variable __base__
    #[arg(short, long, env = "MCFSCRIPT_BASE_URL")]
    base_url: Option<String>,

    /// Write logs to <dir>/mcfscript.log instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_dir.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn init_logging(log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::never(dir, "mcfscript.log");
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file_appender)
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn load_config(cli: &Cli) -> Result<ScriptConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => ScriptConfig::load_from(path)?,
        None => ScriptConfig::load(),
    };
    if let Some(timeout) = cli.timeout {
        config.http_timeout_secs = Some(timeout);
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url = Some(base_url.clone());
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    let transport = BlockingTransport::new(&config)?;
    let mut parser = ScriptParser::new().with_transport(Rc::new(transport));
    if let Some(base_url) = config.base_url {
        parser.context_mut().set("__base__", Variable::Url(base_url));
    }

    match cli.script {
        Some(path) => {
            let file = File::open(&path).map_err(|source| CliError::ScriptFile {
                path: path.clone(),
                source,
            })?;
            let args = cli.args.into_iter().map(|a| Some(Variable::String(a))).collect();
            parser.context_mut().set("__args__", Variable::array(args));

            info!(script = %path.display(), "running script");
            let mut stream = TokenStream::new(Box::new(BufReader::new(file)));
            parser.execute(&mut stream)?;
            Ok(())
        }
        None => {
            run_interactive(&mut parser);
            Ok(())
        }
    }
}

/// Executes stdin statement by statement, reporting errors and carrying on.
fn run_interactive(parser: &mut ScriptParser) {
    let mut stream = TokenStream::new(Box::new(io::stdin().lock()));
    loop {
        match parser.execute_next(&mut stream) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                stream.recover();
            }
        }
    }
    debug!("end of input");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_and_trailing_args() {
        let cli = Cli::parse_from(["mcfscript", "job.mcf", "one", "--two"]);
        assert_eq!(cli.script, Some(PathBuf::from("job.mcf")));
        assert_eq!(cli.args, vec!["one", "--two"]);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from(["mcfscript", "--timeout", "5", "--base-url", "http://h/api"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.http_timeout_secs, Some(5));
        assert_eq!(config.base_url.as_deref(), Some("http://h/api"));
    }
}
