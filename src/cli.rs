//! Command-line interface for fscache
//!
//! Parses arguments with clap and runs one cache operation against the cache
//! root. The `get` subcommand uses an external program as the producer, which
//! makes it possible to cache the output of slow or flaky commands from a shell.

use std::path::PathBuf;
use std::process::Command as ProcessCommand;

use clap::{Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::cache::{Cache, Produced};
use crate::config::{CacheConfig, Ttl};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// A payload argument is not valid JSON
    #[error("Invalid JSON payload: '{input}': {source}")]
    InvalidJson {
        input: String,
        #[source]
        source: serde_json::Error,
    },

    /// A payload could not be rendered for output
    #[error("Failed to render payload: {0}")]
    Render(#[from] serde_json::Error),
}

/// fscache - filesystem-backed read-through cache
#[derive(Parser, Debug)]
#[command(name = "fscache")]
#[command(about = "Read, write and populate a filesystem-backed cache")]
#[command(version)]
pub struct Cli {
    /// Cache root directory (default: $FSCACHE_PATH or the platform cache dir)
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_path: Option<PathBuf>,

    /// TTL used when a command has no --ttl: minutes, or "never"
    #[arg(long, value_name = "TTL", global = true)]
    pub default_ttl: Option<Ttl>,

    /// Allow bypass mode to be triggered
    #[arg(long, global = true)]
    pub allow_bypass: bool,

    /// Raise the bypass signal for this invocation (needs --allow-bypass)
    #[arg(long, global = true)]
    pub bypass: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Cache operations
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a fresh entry, or the fallback
    Read {
        key: String,
        /// Freshness limit: minutes, or "never"
        #[arg(long)]
        ttl: Option<Ttl>,
        /// JSON printed when the entry is missing or expired
        #[arg(long, value_name = "JSON")]
        fallback: Option<String>,
    },
    /// Store a JSON payload
    Write { key: String, payload: String },
    /// Remove an entry
    Delete {
        key: String,
        /// Also remove the key's directory
        #[arg(long)]
        dir: bool,
    },
    /// Print seconds since the entry was last written
    Age { key: String },
    /// Exit successfully if the entry is fresh
    Has {
        key: String,
        #[arg(long)]
        ttl: Option<Ttl>,
    },
    /// Print the file backing a key
    Path { key: String },
    /// Print a fresh entry, running PROGRAM to refill it when needed
    ///
    /// Examples:
    ///   fscache get weather.today --ttl 30 -- curl -s https://example.com/weather
    ///   fscache get build.sha -- git rev-parse HEAD
    Get {
        key: String,
        #[arg(long)]
        ttl: Option<Ttl>,
        /// Producer command and its arguments
        #[arg(last = true, required = true, value_name = "PROGRAM")]
        program: Vec<String>,
    },
}

/// What a command printed and whether it succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Text for stdout, if any
    pub output: Option<String>,
    /// Whether the process should exit successfully
    pub success: bool,
}

impl Outcome {
    fn printed(output: String) -> Self {
        Self {
            output: Some(output),
            success: true,
        }
    }

    fn status(success: bool) -> Self {
        Self {
            output: None,
            success,
        }
    }
}

impl Cli {
    /// Builds the cache configuration: environment first, then flags
    pub fn config(&self) -> CacheConfig {
        let mut config = CacheConfig::from_env();
        if let Some(path) = &self.cache_path {
            config.cache_path = path.clone();
        }
        if let Some(ttl) = self.default_ttl {
            config.default_ttl = ttl;
        }
        if self.allow_bypass {
            config.allow_cache_bypass = true;
        }
        config
    }

    /// Builds the cache, honouring --bypass as the bypass signal
    pub fn cache(&self) -> Cache {
        let cache = Cache::new(self.config());
        if self.bypass {
            cache.with_bypass_probe(|_| true)
        } else {
            cache
        }
    }
}

/// Parses a JSON command-line argument
pub fn parse_json_arg(input: &str) -> Result<Value, CliError> {
    serde_json::from_str(input).map_err(|source| CliError::InvalidJson {
        input: input.to_string(),
        source,
    })
}

/// Interprets the stdout of a successful producer run
///
/// Blank output, `null` and `false` count as empty. Output that is not JSON is
/// kept as a string.
pub fn interpret_output(stdout: &str) -> Produced<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Produced::Empty;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Null) | Ok(Value::Bool(false)) => Produced::Empty,
        Ok(value) => Produced::Value(value),
        Err(_) => Produced::Value(Value::String(trimmed.to_string())),
    }
}

/// Runs `program` as a producer
pub fn run_producer(program: &[String]) -> Produced<Value> {
    let Some((name, args)) = program.split_first() else {
        return Produced::Failed("no producer program given".into());
    };
    debug!(program = %name, "running producer");
    match ProcessCommand::new(name).args(args).output() {
        Ok(output) if output.status.success() => {
            interpret_output(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => Produced::Failed(
            format!(
                "{name} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )
            .into(),
        ),
        Err(e) => Produced::Failed(format!("failed to run {name}: {e}").into()),
    }
}

fn render(value: &Value) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Runs the parsed command against `cache`
pub fn run(cli: &Cli, cache: &Cache) -> Result<Outcome, CliError> {
    match &cli.command {
        Command::Read { key, ttl, fallback } => {
            let fallback = fallback.as_deref().map(parse_json_arg).transpose()?;
            match cache.read::<Value>(key, *ttl, fallback) {
                Some(value) => Ok(Outcome::printed(render(&value)?)),
                None => Ok(Outcome::status(false)),
            }
        }
        Command::Write { key, payload } => {
            let payload = parse_json_arg(payload)?;
            Ok(Outcome::status(cache.write(key, &payload)))
        }
        Command::Delete { key, dir } => Ok(Outcome::status(cache.delete(key, *dir))),
        Command::Age { key } => match cache.age(key) {
            Some(secs) => Ok(Outcome::printed(secs.to_string())),
            None => Ok(Outcome::status(false)),
        },
        Command::Has { key, ttl } => Ok(Outcome::status(cache.has(key, *ttl))),
        Command::Path { key } => Ok(Outcome::printed(cache.path(key).display().to_string())),
        Command::Get { key, ttl, program } => {
            match cache.get(key, || run_producer(program), *ttl) {
                Some(value) => Ok(Outcome::printed(render(&value)?)),
                None => Ok(Outcome::status(false)),
            }
        }
    }
}
