use clap::{Parser, Subcommand};
use serde_json::Value;
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use super::types::LogLevel;
use crate::gateway::{ArgKind, ArgSpec};

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub config_file_location: PathBuf,
    pub identity_file_location: Option<PathBuf>,
    pub log_level: LogLevel,
    pub command: Command,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Dispatch one operation and print its payload. Arguments stay raw until
    /// the operation is known; see [`typed_args`].
    Call { operation: String, args: Vec<String> },
    /// List registered operations with their argument names.
    Operations,
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Static -----------------------------------------------------

impl CliConfig {
    pub fn from_env() -> Result<Self, CliError> {
        Self::from_args(Args::try_parse()?)
    }

    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::from_args(Args::try_parse_from(iter)?)
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn from_args(args: Args) -> Result<Self, CliError> {
        let command = match args.command {
            CommandArgs::Call { operation, args } => Command::Call { operation, args },
            CommandArgs::Operations => Command::Operations,
        };

        let cfg = Self {
            config_file_location: args.config_file,
            identity_file_location: args.identity_file,
            log_level: args.log_level,
            command,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), CliError> {
        must_exist_file(&self.config_file_location, "--config / crystalgate.toml")?;

        if let Some(identity) = &self.identity_file_location {
            must_exist_file(identity, "--identity")?;
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "crystalgate", version, about = "Resilient gateway to the crystal ledger")]
struct Args {
    // Not required via CLI or ENV (defaults to info).
    #[arg(long = "log", default_value = "info", env = "CRYSTALGATE_LOG")]
    log_level: LogLevel,

    // Must exist; no defaults.
    #[arg(long = "config", env = "CRYSTALGATE_CONFIG_FILE")]
    config_file: PathBuf,

    // Optional; without it every call runs anonymously.
    #[arg(long = "identity", env = "CRYSTALGATE_IDENTITY_FILE")]
    identity_file: Option<PathBuf>,

    #[command(subcommand)]
    command: CommandArgs,
}

#[derive(Subcommand, Debug)]
enum CommandArgs {
    /// Call an operation. Text arguments (player ids, crystal types) are taken
    /// as-is, quoted or not; others are JSON.
    Call {
        operation: String,

        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List the operations the gateway knows about.
    Operations,
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Args(#[from] clap::Error),

    #[error("required file missing: {} (from {hint})", path.display())]
    MissingFile { path: PathBuf, hint: &'static str },

    #[error("path is not a file: {} (from {hint})", path.display())]
    NotAFile { path: PathBuf, hint: &'static str },
}

// -----------------------------------------------------------------------------
// ----- Arguments -------------------------------------------------------------

/// Turn raw command-line arguments into values for an operation declaring
/// `specs`. Text positions always become strings, so `12345` stays a player
/// id; a JSON-quoted `"Type1"` loses its quotes. Other positions (and extra
/// arguments) are JSON, falling back to a plain string.
pub fn typed_args(raw: &[String], specs: &[ArgSpec]) -> Vec<Value> {
    raw.iter()
        .enumerate()
        .map(|(i, arg)| match specs.get(i).map(|spec| spec.kind) {
            Some(ArgKind::PlayerId | ArgKind::Text | ArgKind::OneOf(_)) => text_arg(arg),
            _ => json_arg(arg),
        })
        .collect()
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn text_arg(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(s)) => Value::String(s),
        _ => Value::String(raw.to_string()),
    }
}

fn json_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn must_exist_file(path: &Path, hint: &'static str) -> Result<(), CliError> {
    let md = fs::metadata(path).map_err(|_| CliError::MissingFile {
        path: path.to_path_buf(),
        hint,
    })?;

    if !md.is_file() {
        return Err(CliError::NotAFile {
            path: path.to_path_buf(),
            hint,
        });
    }

    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
