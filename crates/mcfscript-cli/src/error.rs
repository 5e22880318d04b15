use std::path::PathBuf;
use std::process::ExitCode;

use mcfscript_core::config::ConfigError;
use mcfscript_core::error::{ScriptError, TransportError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    /// The script ran and failed.
    #[error("{0}")]
    Script(#[from] ScriptError),

    #[error("cannot read script {}: {source}", path.display())]
    ScriptFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad config: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Transport(#[from] TransportError),
}

impl CliError {
    /// 1 when the script failed, 2 when it could not be started.
    pub fn status(&self) -> u8 {
        match self {
            CliError::Script(_) => 1,
            CliError::ScriptFile { .. } | CliError::Config(_) | CliError::Transport(_) => 2,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status())
    }
}
