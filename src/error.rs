use std::io;
use thiserror::Error;
use crate::config::ConfigError;
use crate::executor::ExecError;

/// Prefix of every diagnostic the shell itself prints.
pub const SHELL_TAG: &str = "--sh";

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("can't read input: {0}")]
    Io(#[from] io::Error),
}
