use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use log::LevelFilter;
use thiserror::Error;
use crate::executor::WaitPolicy;
use crate::parser::DEFAULT_MAX_ARGS;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub prompt: String,
    pub exit_keyword: String,
    pub max_args: usize,
    pub launcher: LauncherKind,
    pub wait: WaitPolicy,
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        ConfigLoader::default_config()
    }
}

/// Which process launcher runs the pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherKind {
    Spawn,
    Fork,
}

impl FromStr for LauncherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spawn" => Ok(LauncherKind::Spawn),
            "fork" => Ok(LauncherKind::Fork),
            other => Err(format!("unknown launcher '{}' (expected spawn or fork)", other)),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn default_config() -> Config {
        Config {
            prompt: "> ".to_string(),
            exit_keyword: "exit".to_string(),
            max_args: DEFAULT_MAX_ARGS,
            launcher: LauncherKind::Spawn,
            wait: WaitPolicy::Deferred,
            log_level: LevelFilter::Warn,
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let file = File::open(path)?;
        let mut src = String::new();
        for line in BufReader::new(file).lines() {
            src.push_str(&line?);
            src.push('\n');
        }
        Self::load_from_str(&src)
    }

    /// Parses `key=value` lines. Blank lines and `#` comments are skipped.
    /// The prompt keeps its value verbatim, so `prompt=$ ` ends in a space.
    pub fn load_from_str(src: &str) -> Result<Config, ConfigError> {
        let mut config = Self::default_config();

        for (lineno, line) in src.lines().enumerate() {
            let line_no = lineno + 1;
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let Some((key, raw)) = line.split_once('=') else {
                return Err(ConfigError::parse(line_no, format!("no '=' found: {}", line)));
            };
            let value = raw.trim();

            match key.trim() {
                "prompt" => config.prompt = raw.to_string(),
                "exit_keyword" => {
                    if value.is_empty() {
                        return Err(ConfigError::parse(line_no, "exit_keyword can't be empty"));
                    }
                    config.exit_keyword = value.to_string();
                }
                "max_args" => match value.parse::<usize>() {
                    Ok(n) if n > 0 => config.max_args = n,
                    _ => return Err(ConfigError::parse(line_no, format!("invalid max_args: {}", value))),
                },
                "launcher" => config.launcher = value.parse().map_err(|e| ConfigError::parse(line_no, e))?,
                "wait" => config.wait = value.parse().map_err(|e| ConfigError::parse(line_no, e))?,
                "log_level" => match value.parse::<LevelFilter>() {
                    Ok(level) => config.log_level = level,
                    Err(_) => return Err(ConfigError::parse(line_no, format!("invalid log_level: {}", value))),
                },
                other => return Err(ConfigError::parse(line_no, format!("unknown key: {}", other))),
            }
        }

        Ok(config)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl ConfigError {
    fn parse(line: usize, message: impl Into<String>) -> Self {
        ConfigError::Parse {
            line,
            message: message.into(),
        }
    }
}
