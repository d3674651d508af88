use std::process::ExitCode;
use argh::FromArgs;
use log::{error, LevelFilter};
use tiny_pipe_shell::config::{Config, ConfigLoader, LauncherKind};
use tiny_pipe_shell::error::{ShellError, SHELL_TAG};
use tiny_pipe_shell::executor::WaitPolicy;
use tiny_pipe_shell::logging;
use tiny_pipe_shell::prompt::ShellPrompt;
use tiny_pipe_shell::shell::Shell;

#[derive(FromArgs)]
/// A small shell that runs pipelines of external programs.
struct Args {
    #[argh(option)]
    /// read settings from this key=value file
    config: Option<String>,

    #[argh(option)]
    /// log verbosity on stderr: off, error, warn, info, debug or trace
    log_level: Option<LevelFilter>,

    #[argh(option)]
    /// how stages are started: spawn or fork
    launcher: Option<LauncherKind>,

    #[argh(option)]
    /// when stages are reaped: deferred or per_stage
    wait: Option<WaitPolicy>,
}

impl Args {
    fn into_config(self) -> Result<Config, ShellError> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::default_config(),
        };
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(launcher) = self.launcher {
            config.launcher = launcher;
        }
        if let Some(wait) = self.wait {
            config.wait = wait;
        }
        Ok(config)
    }
}

fn run(args: Args) -> Result<(), ShellError> {
    let config = args.into_config()?;
    logging::init(config.log_level);

    let mut shell = Shell::new(&config)?;
    let mut prompt = ShellPrompt::new(config.prompt.as_str());
    shell.run(&mut prompt)
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("session aborted: {:?}", e);
            eprintln!("{}: {}", SHELL_TAG, e);
            ExitCode::FAILURE
        }
    }
}
