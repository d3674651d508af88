use log::{debug, info};
use crate::config::{Config, LauncherKind};
use crate::error::{ShellError, SHELL_TAG};
use crate::executor::{ExecOutcome, ForkLauncher, Launcher, PipelineExecutor, SpawnLauncher};
use crate::lexer::Lexer;
use crate::parser::Assembler;
use crate::prompt::LineSource;

/// Exit status recorded for a line that failed to parse.
pub const SYNTAX_ERROR_STATUS: i32 = 2;

/// What the session does after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// One interactive session: owns the pipe pair and runs lines until the
/// input ends or the exit keyword shows up.
pub struct Shell {
    assembler: Assembler,
    executor: PipelineExecutor,
    last_status: i32,
}

impl Shell {
    pub fn new(config: &Config) -> Result<Self, ShellError> {
        let launcher: Box<dyn Launcher> = match config.launcher {
            LauncherKind::Spawn => Box::new(SpawnLauncher),
            LauncherKind::Fork => Box::new(ForkLauncher),
        };
        Self::with_launcher(config, launcher)
    }

    pub fn with_launcher(config: &Config, launcher: Box<dyn Launcher>) -> Result<Self, ShellError> {
        debug!(
            "session: launcher {:?}, wait {:?}, exit keyword {:?}",
            config.launcher, config.wait, config.exit_keyword
        );
        Ok(Shell {
            assembler: Assembler::new(config.max_args),
            executor: PipelineExecutor::new(launcher, config.wait, config.exit_keyword.as_str())?,
            last_status: 0,
        })
    }

    /// Exit status of the most recent line.
    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    pub fn executor(&self) -> &PipelineExecutor {
        &self.executor
    }

    /// Parses and runs one input line. Only errors that leave the session
    /// unusable are returned; everything else is reported and skipped.
    pub fn run_line(&mut self, line: &str) -> Result<Flow, ShellError> {
        let mut lexer = Lexer::new(line);
        let pipeline = match self.assembler.assemble(&mut lexer) {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                println!("{}: {}", SHELL_TAG, e);
                self.last_status = SYNTAX_ERROR_STATUS;
                return Ok(Flow::Continue);
            }
        };

        match self.executor.exec(&pipeline)? {
            ExecOutcome::Code(code) => {
                self.last_status = code;
                Ok(Flow::Continue)
            }
            ExecOutcome::Exit => {
                self.last_status = 0;
                Ok(Flow::Exit)
            }
        }
    }

    pub fn run(&mut self, source: &mut dyn LineSource) -> Result<(), ShellError> {
        while let Some(line) = source.next_line()? {
            if self.run_line(&line)? == Flow::Exit {
                info!("exit keyword, leaving session");
                return Ok(());
            }
        }
        info!("end of input, leaving session");
        Ok(())
    }
}
