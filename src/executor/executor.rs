use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use log::debug;
use nix::errno::Errno;
use thiserror::Error;
use crate::ast::{Command, Pipeline};
use crate::error::SHELL_TAG;
use super::launcher::{Binding, Launcher, StageIo, StageProcess, StageStatus};
use super::pipeline::{Endpoint, PipelineState};
use super::pipes::PipePair;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("can't create internal pipes: {0}")]
    Pipe(#[source] Errno),
    #[error("can't fork program: {0}")]
    Fork(#[source] Errno),
    #[error("can't wait for child process: {0}")]
    Wait(#[source] Errno),
    #[error("{0}: command not found")]
    CommandNotFound(String),
    #[error("{program}: can't execute: {source}")]
    CannotExecute {
        program: String,
        #[source]
        source: Errno,
    },
    #[error("{0}: argument contains a NUL byte")]
    InvalidArgument(String),
    #[error("{path}: {source}")]
    Redirect {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ExecError {
    /// Resource failures end the whole session; everything else only costs
    /// the stage that hit it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecError::Pipe(_) | ExecError::Fork(_) | ExecError::Wait(_))
    }

    /// Exit status recorded for a stage that could not be launched.
    pub fn stage_status(&self) -> StageStatus {
        match self {
            ExecError::CommandNotFound(_) => StageStatus::Exited(127),
            ExecError::CannotExecute { .. } => StageStatus::Exited(126),
            _ => StageStatus::Exited(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Exit code of the last stage.
    Code(i32),
    /// The exit keyword was reached.
    Exit,
}

pub type ExecStatus = Result<ExecOutcome, ExecError>;

/// When the parent reaps the stages of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Launch every stage, then wait for all of them in order.
    Deferred,
    /// Wait for each stage before launching the next one. A stage whose
    /// output does not fit in the pipe buffer blocks forever.
    PerStage,
}

impl FromStr for WaitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deferred" => Ok(WaitPolicy::Deferred),
            "per_stage" => Ok(WaitPolicy::PerStage),
            other => Err(format!("unknown wait policy '{}' (expected deferred or per_stage)", other)),
        }
    }
}

/// Runs pipelines stage by stage over the two rotating pipe objects.
pub struct PipelineExecutor {
    launcher: Box<dyn Launcher>,
    pipes: PipePair,
    policy: WaitPolicy,
    exit_keyword: String,
}

impl PipelineExecutor {
    pub fn new(
        launcher: Box<dyn Launcher>,
        policy: WaitPolicy,
        exit_keyword: impl Into<String>,
    ) -> Result<Self, ExecError> {
        Ok(PipelineExecutor {
            launcher,
            pipes: PipePair::open()?,
            policy,
            exit_keyword: exit_keyword.into(),
        })
    }

    pub fn pipes(&self) -> &PipePair {
        &self.pipes
    }

    pub fn exec(&mut self, pipeline: &Pipeline) -> ExecStatus {
        if pipeline.is_empty() {
            return Ok(ExecOutcome::Code(0));
        }
        let count = pipeline.len();
        let mut state = PipelineState::begin(count);
        let mut running: Vec<(usize, Box<dyn StageProcess>)> = Vec::new();
        let mut last = StageStatus::Exited(0);

        for (i, cmd) in pipeline.stages.iter().enumerate() {
            if i + 1 == count {
                state = state.for_final_stage();
            }

            if cmd.program() == self.exit_keyword {
                debug!("exit keyword reached at stage {}", i);
                // drop abandoned pipe ends first so earlier stages can't block
                self.pipes.restore()?;
                reap(&mut running)?;
                return Ok(ExecOutcome::Exit);
            }

            debug!("stage {} {:?} in state {:?}", i, cmd.argv(), state);
            let io = self.stage_io(pipeline, i, state)?;
            match self.launch(cmd, io) {
                Ok(mut child) => match self.policy {
                    WaitPolicy::PerStage => last = child.wait()?,
                    WaitPolicy::Deferred => running.push((i, child)),
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    eprintln!("{}: {}", SHELL_TAG, e);
                    last = e.stage_status();
                }
            }

            let (next, retired) = state.advance();
            if let Some(slot) = retired {
                self.pipes.recreate(slot)?;
            }
            state = next;
        }

        for (i, status) in reap(&mut running)? {
            if i + 1 == count {
                last = status;
            }
        }
        Ok(ExecOutcome::Code(last.code()))
    }

    fn stage_io(&mut self, pipeline: &Pipeline, index: usize, state: PipelineState) -> Result<StageIo, ExecError> {
        let wiring = state.wiring();
        let redirect = &pipeline.redirection;

        let stdin = match wiring.stdin {
            Endpoint::Pipe(slot) => Binding::Pipe(self.pipes.take_read(slot)?),
            Endpoint::Inherit => match &redirect.input {
                Some(path) if index == 0 => Binding::File(PathBuf::from(path)),
                _ => Binding::Inherit,
            },
        };
        let stdout = match wiring.stdout {
            Endpoint::Pipe(slot) => Binding::Pipe(self.pipes.take_write(slot)?),
            Endpoint::Inherit => match &redirect.output {
                Some(path) if index + 1 == pipeline.len() => Binding::File(PathBuf::from(path)),
                _ => Binding::Inherit,
            },
        };
        Ok(StageIo { stdin, stdout })
    }

    fn launch(&mut self, cmd: &Command, io: StageIo) -> Result<Box<dyn StageProcess>, ExecError> {
        let child = self.launcher.launch(cmd, io)?;
        debug!("{} running as pid {}", cmd.program(), child.id());
        Ok(child)
    }
}

// Waits for every launched stage in launch order.
fn reap(running: &mut Vec<(usize, Box<dyn StageProcess>)>) -> Result<Vec<(usize, StageStatus)>, ExecError> {
    let mut statuses = Vec::with_capacity(running.len());
    for (i, mut child) in running.drain(..) {
        let status = child.wait()?;
        debug!("stage {} finished: {:?}", i, status);
        statuses.push((i, status));
    }
    Ok(statuses)
}
