mod executor;
mod fork_launcher;
mod launcher;
mod pipeline;
mod pipes;

pub use executor::{ExecError, ExecOutcome, ExecStatus, PipelineExecutor, WaitPolicy};
pub use fork_launcher::ForkLauncher;
pub use launcher::{open_redirect, Binding, Launcher, SpawnLauncher, StageIo, StageProcess, StageStatus};
pub use pipeline::{Endpoint, PipeSlot, PipelineState, StageWiring};
pub use pipes::PipePair;

#[cfg(test)]
mod tests;
