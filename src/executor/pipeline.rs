/// One of the two rotating pipe objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeSlot {
    A = 0,
    B = 1,
}

impl PipeSlot {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn other(self) -> PipeSlot {
        match self {
            PipeSlot::A => PipeSlot::B,
            PipeSlot::B => PipeSlot::A,
        }
    }
}

/// Where a stage's stdin comes from or its stdout goes to. `Inherit` means
/// the shell's own stream, or the redirection file if the pipeline has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Inherit,
    Pipe(PipeSlot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageWiring {
    pub stdin: Endpoint,
    pub stdout: Endpoint,
}

/// Which pipe endpoints the next stage to launch should use.
///
/// Stages alternate between pipe A and pipe B, so a pipeline of any length
/// only ever needs two pipe objects: each stage talks to its neighbours only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Started,
    ContinuingOnA,
    DrainingA,
    ContinuingOnB,
    DrainingB,
}

impl PipelineState {
    pub fn begin(stage_count: usize) -> Self {
        if stage_count > 1 {
            PipelineState::Started
        } else {
            PipelineState::Idle
        }
    }

    /// Remaps a running pipeline to its draining state before the last stage.
    pub fn for_final_stage(self) -> Self {
        match self {
            PipelineState::Started | PipelineState::ContinuingOnA => PipelineState::DrainingA,
            PipelineState::ContinuingOnB => PipelineState::DrainingB,
            other => other,
        }
    }

    pub fn reading_from(self) -> Option<PipeSlot> {
        match self {
            PipelineState::ContinuingOnA | PipelineState::DrainingA => Some(PipeSlot::A),
            PipelineState::ContinuingOnB | PipelineState::DrainingB => Some(PipeSlot::B),
            PipelineState::Idle | PipelineState::Started => None,
        }
    }

    pub fn writing_to(self) -> Option<PipeSlot> {
        match self {
            PipelineState::Started => Some(PipeSlot::A),
            PipelineState::ContinuingOnA | PipelineState::ContinuingOnB => {
                self.reading_from().map(PipeSlot::other)
            }
            PipelineState::Idle | PipelineState::DrainingA | PipelineState::DrainingB => None,
        }
    }

    pub fn wiring(self) -> StageWiring {
        StageWiring {
            stdin: self.reading_from().map_or(Endpoint::Inherit, Endpoint::Pipe),
            stdout: self.writing_to().map_or(Endpoint::Inherit, Endpoint::Pipe),
        }
    }

    /// Moves past the stage just launched. Returns the next state and the pipe
    /// this stage retired (the one it read from), which must be re-created
    /// before it is used again.
    pub fn advance(self) -> (PipelineState, Option<PipeSlot>) {
        let next = match self.writing_to() {
            Some(PipeSlot::A) => PipelineState::ContinuingOnA,
            Some(PipeSlot::B) => PipelineState::ContinuingOnB,
            None => PipelineState::Idle,
        };
        (next, self.reading_from())
    }
}
