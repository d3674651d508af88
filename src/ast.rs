/// One pipeline stage: `argv[0]` is the program, the rest are its arguments.
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Vec<String>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Command {
            argv: vec![program.into()],
        }
    }

    pub fn push_arg(&mut self, arg: impl Into<String>) {
        self.argv.push(arg.into());
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// `None` for an empty argument vector.
    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Command { argv })
        }
    }
}

/// Files replacing the pipeline's outer streams. `input` feeds the first
/// stage, `output` receives the last stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirection {
    pub input: Option<String>,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Command>,
    pub redirection: Redirection,
}

impl Pipeline {
    pub fn single(cmd: Command) -> Self {
        Pipeline {
            stages: vec![cmd],
            redirection: Redirection::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
