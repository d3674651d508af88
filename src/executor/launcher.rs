use std::fs::File;
use std::io;
use std::os::fd::{FromRawFd, OwnedFd};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{self, Child, ExitStatus, Stdio};
use log::debug;
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use crate::ast::{Command, RedirectKind};
use super::executor::ExecError;

/// How one standard stream of a stage is bound.
#[derive(Debug)]
pub enum Binding {
    Inherit,
    Pipe(OwnedFd),
    File(PathBuf),
}

impl Binding {
    fn into_stdio(self, kind: RedirectKind) -> Result<Stdio, ExecError> {
        match self {
            Binding::Inherit => Ok(Stdio::inherit()),
            Binding::Pipe(fd) => Ok(Stdio::from(fd)),
            Binding::File(path) => open_redirect(&path, kind).map(Stdio::from),
        }
    }
}

#[derive(Debug)]
pub struct StageIo {
    pub stdin: Binding,
    pub stdout: Binding,
}

impl StageIo {
    pub fn inherit() -> Self {
        StageIo {
            stdin: Binding::Inherit,
            stdout: Binding::Inherit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Exited(i32),
    Signaled(i32),
}

impl StageStatus {
    pub fn code(self) -> i32 {
        match self {
            StageStatus::Exited(code) => code,
            StageStatus::Signaled(signo) => 128 + signo,
        }
    }

    pub fn success(self) -> bool {
        self == StageStatus::Exited(0)
    }
}

impl From<ExitStatus> for StageStatus {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => StageStatus::Exited(code),
            (None, Some(signo)) => StageStatus::Signaled(signo),
            (None, None) => StageStatus::Exited(1),
        }
    }
}

/// A launched stage the parent can block on.
pub trait StageProcess {
    fn id(&self) -> u32;
    fn wait(&mut self) -> Result<StageStatus, ExecError>;
}

/// Starts one process for one pipeline stage.
///
/// Implementations take ownership of the bindings; any pipe end handed in is
/// closed on the parent side once the launch returns, whether it succeeded
/// or not.
pub trait Launcher {
    fn launch(&mut self, cmd: &Command, io: StageIo) -> Result<Box<dyn StageProcess>, ExecError>;
}

/// Opens a redirection target with the shell's legacy flags: output is
/// created and truncated, input is opened read-only but also created (empty)
/// when missing.
pub fn redirect_flags(kind: RedirectKind) -> OFlag {
    match kind {
        RedirectKind::In => OFlag::O_RDONLY | OFlag::O_CREAT,
        RedirectKind::Out => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
    }
}

pub const REDIRECT_MODE: libc::mode_t = 0o644;

pub fn open_redirect(path: &Path, kind: RedirectKind) -> Result<File, ExecError> {
    let flags = redirect_flags(kind) | OFlag::O_CLOEXEC;
    let mode = Mode::from_bits_truncate(REDIRECT_MODE);
    let fd = open(path, flags, mode).map_err(|errno| ExecError::Redirect {
        path: path.display().to_string(),
        source: io::Error::from(errno),
    })?;
    // SAFETY: `open` just returned this descriptor and nothing else owns it.
    Ok(File::from(unsafe { OwnedFd::from_raw_fd(fd) }))
}

/// Launches stages through `std::process::Command`; the runtime takes care of
/// duplicating the bound descriptors onto the child's stdin/stdout.
pub struct SpawnLauncher;

struct SpawnedStage(Child);

impl StageProcess for SpawnedStage {
    fn id(&self) -> u32 {
        self.0.id()
    }

    fn wait(&mut self) -> Result<StageStatus, ExecError> {
        let status = self.0.wait().map_err(|e| ExecError::Wait(errno_of(&e)))?;
        Ok(StageStatus::from(status))
    }
}

impl Launcher for SpawnLauncher {
    fn launch(&mut self, cmd: &Command, io: StageIo) -> Result<Box<dyn StageProcess>, ExecError> {
        let mut command = process::Command::new(cmd.program());
        command.args(cmd.args());
        command.stdin(io.stdin.into_stdio(RedirectKind::In)?);
        command.stdout(io.stdout.into_stdio(RedirectKind::Out)?);

        let child = command.spawn().map_err(|e| spawn_error(cmd.program(), e))?;
        debug!("spawned {} as pid {}", cmd.program(), child.id());
        Ok(Box::new(SpawnedStage(child)))
    }
}

fn errno_of(e: &io::Error) -> Errno {
    e.raw_os_error().map_or(Errno::UnknownErrno, Errno::from_raw)
}

// Only a failure to create the process is fatal; anything exec reports
// costs this stage alone.
fn spawn_error(program: &str, e: io::Error) -> ExecError {
    match e.raw_os_error().map(Errno::from_raw) {
        Some(Errno::ENOENT) => ExecError::CommandNotFound(program.to_string()),
        Some(errno @ (Errno::EAGAIN | Errno::ENOMEM)) => ExecError::Fork(errno),
        Some(errno) => ExecError::CannotExecute {
            program: program.to_string(),
            source: errno,
        },
        None if e.kind() == io::ErrorKind::InvalidInput => ExecError::InvalidArgument(program.to_string()),
        None => ExecError::CannotExecute {
            program: program.to_string(),
            source: Errno::UnknownErrno,
        },
    }
}
