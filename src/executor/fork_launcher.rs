use std::ffi::{c_char, c_int, CString};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use log::debug;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use crate::ast::{Command, RedirectKind};
use crate::error::SHELL_TAG;
use super::executor::ExecError;
use super::launcher::{redirect_flags, Binding, Launcher, StageIo, StageProcess, StageStatus, REDIRECT_MODE};

/// Launches stages with a bare `fork` + `execvp`, rewiring stdin/stdout by
/// hand in the child.
///
/// Everything the child touches is built before forking, so between `fork`
/// and `exec` the child only makes async-signal-safe libc calls.
pub struct ForkLauncher;

enum ChildStream {
    Inherit,
    Fd(OwnedFd),
    File { path: CString, flags: c_int, failure: Vec<u8> },
}

impl ChildStream {
    fn prepare(binding: Binding, kind: RedirectKind) -> Result<Self, ExecError> {
        Ok(match binding {
            Binding::Inherit => ChildStream::Inherit,
            Binding::Pipe(fd) => ChildStream::Fd(fd),
            Binding::File(path) => {
                let failure = match kind {
                    RedirectKind::In => "can't redirect stdin to a file",
                    RedirectKind::Out => "can't redirect stdout to a file",
                };
                ChildStream::File {
                    path: CString::new(path.as_os_str().as_bytes())
                        .map_err(|_| ExecError::InvalidArgument(path.display().to_string()))?,
                    flags: redirect_flags(kind).bits(),
                    failure: format!("{}: {}: {}: ", SHELL_TAG, failure, path.display()).into_bytes(),
                }
            }
        })
    }
}

struct ChildPlan {
    argv: Vec<CString>,
    argv_ptrs: Vec<*const c_char>,
    stdin: ChildStream,
    stdout: ChildStream,
    not_found: Vec<u8>,
    exec_failure: Vec<u8>,
    rewire_failure: Vec<u8>,
}

impl ChildPlan {
    fn new(cmd: &Command, io: StageIo) -> Result<Self, ExecError> {
        let argv = cmd
            .argv()
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ExecError::InvalidArgument(cmd.program().to_string()))?;
        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();

        Ok(ChildPlan {
            argv,
            argv_ptrs,
            stdin: ChildStream::prepare(io.stdin, RedirectKind::In)?,
            stdout: ChildStream::prepare(io.stdout, RedirectKind::Out)?,
            not_found: format!("{}: {}: command not found\n", SHELL_TAG, cmd.program()).into_bytes(),
            exec_failure: format!("{}: {}: can't execute: ", SHELL_TAG, cmd.program()).into_bytes(),
            rewire_failure: format!("{}: can't rebind standard streams: ", SHELL_TAG).into_bytes(),
        })
    }
}

fn write_stderr(bytes: &[u8]) {
    // SAFETY: plain write(2) of a live buffer.
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}

// Reports `errno` after `prefix` and leaves the child with `status`.
fn child_exit(prefix: &[u8], errno: Errno, status: c_int) -> ! {
    write_stderr(prefix);
    write_stderr(errno.desc().as_bytes());
    write_stderr(b"\n");
    // SAFETY: _exit skips atexit handlers and stdio buffers shared with the parent.
    unsafe { libc::_exit(status) }
}

fn child_fail(prefix: &[u8]) -> ! {
    child_exit(prefix, Errno::last(), 1)
}

fn child_rewire(fd: RawFd, target: RawFd, failure: &[u8]) {
    // open(2) hands out the lowest free descriptor, which is already the
    // target when the shell was started with that stream closed
    if fd == target {
        return;
    }
    // SAFETY: both descriptors are owned by this (child) process.
    unsafe {
        if libc::dup2(fd, target) < 0 {
            child_fail(failure);
        }
        if libc::close(fd) < 0 {
            child_fail(failure);
        }
    }
}

fn child_bind(stream: &ChildStream, target: RawFd, failure: &[u8]) {
    match stream {
        ChildStream::Inherit => {}
        ChildStream::Fd(fd) => child_rewire(fd.as_raw_fd(), target, failure),
        ChildStream::File { path, flags, failure: open_failure } => {
            // SAFETY: `path` is a valid NUL-terminated string built before fork.
            let fd = unsafe { libc::open(path.as_ptr(), *flags, REDIRECT_MODE as libc::c_uint) };
            if fd < 0 {
                child_fail(open_failure);
            }
            child_rewire(fd, target, failure);
        }
    }
}

// Runs in the forked child; never returns.
fn run_child(plan: &ChildPlan) -> ! {
    child_bind(&plan.stdin, libc::STDIN_FILENO, &plan.rewire_failure);
    child_bind(&plan.stdout, libc::STDOUT_FILENO, &plan.rewire_failure);
    // SAFETY: restores the default disposition the parent runtime ignores, then
    // execs with a NULL-terminated argv whose strings outlive the call.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        libc::execvp(plan.argv[0].as_ptr(), plan.argv_ptrs.as_ptr());
    }
    match Errno::last() {
        Errno::ENOENT => {
            write_stderr(&plan.not_found);
            // SAFETY: see `child_exit`.
            unsafe { libc::_exit(127) }
        }
        errno => child_exit(&plan.exec_failure, errno, 126),
    }
}

struct ForkedStage {
    pid: Pid,
}

impl StageProcess for ForkedStage {
    fn id(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    fn wait(&mut self) -> Result<StageStatus, ExecError> {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(StageStatus::Exited(code)),
                Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(StageStatus::Signaled(signal as i32)),
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(errno) => return Err(ExecError::Wait(errno)),
            }
        }
    }
}

impl Launcher for ForkLauncher {
    fn launch(&mut self, cmd: &Command, io: StageIo) -> Result<Box<dyn StageProcess>, ExecError> {
        let plan = ChildPlan::new(cmd, io)?;

        // SAFETY: the child only runs `run_child`, which sticks to
        // async-signal-safe calls on memory prepared above.
        match unsafe { fork() }.map_err(ExecError::Fork)? {
            ForkResult::Child => run_child(&plan),
            ForkResult::Parent { child } => {
                debug!("forked {} as pid {}", cmd.program(), child);
                // dropping the plan closes the parent's copies of the pipe ends
                drop(plan);
                Ok(Box::new(ForkedStage { pid: child }))
            }
        }
    }
}
