use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use log::debug;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd::pipe2;
use super::executor::ExecError;
use super::pipeline::PipeSlot;

#[derive(Debug)]
struct Pipe {
    read: Option<OwnedFd>,
    write: Option<OwnedFd>,
}

impl Pipe {
    fn open() -> Result<Self, ExecError> {
        // close-on-exec: children only ever see the ends dup'ed onto 0/1
        let (read, write) = pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?;
        Ok(Pipe {
            read: Some(read),
            write: Some(write),
        })
    }

    fn is_complete(&self) -> bool {
        self.read.is_some() && self.write.is_some()
    }
}

/// Owner of the session's two pipe objects. Ends are moved out to the stage
/// that uses them; whatever the parent still holds is closed on `recreate`.
#[derive(Debug)]
pub struct PipePair {
    pipes: [Pipe; 2],
}

impl PipePair {
    pub fn open() -> Result<Self, ExecError> {
        Ok(PipePair {
            pipes: [Pipe::open()?, Pipe::open()?],
        })
    }

    pub fn take_read(&mut self, slot: PipeSlot) -> Result<OwnedFd, ExecError> {
        self.pipes[slot.index()]
            .read
            .take()
            .ok_or(ExecError::Pipe(Errno::EBADF))
    }

    pub fn take_write(&mut self, slot: PipeSlot) -> Result<OwnedFd, ExecError> {
        self.pipes[slot.index()]
            .write
            .take()
            .ok_or(ExecError::Pipe(Errno::EBADF))
    }

    /// Closes whatever is left of `slot` and opens a fresh pipe in its place.
    pub fn recreate(&mut self, slot: PipeSlot) -> Result<(), ExecError> {
        let fresh = Pipe::open()?;
        let retired = std::mem::replace(&mut self.pipes[slot.index()], fresh);
        debug!("pipe {:?} retired, re-created", slot);
        drop(retired);
        Ok(())
    }

    /// Re-creates every slot that lost an end to an abandoned pipeline.
    pub fn restore(&mut self) -> Result<(), ExecError> {
        for slot in [PipeSlot::A, PipeSlot::B] {
            if !self.pipes[slot.index()].is_complete() {
                self.recreate(slot)?;
            }
        }
        Ok(())
    }

    /// Both pipe objects hold two open, valid descriptors.
    pub fn is_intact(&self) -> bool {
        self.pipes.iter().all(|pipe| {
            [&pipe.read, &pipe.write].into_iter().all(|end| {
                end.as_ref()
                    .is_some_and(|fd| fcntl(fd.as_raw_fd(), FcntlArg::F_GETFD).is_ok())
            })
        })
    }

    pub fn raw_fds(&self) -> Vec<RawFd> {
        self.pipes
            .iter()
            .flat_map(|pipe| [&pipe.read, &pipe.write])
            .filter_map(|end| end.as_ref().map(AsRawFd::as_raw_fd))
            .collect()
    }
}
