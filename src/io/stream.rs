/*!
 * Stream Endpoints
 * Owned byte streams over native descriptors / handles
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};

#[cfg(unix)]
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
#[cfg(windows)]
use std::os::windows::io::{AsHandle, AsRawHandle, BorrowedHandle, OwnedHandle};

/// Direction a stream can be used in, from the owner's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    #[inline]
    pub fn is_readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    #[inline]
    pub fn is_writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// Owned, readable-or-writable byte stream
///
/// Wraps exactly one native descriptor (POSIX) or handle (Windows). The
/// native object is released once, either by [`Stream::close`] or on drop.
pub struct Stream {
    file: Option<File>,
    access: Access,
}

impl Stream {
    /// Wrap an open file
    pub fn new(file: File, access: Access) -> Self {
        Self {
            file: Some(file),
            access,
        }
    }

    /// Wrap a file the owner reads from
    pub fn reader(file: File) -> Self {
        Self::new(file, Access::Read)
    }

    /// Wrap a file the owner writes to
    pub fn writer(file: File) -> Self {
        Self::new(file, Access::Write)
    }

    #[cfg(unix)]
    pub fn from_owned_fd(fd: OwnedFd, access: Access) -> Self {
        Self::new(File::from(fd), access)
    }

    #[cfg(windows)]
    pub fn from_owned_handle(handle: OwnedHandle, access: Access) -> Self {
        Self::new(File::from(handle), access)
    }

    #[inline]
    pub fn access(&self) -> Access {
        self.access
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Open and readable by the owner
    pub fn is_readable(&self) -> bool {
        self.is_open() && self.access.is_readable()
    }

    /// Open and writable by the owner
    pub fn is_writable(&self) -> bool {
        self.is_open() && self.access.is_writable()
    }

    /// Flush and release the native object
    ///
    /// Closing an already closed stream is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => {
                if self.access.is_writable() {
                    file.flush()?;
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Independent stream over a duplicate of the same native object
    pub fn duplicate(&self) -> io::Result<Stream> {
        let file = self.open_file()?.try_clone()?;
        Ok(Stream::new(file, self.access))
    }

    /// Toggle non-blocking mode on the underlying descriptor / pipe handle
    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        let file = self.open_file()?;
        sys::set_nonblocking(file, nonblocking)
    }

    /// Give up ownership of the native object
    pub fn into_file(mut self) -> Option<File> {
        self.file.take()
    }

    #[cfg(unix)]
    pub fn as_fd(&self) -> Option<BorrowedFd<'_>> {
        self.file.as_ref().map(|f| f.as_fd())
    }

    #[cfg(windows)]
    pub fn as_handle(&self) -> Option<BorrowedHandle<'_>> {
        self.file.as_ref().map(|f| f.as_handle())
    }

    fn open_file(&self) -> io::Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream is closed"))
    }

    fn file_for(&mut self, readable: bool) -> io::Result<&mut File> {
        let allowed = if readable {
            self.access.is_readable()
        } else {
            self.access.is_writable()
        };
        if !allowed {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                if readable {
                    "stream is not readable"
                } else {
                    "stream is not writable"
                },
            ));
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream is closed"))
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file_for(true)?.read(buf)
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_for(false)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_for(false)?.flush()
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Stream");
        s.field("access", &self.access);
        match &self.file {
            #[cfg(unix)]
            Some(file) => s.field("fd", &file.as_raw_fd()),
            #[cfg(windows)]
            Some(file) => s.field("handle", &file.as_raw_handle()),
            #[cfg(not(any(unix, windows)))]
            Some(_) => s.field("open", &true),
            None => s.field("closed", &true),
        };
        s.finish()
    }
}

#[cfg(unix)]
mod sys {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    use std::fs::File;
    use std::io;
    use std::os::fd::AsRawFd;

    pub(super) fn set_nonblocking(file: &File, nonblocking: bool) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
        let flags = if nonblocking {
            flags | OFlag::O_NONBLOCK
        } else {
            flags - OFlag::O_NONBLOCK
        };
        fcntl(fd, FcntlArg::F_SETFL(flags))?;
        Ok(())
    }
}

#[cfg(windows)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::System::Pipes::{SetNamedPipeHandleState, PIPE_NOWAIT, PIPE_WAIT};

    pub(super) fn set_nonblocking(file: &File, nonblocking: bool) -> io::Result<()> {
        let mode = if nonblocking { PIPE_NOWAIT } else { PIPE_WAIT };
        // Only meaningful for pipe handles; fails with ERROR_INVALID_PARAMETER otherwise
        let ok = unsafe {
            SetNamedPipeHandleState(
                file.as_raw_handle(),
                &mode,
                std::ptr::null(),
                std::ptr::null(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    use std::fs::File;
    use std::io;

    pub(super) fn set_nonblocking(_file: &File, _nonblocking: bool) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "non-blocking streams are not supported on this platform",
        ))
    }
}
