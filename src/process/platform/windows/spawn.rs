/*!
 * Windows Spawn
 * Standard handle resolution and CreateProcessW
 */

use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::limits::NULL_DEVICE;
use crate::io::Stream;
use crate::process::cmdline::{build_command_line, build_environment_block};
use crate::process::traits::StdioEndpoints;
use crate::process::types::{IoOption, ProcessConfig, StdStream};
use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, IntoRawHandle, OwnedHandle};
use std::ptr;

use windows_sys::Win32::Foundation::{
    DuplicateHandle, SetHandleInformation, DUPLICATE_SAME_ACCESS, HANDLE, HANDLE_FLAG_INHERIT,
    INVALID_HANDLE_VALUE, TRUE,
};
use windows_sys::Win32::System::Console::{
    GetStdHandle, STD_ERROR_HANDLE, STD_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};
use windows_sys::Win32::System::Pipes::CreatePipe;
use windows_sys::Win32::System::Threading::{
    CreateProcessW, GetCurrentProcess, CREATE_NEW_PROCESS_GROUP, CREATE_UNICODE_ENVIRONMENT,
    DETACHED_PROCESS, PROCESS_INFORMATION, STARTF_USESTDHANDLES, STARTUPINFOW,
};

/// Native identity of a freshly created child
pub(super) struct CreatedProcess {
    pub(super) process: OwnedHandle,
    pub(super) thread: OwnedHandle,
    pub(super) pid: u32,
}

/// Child-side standard handles, all inheritable, closed once creation returns
struct ChildHandles {
    stdin: OwnedHandle,
    stdout: OwnedHandle,
    stderr: OwnedHandle,
}

fn to_wide(value: &OsStr) -> Vec<u16> {
    value.encode_wide().chain(std::iter::once(0)).collect()
}

fn std_handle_id(stream: StdStream) -> STD_HANDLE {
    match stream {
        StdStream::Stdin => STD_INPUT_HANDLE,
        StdStream::Stdout => STD_OUTPUT_HANDLE,
        StdStream::Stderr => STD_ERROR_HANDLE,
    }
}

/// Duplicate a handle of this process as an inheritable handle
fn duplicate_inheritable(source: HANDLE) -> ProcessResult<OwnedHandle> {
    let mut target: HANDLE = ptr::null_mut();
    let ok = unsafe {
        let current = GetCurrentProcess();
        DuplicateHandle(
            current,
            source,
            current,
            &mut target,
            0,
            TRUE,
            DUPLICATE_SAME_ACCESS,
        )
    };
    if ok == 0 {
        return Err(ProcessError::last_os_error());
    }
    Ok(unsafe { OwnedHandle::from_raw_handle(target) })
}

fn set_inheritable(handle: HANDLE, inheritable: bool) -> ProcessResult<()> {
    let flags = if inheritable { HANDLE_FLAG_INHERIT } else { 0 };
    if unsafe { SetHandleInformation(handle, HANDLE_FLAG_INHERIT, flags) } == 0 {
        return Err(ProcessError::last_os_error());
    }
    Ok(())
}

/// `NUL` opened in the direction the child uses the stream
fn open_null(stream: StdStream) -> ProcessResult<OwnedHandle> {
    let file = OpenOptions::new()
        .read(stream.child_access().is_readable())
        .write(stream.child_access().is_writable())
        .open(NULL_DEVICE)?;
    let handle = unsafe { OwnedHandle::from_raw_handle(file.into_raw_handle()) };
    set_inheritable(handle.as_raw_handle(), true)?;
    Ok(handle)
}

/// Anonymous pipe: (parent end as a `Stream`, inheritable child end)
///
/// Both ends are created non-inheritable; only a duplicate of the child end
/// is marked inheritable, so a concurrent `CreateProcessW` never sees the
/// parent end.
fn create_pipe(stream: StdStream) -> ProcessResult<(Stream, OwnedHandle)> {
    let mut read: HANDLE = ptr::null_mut();
    let mut write: HANDLE = ptr::null_mut();
    if unsafe { CreatePipe(&mut read, &mut write, ptr::null(), 0) } == 0 {
        return Err(ProcessError::last_os_error());
    }
    let (read, write) = unsafe {
        (
            OwnedHandle::from_raw_handle(read),
            OwnedHandle::from_raw_handle(write),
        )
    };

    let (parent, child) = if stream == StdStream::Stdin {
        (write, read)
    } else {
        (read, write)
    };

    let child = duplicate_inheritable(child.as_raw_handle())?;
    let parent = Stream::from_owned_handle(parent, stream.parent_access());
    parent.set_nonblocking(true)?;
    Ok((parent, child))
}

fn redirect_handle(config: &ProcessConfig<'_>, stream: StdStream) -> ProcessResult<OwnedHandle> {
    let handle = config
        .redirect(stream)
        .and_then(Stream::as_handle)
        .ok_or_else(|| {
            ProcessError::InvalidArgument(format!("{} redirect endpoint is closed", stream.name()))
        })?;
    duplicate_inheritable(handle.as_raw_handle())
}

fn inherit_handle(stream: StdStream) -> ProcessResult<OwnedHandle> {
    let handle = unsafe { GetStdHandle(std_handle_id(stream)) };
    if handle.is_null() || handle == INVALID_HANDLE_VALUE {
        tracing::debug!(stream = stream.name(), "No parent handle to inherit, using NUL");
        return open_null(stream);
    }
    duplicate_inheritable(handle)
}

fn resolve_handles(
    config: &ProcessConfig<'_>,
    parent: &mut StdioEndpoints,
) -> ProcessResult<ChildHandles> {
    let mut resolve = |stream: StdStream| -> ProcessResult<OwnedHandle> {
        match config.effective_option(stream) {
            IoOption::None => open_null(stream),
            IoOption::Inherit => inherit_handle(stream),
            IoOption::Redirect => redirect_handle(config, stream),
            IoOption::Create => {
                let (parent_end, child_end) = create_pipe(stream)?;
                parent.set(stream, parent_end);
                Ok(child_end)
            }
        }
    };

    Ok(ChildHandles {
        stdin: resolve(StdStream::Stdin)?,
        stdout: resolve(StdStream::Stdout)?,
        stderr: resolve(StdStream::Stderr)?,
    })
}

/// Create the child; every handle acquired here is owned, so an early
/// return releases all of them
pub(super) fn create_process(
    config: &ProcessConfig<'_>,
) -> ProcessResult<(CreatedProcess, StdioEndpoints)> {
    let mut command_line = to_wide(OsStr::new(&build_command_line(&config.args)));
    let environment = build_environment_block(&config.environment);
    let working_directory = config
        .working_directory
        .as_ref()
        .map(|dir| to_wide(dir.as_os_str()));

    let mut parent = StdioEndpoints::default();
    let child = resolve_handles(config, &mut parent)?;

    let mut startup: STARTUPINFOW = unsafe { std::mem::zeroed() };
    startup.cb = std::mem::size_of::<STARTUPINFOW>() as u32;
    startup.dwFlags = STARTF_USESTDHANDLES;
    startup.hStdInput = child.stdin.as_raw_handle();
    startup.hStdOutput = child.stdout.as_raw_handle();
    startup.hStdError = child.stderr.as_raw_handle();

    let mut flags = CREATE_UNICODE_ENVIRONMENT;
    if config.background {
        flags |= DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP;
    }

    let mut info: PROCESS_INFORMATION = unsafe { std::mem::zeroed() };
    let ok = unsafe {
        CreateProcessW(
            ptr::null(),
            command_line.as_mut_ptr(),
            ptr::null(),
            ptr::null(),
            TRUE,
            flags,
            environment
                .as_ref()
                .map_or(ptr::null(), |block| block.as_ptr().cast()),
            working_directory
                .as_ref()
                .map_or(ptr::null(), |dir| dir.as_ptr()),
            &startup,
            &mut info,
        )
    };
    if ok == 0 {
        return Err(ProcessError::last_os_error());
    }
    drop(child);

    let created = unsafe {
        CreatedProcess {
            process: OwnedHandle::from_raw_handle(info.hProcess),
            thread: OwnedHandle::from_raw_handle(info.hThread),
            pid: info.dwProcessId,
        }
    };
    Ok((created, parent))
}
