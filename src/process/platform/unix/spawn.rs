/*!
 * POSIX Spawn
 *
 * posix_spawn file actions, spawn attributes and the detached
 * fork-then-spawn protocol.
 */

use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult, SpawnTransaction};
use crate::core::limits::{FD_DIRECTORY, FD_SCAN_LIMIT, FIRST_NON_STD_FD, NULL_DEVICE};
use crate::io::Stream;
use crate::process::traits::StdioEndpoints;
use crate::process::types::{IoOption, ProcessConfig, StdStream};
use libc::{c_char, c_int};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "illumos",
    target_os = "solaris"
))]
use nix::unistd::pipe2;
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::Read;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

#[cfg(any(target_os = "linux", target_os = "macos"))]
extern "C" {
    fn posix_spawn_file_actions_addchdir_np(
        actions: *mut libc::posix_spawn_file_actions_t,
        path: *const c_char,
    ) -> c_int;
}

#[cfg(not(target_os = "macos"))]
extern "C" {
    static environ: *const *mut c_char;
}

/// Live environment block of this process
fn current_environ() -> *const *mut c_char {
    #[cfg(target_os = "macos")]
    unsafe {
        *libc::_NSGetEnviron() as *const *mut c_char
    }
    #[cfg(not(target_os = "macos"))]
    unsafe {
        environ
    }
}

fn check(rc: c_int) -> ProcessResult<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(ProcessError::from_os_code(rc))
    }
}

/// Owned `posix_spawn_file_actions_t`
///
/// Boxed so the initialized object never moves.
pub(super) struct FileActions {
    raw: libc::posix_spawn_file_actions_t,
    metadata: GuardMetadata,
    active: bool,
}

impl FileActions {
    pub(super) fn new() -> ProcessResult<Box<Self>> {
        let mut actions = Box::new(Self {
            raw: unsafe { std::mem::zeroed() },
            metadata: GuardMetadata::new("posix_spawn_file_actions"),
            active: false,
        });
        check(unsafe { libc::posix_spawn_file_actions_init(&mut actions.raw) })?;
        actions.active = true;
        Ok(actions)
    }

    fn add_open(&mut self, fd: RawFd, path: &CStr, flags: OFlag) -> ProcessResult<()> {
        check(unsafe {
            libc::posix_spawn_file_actions_addopen(
                &mut self.raw,
                fd,
                path.as_ptr(),
                flags.bits(),
                0,
            )
        })
    }

    fn add_dup2(&mut self, fd: RawFd, target: RawFd) -> ProcessResult<()> {
        check(unsafe { libc::posix_spawn_file_actions_adddup2(&mut self.raw, fd, target) })
    }

    fn add_close(&mut self, fd: RawFd) -> ProcessResult<()> {
        check(unsafe { libc::posix_spawn_file_actions_addclose(&mut self.raw, fd) })
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    pub(super) fn add_chdir(&mut self, dir: &CStr) -> ProcessResult<()> {
        check(unsafe { posix_spawn_file_actions_addchdir_np(&mut self.raw, dir.as_ptr()) })
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    pub(super) fn add_chdir(&mut self, _dir: &CStr) -> ProcessResult<()> {
        Err(ProcessError::Unsupported(
            "changing the working directory before exec".to_string(),
        ))
    }

    fn as_ptr(&self) -> *const libc::posix_spawn_file_actions_t {
        &self.raw
    }
}

impl Guard for FileActions {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.active {
            return Err(GuardError::AlreadyReleased);
        }
        self.active = false;
        let rc = unsafe { libc::posix_spawn_file_actions_destroy(&mut self.raw) };
        if rc != 0 {
            return Err(GuardError::OperationFailed(Errno::from_raw(rc).to_string()));
        }
        Ok(())
    }
}

impl GuardDrop for FileActions {}

impl Drop for FileActions {
    fn drop(&mut self) {
        self.on_drop();
    }
}

/// Owned `posix_spawnattr_t`
///
/// Resets the signal mask and restores `SIGPIPE`, which the Rust runtime
/// ignores and exec would otherwise carry over.
pub(super) struct SpawnAttributes {
    raw: libc::posix_spawnattr_t,
    metadata: GuardMetadata,
    active: bool,
}

impl SpawnAttributes {
    pub(super) fn new() -> ProcessResult<Box<Self>> {
        let mut attrs = Box::new(Self {
            raw: unsafe { std::mem::zeroed() },
            metadata: GuardMetadata::new("posix_spawnattr"),
            active: false,
        });
        check(unsafe { libc::posix_spawnattr_init(&mut attrs.raw) })?;
        attrs.active = true;

        unsafe {
            let mut empty: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut empty);
            check(libc::posix_spawnattr_setsigmask(&mut attrs.raw, &empty))?;

            let mut defaults: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut defaults);
            libc::sigaddset(&mut defaults, libc::SIGPIPE);
            check(libc::posix_spawnattr_setsigdefault(&mut attrs.raw, &defaults))?;

            let flags = libc::POSIX_SPAWN_SETSIGMASK | libc::POSIX_SPAWN_SETSIGDEF;
            check(libc::posix_spawnattr_setflags(
                &mut attrs.raw,
                flags as libc::c_short,
            ))?;
        }

        Ok(attrs)
    }

    fn as_ptr(&self) -> *const libc::posix_spawnattr_t {
        &self.raw
    }
}

impl Guard for SpawnAttributes {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.active {
            return Err(GuardError::AlreadyReleased);
        }
        self.active = false;
        let rc = unsafe { libc::posix_spawnattr_destroy(&mut self.raw) };
        if rc != 0 {
            return Err(GuardError::OperationFailed(Errno::from_raw(rc).to_string()));
        }
        Ok(())
    }
}

impl GuardDrop for SpawnAttributes {}

impl Drop for SpawnAttributes {
    fn drop(&mut self) {
        self.on_drop();
    }
}

/// NULL-terminated `char *[]` over owned C strings
pub(super) struct CStringArray {
    items: Vec<CString>,
    ptrs: Vec<*mut c_char>,
}

impl CStringArray {
    pub(super) fn new<I, S>(strings: I) -> ProcessResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        let items = strings
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProcessError::InvalidArgument(e.to_string()))?;

        let mut ptrs: Vec<*mut c_char> = items.iter().map(|s| s.as_ptr() as *mut c_char).collect();
        ptrs.push(ptr::null_mut());

        Ok(Self { items, ptrs })
    }

    pub(super) fn first(&self) -> Option<&CStr> {
        self.items.first().map(CString::as_c_str)
    }

    pub(super) fn len(&self) -> usize {
        self.items.len()
    }

    fn as_ptr(&self) -> *const *mut c_char {
        self.ptrs.as_ptr()
    }
}

/// Build the `KEY=VALUE` vector, `None` to inherit the live environment
pub(super) fn build_envp(config: &ProcessConfig<'_>) -> ProcessResult<Option<CStringArray>> {
    if config.inherits_environment() {
        return Ok(None);
    }
    let pairs = config
        .environment
        .iter()
        .map(|(key, value)| format!("{}={}", key, value));
    CStringArray::new(pairs).map(Some)
}

/// Everything one posix_spawn call needs, kept alive until it returns
pub(super) struct SpawnPlan {
    pub(super) actions: Box<FileActions>,
    pub(super) attrs: Box<SpawnAttributes>,
    pub(super) argv: CStringArray,
    pub(super) envp: Option<CStringArray>,
    pub(super) parent: StdioEndpoints,
    /// Child-facing pipe ends; closed in the parent once the spawn returns
    child_ends: Vec<OwnedFd>,
    _null_device: CString,
    _working_directory: Option<CString>,
}

impl SpawnPlan {
    pub(super) fn build(config: &ProcessConfig<'_>) -> ProcessResult<Self> {
        let argv = CStringArray::new(config.args.iter().map(String::as_str))?;
        let envp = build_envp(config)?;
        let mut actions = FileActions::new()?;
        let attrs = SpawnAttributes::new()?;

        let null_device = CString::new(NULL_DEVICE)
            .map_err(|e| ProcessError::InvalidArgument(e.to_string()))?;

        let mut parent = StdioEndpoints::default();
        let mut child_ends = Vec::new();

        for stream in StdStream::ALL {
            match config.effective_option(stream) {
                IoOption::Inherit => {}
                IoOption::None => {
                    let flags = if stream == StdStream::Stdin {
                        OFlag::O_RDONLY
                    } else {
                        OFlag::O_WRONLY
                    };
                    actions.add_open(stream.fd(), &null_device, flags)?;
                }
                IoOption::Create => {
                    let (parent_end, child_end) = create_pipe(stream)?;
                    actions.add_dup2(child_end.as_raw_fd(), stream.fd())?;
                    child_ends.push(child_end);
                    parent.set(stream, parent_end);
                }
                IoOption::Redirect => {
                    let fd = redirect_fd(config, stream)?;
                    actions.add_dup2(fd, stream.fd())?;
                }
            }
        }

        for fd in inherited_fds() {
            actions.add_close(fd)?;
        }

        let working_directory = match &config.working_directory {
            Some(dir) => {
                let dir = path_to_cstring(dir)?;
                actions.add_chdir(&dir)?;
                Some(dir)
            }
            None => None,
        };

        Ok(Self {
            actions,
            attrs,
            argv,
            envp,
            parent,
            child_ends,
            _null_device: null_device,
            _working_directory: working_directory,
        })
    }

    fn envp_ptr(&self) -> *const *mut c_char {
        match &self.envp {
            Some(envp) => envp.as_ptr(),
            None => current_environ(),
        }
    }

    /// One `posix_spawnp` call with this plan
    ///
    /// Async-signal-safe, so it may run in a freshly forked child.
    fn spawn_raw(&self) -> (c_int, libc::pid_t) {
        let program = match self.argv.first() {
            Some(program) => program.as_ptr(),
            None => return (libc::EINVAL, 0),
        };
        let mut pid: libc::pid_t = 0;
        let rc = unsafe {
            libc::posix_spawnp(
                &mut pid,
                program,
                self.actions.as_ptr(),
                self.attrs.as_ptr(),
                self.argv.as_ptr(),
                self.envp_ptr(),
            )
        };
        (rc, pid)
    }

    /// Drop the child-facing pipe ends and hand back the parent ends
    pub(super) fn finish(self) -> StdioEndpoints {
        drop(self.child_ends);
        self.parent
    }
}

/// Ordinary spawn: the child stays this process's waitable child
pub(super) fn spawn_foreground(plan: &SpawnPlan) -> ProcessResult<Pid> {
    let (rc, pid) = plan.spawn_raw();
    check(rc)?;
    Ok(Pid::from_raw(pid))
}

/// Detached spawn
///
/// An intermediary is forked; it leaves the controlling session, spawns the
/// real child, reports the child's pid through a close-on-exec pipe and
/// exits with 0 or the spawn errno. The real child is reparented away from
/// this process, so its status can only be probed, never waited for.
pub(super) fn spawn_detached(plan: &SpawnPlan) -> ProcessResult<Pid> {
    let (report_read, report_write) = cloexec_pipe()?;

    let mut tx = SpawnTransaction::new("detached_spawn");

    match unsafe { fork() }? {
        ForkResult::Child => {
            // Only async-signal-safe calls between fork and _exit
            unsafe {
                libc::setsid();
            }
            let (rc, pid) = plan.spawn_raw();
            if rc == 0 {
                let bytes = pid.to_ne_bytes();
                unsafe {
                    libc::write(
                        report_write.as_raw_fd(),
                        bytes.as_ptr().cast(),
                        bytes.len(),
                    );
                }
            }
            unsafe { libc::_exit(rc.clamp(0, 255)) }
        }
        ForkResult::Parent { child } => {
            drop(report_write);
            tx.set_pid(child.as_raw());
            tx.defer("reap intermediary", move || {
                let _ = kill(child, Signal::SIGKILL);
                waitpid(child, None).map(|_| ()).map_err(|e| e.to_string())
            });

            let status = loop {
                match waitpid(child, None) {
                    Err(Errno::EINTR) => continue,
                    other => break other?,
                }
            };
            tx.commit();

            match status {
                WaitStatus::Exited(_, 0) => {}
                WaitStatus::Exited(_, code) => return Err(ProcessError::from_os_code(code)),
                other => {
                    return Err(ProcessError::SystemError {
                        code: -1,
                        message: format!("spawn intermediary terminated abnormally: {:?}", other),
                    })
                }
            }

            let mut bytes = [0u8; std::mem::size_of::<libc::pid_t>()];
            File::from(report_read).read_exact(&mut bytes)?;
            Ok(Pid::from_raw(libc::pid_t::from_ne_bytes(bytes)))
        }
    }
}

/// Pipe for one `Create` stream: (parent end as a `Stream`, child end)
fn create_pipe(stream: StdStream) -> ProcessResult<(Stream, OwnedFd)> {
    let (read, write) = cloexec_pipe()?;

    let (parent, child) = if stream == StdStream::Stdin {
        (write, read)
    } else {
        (read, write)
    };

    let parent = Stream::from_owned_fd(parent, stream.parent_access());
    parent.set_nonblocking(true)?;
    Ok((parent, child))
}

/// Descriptor behind a `Redirect` endpoint, checked against its open mode
fn redirect_fd(config: &ProcessConfig<'_>, stream: StdStream) -> ProcessResult<RawFd> {
    let fd = config
        .redirect(stream)
        .and_then(Stream::as_fd)
        .map(|fd| fd.as_raw_fd())
        .ok_or_else(|| {
            ProcessError::InvalidArgument(format!("{} redirect endpoint is closed", stream.name()))
        })?;

    let flags = match fcntl(fd, FcntlArg::F_GETFL) {
        Ok(flags) => OFlag::from_bits_truncate(flags),
        Err(Errno::EBADF) => {
            return Err(ProcessError::InvalidArgument(format!(
                "{} redirect descriptor {} is not open",
                stream.name(),
                fd
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let mode = flags & OFlag::O_ACCMODE;
    let wrong_direction = if stream.child_access().is_readable() {
        mode == OFlag::O_WRONLY
    } else {
        mode == OFlag::O_RDONLY
    };
    if wrong_direction {
        return Err(ProcessError::InvalidArgument(format!(
            "{} redirect descriptor {} has the wrong access mode",
            stream.name(),
            fd
        )));
    }

    Ok(fd)
}

/// (read, write) pipe, both ends close-on-exec from creation so a concurrent
/// spawn on another thread cannot inherit them
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "illumos",
    target_os = "solaris"
))]
fn cloexec_pipe() -> ProcessResult<(OwnedFd, OwnedFd)> {
    Ok(pipe2(OFlag::O_CLOEXEC)?)
}

/// No `pipe2` here; the flag is set right after creation
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "illumos",
    target_os = "solaris"
)))]
fn cloexec_pipe() -> ProcessResult<(OwnedFd, OwnedFd)> {
    let (read, write) = nix::unistd::pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read, write))
}

fn path_to_cstring(path: &Path) -> ProcessResult<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|e| ProcessError::InvalidArgument(format!("working directory: {}", e)))
}

/// Open descriptors >= 3 that exec would leak into the child
///
/// Enumerates the descriptor directory, falling back to a bounded scan.
/// Descriptors already marked close-on-exec are skipped.
pub(super) fn inherited_fds() -> Vec<RawFd> {
    let candidates = enumerate_fds().unwrap_or_else(|| {
        tracing::debug!(dir = FD_DIRECTORY, "Descriptor enumeration unavailable, scanning");
        (FIRST_NON_STD_FD..scan_limit()).collect()
    });

    candidates
        .into_iter()
        .filter(|&fd| fd >= FIRST_NON_STD_FD)
        .filter(|&fd| match fcntl(fd, FcntlArg::F_GETFD) {
            Ok(flags) => !FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC),
            Err(_) => false,
        })
        .collect()
}

fn enumerate_fds() -> Option<BTreeSet<RawFd>> {
    let entries = std::fs::read_dir(FD_DIRECTORY).ok()?;
    Some(
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().to_str()?.parse::<RawFd>().ok())
            .collect(),
    )
}

fn scan_limit() -> RawFd {
    let open_max = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
    if open_max <= 0 {
        FD_SCAN_LIMIT
    } else {
        (open_max as RawFd).min(FD_SCAN_LIMIT)
    }
}
