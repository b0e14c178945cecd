//! OS process probing and termination.

use std::{fmt::Debug, io};

/// Liveness probe and termination for process ids recorded on disk.
///
/// Implemented by [`SystemProcesses`] for real processes; tests substitute
/// an in-memory process table.
pub trait ProcessControl: Send + Sync + Debug {
  /// Zero-effect probe. `false` when the process does not exist or cannot be
  /// signaled by the caller.
  fn is_alive(&self, pid: u32) -> bool;

  /// Ask the process to terminate (SIGTERM on Unix).
  fn terminate(&self, pid: u32) -> io::Result<()>;
}

/// The host operating system's process table
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

#[cfg(unix)]
impl ProcessControl for SystemProcesses {
  fn is_alive(&self, pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
      return false;
    };
    if pid <= 0 {
      return false;
    }
    unsafe { libc::kill(pid, 0) == 0 }
  }

  fn terminate(&self, pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    if pid <= 0 {
      return Err(io::Error::from(io::ErrorKind::InvalidInput));
    }
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
      Ok(())
    } else {
      Err(io::Error::last_os_error())
    }
  }
}

#[cfg(windows)]
impl ProcessControl for SystemProcesses {
  fn is_alive(&self, pid: u32) -> bool {
    use windows_sys::Win32::{
      Foundation::{CloseHandle, STILL_ACTIVE},
      System::Threading::{GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION},
    };

    if pid == 0 {
      return false;
    }
    unsafe {
      let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
      if handle.is_null() {
        return false;
      }
      let mut code: u32 = 0;
      let ok = GetExitCodeProcess(handle, &mut code);
      CloseHandle(handle);
      ok != 0 && code == STILL_ACTIVE as u32
    }
  }

  fn terminate(&self, pid: u32) -> io::Result<()> {
    use windows_sys::Win32::{
      Foundation::CloseHandle,
      System::Threading::{OpenProcess, PROCESS_TERMINATE, TerminateProcess},
    };

    unsafe {
      let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
      if handle.is_null() {
        return Err(io::Error::last_os_error());
      }
      let ok = TerminateProcess(handle, 1);
      let err = io::Error::last_os_error();
      CloseHandle(handle);
      if ok != 0 { Ok(()) } else { Err(err) }
    }
  }
}
