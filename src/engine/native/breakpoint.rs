use nix::libc::c_void;
use nix::sys;
use nix::unistd::Pid;

const INT3: u64 = 0xCC;

/// Software breakpoint installed into a debugged process memory.
#[derive(Debug)]
pub struct Breakpoint {
    /// Engine breakpoint id.
    pub id: u32,
    /// Relocated (runtime) address.
    pub addr: u64,
    saved_data: u8,
    enabled: bool,
}

impl Breakpoint {
    pub fn new(id: u32, addr: u64) -> Self {
        Self {
            id,
            addr,
            saved_data: 0,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn as_ptr(&self) -> *mut c_void {
        self.addr as usize as *mut c_void
    }

    pub fn enable(&mut self, pid: Pid) -> nix::Result<()> {
        if self.enabled {
            return Ok(());
        }
        let data = sys::ptrace::read(pid, self.as_ptr())?;
        self.saved_data = (data & 0xff) as u8;
        let data_with_bp = (data as u64 & !0xff) | INT3;
        unsafe {
            sys::ptrace::write(pid, self.as_ptr(), data_with_bp as *mut c_void)?;
        }
        self.enabled = true;

        Ok(())
    }

    pub fn disable(&mut self, pid: Pid) -> nix::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let data = sys::ptrace::read(pid, self.as_ptr())? as u64;
        let restored: u64 = (data & !0xff) | self.saved_data as u64;
        unsafe {
            sys::ptrace::write(pid, self.as_ptr(), restored as *mut c_void)?;
        }
        self.enabled = false;

        Ok(())
    }
}
