use std::io::{IoSlice, IoSliceMut};

use log::warn;
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::uio::{process_vm_readv, process_vm_writev, RemoteIoVec};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use super::platform::PlatformDebugger;
use super::types::KonteksRegister;
use crate::error::DumperError;

pub struct LinuxDebugger {
    pid_target: Pid,
    alamat_basis: u64,
    exception_hit: bool,
}

impl LinuxDebugger {
    pub fn new(pid: libc::pid_t, alamat_basis: u64) -> Self {
        LinuxDebugger {
            pid_target: Pid::from_raw(pid),
            alamat_basis,
            exception_hit: false,
        }
    }

    /// Baca alamat basis module utama dari /proc/<pid>/maps (baris pertama
    /// yang menunjuk ke path executable).
    pub fn deteksi_base(pid: libc::pid_t) -> Result<u64, DumperError> {
        let maps_file = format!("/proc/{}/maps", pid);
        let content = std::fs::read_to_string(maps_file)?;
        let exe_path = std::fs::read_link(format!("/proc/{}/exe", pid))?;
        let exe_str = exe_path.to_string_lossy();
        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 6 || !parts[5..].join(" ").ends_with(exe_str.as_ref()) {
                continue;
            }
            let addr_range: Vec<&str> = parts[0].split('-').collect();
            if let Ok(start) = u64::from_str_radix(addr_range[0], 16) {
                return Ok(start);
            }
        }
        Err(DumperError::Generic(format!(
            "Tidak menemukan module utama di maps PID {}",
            pid
        )))
    }
}

impl PlatformDebugger for LinuxDebugger {
    fn attach(&mut self) -> Result<(), DumperError> {
        ptrace::attach(self.pid_target)?;
        match waitpid(self.pid_target, None) {
            Ok(WaitStatus::Stopped(_, _)) => Ok(()),
            Ok(status) => Err(DumperError::Generic(format!(
                "Status waitpid tidak terduga setelah attach: {:?}",
                status
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn detach(&mut self) -> Result<(), DumperError> {
        ptrace::detach(self.pid_target, None)?;
        Ok(())
    }

    fn baca_memory(&self, alamat: u64, ukuran: usize) -> Result<Vec<u8>, DumperError> {
        let mut buffer = vec![0u8; ukuran];
        let mut local_iov = [IoSliceMut::new(&mut buffer)];
        let remote_iov = [RemoteIoVec {
            base: alamat as usize,
            len: ukuran,
        }];
        let bytes_read = process_vm_readv(self.pid_target, &mut local_iov, &remote_iov)?;
        buffer.truncate(bytes_read);
        Ok(buffer)
    }

    fn tulis_memory(&mut self, alamat: u64, data: &[u8]) -> Result<usize, DumperError> {
        let local_iov = [IoSlice::new(data)];
        let remote_iov = [RemoteIoVec {
            base: alamat as usize,
            len: data.len(),
        }];
        let bytes_written = process_vm_writev(self.pid_target, &local_iov, &remote_iov)?;
        Ok(bytes_written)
    }

    fn get_registers(&self) -> Result<KonteksRegister, DumperError> {
        let regs = ptrace::getregs(self.pid_target)?;
        Ok(KonteksRegister {
            rax: regs.rax,
            rbx: regs.rbx,
            rcx: regs.rcx,
            rdx: regs.rdx,
            rsi: regs.rsi,
            rdi: regs.rdi,
            rbp: regs.rbp,
            rsp: regs.rsp,
            r8: regs.r8,
            r9: regs.r9,
            r10: regs.r10,
            r11: regs.r11,
            r12: regs.r12,
            r13: regs.r13,
            r14: regs.r14,
            r15: regs.r15,
            rip: regs.rip,
            eflags: regs.eflags,
        })
    }

    fn set_registers(&mut self, konteks: &KonteksRegister) -> Result<(), DumperError> {
        let mut regs = ptrace::getregs(self.pid_target)?;
        regs.rax = konteks.rax;
        regs.rbx = konteks.rbx;
        regs.rcx = konteks.rcx;
        regs.rdx = konteks.rdx;
        regs.rsi = konteks.rsi;
        regs.rdi = konteks.rdi;
        regs.rbp = konteks.rbp;
        regs.rsp = konteks.rsp;
        regs.r8 = konteks.r8;
        regs.r9 = konteks.r9;
        regs.r10 = konteks.r10;
        regs.r11 = konteks.r11;
        regs.r12 = konteks.r12;
        regs.r13 = konteks.r13;
        regs.r14 = konteks.r14;
        regs.r15 = konteks.r15;
        regs.rip = konteks.rip;
        regs.eflags = konteks.eflags;
        ptrace::setregs(self.pid_target, regs)?;
        Ok(())
    }

    fn single_step(&mut self) -> Result<u64, DumperError> {
        ptrace::step(self.pid_target, None)?;
        match waitpid(self.pid_target, None) {
            Ok(WaitStatus::Stopped(_, Signal::SIGTRAP)) => {}
            Ok(WaitStatus::Stopped(_, sig)) => {
                // Fault saat step: kernel tidak memajukan RIP, caller yang
                // harus koreksi manual.
                warn!("Step memicu signal {:?}, exception ditandai", sig);
                self.exception_hit = true;
            }
            Ok(status) => {
                return Err(DumperError::Generic(format!(
                    "Status waitpid tidak terduga setelah step: {:?}",
                    status
                )))
            }
            Err(e) => return Err(e.into()),
        }
        Ok(ptrace::getregs(self.pid_target)?.rip)
    }

    fn exception_tertunda(&self) -> bool {
        self.exception_hit
    }

    fn clear_exception(&mut self) {
        self.exception_hit = false;
    }

    fn base_address(&self) -> u64 {
        self.alamat_basis
    }
}

impl From<nix::Error> for DumperError {
    fn from(err: nix::Error) -> DumperError {
        DumperError::Generic(format!("Nix error: {}", err))
    }
}
