use log::{debug, error, info, warn};
use std::ptr::{null, null_mut};

use windows_sys::Win32::Foundation::{
    CloseHandle, DBG_CONTINUE, EXCEPTION_SINGLE_STEP, FALSE, HANDLE, LUID,
};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, LookupPrivilegeValueA, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES,
    TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows_sys::Win32::System::Diagnostics::Debug::{
    ContinueDebugEvent, DebugActiveProcess, DebugActiveProcessStop, GetThreadContext,
    ReadProcessMemory, SetThreadContext, WaitForDebugEvent, WriteProcessMemory, CONTEXT,
    DEBUG_EVENT, EXCEPTION_DEBUG_EVENT, EXIT_PROCESS_DEBUG_EVENT,
};
use windows_sys::Win32::System::Diagnostics::Debug::CONTEXT_FULL_AMD64 as CONTEXT_FULL;
use windows_sys::Win32::System::Threading::{
    GetCurrentProcess, OpenProcess, OpenProcessToken, OpenThread, PROCESS_ALL_ACCESS,
    THREAD_GET_CONTEXT, THREAD_SET_CONTEXT, THREAD_SUSPEND_RESUME,
};

use super::platform::PlatformDebugger;
use super::types::KonteksRegister;
use crate::error::DumperError;

pub struct WindowsDebugger {
    pid_target: u32,
    handle_proses: HANDLE,
    last_event_thread_id: u32,
    alamat_basis: u64,
    exception_hit: bool,
}

#[allow(non_snake_case)]
unsafe fn impl_EnableDebugPrivilege_windows() -> bool {
    let mut handle_token: HANDLE = 0;
    if OpenProcessToken(
        GetCurrentProcess(),
        TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
        &mut handle_token,
    ) == 0
    {
        warn!(
            "WinAPI: OpenProcessToken gagal: {}",
            std::io::Error::last_os_error()
        );
        return false;
    }
    let mut luid_debug: LUID = std::mem::zeroed();
    let debug_name = b"SeDebugPrivilege\0";
    if LookupPrivilegeValueA(null(), debug_name.as_ptr(), &mut luid_debug) == 0 {
        warn!(
            "WinAPI: LookupPrivilegeValueA gagal: {}",
            std::io::Error::last_os_error()
        );
        CloseHandle(handle_token);
        return false;
    }
    let mut token_privs: TOKEN_PRIVILEGES = std::mem::zeroed();
    token_privs.PrivilegeCount = 1;
    token_privs.Privileges[0].Luid = luid_debug;
    token_privs.Privileges[0].Attributes = SE_PRIVILEGE_ENABLED;
    let b_ok = AdjustTokenPrivileges(handle_token, FALSE, &token_privs, 0, null_mut(), null_mut());
    CloseHandle(handle_token);
    if b_ok == 0 {
        warn!(
            "WinAPI: AdjustTokenPrivileges gagal: {}",
            std::io::Error::last_os_error()
        );
        return false;
    }
    info!("WinAPI: SeDebugPrivilege diaktifkan");
    true
}

impl WindowsDebugger {
    pub fn new(pid: u32, alamat_basis: u64) -> Self {
        WindowsDebugger {
            pid_target: pid,
            handle_proses: 0,
            last_event_thread_id: 0,
            alamat_basis,
            exception_hit: false,
        }
    }

    unsafe fn ambil_context_thread(&self) -> Result<CONTEXT, DumperError> {
        if self.last_event_thread_id == 0 {
            return Err(DumperError::Generic(
                "Belum ada thread event, attach dulu".to_string(),
            ));
        }
        let h_thread = OpenThread(
            THREAD_GET_CONTEXT | THREAD_SET_CONTEXT | THREAD_SUSPEND_RESUME,
            FALSE,
            self.last_event_thread_id,
        );
        if h_thread == 0 {
            return Err(DumperError::Generic(format!(
                "OpenThread gagal: {}",
                std::io::Error::last_os_error()
            )));
        }
        let mut context: CONTEXT = std::mem::zeroed();
        context.ContextFlags = CONTEXT_FULL;
        let ok = GetThreadContext(h_thread, &mut context);
        CloseHandle(h_thread);
        if ok == 0 {
            return Err(DumperError::Generic(format!(
                "GetThreadContext gagal: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(context)
    }

    unsafe fn tulis_context_thread(&self, context: &CONTEXT) -> Result<(), DumperError> {
        let h_thread = OpenThread(
            THREAD_GET_CONTEXT | THREAD_SET_CONTEXT,
            FALSE,
            self.last_event_thread_id,
        );
        if h_thread == 0 {
            return Err(DumperError::Generic(format!(
                "OpenThread gagal: {}",
                std::io::Error::last_os_error()
            )));
        }
        let ok = SetThreadContext(h_thread, context);
        CloseHandle(h_thread);
        if ok == 0 {
            return Err(DumperError::Generic(format!(
                "SetThreadContext gagal: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}

impl PlatformDebugger for WindowsDebugger {
    fn attach(&mut self) -> Result<(), DumperError> {
        unsafe {
            impl_EnableDebugPrivilege_windows();
            let handle_proses = OpenProcess(PROCESS_ALL_ACCESS, FALSE, self.pid_target);
            if handle_proses == 0 {
                return Err(DumperError::Generic(format!(
                    "OpenProcess gagal: {}",
                    std::io::Error::last_os_error()
                )));
            }
            self.handle_proses = handle_proses;
            if DebugActiveProcess(self.pid_target) == 0 {
                CloseHandle(handle_proses);
                self.handle_proses = 0;
                return Err(DumperError::Generic(format!(
                    "DebugActiveProcess gagal: {}",
                    std::io::Error::last_os_error()
                )));
            }
            let mut debug_event: DEBUG_EVENT = std::mem::zeroed();
            if WaitForDebugEvent(&mut debug_event, 5000) == 0 {
                DebugActiveProcessStop(self.pid_target);
                CloseHandle(handle_proses);
                self.handle_proses = 0;
                return Err(DumperError::Generic(
                    "Timeout menunggu event attach awal".to_string(),
                ));
            }
            info!(
                "WinAPI: Attach berhasil, event awal dari thread {}",
                debug_event.dwThreadId
            );
            self.last_event_thread_id = debug_event.dwThreadId;
            Ok(())
        }
    }

    fn detach(&mut self) -> Result<(), DumperError> {
        unsafe {
            if self.handle_proses != 0 {
                if DebugActiveProcessStop(self.pid_target) == 0 {
                    error!(
                        "WinAPI: DebugActiveProcessStop gagal: {}",
                        std::io::Error::last_os_error()
                    );
                }
                CloseHandle(self.handle_proses);
                self.handle_proses = 0;
            }
            Ok(())
        }
    }

    fn baca_memory(&self, alamat: u64, ukuran: usize) -> Result<Vec<u8>, DumperError> {
        unsafe {
            let mut buffer = vec![0u8; ukuran];
            let mut bytes_dibaca: usize = 0;
            if ReadProcessMemory(
                self.handle_proses,
                alamat as *const std::ffi::c_void,
                buffer.as_mut_ptr() as *mut std::ffi::c_void,
                ukuran,
                &mut bytes_dibaca,
            ) == 0
            {
                return Err(DumperError::Generic(format!(
                    "ReadProcessMemory gagal pada 0x{:x}: {}",
                    alamat,
                    std::io::Error::last_os_error()
                )));
            }
            buffer.truncate(bytes_dibaca);
            Ok(buffer)
        }
    }

    fn tulis_memory(&mut self, alamat: u64, data: &[u8]) -> Result<usize, DumperError> {
        unsafe {
            let mut bytes_ditulis: usize = 0;
            if WriteProcessMemory(
                self.handle_proses,
                alamat as *mut std::ffi::c_void,
                data.as_ptr() as *const std::ffi::c_void,
                data.len(),
                &mut bytes_ditulis,
            ) == 0
            {
                return Err(DumperError::Generic(format!(
                    "WriteProcessMemory gagal pada 0x{:x}: {}",
                    alamat,
                    std::io::Error::last_os_error()
                )));
            }
            Ok(bytes_ditulis)
        }
    }

    fn get_registers(&self) -> Result<KonteksRegister, DumperError> {
        unsafe {
            let context = self.ambil_context_thread()?;
            Ok(KonteksRegister {
                rax: context.Rax,
                rbx: context.Rbx,
                rcx: context.Rcx,
                rdx: context.Rdx,
                rsi: context.Rsi,
                rdi: context.Rdi,
                rbp: context.Rbp,
                rsp: context.Rsp,
                r8: context.R8,
                r9: context.R9,
                r10: context.R10,
                r11: context.R11,
                r12: context.R12,
                r13: context.R13,
                r14: context.R14,
                r15: context.R15,
                rip: context.Rip,
                eflags: context.EFlags as u64,
            })
        }
    }

    fn set_registers(&mut self, regs: &KonteksRegister) -> Result<(), DumperError> {
        unsafe {
            let mut context = self.ambil_context_thread()?;
            context.ContextFlags = CONTEXT_FULL;
            context.Rax = regs.rax;
            context.Rbx = regs.rbx;
            context.Rcx = regs.rcx;
            context.Rdx = regs.rdx;
            context.Rsi = regs.rsi;
            context.Rdi = regs.rdi;
            context.Rbp = regs.rbp;
            context.Rsp = regs.rsp;
            context.R8 = regs.r8;
            context.R9 = regs.r9;
            context.R10 = regs.r10;
            context.R11 = regs.r11;
            context.R12 = regs.r12;
            context.R13 = regs.r13;
            context.R14 = regs.r14;
            context.R15 = regs.r15;
            context.Rip = regs.rip;
            context.EFlags = regs.eflags as u32;
            self.tulis_context_thread(&context)
        }
    }

    fn single_step(&mut self) -> Result<u64, DumperError> {
        unsafe {
            let mut context = self.ambil_context_thread()?;
            context.EFlags |= 0x100; // trap flag
            self.tulis_context_thread(&context)?;
            if ContinueDebugEvent(self.pid_target, self.last_event_thread_id, DBG_CONTINUE) == 0 {
                return Err(DumperError::Generic(format!(
                    "ContinueDebugEvent gagal: {}",
                    std::io::Error::last_os_error()
                )));
            }
            let mut debug_event: DEBUG_EVENT = std::mem::zeroed();
            loop {
                if WaitForDebugEvent(&mut debug_event, u32::MAX) == 0 {
                    return Err(DumperError::Generic(format!(
                        "WaitForDebugEvent gagal: {}",
                        std::io::Error::last_os_error()
                    )));
                }
                self.last_event_thread_id = debug_event.dwThreadId;
                match debug_event.dwDebugEventCode {
                    EXCEPTION_DEBUG_EVENT => {
                        let code = debug_event.u.Exception.ExceptionRecord.ExceptionCode;
                        if code == EXCEPTION_SINGLE_STEP {
                            debug!("WinAPI: EXCEPTION_SINGLE_STEP diterima");
                        } else {
                            // Fault dari instruksi itu sendiri; RIP tidak
                            // maju, caller yang koreksi.
                            warn!("WinAPI: exception 0x{:x} saat step", code);
                            self.exception_hit = true;
                        }
                        return Ok(self.get_registers()?.rip);
                    }
                    EXIT_PROCESS_DEBUG_EVENT => {
                        return Err(DumperError::Generic(
                            "Debuggee keluar saat single step".to_string(),
                        ));
                    }
                    _ => {
                        debug!(
                            "WinAPI: event lain saat single step: {}, lanjut...",
                            debug_event.dwDebugEventCode
                        );
                        ContinueDebugEvent(
                            debug_event.dwProcessId,
                            debug_event.dwThreadId,
                            DBG_CONTINUE,
                        );
                    }
                }
            }
        }
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
