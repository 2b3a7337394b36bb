use serde::Serialize;

/// Snapshot penuh register general-purpose dari debuggee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KonteksRegister {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub rsp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub eflags: u64,
}

impl KonteksRegister {
    pub fn ambil_nilai(&self, nama_reg: &str) -> u64 {
        match nama_reg.to_lowercase().as_str() {
            "rax" => self.rax,
            "rbx" => self.rbx,
            "rcx" => self.rcx,
            "rdx" => self.rdx,
            "rsi" => self.rsi,
            "rdi" => self.rdi,
            "rbp" => self.rbp,
            "rsp" => self.rsp,
            "r8" => self.r8,
            "r9" => self.r9,
            "r10" => self.r10,
            "r11" => self.r11,
            "r12" => self.r12,
            "r13" => self.r13,
            "r14" => self.r14,
            "r15" => self.r15,
            "rip" => self.rip,
            "eflags" | "rflags" => self.eflags,
            _ => 0,
        }
    }

    pub fn set_nilai(&mut self, nama_reg: &str, nilai: u64) {
        match nama_reg.to_lowercase().as_str() {
            "rax" => self.rax = nilai,
            "rbx" => self.rbx = nilai,
            "rcx" => self.rcx = nilai,
            "rdx" => self.rdx = nilai,
            "rsi" => self.rsi = nilai,
            "rdi" => self.rdi = nilai,
            "rbp" => self.rbp = nilai,
            "rsp" => self.rsp = nilai,
            "r8" => self.r8 = nilai,
            "r9" => self.r9 = nilai,
            "r10" => self.r10 = nilai,
            "r11" => self.r11 = nilai,
            "r12" => self.r12 = nilai,
            "r13" => self.r13 = nilai,
            "r14" => self.r14 = nilai,
            "r15" => self.r15 = nilai,
            "rip" => self.rip = nilai,
            "eflags" | "rflags" => self.eflags = nilai,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambil_set_nilai_roundtrip() {
        let mut regs = KonteksRegister::default();
        regs.set_nilai("rcx", 0xDEAD_BEEF);
        regs.set_nilai("R11", 0x1234);
        assert_eq!(regs.ambil_nilai("rcx"), 0xDEAD_BEEF);
        assert_eq!(regs.ambil_nilai("r11"), 0x1234);
        assert_eq!(regs.ambil_nilai("xmm0"), 0);
    }
}
