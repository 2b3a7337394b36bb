use capstone::arch::x86::{X86Operand, X86OperandType};
use capstone::prelude::*;
use capstone::RegId;
use log::debug;
use serde::Serialize;

use crate::error::DumperError;
use crate::logic::tracer::platform::PlatformDebugger;

/// Window baca untuk satu instruksi; cukup untuk instruksi x86 terpanjang.
const UKURAN_WINDOW_DECODE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AksesOperand {
    Read,
    Write,
    ReadWrite,
}

impl AksesOperand {
    pub fn baca(&self) -> bool {
        matches!(self, AksesOperand::Read | AksesOperand::ReadWrite)
    }

    pub fn tulis(&self) -> bool {
        matches!(self, AksesOperand::Write | AksesOperand::ReadWrite)
    }

    fn gabung(&self, lain: AksesOperand) -> AksesOperand {
        if (self.baca() || lain.baca()) && (self.tulis() || lain.tulis()) {
            AksesOperand::ReadWrite
        } else if self.tulis() || lain.tulis() {
            AksesOperand::Write
        } else {
            AksesOperand::Read
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VisibilitasOperand {
    Explicit,
    Implicit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TipeOperand {
    Register(String),
    Memory {
        segment: Option<String>,
        base: Option<String>,
        index: Option<String>,
        scale: i32,
        disp: i64,
    },
    Immediate {
        nilai: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperandInstruksi {
    pub tipe: TipeOperand,
    pub akses: AksesOperand,
    pub visibilitas: VisibilitasOperand,
}

impl OperandInstruksi {
    pub fn register(&self) -> Option<&str> {
        match &self.tipe {
            TipeOperand::Register(nama) => Some(nama),
            _ => None,
        }
    }

    pub fn immediate(&self) -> Option<i64> {
        match &self.tipe {
            TipeOperand::Immediate { nilai } => Some(*nilai),
            _ => None,
        }
    }
}

/// Satu instruksi yang sudah didecode. Decode gagal menghasilkan sentinel
/// kosong (mnemonic kosong, panjang nol); caller tidak boleh maju dari situ.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruksi {
    pub mnemonic: String,
    pub panjang: usize,
    pub teks: String,
    pub operands: Vec<OperandInstruksi>,
}

impl Instruksi {
    pub fn kosong() -> Self {
        Instruksi {
            mnemonic: String::new(),
            panjang: 0,
            teks: String::new(),
            operands: Vec::new(),
        }
    }

    pub fn valid(&self) -> bool {
        self.panjang > 0
    }

    pub fn operand(&self, idx: usize) -> Option<&OperandInstruksi> {
        self.operands.get(idx)
    }

    /// Register tujuan (operand 0) dalam bentuk 64-bit, kalau memang register.
    pub fn register_tujuan(&self) -> Option<String> {
        self.operands
            .first()
            .and_then(|op| op.register())
            .map(normalisasi_register_64)
    }
}

/// Petakan alias register 8/16/32-bit ke identitas 64-bit-nya. Bookkeeping
/// dependency seluruhnya pakai register arsitektural, bukan lebar encoding.
pub fn normalisasi_register_64(nama: &str) -> String {
    match nama {
        "al" | "ah" | "ax" | "eax" | "rax" => "rax",
        "bl" | "bh" | "bx" | "ebx" | "rbx" => "rbx",
        "cl" | "ch" | "cx" | "ecx" | "rcx" => "rcx",
        "dl" | "dh" | "dx" | "edx" | "rdx" => "rdx",
        "sil" | "si" | "esi" | "rsi" => "rsi",
        "dil" | "di" | "edi" | "rdi" => "rdi",
        "bpl" | "bp" | "ebp" | "rbp" => "rbp",
        "spl" | "sp" | "esp" | "rsp" => "rsp",
        "r8b" | "r8w" | "r8d" | "r8" => "r8",
        "r9b" | "r9w" | "r9d" | "r9" => "r9",
        "r10b" | "r10w" | "r10d" | "r10" => "r10",
        "r11b" | "r11w" | "r11d" | "r11" => "r11",
        "r12b" | "r12w" | "r12d" | "r12" => "r12",
        "r13b" | "r13w" | "r13d" | "r13" => "r13",
        "r14b" | "r14w" | "r14d" | "r14" => "r14",
        "r15b" | "r15w" | "r15d" | "r15" => "r15",
        "eip" | "rip" => "rip",
        lain => return lain.to_string(),
    }
    .to_string()
}

/// Mode akses operand eksplisit per mnemonic dan posisi. Tabel tetap untuk
/// subset instruksi yang ditangani, bukan aturan umum.
fn akses_operand_eksplisit(mnemonic: &str, idx: usize, jumlah_op: usize) -> AksesOperand {
    match mnemonic {
        "mov" | "movabs" | "movzx" | "movsx" | "movsxd" | "lea" | "pop" => {
            if idx == 0 {
                AksesOperand::Write
            } else {
                AksesOperand::Read
            }
        }
        "cmp" | "test" | "push" | "mul" | "div" | "idiv" => AksesOperand::Read,
        "imul" => {
            if jumlah_op >= 3 {
                if idx == 0 {
                    AksesOperand::Write
                } else {
                    AksesOperand::Read
                }
            } else if jumlah_op == 1 {
                AksesOperand::Read
            } else if idx == 0 {
                AksesOperand::ReadWrite
            } else {
                AksesOperand::Read
            }
        }
        "xchg" => AksesOperand::ReadWrite,
        _ => {
            // add, sub, and, or, xor, shift, rotate, not, neg, bswap, inc, dec
            if idx == 0 {
                AksesOperand::ReadWrite
            } else {
                AksesOperand::Read
            }
        }
    }
}

/// Operand implicit per mnemonic. Daftar tetap, direplikasi apa adanya --
/// jangan digeneralisasi.
fn operand_implisit(mnemonic: &str, jumlah_op_eksplisit: usize) -> Vec<(&'static str, AksesOperand)> {
    match mnemonic {
        "mul" => vec![
            ("rax", AksesOperand::ReadWrite),
            ("rdx", AksesOperand::Write),
            ("rflags", AksesOperand::Write),
        ],
        "imul" if jumlah_op_eksplisit == 1 => vec![
            ("rax", AksesOperand::ReadWrite),
            ("rdx", AksesOperand::Write),
            ("rflags", AksesOperand::Write),
        ],
        "div" | "idiv" => vec![
            ("rax", AksesOperand::ReadWrite),
            ("rdx", AksesOperand::ReadWrite),
            ("rflags", AksesOperand::Write),
        ],
        "add" | "sub" | "and" | "or" | "xor" | "shl" | "shr" | "sar" | "rol" | "ror" | "neg"
        | "inc" | "dec" | "cmp" | "test" | "imul" => {
            vec![("rflags", AksesOperand::Write)]
        }
        _ => Vec::new(),
    }
}

pub struct DecoderInstruksi {
    cs: Capstone,
}

impl DecoderInstruksi {
    pub fn new() -> Result<Self, DumperError> {
        let cs = Capstone::new()
            .x86()
            .mode(arch::x86::ArchMode::Mode64)
            .detail(true)
            .build()?;
        Ok(DecoderInstruksi { cs })
    }

    fn nama_register(&self, reg_id: RegId) -> Option<String> {
        if reg_id.0 == 0 {
            return None;
        }
        self.cs.reg_name(reg_id)
    }

    /// Decode tepat satu instruksi pada alamat debuggee. Gagal baca atau
    /// gagal decode menghasilkan sentinel kosong, bukan error.
    pub fn decode(&self, dbg: &dyn PlatformDebugger, rip: u64) -> Instruksi {
        match dbg.baca_memory(rip, UKURAN_WINDOW_DECODE) {
            Ok(bytes) => self.decode_bytes(&bytes, rip),
            Err(e) => {
                debug!("Gagal baca memory untuk decode di 0x{:x}: {}", rip, e);
                Instruksi::kosong()
            }
        }
    }

    pub fn decode_bytes(&self, bytes: &[u8], va: u64) -> Instruksi {
        let insns = match self.cs.disasm_count(bytes, va, 1) {
            Ok(insns) => insns,
            Err(_) => return Instruksi::kosong(),
        };
        let insn = match insns.first() {
            Some(insn) => insn,
            None => return Instruksi::kosong(),
        };
        let detail = match self.cs.insn_detail(insn) {
            Ok(detail) => detail,
            Err(_) => return Instruksi::kosong(),
        };
        let arch_detail = detail.arch_detail();
        let x86 = match arch_detail.x86() {
            Some(x86) => x86,
            None => return Instruksi::kosong(),
        };

        let mnemonic = insn.mnemonic().unwrap_or("").to_string();
        let teks = format!("{} {}", mnemonic, insn.op_str().unwrap_or(""))
            .trim()
            .to_string();

        let ops_raw: Vec<X86Operand> = x86.operands().collect();
        let jumlah_op = ops_raw.len();
        let mut operands = Vec::with_capacity(jumlah_op + 2);
        for (i, op) in ops_raw.iter().enumerate() {
            let akses = akses_operand_eksplisit(&mnemonic, i, jumlah_op);
            let tipe = match op.op_type {
                X86OperandType::Reg(reg_id) => match self.nama_register(reg_id) {
                    Some(nama) => TipeOperand::Register(nama),
                    None => continue,
                },
                X86OperandType::Imm(nilai) => TipeOperand::Immediate { nilai },
                X86OperandType::Mem(mem) => TipeOperand::Memory {
                    segment: self.nama_register(mem.segment()),
                    base: self.nama_register(mem.base()),
                    index: self.nama_register(mem.index()),
                    scale: mem.scale(),
                    disp: mem.disp(),
                },
                _ => continue,
            };
            operands.push(OperandInstruksi {
                tipe,
                akses,
                visibilitas: VisibilitasOperand::Explicit,
            });
        }

        for (nama, akses) in operand_implisit(&mnemonic, jumlah_op) {
            let sudah_ada = operands.iter_mut().find(|op| {
                op.register()
                    .map(|r| normalisasi_register_64(r) == nama)
                    .unwrap_or(false)
            });
            match sudah_ada {
                Some(op) => op.akses = op.akses.gabung(akses),
                None => operands.push(OperandInstruksi {
                    tipe: TipeOperand::Register(nama.to_string()),
                    akses,
                    visibilitas: VisibilitasOperand::Implicit,
                }),
            }
        }

        Instruksi {
            mnemonic,
            panjang: insn.bytes().len(),
            teks,
            operands,
        }
    }
}
