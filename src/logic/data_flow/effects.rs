//! Author: [Seclususs](https://github.com/seclususs)

use crate::logic::disasm::{
	normalisasi_register_64, Instruksi, OperandInstruksi, TipeOperand, VisibilitasOperand,
};

pub const JUMLAH_SLOT_REGISTER: usize = 8;

/// Operand ikut dihitung kalau eksplisit, kalau registernya accumulator,
/// atau kalau mnemonic-nya `and`/`mul` (operand pertama ditandai implicit
/// oleh encoding padahal dialah tujuan sebenarnya). Daftar pengecualian
/// tetap; alasannya di level ISA tidak jelas, jadi jangan diperluas.
fn operand_diperhitungkan(instruksi: &Instruksi, op: &OperandInstruksi) -> bool {
	if op.visibilitas == VisibilitasOperand::Explicit {
		return true;
	}
	if let Some(reg) = op.register() {
		if normalisasi_register_64(reg) == "rax" {
			return true;
		}
	}
	instruksi.mnemonic == "and" || instruksi.mnemonic == "mul"
}

/// Register yang ditulis instruksi ini, slot per indeks operand.
pub fn get_registers_modified(instruksi: &Instruksi) -> [Option<String>; JUMLAH_SLOT_REGISTER] {
	let mut hasil: [Option<String>; JUMLAH_SLOT_REGISTER] = Default::default();
	for (i, op) in instruksi
		.operands
		.iter()
		.enumerate()
		.take(JUMLAH_SLOT_REGISTER)
	{
		if !operand_diperhitungkan(instruksi, op) {
			continue;
		}
		match &op.tipe {
			TipeOperand::Register(nama) => {
				if op.akses.tulis() {
					hasil[i] = Some(normalisasi_register_64(nama));
				}
			}
			TipeOperand::Memory { base, .. } => {
				if op.akses.tulis() {
					if let Some(b) = base {
						hasil[i] = Some(normalisasi_register_64(b));
					}
				}
			}
			TipeOperand::Immediate { .. } => {}
		}
	}
	hasil
}

/// Register yang dibaca instruksi ini. Base rip/rbp/rsp cuma scaffolding
/// addressing, bukan data dependency, jadi tidak dihitung; index register
/// tetap dicatat di slot tinggi (i+4) supaya tidak menimpa slot base.
pub fn get_registers_accessed(instruksi: &Instruksi) -> [Option<String>; JUMLAH_SLOT_REGISTER] {
	let mut hasil: [Option<String>; JUMLAH_SLOT_REGISTER] = Default::default();
	for (i, op) in instruksi
		.operands
		.iter()
		.enumerate()
		.take(JUMLAH_SLOT_REGISTER)
	{
		if !operand_diperhitungkan(instruksi, op) {
			continue;
		}
		match &op.tipe {
			TipeOperand::Register(nama) => {
				if op.akses.baca() {
					hasil[i] = Some(normalisasi_register_64(nama));
				}
			}
			TipeOperand::Memory { base, index, .. } => {
				// lea dengan operand > 0 tetap read: hasil komputasi
				// alamatnya dipakai downstream.
				let dibaca = op.akses.baca() || (instruksi.mnemonic == "lea" && i > 0);
				if dibaca {
					if let Some(b) = base {
						let b64 = normalisasi_register_64(b);
						if b64 != "rip" && b64 != "rbp" && b64 != "rsp" {
							hasil[i] = Some(b64);
						}
					}
					if let Some(idx_reg) = index {
						if i + 4 < JUMLAH_SLOT_REGISTER {
							hasil[i + 4] = Some(normalisasi_register_64(idx_reg));
						}
					}
				}
			}
			TipeOperand::Immediate { .. } => {}
		}
	}
	hasil
}
