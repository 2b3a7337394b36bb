//! Author: [Seclususs](https://github.com/seclususs)

use crate::logic::data_flow::resolver::SENTINEL_MASK_NOL;
use crate::logic::disasm::{normalisasi_register_64, Instruksi, TipeOperand};

/// Mnemonic tanpa makna data-movement: efek control-flow-nya sudah terwakili
/// oleh jalannya trace, jadi tidak ada kode yang dihasilkan.
pub fn mnemonic_senyap(mnemonic: &str) -> bool {
	matches!(
		mnemonic,
		"call" | "jmp" | "ret" | "nop" | "cmp" | "test" | "je" | "jne" | "ja" | "jae" | "jb"
			| "jbe" | "jg" | "jge" | "jl" | "jle" | "js" | "jns" | "jo" | "jno" | "jp" | "jnp"
	)
}

fn reg64(instruksi: &Instruksi, idx: usize) -> Option<String> {
	instruksi
		.operand(idx)
		.and_then(|op| op.register())
		.map(normalisasi_register_64)
}

fn imm(instruksi: &Instruksi, idx: usize) -> Option<i64> {
	instruksi.operand(idx).and_then(|op| op.immediate())
}

struct MemOperand<'a> {
	segment: Option<&'a str>,
	base: Option<&'a str>,
	index: Option<&'a str>,
	scale: i32,
	disp: i64,
}

fn mem(instruksi: &Instruksi, idx: usize) -> Option<MemOperand<'_>> {
	match &instruksi.operand(idx)?.tipe {
		TipeOperand::Memory {
			segment,
			base,
			index,
			scale,
			disp,
		} => Some(MemOperand {
			segment: segment.as_deref(),
			base: base.as_deref(),
			index: index.as_deref(),
			scale: *scale,
			disp: *disp,
		}),
		_ => None,
	}
}

fn basis_adalah(mem: &MemOperand, nama: &str) -> bool {
	mem.base
		.map(|b| normalisasi_register_64(b) == nama)
		.unwrap_or(false)
}

/// Offset relatif module untuk addressing rip-relative; displacement dihitung
/// dari instruksi berikutnya.
fn offset_module(rip: u64, disp: i64, panjang: usize, base_address: u64) -> u64 {
	rip.wrapping_add(disp as u64)
		.wrapping_add(panjang as u64)
		.wrapping_sub(base_address)
}

/// Terjemahkan satu instruksi jadi ekspresi assignment simbolik. String
/// kosong berarti senyap atau tidak dikenal; caller yang memutuskan mau
/// menandai atau melewatkan. `nama_substitusi` dipakai kalau nilai source
/// sudah dipulangkan lewat alias slot stack.
pub fn asm_ke_pseudo(
	instruksi: &Instruksi,
	rip: u64,
	base_address: u64,
	nama_substitusi: Option<&str>,
) -> String {
	match instruksi.mnemonic.as_str() {
		"lea" => {
			let r1 = match reg64(instruksi, 0) {
				Some(r) => r,
				None => return instruksi.teks.clone(),
			};
			let m = match mem(instruksi, 1) {
				Some(m) => m,
				None => return instruksi.teks.clone(),
			};
			if basis_adalah(&m, "rip") {
				let off = offset_module(rip, m.disp, instruksi.panjang, base_address);
				if off != 0 {
					format!("{} = baseModuleAddr + 0x{:X}", r1, off)
				} else {
					format!("{} = baseModuleAddr", r1)
				}
			} else if m.index.is_some() && m.scale != 0 {
				let index = normalisasi_register_64(m.index.unwrap_or_default());
				if let Some(base) = m.base {
					format!(
						"{} = {} + {} * {}",
						r1,
						normalisasi_register_64(base),
						index,
						m.scale
					)
				} else {
					format!("{} = {} * {} + 0x{:X}", r1, index, m.scale, m.disp as u64)
				}
			} else if let Some(base) = m.base {
				format!(
					"{} = {} + 0x{:X}",
					r1,
					normalisasi_register_64(base),
					m.disp as u64
				)
			} else {
				instruksi.teks.clone()
			}
		}
		"mov" | "movabs" => {
			let r1 = match reg64(instruksi, 0) {
				Some(r) => r,
				// store ke memory: dirender di sisi load lewat alias slot
				None => return String::new(),
			};
			if let Some(r2) = reg64(instruksi, 1) {
				format!("{} = {}", r1, r2)
			} else if let Some(m) = mem(instruksi, 1) {
				if m.segment == Some("gs") {
					format!("{} = Peb", r1)
				} else if basis_adalah(&m, "rip") && m.disp != 0 {
					format!(
						"{} = *(uintptr_t*)(baseModuleAddr + 0x{:X})",
						r1,
						offset_module(rip, m.disp, instruksi.panjang, base_address)
					)
				} else if let Some(nama) = nama_substitusi {
					format!("{} = {}", r1, nama)
				} else if let Some(base) = m.base {
					if m.disp != 0 {
						format!(
							"{} = *(uintptr_t*)({} + 0x{:X})",
							r1,
							normalisasi_register_64(base),
							m.disp as u64
						)
					} else {
						format!("{} = *(uintptr_t*)({})", r1, normalisasi_register_64(base))
					}
				} else {
					instruksi.teks.clone()
				}
			} else if let Some(nilai) = imm(instruksi, 1) {
				format!("{} = 0x{:X}", r1, nilai as u64)
			} else {
				instruksi.teks.clone()
			}
		}
		"movzx" | "movsx" | "movsxd" => {
			let r1 = match reg64(instruksi, 0) {
				Some(r) => r,
				None => return instruksi.teks.clone(),
			};
			let m = mem(instruksi, 1);
			if let Some(m) = m {
				if m.base.is_some() && m.index.is_some() && m.disp != 0 {
					return format!(
						"{} = *(uint16_t*)({} + {} * {} + 0x{:X})",
						r1,
						normalisasi_register_64(m.base.unwrap_or_default()),
						normalisasi_register_64(m.index.unwrap_or_default()),
						m.scale,
						m.disp as u64
					);
				}
			}
			if let Some(nama) = nama_substitusi {
				format!("{} = {}", r1, nama)
			} else if let Some(r2) = reg64(instruksi, 1) {
				format!("{} = {}", r1, r2)
			} else {
				instruksi.teks.clone()
			}
		}
		"ror" | "rol" => {
			let intrinsik = if instruksi.mnemonic == "ror" {
				"_rotr64"
			} else {
				"_rotl64"
			};
			match (reg64(instruksi, 0), imm(instruksi, 1)) {
				(Some(r1), Some(nilai)) => {
					format!("{} = {}({}, 0x{:X})", r1, intrinsik, r1, nilai as u64)
				}
				_ => instruksi.teks.clone(),
			}
		}
		"shr" | "shl" => {
			let simbol = if instruksi.mnemonic == "shr" {
				">>="
			} else {
				"<<="
			};
			match (reg64(instruksi, 0), imm(instruksi, 1)) {
				(Some(r1), Some(nilai)) => format!("{} {} 0x{:X}", r1, simbol, nilai as u64),
				_ => instruksi.teks.clone(),
			}
		}
		"sub" | "add" => {
			let simbol = if instruksi.mnemonic == "sub" { "-=" } else { "+=" };
			let r1 = match reg64(instruksi, 0) {
				Some(r) => r,
				None => return String::new(),
			};
			if let Some(r2) = reg64(instruksi, 1) {
				format!("{} {} {}", r1, simbol, r2)
			} else if imm(instruksi, 1).map_or(false, |v| v != 0) {
				format!(
					"{} {} 0x{:X}",
					r1,
					simbol,
					imm(instruksi, 1).unwrap_or(0) as u64
				)
			} else if let Some(nama) = nama_substitusi {
				format!("{} {} {}", r1, simbol, nama)
			} else {
				instruksi.teks.clone()
			}
		}
		"and" => {
			match (reg64(instruksi, 0), imm(instruksi, 1)) {
				(Some(r1), Some(nilai)) if nilai != 0 => {
					if nilai as u64 == SENTINEL_MASK_NOL {
						// mask penuh: efek bersihnya register jadi nol
						format!("{} = 0", r1)
					} else {
						format!("{} &= 0x{:X}", r1, nilai as u64)
					}
				}
				_ => match (reg64(instruksi, 0), reg64(instruksi, 1)) {
					(Some(r1), Some(r2)) => format!("{} &= {}", r1, r2),
					_ => instruksi.teks.clone(),
				},
			}
		}
		"xor" => {
			let r1 = match reg64(instruksi, 0) {
				Some(r) => r,
				None => return instruksi.teks.clone(),
			};
			if let Some(nama) = nama_substitusi {
				format!("{} ^= {}", r1, nama)
			} else if let Some(m) = mem(instruksi, 1) {
				if basis_adalah(&m, "rip") && m.disp != 0 {
					format!(
						"{} ^= *(uintptr_t*)(baseModuleAddr + 0x{:X})",
						r1,
						offset_module(rip, m.disp, instruksi.panjang, base_address)
					)
				} else {
					instruksi.teks.clone()
				}
			} else if let Some(r2) = reg64(instruksi, 1) {
				format!("{} ^= {}", r1, r2)
			} else {
				instruksi.teks.clone()
			}
		}
		"bswap" => match reg64(instruksi, 0) {
			Some(r1) => format!("{} = _byteswap_uint64({})", r1, r1),
			None => instruksi.teks.clone(),
		},
		"not" => match reg64(instruksi, 0) {
			Some(r1) => format!("{} = ~{}", r1, r1),
			None => instruksi.teks.clone(),
		},
		"mul" => {
			if instruksi.operands.len() == 4 {
				match (
					reg64(instruksi, 0),
					reg64(instruksi, 1),
					reg64(instruksi, 2),
				) {
					(Some(r1), Some(r2), Some(r3)) => {
						format!("{} = _umul128({}, {}, (uintptr_t*)&{})", r2, r2, r1, r3)
					}
					_ => instruksi.teks.clone(),
				}
			} else {
				instruksi.teks.clone()
			}
		}
		"imul" => {
			let jumlah = instruksi.operands.len();
			let r1 = match reg64(instruksi, 0) {
				Some(r) => r,
				None => return instruksi.teks.clone(),
			};
			if (jumlah == 2 || jumlah == 3) && reg64(instruksi, 1).is_some() {
				format!("{} *= {}", r1, reg64(instruksi, 1).unwrap_or_default())
			} else if jumlah == 2 && imm(instruksi, 1).map_or(false, |v| v != 0) {
				format!("{} *= 0x{:X}", r1, imm(instruksi, 1).unwrap_or(0) as u64)
			} else if let Some(m) = mem(instruksi, 1) {
				if m.base.is_some() && m.disp != 0 {
					let base = normalisasi_register_64(m.base.unwrap_or_default());
					if base != "rsp" && base != "rbp" {
						format!("{} *= *(uintptr_t*)({} + 0x{:X})", r1, base, m.disp as u64)
					} else if let Some(nama) = nama_substitusi {
						format!("{} *= {}", r1, nama)
					} else {
						instruksi.teks.clone()
					}
				} else {
					instruksi.teks.clone()
				}
			} else if jumlah == 4
				&& reg64(instruksi, 1).is_some()
				&& imm(instruksi, 2).map_or(false, |v| v != 0)
			{
				format!(
					"{} = {} * 0x{:X}",
					r1,
					reg64(instruksi, 1).unwrap_or_default(),
					imm(instruksi, 2).unwrap_or(0) as u64
				)
			} else if let Some(nama) = nama_substitusi {
				format!("{} *= {}", r1, nama)
			} else {
				instruksi.teks.clone()
			}
		}
		m if mnemonic_senyap(m) => String::new(),
		_ => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::logic::disasm::DecoderInstruksi;

	const BASIS: u64 = 0x140000000;

	fn decode(bytes: &[u8], va: u64) -> Instruksi {
		DecoderInstruksi::new().unwrap().decode_bytes(bytes, va)
	}

	fn pseudo(bytes: &[u8], va: u64) -> String {
		asm_ke_pseudo(&decode(bytes, va), va, BASIS, None)
	}

	#[test]
	fn test_and_sentinel_jadi_nol() {
		// and rbx, 0xffffffffc0000000
		let kode = pseudo(
			&[0x48, 0x81, 0xE3, 0x00, 0x00, 0x00, 0xC0],
			BASIS + 0x100,
		);
		assert_eq!(kode, "rbx = 0");
	}

	#[test]
	fn test_and_mask_biasa() {
		// and rcx, 0xF
		let kode = pseudo(&[0x48, 0x83, 0xE1, 0x0F], BASIS + 0x100);
		assert_eq!(kode, "rcx &= 0xF");
	}

	#[test]
	fn test_mov_immediate() {
		// mov rax, 0x1234
		let kode = pseudo(&[0x48, 0xC7, 0xC0, 0x34, 0x12, 0x00, 0x00], BASIS);
		assert_eq!(kode, "rax = 0x1234");
	}

	#[test]
	fn test_mov_lebar_32_dinormalkan() {
		// mov eax, ecx tetap dirender sebagai register 64-bit
		let kode = pseudo(&[0x89, 0xC8], BASIS);
		assert_eq!(kode, "rax = rcx");
	}

	#[test]
	fn test_lea_rip_relative_jadi_module_offset() {
		// lea rax, [rip + 0x1000] di base+0x500, panjang 7
		let kode = pseudo(
			&[0x48, 0x8D, 0x05, 0x00, 0x10, 0x00, 0x00],
			BASIS + 0x500,
		);
		assert_eq!(kode, "rax = baseModuleAddr + 0x1507");
	}

	#[test]
	fn test_mov_rip_relative_deref() {
		// mov rax, [rip + 0x2000] di base+0x500, panjang 7
		let kode = pseudo(
			&[0x48, 0x8B, 0x05, 0x00, 0x20, 0x00, 0x00],
			BASIS + 0x500,
		);
		assert_eq!(kode, "rax = *(uintptr_t*)(baseModuleAddr + 0x2507)");
	}

	#[test]
	fn test_mov_gs_segment_peb() {
		// mov rax, gs:[0x60]
		let kode = pseudo(
			&[0x65, 0x48, 0x8B, 0x04, 0x25, 0x60, 0x00, 0x00, 0x00],
			BASIS,
		);
		assert_eq!(kode, "rax = Peb");
	}

	#[test]
	fn test_rotate_kanan() {
		// ror rcx, 0x10
		let kode = pseudo(&[0x48, 0xC1, 0xC9, 0x10], BASIS);
		assert_eq!(kode, "rcx = _rotr64(rcx, 0x10)");
	}

	#[test]
	fn test_mul_wide_umul128() {
		// mul rcx -> pasangan hasil di rax/rdx
		let kode = pseudo(&[0x48, 0xF7, 0xE1], BASIS);
		assert_eq!(kode, "rax = _umul128(rax, rcx, (uintptr_t*)&rdx)");
	}

	#[test]
	fn test_imul_tiga_alamat() {
		// imul rax, rcx, 0x25a3
		let kode = pseudo(&[0x48, 0x69, 0xC1, 0xA3, 0x25, 0x00, 0x00], BASIS);
		assert_eq!(kode, "rax = rcx * 0x25A3");
	}

	#[test]
	fn test_imul_reg_reg() {
		// imul rax, rcx
		let kode = pseudo(&[0x48, 0x0F, 0xAF, 0xC1], BASIS);
		assert_eq!(kode, "rax *= rcx");
	}

	#[test]
	fn test_xor_reg_reg() {
		// xor rax, rcx
		let kode = pseudo(&[0x48, 0x31, 0xC8], BASIS);
		assert_eq!(kode, "rax ^= rcx");
	}

	#[test]
	fn test_bswap_dan_not() {
		assert_eq!(
			pseudo(&[0x48, 0x0F, 0xC8], BASIS),
			"rax = _byteswap_uint64(rax)"
		);
		assert_eq!(pseudo(&[0x48, 0xF7, 0xD0], BASIS), "rax = ~rax");
	}

	#[test]
	fn test_substitusi_nama_stack() {
		// sub rax, [rsp+0x20] dengan nama pengganti
		let instr = decode(&[0x48, 0x2B, 0x44, 0x24, 0x20], BASIS);
		let kode = asm_ke_pseudo(&instr, BASIS, BASIS, Some("RSP_0x20"));
		assert_eq!(kode, "rax -= RSP_0x20");
	}

	#[test]
	fn test_branch_senyap() {
		assert_eq!(pseudo(&[0x74, 0x10], BASIS), "");
		assert_eq!(pseudo(&[0x48, 0x85, 0xC0], BASIS), ""); // test rax, rax
		assert!(mnemonic_senyap("jmp"));
		assert!(!mnemonic_senyap("mov"));
	}

	#[test]
	fn test_mnemonic_asing_fallback_kosong() {
		// cpuid tidak ada di tabel
		assert_eq!(pseudo(&[0x0F, 0xA2], BASIS), "");
	}
}
