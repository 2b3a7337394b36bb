//! Author: [Seclususs](https://github.com/seclususs)

use log::debug;
use serde::Serialize;

use crate::logic::data_flow::effects::get_registers_accessed;
use crate::logic::data_flow::trace::TraceEntry;
use crate::logic::disasm::{normalisasi_register_64, Instruksi, TipeOperand};

/// AND terhadap pola bit ini artinya "nolkan register"; operand mask-nya
/// bukan dependency.
pub const SENTINEL_MASK_NOL: u64 = 0xFFFF_FFFF_C000_0000;

/// Register yang nilainya tidak bisa dipulangkan ke instruksi dalam trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AkarTrace {
	/// Nilai mentahnya sama dengan basis module: konstanta awal, bukan
	/// komputasi.
	ModuleBase { register: String },
	/// Nilai mentah apa adanya; belum tentu benar.
	TakTerverifikasi { register: String, nilai: u64 },
}

pub(crate) fn operand_stack_baca(instruksi: &Instruksi) -> Option<(String, i64)> {
	let op = instruksi.operand(1)?;
	if !op.akses.baca() {
		return None;
	}
	if let TipeOperand::Memory {
		base: Some(b), disp, ..
	} = &op.tipe
	{
		let b64 = normalisasi_register_64(b);
		if b64 == "rsp" || b64 == "rbp" {
			return Some((b64, *disp));
		}
	}
	None
}

pub(crate) fn operand_stack_tulis(instruksi: &Instruksi) -> Option<(String, i64)> {
	let op = instruksi.operand(0)?;
	if !op.akses.tulis() {
		return None;
	}
	if let TipeOperand::Memory {
		base: Some(b), disp, ..
	} = &op.tipe
	{
		let b64 = normalisasi_register_64(b);
		if b64 == "rsp" || b64 == "rbp" {
			return Some((b64, *disp));
		}
	}
	None
}

/// Tandai subset minimal instruksi yang menyumbang nilai akhir `enc_reg`.
/// `enc_reg` None berarti tidak ada seed (mode cetak semua). Flag `used`
/// monoton; jalan dua kali hasilnya sama. Register di `ignore_trace`
/// dianggap aksioma dari OS dan tidak pernah dikejar.
pub fn telusuri_dekripsi(
	trace: &mut [TraceEntry],
	enc_reg: Option<&str>,
	ignore_trace: &[String],
	base_address: u64,
) -> Vec<AkarTrace> {
	let mut akar: Vec<AkarTrace> = Vec::new();
	let target = match enc_reg {
		Some(reg) => normalisasi_register_64(reg),
		None => return akar,
	};

	let mut stack: Vec<usize> = Vec::new();
	for j in (0..trace.len()).rev() {
		if trace[j].instruksi.register_tujuan().as_deref() == Some(target.as_str()) {
			trace[j].used = true;
			stack.push(j);
			break;
		}
	}

	while let Some(idx) = stack.pop() {
		debug!("needed line {}: {}", idx, trace[idx].instruksi.teks);

		let imm1 = trace[idx]
			.instruksi
			.operand(1)
			.and_then(|op| op.immediate());
		if imm1.map(|v| v as u64) == Some(SENTINEL_MASK_NOL) {
			// mask "jadi nol": rantai dependency putus di sini
			continue;
		}

		let accessed = get_registers_accessed(&trace[idx].instruksi);
		for reg in accessed.iter().flatten() {
			if ignore_trace.iter().any(|r| r == reg) {
				continue;
			}
			if let Some(def_idx) = trace[idx].last_modified.get(reg).copied() {
				if !trace[def_idx].used {
					trace[def_idx].used = true;
					stack.push(def_idx);
				}
			} else {
				let nilai = trace[idx].context.ambil_nilai(reg);
				let entri = if nilai == base_address {
					AkarTrace::ModuleBase {
						register: reg.clone(),
					}
				} else {
					AkarTrace::TakTerverifikasi {
						register: reg.clone(),
						nilai,
					}
				};
				if !akar.contains(&entri) {
					akar.push(entri);
				}
			}
		}

		// Load dari slot stack: pulangkan lewat alias map ke definisi nilai
		// yang di-spill, dan tandai juga store-nya supaya rantainya utuh.
		if let Some((basis, disp)) = operand_stack_baca(&trace[idx].instruksi) {
			let alias = match basis.as_str() {
				"rsp" => trace[idx].rsp_stack_map.get(&disp).copied(),
				"rbp" => trace[idx].rbp_stack_map.get(&disp).copied(),
				_ => None,
			};
			if let Some(def_idx) = alias {
				if !trace[def_idx].used {
					trace[def_idx].used = true;
					stack.push(def_idx);
				}
				for j in (0..idx).rev() {
					if operand_stack_tulis(&trace[j].instruksi)
						== Some((basis.clone(), disp))
					{
						if !trace[j].used {
							trace[j].used = true;
							stack.push(j);
						}
						break;
					}
				}
			}
		}
	}

	akar
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::logic::data_flow::trace::muat_trace_dekripsi;
	use crate::logic::disasm::DecoderInstruksi;
	use crate::logic::tracer::mock::MockDebugger;

	const BASIS: u64 = 0x140000000;

	fn dekoder() -> DecoderInstruksi {
		DecoderInstruksi::new().unwrap()
	}

	/// add rbx, 0x10 ; mov [rsp-8], rbx ; mov rcx, [rsp-8]
	fn trace_spill() -> Vec<crate::logic::data_flow::trace::TraceEntry> {
		let mut dbg = MockDebugger::kosong(BASIS);
		let mut kode = vec![
			0x48, 0x83, 0xC3, 0x10, // add rbx, 0x10
			0x48, 0x89, 0x5C, 0x24, 0xF8, // mov [rsp-8], rbx
			0x48, 0x8B, 0x4C, 0x24, 0xF8, // mov rcx, [rsp-8]
		];
		kode.extend([0x90; 32]);
		dbg.tambah_memori(0x3000, &kode);
		dbg.tambah_langkah(0x3000, 4, vec![("rbx", BASIS + 0x10)]);
		dbg.tambah_langkah(0x3004, 5, vec![]);
		dbg.tambah_langkah(0x3009, 5, vec![("rcx", BASIS + 0x10)]);
		dbg.regs.rbx = BASIS;
		dbg.regs.rsp = 0x7FFE0000;
		dbg.regs.rip = 0x3000;
		let mut rip = 0x3000;
		muat_trace_dekripsi(&mut dbg, &dekoder(), &mut rip, 0x300E, None).unwrap()
	}

	#[test]
	fn test_roundtrip_slot_stack_lengkap() {
		let mut trace = trace_spill();
		let akar = telusuri_dekripsi(&mut trace, Some("rcx"), &[], BASIS);
		assert!(trace[0].used, "definisi nilai yang di-spill harus ikut");
		assert!(trace[1].used, "store ke slot harus ikut");
		assert!(trace[2].used, "load seed harus ikut");
		assert_eq!(
			akar,
			vec![AkarTrace::ModuleBase {
				register: "rbx".to_string()
			}]
		);
	}

	#[test]
	fn test_resolusi_idempotent() {
		// needed-set tidak berubah kalau resolusi dijalankan dua kali
		let mut trace = trace_spill();
		telusuri_dekripsi(&mut trace, Some("rcx"), &[], BASIS);
		let used_1: Vec<bool> = trace.iter().map(|e| e.used).collect();
		telusuri_dekripsi(&mut trace, Some("rcx"), &[], BASIS);
		let used_2: Vec<bool> = trace.iter().map(|e| e.used).collect();
		assert_eq!(used_1, used_2);
	}

	#[test]
	fn test_sentinel_mask_memutus_rantai() {
		// mov rbx, rax ; and rbx, 0xffffffffc0000000
		let mut dbg = MockDebugger::kosong(BASIS);
		let mut kode = vec![
			0x48, 0x89, 0xC3, // mov rbx, rax
			0x48, 0x81, 0xE3, 0x00, 0x00, 0x00, 0xC0, // and rbx, 0xffffffffc0000000
		];
		kode.extend([0x90; 32]);
		dbg.tambah_memori(0x3000, &kode);
		dbg.tambah_langkah(0x3000, 3, vec![("rbx", 0x55)]);
		dbg.tambah_langkah(0x3003, 7, vec![("rbx", 0)]);
		dbg.regs.rip = 0x3000;
		let mut rip = 0x3000;
		let mut trace =
			muat_trace_dekripsi(&mut dbg, &dekoder(), &mut rip, 0x300A, None).unwrap();
		let akar = telusuri_dekripsi(&mut trace, Some("rbx"), &[], BASIS);
		assert!(trace[1].used);
		assert!(!trace[0].used, "mask sentinel tidak boleh menyeret dependency");
		assert!(akar.is_empty());
	}

	#[test]
	fn test_ignore_list_tidak_dikejar() {
		let mut dbg = MockDebugger::kosong(BASIS);
		let mut kode = vec![
			0x48, 0x89, 0xC3, // mov rbx, rax
			0x48, 0x89, 0xD9, // mov rcx, rbx
		];
		kode.extend([0x90; 32]);
		dbg.tambah_memori(0x3000, &kode);
		dbg.tambah_langkah(0x3000, 3, vec![("rbx", 0x55)]);
		dbg.tambah_langkah(0x3003, 3, vec![("rcx", 0x55)]);
		dbg.regs.rip = 0x3000;
		let mut rip = 0x3000;
		let mut trace =
			muat_trace_dekripsi(&mut dbg, &dekoder(), &mut rip, 0x3006, None).unwrap();
		let ignore = vec!["rbx".to_string()];
		let akar = telusuri_dekripsi(&mut trace, Some("rcx"), &ignore, BASIS);
		assert!(trace[1].used);
		assert!(!trace[0].used, "register aksioma tidak boleh dikejar");
		assert!(akar.is_empty());
	}

	#[test]
	fn test_akar_tak_terverifikasi() {
		// mov rcx, rbx tanpa definisi rbx; nilai mentah bukan basis module
		let mut dbg = MockDebugger::kosong(BASIS);
		let mut kode = vec![0x48, 0x89, 0xD9];
		kode.extend([0x90; 32]);
		dbg.tambah_memori(0x3000, &kode);
		dbg.tambah_langkah(0x3000, 3, vec![("rcx", 0x1234)]);
		dbg.regs.rbx = 0x1234;
		dbg.regs.rip = 0x3000;
		let mut rip = 0x3000;
		let mut trace =
			muat_trace_dekripsi(&mut dbg, &dekoder(), &mut rip, 0x3003, None).unwrap();
		let akar = telusuri_dekripsi(&mut trace, Some("rcx"), &[], BASIS);
		assert_eq!(
			akar,
			vec![AkarTrace::TakTerverifikasi {
				register: "rbx".to_string(),
				nilai: 0x1234
			}]
		);
	}
}
