//! Author: [Seclususs](https://github.com/seclususs)

use std::collections::HashMap;

use log::{debug, warn};
use serde::Serialize;

use crate::error::DumperError;
use crate::logic::data_flow::effects::{get_registers_accessed, get_registers_modified};
use crate::logic::disasm::{normalisasi_register_64, DecoderInstruksi, Instruksi, TipeOperand};
use crate::logic::tracer::platform::PlatformDebugger;
use crate::logic::tracer::types::KonteksRegister;

/// Batas langkah per trace; rutin dekripsi normal jauh di bawah ini.
pub const BATAS_LANGKAH_TRACE: usize = 10_000;

/// Satu langkah eksekusi: instruksi, snapshot register sebelum step, dan
/// peta dependency sebagaimana adanya di titik itu. Entry dimiliki oleh
/// urutan trace; resolver dan printer hanya pegang indeks.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
	pub instruksi: Instruksi,
	pub rip: u64,
	pub context: KonteksRegister,
	pub last_modified: HashMap<String, usize>,
	pub rsp_stack_map: HashMap<i64, usize>,
	pub rbp_stack_map: HashMap<i64, usize>,
	pub used: bool,
}

/// Single-step debuggee dari posisi sekarang sampai `decryption_end` atau
/// sampai mnemonic `end_mnemonic` terdecode. Instruksi terakhir (yang match)
/// tidak ikut dieksekusi maupun dicatat.
pub fn muat_trace_dekripsi(
	dbg: &mut dyn PlatformDebugger,
	dekoder: &DecoderInstruksi,
	current_rip: &mut u64,
	decryption_end: u64,
	end_mnemonic: Option<&str>,
) -> Result<Vec<TraceEntry>, DumperError> {
	let mut trace: Vec<TraceEntry> = Vec::with_capacity(200);
	let mut last_modified: HashMap<String, usize> = HashMap::new();
	let mut rsp_stack_map: HashMap<i64, usize> = HashMap::new();
	let mut rbp_stack_map: HashMap<i64, usize> = HashMap::new();

	let mut instruksi = dekoder.decode(dbg, *current_rip);
	while *current_rip != decryption_end
		&& end_mnemonic.map_or(true, |m| instruksi.mnemonic != m)
	{
		if !instruksi.valid() {
			warn!(
				"Decode gagal di 0x{:x}, trace berhenti ({} entry)",
				*current_rip,
				trace.len()
			);
			break;
		}
		if trace.len() >= BATAS_LANGKAH_TRACE {
			warn!("Batas langkah trace tercapai pada 0x{:x}", *current_rip);
			break;
		}

		let context = dbg.get_registers()?;
		let rip_baru = dbg.single_step()?;

		debug!("read line {}: {}", trace.len(), instruksi.teks);
		trace.push(TraceEntry {
			instruksi: instruksi.clone(),
			rip: *current_rip,
			context,
			last_modified: last_modified.clone(),
			rsp_stack_map: rsp_stack_map.clone(),
			rbp_stack_map: rbp_stack_map.clone(),
			used: false,
		});
		let idx = trace.len() - 1;

		let modified = get_registers_modified(&instruksi);
		let accessed = get_registers_accessed(&instruksi);
		for reg in modified.iter().flatten() {
			last_modified.insert(reg.clone(), idx);
		}

		// Store relatif rsp/rbp: catat alias slot -> definisi terakhir dari
		// register yang dibaca, supaya load dari slot itu nanti bisa
		// dipulangkan ke instruksi asalnya.
		if let Some(op0) = instruksi.operand(0) {
			if let TipeOperand::Memory {
				base: Some(b), disp, ..
			} = &op0.tipe
			{
				let b64 = normalisasi_register_64(b);
				if b64 == "rsp" || b64 == "rbp" {
					for reg in accessed.iter().flatten() {
						if let Some(&def_idx) = last_modified.get(reg) {
							if b64 == "rsp" {
								rsp_stack_map.insert(*disp, def_idx);
							} else {
								rbp_stack_map.insert(*disp, def_idx);
							}
						}
					}
				}
			}
		}

		*current_rip = rip_baru;
		if dbg.exception_tertunda() {
			// Kernel tidak memajukan pointer pada fault; majukan manual
			// sepanjang instruksi dan sinkronkan lagi RIP live.
			*current_rip += instruksi.panjang as u64;
			dbg.set_rip(*current_rip)?;
			dbg.clear_exception();
		}
		instruksi = dekoder.decode(dbg, *current_rip);
	}

	Ok(trace)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::logic::tracer::mock::MockDebugger;

	fn dekoder() -> DecoderInstruksi {
		DecoderInstruksi::new().unwrap()
	}

	fn program_linear() -> MockDebugger {
		// 0x2000: mov rbx, rax ; 0x2003: mov rcx, rbx
		let mut dbg = MockDebugger::kosong(0x140000000);
		let mut kode = vec![0x48, 0x89, 0xC3, 0x48, 0x89, 0xD9];
		kode.extend([0x90; 32]);
		dbg.tambah_memori(0x2000, &kode);
		dbg.tambah_langkah(0x2000, 3, vec![("rbx", 0xAA)]);
		dbg.tambah_langkah(0x2003, 3, vec![("rcx", 0xAA)]);
		dbg.regs.rax = 0xAA;
		dbg.regs.rip = 0x2000;
		dbg
	}

	#[test]
	fn test_trace_sampai_alamat_akhir() {
		let mut dbg = program_linear();
		let mut rip = 0x2000;
		let trace =
			muat_trace_dekripsi(&mut dbg, &dekoder(), &mut rip, 0x2006, None).unwrap();
		assert_eq!(trace.len(), 2);
		assert_eq!(rip, 0x2006);
		assert_eq!(trace[0].rip, 0x2000);
		assert_eq!(trace[1].rip, 0x2003);
	}

	#[test]
	fn test_reaching_definition_selalu_mundur() {
		let mut dbg = program_linear();
		let mut rip = 0x2000;
		let trace =
			muat_trace_dekripsi(&mut dbg, &dekoder(), &mut rip, 0x2006, None).unwrap();
		assert!(trace[0].last_modified.is_empty());
		assert_eq!(trace[1].last_modified.get("rbx"), Some(&0));
		for (i, entry) in trace.iter().enumerate() {
			for (_, &def_idx) in &entry.last_modified {
				assert!(def_idx < i, "definisi maju di entry {}", i);
			}
		}
	}

	#[test]
	fn test_trace_berhenti_di_mnemonic() {
		// 0x2000: mov rbx, rax ; 0x2003: and rbx, 0xF
		let mut dbg = MockDebugger::kosong(0x140000000);
		let mut kode = vec![0x48, 0x89, 0xC3, 0x48, 0x83, 0xE3, 0x0F];
		kode.extend([0x90; 32]);
		dbg.tambah_memori(0x2000, &kode);
		dbg.tambah_langkah(0x2000, 3, vec![("rbx", 0x1)]);
		dbg.regs.rip = 0x2000;
		let mut rip = 0x2000;
		let trace =
			muat_trace_dekripsi(&mut dbg, &dekoder(), &mut rip, 0, Some("and")).unwrap();
		assert_eq!(trace.len(), 1);
		assert_eq!(rip, 0x2003);
		assert_eq!(trace[0].instruksi.mnemonic, "mov");
	}

	#[test]
	fn test_exception_advance_manual() {
		// instruksi pertama memicu fault, RIP tidak maju sendiri
		let mut dbg = MockDebugger::kosong(0x140000000);
		let mut kode = vec![0x48, 0x89, 0xC3, 0x48, 0x89, 0xD9];
		kode.extend([0x90; 32]);
		dbg.tambah_memori(0x2000, &kode);
		dbg.tambah_langkah_exception(0x2000, 3);
		dbg.tambah_langkah(0x2003, 3, vec![("rcx", 0xAA)]);
		dbg.regs.rip = 0x2000;
		let mut rip = 0x2000;
		let trace =
			muat_trace_dekripsi(&mut dbg, &dekoder(), &mut rip, 0x2006, None).unwrap();
		assert_eq!(trace.len(), 2);
		assert_eq!(trace[1].rip, 0x2003);
		assert!(!dbg.exception_tertunda());
	}

	#[test]
	fn test_alias_slot_stack_tercatat() {
		// mov rbx, rax ; mov [rsp-8], rbx ; mov rcx, [rsp-8]
		let mut dbg = MockDebugger::kosong(0x140000000);
		let mut kode = vec![
			0x48, 0x89, 0xC3, // mov rbx, rax
			0x48, 0x89, 0x5C, 0x24, 0xF8, // mov [rsp-8], rbx
			0x48, 0x8B, 0x4C, 0x24, 0xF8, // mov rcx, [rsp-8]
		];
		kode.extend([0x90; 32]);
		dbg.tambah_memori(0x2000, &kode);
		dbg.tambah_langkah(0x2000, 3, vec![("rbx", 0xAA)]);
		dbg.tambah_langkah(0x2003, 5, vec![]);
		dbg.tambah_langkah(0x2008, 5, vec![("rcx", 0xAA)]);
		dbg.regs.rip = 0x2000;
		let mut rip = 0x2000;
		let trace =
			muat_trace_dekripsi(&mut dbg, &dekoder(), &mut rip, 0x200D, None).unwrap();
		assert_eq!(trace.len(), 3);
		// entry load melihat alias -8 -> definisi rbx (entry 0)
		assert_eq!(trace[2].rsp_stack_map.get(&-8), Some(&0));
		// snapshot entry store belum memuat aliasnya sendiri
		assert!(trace[1].rsp_stack_map.is_empty());
	}
}
