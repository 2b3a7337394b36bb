//! Author: [Seclususs](https://github.com/seclususs)

use std::fmt::Write;

use regex::Regex;

use crate::error::DumperError;
use crate::logic::data_flow::resolver::{
	operand_stack_baca, operand_stack_tulis, AkarTrace,
};
use crate::logic::data_flow::trace::TraceEntry;
use crate::logic::decompiler::codegen::{asm_ke_pseudo, mnemonic_senyap};

pub struct PrinterState {
	output: String,
	indent_level: usize,
}

impl PrinterState {
	pub fn new() -> Self {
		PrinterState {
			output: String::new(),
			indent_level: 0,
		}
	}

	pub fn indent(&mut self) {
		self.indent_level += 1;
	}

	pub fn dedent(&mut self) {
		if self.indent_level > 0 {
			self.indent_level -= 1;
		}
	}

	fn write_indent(&mut self) {
		for _ in 0..self.indent_level {
			write!(self.output, "    ").unwrap();
		}
	}

	pub fn write_line(&mut self, line: &str) {
		self.write_indent();
		writeln!(self.output, "{}", line).unwrap();
	}

	pub fn as_str(&self) -> &str {
		&self.output
	}

	pub fn into_output(self) -> String {
		self.output
	}
}

impl Default for PrinterState {
	fn default() -> Self {
		PrinterState::new()
	}
}

fn nama_var_slot(basis: &str, disp: i64) -> String {
	let prefix = if basis == "rsp" { "RSP" } else { "RBP" };
	format!("{}_0x{:X}", prefix, disp as u64)
}

/// Render trace jadi listing pseudocode. Dengan seed hanya entry `used` yang
/// dicetak; tanpa seed semua entry dicetak. Tiap baris dianotasi disassembly
/// aslinya; baris yang gagal diterjemahkan atau tidak terverifikasi ditandai
/// `// !!`.
pub fn print_dekripsi(
	trace: &[TraceEntry],
	akar: &[AkarTrace],
	enc_reg: Option<&str>,
	base_address: u64,
	printer: &mut PrinterState,
) -> Result<(), DumperError> {
	for entri_akar in akar {
		match entri_akar {
			AkarTrace::ModuleBase { register } => {
				printer.write_line(&format!("{} = baseModuleAddr;", register));
			}
			AkarTrace::TakTerverifikasi { register, nilai } => {
				printer.write_line(&format!(
					"{} = 0x{:X}; // !! failed to trace (base: 0x{:X}), possibly wrong",
					register, nilai, base_address
				));
			}
		}
	}

	for entry in trace.iter() {
		if enc_reg.is_some() && !entry.used {
			continue;
		}
		let instruksi = &entry.instruksi;

		// Load relatif rsp/rbp: ganti operand memory dengan variabel lokal
		// hasil alias slot; kalau aliasnya tidak ada, pakai basis module dan
		// tandai.
		if instruksi.mnemonic != "pushfq" {
			if let Some((basis, disp)) = operand_stack_baca(instruksi) {
				let alias = match basis.as_str() {
					"rsp" => entry.rsp_stack_map.get(&disp).copied(),
					"rbp" => entry.rbp_stack_map.get(&disp).copied(),
					_ => None,
				};
				match alias {
					Some(def_idx) => {
						let def = &trace[def_idx];
						let nama_var = nama_var_slot(&basis, disp);
						printer.write_line(&format!("uintptr_t {};", nama_var));
						if let Some(tujuan_def) = def.instruksi.register_tujuan() {
							let kode_def =
								asm_ke_pseudo(&def.instruksi, def.rip, base_address, None);
							if !kode_def.is_empty() {
								let re = Regex::new(&format!(r"\b{}\b", tujuan_def))?;
								let kode_def = re.replace_all(&kode_def, nama_var.as_str());
								printer.write_line(&format!(
									"{}; \t\t//{} : {}+0x{:X}",
									kode_def,
									def.instruksi.teks,
									basis,
									disp as u64
								));
							}
						}
						let kode = asm_ke_pseudo(
							instruksi,
							entry.rip,
							base_address,
							Some(&nama_var),
						);
						if !kode.is_empty() {
							printer.write_line(&format!(
								"{}; \t\t//{}",
								kode, instruksi.teks
							));
						}
					}
					None => {
						let kode = asm_ke_pseudo(
							instruksi,
							entry.rip,
							base_address,
							Some("baseModuleAddr"),
						);
						if !kode.is_empty() {
							printer.write_line(&format!(
								"{}; \t\t//{} -- didn't find trace -> use base // !!",
								kode, instruksi.teks
							));
						} else if !mnemonic_senyap(&instruksi.mnemonic) {
							printer.write_line(&format!(
								"// !! failed to translate: {}",
								instruksi.teks
							));
						}
					}
				}
				continue;
			}
		}

		let kode = asm_ke_pseudo(instruksi, entry.rip, base_address, None);
		if !kode.is_empty() {
			printer.write_line(&format!("{}; \t\t//{}", kode, instruksi.teks));
		} else if mnemonic_senyap(&instruksi.mnemonic)
			|| operand_stack_tulis(instruksi).is_some()
		{
			// senyap: branch/cmp/store slot stack
		} else {
			printer.write_line(&format!("// !! failed to translate: {}", instruksi.teks));
		}
	}

	Ok(())
}
