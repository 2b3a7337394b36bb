//! Author: [Seclususs](https://github.com/seclususs)

use crate::error::DumperError;
use crate::logic::tracer::types::KonteksRegister;

/// Kontrol proses untuk satu debuggee yang sedang di-pause. Semua operasi
/// blocking; debuggee hanya jalan selama `single_step`.
pub trait PlatformDebugger: Send {
    fn attach(&mut self) -> Result<(), DumperError>;
    fn detach(&mut self) -> Result<(), DumperError>;
    fn baca_memory(&self, alamat: u64, ukuran: usize) -> Result<Vec<u8>, DumperError>;
    fn tulis_memory(&mut self, alamat: u64, data: &[u8]) -> Result<usize, DumperError>;
    fn get_registers(&self) -> Result<KonteksRegister, DumperError>;
    fn set_registers(&mut self, regs: &KonteksRegister) -> Result<(), DumperError>;

    /// Step satu instruksi, return RIP setelah step. Kalau step memicu
    /// hardware exception, RIP yang dikembalikan TIDAK maju dan
    /// `exception_tertunda` jadi true sampai caller memanggil
    /// `clear_exception`.
    fn single_step(&mut self) -> Result<u64, DumperError>;
    fn exception_tertunda(&self) -> bool;
    fn clear_exception(&mut self);

    /// Alamat basis module utama debuggee.
    fn base_address(&self) -> u64;

    fn get_rip(&self) -> Result<u64, DumperError> {
        Ok(self.get_registers()?.rip)
    }

    fn set_rip(&mut self, rip: u64) -> Result<(), DumperError> {
        let mut regs = self.get_registers()?;
        regs.rip = rip;
        self.set_registers(&regs)
    }

    fn get_nilai_register(&self, nama_reg: &str) -> Result<u64, DumperError> {
        Ok(self.get_registers()?.ambil_nilai(nama_reg))
    }

    fn set_nilai_register(&mut self, nama_reg: &str, nilai: u64) -> Result<(), DumperError> {
        let mut regs = self.get_registers()?;
        regs.set_nilai(nama_reg, nilai);
        self.set_registers(&regs)
    }
}
