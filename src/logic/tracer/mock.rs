//! Debuggee tiruan untuk test: memory dari buffer dan eksekusi dari skrip
//! per-alamat, tanpa proses hidup.

use super::platform::PlatformDebugger;
use super::types::KonteksRegister;
use crate::error::DumperError;

pub struct LangkahMock {
    pub alamat: u64,
    pub panjang: u64,
    pub efek: Vec<(&'static str, u64)>,
    pub picu_exception: bool,
}

pub struct MockDebugger {
    pub regs: KonteksRegister,
    pub alamat_basis: u64,
    memori: Vec<(u64, Vec<u8>)>,
    program: Vec<LangkahMock>,
    exception_hit: bool,
}

impl MockDebugger {
    pub fn kosong(alamat_basis: u64) -> Self {
        MockDebugger {
            regs: KonteksRegister::default(),
            alamat_basis,
            memori: Vec::new(),
            program: Vec::new(),
            exception_hit: false,
        }
    }

    pub fn tambah_memori(&mut self, alamat: u64, bytes: &[u8]) {
        self.memori.push((alamat, bytes.to_vec()));
    }

    pub fn tambah_langkah(
        &mut self,
        alamat: u64,
        panjang: u64,
        efek: Vec<(&'static str, u64)>,
    ) {
        self.program.push(LangkahMock {
            alamat,
            panjang,
            efek,
            picu_exception: false,
        });
    }

    pub fn tambah_langkah_exception(&mut self, alamat: u64, panjang: u64) {
        self.program.push(LangkahMock {
            alamat,
            panjang,
            efek: Vec::new(),
            picu_exception: true,
        });
    }
}

impl PlatformDebugger for MockDebugger {
    fn attach(&mut self) -> Result<(), DumperError> {
        Ok(())
    }

    fn detach(&mut self) -> Result<(), DumperError> {
        Ok(())
    }

    fn baca_memory(&self, alamat: u64, ukuran: usize) -> Result<Vec<u8>, DumperError> {
        for (mulai, bytes) in &self.memori {
            if alamat >= *mulai && alamat < *mulai + bytes.len() as u64 {
                let offset = (alamat - mulai) as usize;
                let akhir = std::cmp::min(offset + ukuran, bytes.len());
                return Ok(bytes[offset..akhir].to_vec());
            }
        }
        Err(DumperError::Generic(format!(
            "Mock: baca di luar region: 0x{:x}",
            alamat
        )))
    }

    fn tulis_memory(&mut self, alamat: u64, data: &[u8]) -> Result<usize, DumperError> {
        for (mulai, bytes) in &mut self.memori {
            if alamat >= *mulai && alamat < *mulai + bytes.len() as u64 {
                let offset = (alamat - *mulai) as usize;
                let akhir = std::cmp::min(offset + data.len(), bytes.len());
                let jumlah = akhir - offset;
                bytes[offset..akhir].copy_from_slice(&data[..jumlah]);
                return Ok(jumlah);
            }
        }
        Err(DumperError::Generic(format!(
            "Mock: tulis di luar region: 0x{:x}",
            alamat
        )))
    }

    fn get_registers(&self) -> Result<KonteksRegister, DumperError> {
        Ok(self.regs)
    }

    fn set_registers(&mut self, regs: &KonteksRegister) -> Result<(), DumperError> {
        self.regs = *regs;
        Ok(())
    }

    fn single_step(&mut self) -> Result<u64, DumperError> {
        let rip = self.regs.rip;
        let langkah = self
            .program
            .iter()
            .find(|l| l.alamat == rip)
            .ok_or_else(|| {
                DumperError::Generic(format!("Mock: tidak ada langkah pada 0x{:x}", rip))
            })?;
        if langkah.picu_exception {
            self.exception_hit = true;
            return Ok(rip);
        }
        let panjang = langkah.panjang;
        let efek: Vec<(&'static str, u64)> = langkah.efek.clone();
        for (nama, nilai) in efek {
            self.regs.set_nilai(nama, nilai);
        }
        self.regs.rip = rip + panjang;
        Ok(self.regs.rip)
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
