//! Author: [Seclususs](https://github.com/seclususs)

use log::{debug, info, warn};
use memchr::memmem::Finder;

use crate::error::DumperError;
use crate::logic::tracer::platform::PlatformDebugger;

const UKURAN_CHUNK_BACA: usize = 0x1000;

/// Pencari signature byte di module debuggee. Pola pakai token hex
/// dipisah spasi, `?`/`??` sebagai wildcard: `"48 8B ? ? 33 05"`.
pub trait PatternScanner {
    /// Alamat match pertama, atau match berikutnya kalau `match_berikutnya`.
    fn find_pattern(&mut self, pola: &str, match_berikutnya: bool) -> Option<u64>;
}

fn parse_pola(pola: &str) -> Result<Vec<Option<u8>>, DumperError> {
    let mut tokens = Vec::new();
    for bagian in pola.split_whitespace() {
        if bagian == "?" || bagian == "??" {
            tokens.push(None);
        } else {
            let nilai = u8::from_str_radix(bagian, 16).map_err(|_| {
                DumperError::Generic(format!("Token pola tidak valid: '{}'", bagian))
            })?;
            tokens.push(Some(nilai));
        }
    }
    if tokens.is_empty() {
        return Err(DumperError::Generic("Pola kosong".to_string()));
    }
    Ok(tokens)
}

/// Run literal terpanjang di dalam pola, untuk fast path memmem.
fn run_literal_terpanjang(tokens: &[Option<u8>]) -> Option<(usize, Vec<u8>)> {
    let mut terbaik: Option<(usize, Vec<u8>)> = None;
    let mut mulai = 0;
    let mut run: Vec<u8> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Some(b) => {
                if run.is_empty() {
                    mulai = i;
                }
                run.push(*b);
            }
            None => {
                if terbaik.as_ref().map_or(true, |(_, t)| run.len() > t.len()) && !run.is_empty()
                {
                    terbaik = Some((mulai, run.clone()));
                }
                run.clear();
            }
        }
    }
    if !run.is_empty() && terbaik.as_ref().map_or(true, |(_, t)| run.len() > t.len()) {
        terbaik = Some((mulai, run));
    }
    terbaik
}

fn cocok_pada(data: &[u8], offset: usize, tokens: &[Option<u8>]) -> bool {
    if offset + tokens.len() > data.len() {
        return false;
    }
    tokens
        .iter()
        .enumerate()
        .all(|(i, t)| t.map_or(true, |b| data[offset + i] == b))
}

/// Image byte module yang dibaca dari debuggee, discan lokal.
pub struct ScannerModul {
    data: Vec<u8>,
    alamat_basis: u64,
}

impl ScannerModul {
    pub fn dari_buffer(data: Vec<u8>, alamat_basis: u64) -> Self {
        ScannerModul { data, alamat_basis }
    }

    /// Baca image module dari memory debuggee, chunk demi chunk; berhenti
    /// di baca pertama yang gagal atau pendek.
    pub fn dari_debuggee(
        dbg: &dyn PlatformDebugger,
        ukuran_modul: usize,
    ) -> Result<Self, DumperError> {
        let alamat_basis = dbg.base_address();
        let mut data = Vec::with_capacity(ukuran_modul);
        let mut offset = 0usize;
        while offset < ukuran_modul {
            let sisa = std::cmp::min(UKURAN_CHUNK_BACA, ukuran_modul - offset);
            match dbg.baca_memory(alamat_basis + offset as u64, sisa) {
                Ok(chunk) => {
                    let pendek = chunk.len() < sisa;
                    data.extend_from_slice(&chunk);
                    if pendek {
                        debug!(
                            "Baca module berhenti pendek di offset 0x{:x}",
                            offset + chunk.len()
                        );
                        break;
                    }
                }
                Err(e) => {
                    debug!("Baca module berhenti di offset 0x{:x}: {}", offset, e);
                    break;
                }
            }
            offset += sisa;
        }
        info!(
            "Image module terbaca: {} bytes dari 0x{:x}",
            data.len(),
            alamat_basis
        );
        Ok(ScannerModul { data, alamat_basis })
    }
}

impl PatternScanner for ScannerModul {
    fn find_pattern(&mut self, pola: &str, match_berikutnya: bool) -> Option<u64> {
        let tokens = match parse_pola(pola) {
            Ok(t) => t,
            Err(e) => {
                warn!("Pola signature ditolak: {}", e);
                return None;
            }
        };
        let (run_mulai, run_bytes) = match run_literal_terpanjang(&tokens) {
            Some(run) => run,
            None => {
                warn!("Pola tanpa byte literal tidak bisa discan");
                return None;
            }
        };
        let finder = Finder::new(&run_bytes);
        let mut ditemukan = 0usize;
        for pos in finder.find_iter(&self.data) {
            if pos < run_mulai {
                continue;
            }
            let kandidat = pos - run_mulai;
            if !cocok_pada(&self.data, kandidat, &tokens) {
                continue;
            }
            ditemukan += 1;
            let ambil = if match_berikutnya { 2 } else { 1 };
            if ditemukan == ambil {
                let alamat = self.alamat_basis + kandidat as u64;
                debug!("Signature ketemu di 0x{:x}", alamat);
                return Some(alamat);
            }
        }
        None
    }
}
