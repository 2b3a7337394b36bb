//! Author: [Seclususs](https://github.com/seclususs)

use super::platform::PlatformDebugger;
use super::types::KonteksRegister;
use crate::error::DumperError;

pub struct UnsupportedDebugger;

fn tidak_didukung<T>() -> Result<T, DumperError> {
    Err(DumperError::Generic(
        "Platform ini tidak didukung untuk tracing".to_string(),
    ))
}

impl PlatformDebugger for UnsupportedDebugger {
    fn attach(&mut self) -> Result<(), DumperError> {
        tidak_didukung()
    }

    fn detach(&mut self) -> Result<(), DumperError> {
        tidak_didukung()
    }

    fn baca_memory(&self, _alamat: u64, _ukuran: usize) -> Result<Vec<u8>, DumperError> {
        tidak_didukung()
    }

    fn tulis_memory(&mut self, _alamat: u64, _data: &[u8]) -> Result<usize, DumperError> {
        tidak_didukung()
    }

    fn get_registers(&self) -> Result<KonteksRegister, DumperError> {
        tidak_didukung()
    }

    fn set_registers(&mut self, _regs: &KonteksRegister) -> Result<(), DumperError> {
        tidak_didukung()
    }

    fn single_step(&mut self) -> Result<u64, DumperError> {
        tidak_didukung()
    }

    fn exception_tertunda(&self) -> bool {
        false
    }

    fn clear_exception(&mut self) {}

    fn base_address(&self) -> u64 {
        0
    }
}
