//! Author: [Seclususs](https://github.com/seclususs)

use std::ops::{Deref, DerefMut};

use log::{debug, warn};

use crate::error::DumperError;
use crate::logic::tracer::platform::PlatformDebugger;
use crate::logic::tracer::types::KonteksRegister;

/// Guard yang ambil snapshot register/RIP debuggee saat acquire dan
/// mengembalikannya lagi di setiap jalur keluar, termasuk early-return.
/// Probing destruktif (forcing register untuk enumerasi switch) selalu
/// mulai dari baseline yang bersih.
pub struct ContextRestorer<'a> {
    dbg: &'a mut dyn PlatformDebugger,
    snapshot: KonteksRegister,
}

impl<'a> ContextRestorer<'a> {
    pub fn acquire(dbg: &'a mut dyn PlatformDebugger) -> Result<Self, DumperError> {
        let snapshot = dbg.get_registers()?;
        debug!("ContextRestorer: snapshot diambil, rip=0x{:x}", snapshot.rip);
        Ok(ContextRestorer { dbg, snapshot })
    }
}

impl<'a> Drop for ContextRestorer<'a> {
    fn drop(&mut self) {
        if let Err(e) = self.dbg.set_registers(&self.snapshot) {
            warn!("ContextRestorer: gagal restore context: {}", e);
        } else {
            debug!("ContextRestorer: context dikembalikan ke rip=0x{:x}", self.snapshot.rip);
        }
    }
}

impl<'a> Deref for ContextRestorer<'a> {
    type Target = dyn PlatformDebugger + 'a;

    fn deref(&self) -> &Self::Target {
        self.dbg
    }
}

impl<'a> DerefMut for ContextRestorer<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dbg
    }
}
