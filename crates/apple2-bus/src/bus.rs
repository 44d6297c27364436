//! The bus the CPU and debugger both drive: a [`PageMap`] plus the
//! `try_read`/`try_write` entry points that pick `Decomposed` vs. `Atomic`
//! handling per [`AccessMode`].

use emu_core::{Address, Byte, DWord, Word};

use crate::access::{AccessMode, BusAccess};
use crate::fault::Fault;
use crate::page_map::PageMap;
use crate::target::Capabilities;

/// Owns the layer stack and exposes the width-aware access API the CPU core
/// and any debugger/tooling code call into.
#[derive(Default)]
pub struct MemoryBus {
    pub page_map: PageMap,
}

impl MemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            page_map: PageMap::new(),
        }
    }

    pub fn try_read8(&self, access: &BusAccess) -> Result<Byte, Fault> {
        self.page_map.read8(access)
    }

    pub fn try_write8(&self, access: &BusAccess) -> Result<(), Fault> {
        self.page_map.write8(access)
    }

    fn byte_access(template: &BusAccess, address: Address, value: Byte) -> BusAccess {
        BusAccess {
            address,
            value,
            width_bits: 8,
            ..*template
        }
    }

    /// Read a little-endian 16-bit value starting at `access.address`.
    ///
    /// In [`AccessMode::Decomposed`] this is exactly two independent 8-bit
    /// reads — the only way a real 65C02 ever reads 16 bits — so any device
    /// side effect from the low byte is visible before the high byte is
    /// read. In [`AccessMode::Atomic`] both bytes are read side-effect-free
    /// in one step, which only targets advertising `SUPPORTS_ATOMIC16`
    /// accept.
    pub fn try_read16(&self, access: &BusAccess) -> Result<Word, Fault> {
        match access.mode {
            AccessMode::Decomposed => {
                let lo = self.try_read8(&Self::byte_access(access, access.address, 0))?;
                let hi = self.try_read8(&Self::byte_access(access, access.address + 1, 0))?;
                Ok(Word::from(lo) | (Word::from(hi) << 8))
            }
            AccessMode::Atomic => {
                let caps = self.page_map.capabilities_at(access.address)?;
                if !caps.contains(Capabilities::SUPPORTS_ATOMIC16) {
                    return Err(Fault::TargetRejected(access.address));
                }
                let lo = self.page_map.peek8(access.address)?;
                let hi = self.page_map.peek8(access.address + 1)?;
                Ok(Word::from(lo) | (Word::from(hi) << 8))
            }
        }
    }

    pub fn try_write16(&self, access: &BusAccess, value: Word) -> Result<(), Fault> {
        let lo = (value & 0xFF) as Byte;
        let hi = (value >> 8) as Byte;
        match access.mode {
            AccessMode::Decomposed => {
                self.try_write8(&Self::byte_access(access, access.address, lo))?;
                self.try_write8(&Self::byte_access(access, access.address + 1, hi))
            }
            AccessMode::Atomic => {
                let caps = self.page_map.capabilities_at(access.address)?;
                if !caps.contains(Capabilities::SUPPORTS_ATOMIC16) {
                    return Err(Fault::TargetRejected(access.address));
                }
                self.page_map.poke8(access.address, lo)?;
                self.page_map.poke8(access.address + 1, hi)
            }
        }
    }

    /// Read a little-endian 32-bit value. Only meaningful in `Atomic` mode
    /// for tooling; the CPU never issues a 32-bit access.
    pub fn try_read32(&self, access: &BusAccess) -> Result<DWord, Fault> {
        match access.mode {
            AccessMode::Decomposed => {
                let lo = self.try_read16(access)?;
                let hi_access = Self::byte_access(access, access.address + 2, 0);
                let hi = self.try_read16(&hi_access)?;
                Ok(DWord::from(lo) | (DWord::from(hi) << 16))
            }
            AccessMode::Atomic => {
                let caps = self.page_map.capabilities_at(access.address)?;
                if !caps.contains(Capabilities::SUPPORTS_ATOMIC32) {
                    return Err(Fault::TargetRejected(access.address));
                }
                let b0 = self.page_map.peek8(access.address)?;
                let b1 = self.page_map.peek8(access.address + 1)?;
                let b2 = self.page_map.peek8(access.address + 2)?;
                let b3 = self.page_map.peek8(access.address + 3)?;
                Ok(DWord::from(b0)
                    | (DWord::from(b1) << 8)
                    | (DWord::from(b2) << 16)
                    | (DWord::from(b3) << 24))
            }
        }
    }

    #[must_use]
    pub fn peek8(&self, address: Address) -> Byte {
        self.page_map.peek8(address).unwrap_or(0xFF)
    }

    pub fn poke8(&self, address: Address, value: Byte) -> Result<(), Fault> {
        self.page_map.poke8(address, value)
    }
}
