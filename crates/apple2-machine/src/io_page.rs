//! The `$C000`-`$CFFF` page as one [`BusTarget`]: the `$C000`-`$C0FF`
//! soft-switch dispatcher for the low 256 bytes, and slot ROM space for the
//! rest. [`apple2_bus::PageMap`] only bank-switches whole pages, so the two
//! regions have to share a single layer here rather than two adjacent ones
//! — the I/O page's device table already dispatches by the low byte of the
//! address the same way [`IoPageDispatcher`] does, so this just adds a
//! pass-through for everything above offset `$FF`.

use apple2_bus::{BusAccess, BusTarget, Capabilities, IoPageDispatcher};
use emu_core::Address;

/// Boot-ROM content is out of scope; slot ROM space reads back as whatever
/// was loaded here (blank by default) and never accepts writes.
pub struct IoAndSlotRom {
    pub io: IoPageDispatcher,
    slot_rom: Vec<u8>,
}

impl IoAndSlotRom {
    #[must_use]
    pub fn new(io: IoPageDispatcher, slot_rom_size: usize) -> Self {
        Self {
            io,
            slot_rom: vec![0xFF; slot_rom_size],
        }
    }

    /// Replace the slot ROM image starting at offset `$100`. Must fit
    /// within the reserved slot ROM window.
    pub fn load_slot_rom(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.slot_rom.len());
        self.slot_rom[..n].copy_from_slice(&bytes[..n]);
    }
}

impl BusTarget for IoAndSlotRom {
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn read8(&mut self, phys_addr: Address, access: &BusAccess) -> u8 {
        if phys_addr < 0x100 {
            self.io.dispatch_read(phys_addr as u8, access)
        } else {
            let idx = (phys_addr - 0x100) as usize;
            self.slot_rom.get(idx).copied().unwrap_or(0xFF)
        }
    }

    fn write8(&mut self, phys_addr: Address, access: &BusAccess) {
        if phys_addr < 0x100 {
            self.io.dispatch_write(phys_addr as u8, access.value, access);
        }
        // Slot ROM space is read-only; writes above $C0FF are dropped.
    }

    fn peek8(&self, phys_addr: Address) -> u8 {
        if phys_addr < 0x100 {
            0xFF
        } else {
            let idx = (phys_addr - 0x100) as usize;
            self.slot_rom.get(idx).copied().unwrap_or(0xFF)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use apple2_bus::{Intent, IoHandler};
    use emu_core::Cycle;

    use super::*;

    struct Echo(u8);
    impl IoHandler for Echo {
        fn io_read(&mut self, _offset: u8, _access: &BusAccess) -> u8 {
            self.0
        }
        fn io_write(&mut self, _offset: u8, value: u8, _access: &BusAccess) {
            self.0 = value;
        }
    }

    fn access(addr: Address) -> BusAccess {
        BusAccess::cpu(addr, Intent::DataRead, 0, Cycle::ZERO)
    }

    #[test]
    fn low_offsets_dispatch_to_io_devices() {
        let mut dispatcher = IoPageDispatcher::new();
        dispatcher.register(0x00, Rc::new(RefCell::new(Echo(0x42))));
        let mut page = IoAndSlotRom::new(dispatcher, 0xF00);

        assert_eq!(page.read8(0x00, &access(0xC000)), 0x42);
    }

    #[test]
    fn high_offsets_read_slot_rom_unaffected_by_io_devices() {
        let dispatcher = IoPageDispatcher::new();
        let mut page = IoAndSlotRom::new(dispatcher, 0xF00);
        page.load_slot_rom(&[0xAA, 0xBB]);

        assert_eq!(page.read8(0x100, &access(0xC100)), 0xAA);
        assert_eq!(page.read8(0x101, &access(0xC101)), 0xBB);
    }

    #[test]
    fn writes_to_slot_rom_are_dropped() {
        let dispatcher = IoPageDispatcher::new();
        let mut page = IoAndSlotRom::new(dispatcher, 0xF00);
        let mut w = access(0xC100);
        w.value = 0x55;
        page.write8(0x100, &w);
        assert_eq!(page.read8(0x100, &access(0xC100)), 0xFF);
    }
}
