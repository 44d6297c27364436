//! Layered, paged memory bus and $C000-$C0FF I/O page dispatcher.
//!
//! Every access — CPU fetch, CPU operand read/write, or a debugger peek —
//! flows through the same [`BusAccess`] record and the same [`MemoryBus`],
//! so there is exactly one code path that decides what a given address
//! currently means. Bank switching (the language card, the 80-column aux
//! card) never rewrites the page table: it activates or deactivates a
//! [`Layer`] that was already pushed onto the stack at machine-wiring time.

mod access;
mod bus;
mod fault;
mod io;
mod page_map;
mod target;

pub use access::{AccessFlags, AccessMode, BusAccess, Intent};
pub use bus::MemoryBus;
pub use fault::Fault;
pub use io::{IoHandler, IoPageDispatcher};
pub use page_map::{Layer, PageMap, Perms};
pub use target::{BusTarget, Capabilities, Memory};

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use emu_core::Cycle;

    use super::*;

    fn read_access(address: emu_core::Address) -> BusAccess {
        BusAccess::cpu(address, Intent::DataRead, 0, Cycle::ZERO)
    }

    fn write_access(address: emu_core::Address, value: u8) -> BusAccess {
        let mut access = BusAccess::cpu(address, Intent::DataWrite, 0, Cycle::ZERO);
        access.value = value;
        access
    }

    fn fetch_access(address: emu_core::Address) -> BusAccess {
        BusAccess::cpu(address, Intent::InstructionFetch, 0, Cycle::ZERO)
    }

    #[test]
    fn ram_reads_back_what_was_written() {
        let mut bus = MemoryBus::new();
        let ram = Rc::new(RefCell::new(Memory::new(0x1000)));
        bus.page_map
            .add_layer("ram", 0x0000, 1, Perms::READ_WRITE, true, ram);

        bus.try_write8(&write_access(0x0200, 0x42)).unwrap();
        assert_eq!(bus.try_read8(&read_access(0x0200)).unwrap(), 0x42);
    }

    #[test]
    fn write_to_rom_page_is_permission_denied() {
        let mut bus = MemoryBus::new();
        let rom = Rc::new(RefCell::new(Memory::from_bytes(vec![0xEA; 0x1000])));
        bus.page_map.add_layer("rom", 0xD000, 1, Perms::READ, true, rom);

        assert_eq!(
            bus.try_write8(&write_access(0xD000, 0xFF)),
            Err(Fault::PermissionDenied(0xD000))
        );
        assert_eq!(bus.try_read8(&read_access(0xD000)).unwrap(), 0xEA);
    }

    #[test]
    fn unmapped_address_faults() {
        let bus = MemoryBus::new();
        assert_eq!(
            bus.try_read8(&read_access(0x1234)),
            Err(Fault::Unmapped(0x1234))
        );
    }

    #[test]
    fn higher_layer_shadows_lower_one_while_active() {
        let mut bus = MemoryBus::new();
        let base_ram = Rc::new(RefCell::new(Memory::from_bytes(vec![1; 0x1000])));
        let card_ram = Rc::new(RefCell::new(Memory::from_bytes(vec![2; 0x1000])));
        bus.page_map
            .add_layer("base", 0xD000, 1, Perms::READ_WRITE, true, base_ram);
        let card = bus
            .page_map
            .add_layer("card", 0xD000, 1, Perms::READ_WRITE, true, card_ram);

        assert_eq!(bus.try_read8(&read_access(0xD000)).unwrap(), 2);

        bus.page_map.set_active(card, false);
        assert_eq!(bus.try_read8(&read_access(0xD000)).unwrap(), 1);
    }

    #[test]
    fn decomposed_16_bit_read_is_little_endian() {
        let mut bus = MemoryBus::new();
        let ram = Rc::new(RefCell::new(Memory::new(0x1000)));
        bus.page_map
            .add_layer("ram", 0x0000, 1, Perms::READ_WRITE, true, ram);
        bus.try_write8(&write_access(0x0300, 0x34)).unwrap();
        bus.try_write8(&write_access(0x0301, 0x12)).unwrap();

        assert_eq!(bus.try_read16(&read_access(0x0300)).unwrap(), 0x1234);
    }

    #[test]
    fn atomic_mode_rejected_without_capability() {
        struct NoAtomic;
        impl BusTarget for NoAtomic {
            fn capabilities(&self) -> Capabilities {
                Capabilities::SUPPORTS_PEEK
            }
            fn read8(&mut self, _phys_addr: emu_core::Address, _access: &BusAccess) -> u8 {
                0
            }
            fn write8(&mut self, _phys_addr: emu_core::Address, _access: &BusAccess) {}
        }

        let mut bus = MemoryBus::new();
        bus.page_map.add_layer(
            "device",
            0xC000,
            1,
            Perms::READ_WRITE,
            true,
            Rc::new(RefCell::new(NoAtomic)),
        );

        let mut access = read_access(0xC000);
        access.mode = AccessMode::Atomic;
        assert_eq!(bus.try_read16(&access), Err(Fault::TargetRejected(0xC000)));
    }

    struct EchoDevice {
        last_write: u8,
    }

    impl IoHandler for EchoDevice {
        fn io_read(&mut self, _offset: u8, _access: &BusAccess) -> u8 {
            self.last_write
        }
        fn io_write(&mut self, _offset: u8, value: u8, _access: &BusAccess) {
            self.last_write = value;
        }
    }

    #[test]
    fn io_dispatcher_routes_by_offset() {
        let mut dispatcher = IoPageDispatcher::new();
        let device = Rc::new(RefCell::new(EchoDevice { last_write: 0 }));
        dispatcher.register(0x10, device.clone());

        dispatcher.dispatch_write(0x10, 0x99, &write_access(0xC010, 0x99));
        assert_eq!(dispatcher.dispatch_read(0x10, &read_access(0xC010)), 0x99);
        assert_eq!(dispatcher.dispatch_read(0x20, &read_access(0xC020)), 0xFF);
    }

    #[test]
    fn io_page_behind_bus_layer() {
        let mut bus = MemoryBus::new();
        let mut dispatcher = IoPageDispatcher::new();
        let device = Rc::new(RefCell::new(EchoDevice { last_write: 7 }));
        dispatcher.register(0x00, device);
        bus.page_map.add_layer(
            "io",
            0xC000,
            1,
            Perms::READ_WRITE,
            true,
            Rc::new(RefCell::new(dispatcher)),
        );

        assert_eq!(bus.try_read8(&read_access(0xC000)).unwrap(), 7);
    }

    #[test]
    fn instruction_fetch_from_a_non_executable_layer_is_permission_denied() {
        let mut bus = MemoryBus::new();
        let io_ram = Rc::new(RefCell::new(Memory::new(0x1000)));
        // Data-only: no EXEC bit, matching a device register window that
        // should never be jumped into.
        bus.page_map
            .add_layer("io-data-only", 0xC000, 1, Perms::READ_WRITE, true, io_ram);

        assert_eq!(bus.try_read8(&read_access(0xC000)), Ok(0));
        assert_eq!(
            bus.try_read8(&fetch_access(0xC000)),
            Err(Fault::PermissionDenied(0xC000)),
            "a non-executable layer must reject InstructionFetch even though DataRead succeeds"
        );
    }

    #[test]
    fn debug_write_bypasses_the_write_permission_check() {
        let mut bus = MemoryBus::new();
        let rom = Rc::new(RefCell::new(Memory::from_bytes(vec![0xEA; 0x1000])));
        bus.page_map.add_layer("rom", 0xD000, 1, Perms::READ, true, rom);

        assert_eq!(
            bus.try_write8(&write_access(0xD000, 0xFF)),
            Err(Fault::PermissionDenied(0xD000)),
            "a real DataWrite must still be rejected"
        );

        bus.poke8(0xD000, 0x99).unwrap();
        assert_eq!(bus.try_read8(&read_access(0xD000)).unwrap(), 0x99, "poke8 (DebugWrite) bypasses the W check");
    }
}
