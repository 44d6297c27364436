//! The extended 80-column card: 64 KiB of auxiliary RAM plus the switches
//! (`80STORE`, `RAMRD`, `RAMWRT`, `INTCXROM`, `ALTZP`, `SLOTC3ROM`, `80COL`)
//! that decide, access by access, whether the CPU is looking at main memory
//! or this card's RAM.
//!
//! Page 0 can't be a single bank-switched layer: its sub-regions route on
//! different switches (zero page + stack on `ALTZP`; text page 1 on
//! `80STORE`+`PAGE2` or else `RAMRD`/`RAMWRT`; everything else in `$0200`
//! -`$0FFF` on plain `RAMRD`/`RAMWRT`). The rest of the swappable window,
//! `$1000`-`$BFFF`, follows the same `RAMRD`/`RAMWRT` split uniformly,
//! *except* the `80STORE`+`HIRES` combination, which extends the
//! `80STORE`+`PAGE2` rule to the hi-res page range `$2000`-`$3FFF` so a
//! program double-buffering hi-res graphics gets the aux page the same way
//! it gets the aux text page.
//!
//! [`AuxMemoryController`] owns the switch latch and the RAM; it never sits
//! behind a bus layer itself. [`AuxWindow`] is the `BusTarget` that does,
//! built once per address range at machine-wiring time via
//! [`AuxMemoryController::window`], sharing the same switch state and RAM.

use std::cell::RefCell;
use std::rc::Rc;

use apple2_bus::{BusAccess, BusTarget, Capabilities, Intent, IoHandler, Memory};
use emu_core::Address;

use crate::devices::{DeviceKind, SoftSwitchDevice, SoftSwitchState};

pub const AUX_RAM_SIZE: usize = 0x1_0000;

const STORE80_OFF: u8 = 0x00;
const STORE80_ON: u8 = 0x01;
const RAMRD_OFF: u8 = 0x02;
const RAMRD_ON: u8 = 0x03;
const RAMWRT_OFF: u8 = 0x04;
const RAMWRT_ON: u8 = 0x05;
const INTCXROM_OFF: u8 = 0x06;
const INTCXROM_ON: u8 = 0x07;
const ALTZP_OFF: u8 = 0x08;
const ALTZP_ON: u8 = 0x09;
const SLOTC3ROM_OFF: u8 = 0x0A;
const SLOTC3ROM_ON: u8 = 0x0B;
const COL80_OFF: u8 = 0x0C;
const COL80_ON: u8 = 0x0D;

const RD_RAMRD: u8 = 0x13;
const RD_RAMWRT: u8 = 0x14;
const RD_INTCXROM: u8 = 0x15;
const RD_ALTZP: u8 = 0x16;
const RD_SLOTC3ROM: u8 = 0x17;
const RD_80STORE: u8 = 0x18;

#[derive(Debug, Clone, Copy, Default)]
struct AuxSwitches {
    store80: bool,
    ramrd: bool,
    ramwrt: bool,
    intcxrom: bool,
    altzp: bool,
    slotc3rom: bool,
    col80: bool,
    page2: bool,
    hires: bool,
}

/// The card's switch latch and RAM, registered with the I/O dispatcher.
pub struct AuxMemoryController {
    switches: Rc<RefCell<AuxSwitches>>,
    main_ram: Rc<RefCell<Memory>>,
    aux_ram: Rc<RefCell<Memory>>,
}

impl AuxMemoryController {
    /// `main_ram` must be the same backing block the machine's plain main
    /// RAM layer uses, so the composite window reads/writes land in the
    /// one shared image rather than a shadow copy.
    #[must_use]
    pub fn new(main_ram: Rc<RefCell<Memory>>) -> Self {
        Self {
            switches: Rc::new(RefCell::new(AuxSwitches::default())),
            main_ram,
            aux_ram: Rc::new(RefCell::new(Memory::new(AUX_RAM_SIZE))),
        }
    }

    /// A `BusTarget` covering the range starting at `base`, sharing this
    /// controller's switch state and both RAM blocks.
    #[must_use]
    pub fn window(&self, base: Address) -> AuxWindow {
        AuxWindow {
            base,
            switches: self.switches.clone(),
            main_ram: self.main_ram.clone(),
            aux_ram: self.aux_ram.clone(),
        }
    }

    #[must_use]
    pub fn aux_ram(&self) -> Rc<RefCell<Memory>> {
        self.aux_ram.clone()
    }

    /// Called by the machine whenever the video device's `PAGE2`/`HIRES`
    /// latches change, since this controller's composite routing needs
    /// them but does not own them.
    pub fn sync_video_latches(&mut self, page2: bool, hires: bool) {
        let mut sw = self.switches.borrow_mut();
        sw.page2 = page2;
        sw.hires = hires;
    }

    #[must_use]
    pub fn col80(&self) -> bool {
        self.switches.borrow().col80
    }

    #[must_use]
    pub fn intcxrom(&self) -> bool {
        self.switches.borrow().intcxrom
    }

    #[must_use]
    pub fn slotc3rom(&self) -> bool {
        self.switches.borrow().slotc3rom
    }
}

impl IoHandler for AuxMemoryController {
    fn io_read(&mut self, offset: u8, access: &BusAccess) -> u8 {
        let side_effects = !access.suppresses_side_effects();
        match offset {
            STORE80_OFF | STORE80_ON | RAMRD_OFF | RAMRD_ON | RAMWRT_OFF | RAMWRT_ON
            | INTCXROM_OFF | INTCXROM_ON | ALTZP_OFF | ALTZP_ON | SLOTC3ROM_OFF
            | SLOTC3ROM_ON | COL80_OFF | COL80_ON => {
                if side_effects {
                    apply_toggle(&mut self.switches.borrow_mut(), offset);
                }
                0xFF
            }
            RD_RAMRD => bit7(self.switches.borrow().ramrd),
            RD_RAMWRT => bit7(self.switches.borrow().ramwrt),
            RD_INTCXROM => bit7(self.switches.borrow().intcxrom),
            RD_ALTZP => bit7(self.switches.borrow().altzp),
            RD_SLOTC3ROM => bit7(self.switches.borrow().slotc3rom),
            RD_80STORE => bit7(self.switches.borrow().store80),
            _ => 0xFF,
        }
    }

    fn io_write(&mut self, offset: u8, _value: u8, access: &BusAccess) {
        if !access.suppresses_side_effects() {
            apply_toggle(&mut self.switches.borrow_mut(), offset);
        }
    }
}

fn apply_toggle(sw: &mut AuxSwitches, offset: u8) {
    match offset {
        STORE80_OFF => sw.store80 = false,
        STORE80_ON => sw.store80 = true,
        RAMRD_OFF => sw.ramrd = false,
        RAMRD_ON => sw.ramrd = true,
        RAMWRT_OFF => sw.ramwrt = false,
        RAMWRT_ON => sw.ramwrt = true,
        INTCXROM_OFF => sw.intcxrom = false,
        INTCXROM_ON => sw.intcxrom = true,
        ALTZP_OFF => sw.altzp = false,
        ALTZP_ON => sw.altzp = true,
        SLOTC3ROM_OFF => sw.slotc3rom = false,
        SLOTC3ROM_ON => sw.slotc3rom = true,
        COL80_OFF => sw.col80 = false,
        COL80_ON => sw.col80 = true,
        _ => {}
    }
}

fn bit7(set: bool) -> u8 {
    if set {
        0x80
    } else {
        0
    }
}

impl SoftSwitchDevice for AuxMemoryController {
    fn name(&self) -> &'static str {
        "aux-memory"
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::SlotCard
    }

    fn reset(&mut self) {
        *self.switches.borrow_mut() = AuxSwitches::default();
    }

    fn get_soft_switch_states(&self) -> Vec<SoftSwitchState> {
        let sw = self.switches.borrow();
        vec![
            SoftSwitchState {
                name: "80STORE",
                address: 0xC001,
                is_on: sw.store80,
                description: "page2/hires select aux for text page 1 / hi-res",
            },
            SoftSwitchState {
                name: "RAMRD",
                address: 0xC003,
                is_on: sw.ramrd,
                description: "reads in the swappable window come from aux",
            },
            SoftSwitchState {
                name: "RAMWRT",
                address: 0xC005,
                is_on: sw.ramwrt,
                description: "writes in the swappable window go to aux",
            },
            SoftSwitchState {
                name: "ALTZP",
                address: 0xC009,
                is_on: sw.altzp,
                description: "aux zero page and stack",
            },
            SoftSwitchState {
                name: "80COL",
                address: 0xC00D,
                is_on: sw.col80,
                description: "80-column display mode",
            },
        ]
    }
}

/// The composite `BusTarget` for one address window, sharing a controller's
/// switch state and RAM blocks. `base` is the window's first virtual
/// address, used to recover the absolute address a `phys_addr` (already
/// relative to the owning layer) corresponds to.
pub struct AuxWindow {
    base: Address,
    switches: Rc<RefCell<AuxSwitches>>,
    main_ram: Rc<RefCell<Memory>>,
    aux_ram: Rc<RefCell<Memory>>,
}

impl AuxWindow {
    fn selects_aux(&self, abs: Address, is_write: bool) -> bool {
        let sw = self.switches.borrow();
        if abs < 0x0200 {
            return sw.altzp;
        }
        if (0x0400..0x0800).contains(&abs) {
            return if sw.store80 {
                sw.page2
            } else if is_write {
                sw.ramwrt
            } else {
                sw.ramrd
            };
        }
        if (0x2000..0x4000).contains(&abs) && sw.store80 && sw.hires {
            return sw.page2;
        }
        if is_write {
            sw.ramwrt
        } else {
            sw.ramrd
        }
    }
}

impl BusTarget for AuxWindow {
    fn capabilities(&self) -> Capabilities {
        Capabilities::IS_SIDE_EFFECT_FREE
    }

    fn read8(&mut self, phys_addr: Address, access: &BusAccess) -> u8 {
        let abs = self.base + phys_addr;
        let is_write = access.intent == Intent::DataWrite || access.intent == Intent::DebugWrite;
        if self.selects_aux(abs, is_write) {
            self.aux_ram.borrow_mut().read8(abs, access)
        } else {
            self.main_ram.borrow_mut().read8(abs, access)
        }
    }

    fn write8(&mut self, phys_addr: Address, access: &BusAccess) {
        let abs = self.base + phys_addr;
        if self.selects_aux(abs, true) {
            self.aux_ram.borrow_mut().write8(abs, access);
        } else {
            self.main_ram.borrow_mut().write8(abs, access);
        }
    }

    fn peek8(&self, phys_addr: Address) -> u8 {
        let abs = self.base + phys_addr;
        if self.selects_aux(abs, false) {
            self.aux_ram.borrow().peek8(abs)
        } else {
            self.main_ram.borrow().peek8(abs)
        }
    }

    fn poke8(&mut self, phys_addr: Address, value: u8) {
        let abs = self.base + phys_addr;
        if self.selects_aux(abs, true) {
            self.aux_ram.borrow_mut().poke8(abs, value);
        } else {
            self.main_ram.borrow_mut().poke8(abs, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use emu_core::Cycle;

    use super::*;

    fn read_access(addr: Address) -> BusAccess {
        BusAccess::cpu(addr, Intent::DataRead, 0, Cycle::ZERO)
    }

    fn write_access(addr: Address, value: u8) -> BusAccess {
        let mut a = BusAccess::cpu(addr, Intent::DataWrite, 0, Cycle::ZERO);
        a.value = value;
        a
    }

    fn toggle(aux: &mut AuxMemoryController, offset: u8) {
        aux.io_write(offset, 0, &write_access(0xC000 + u32::from(offset), 0));
    }

    #[test]
    fn altzp_selects_aux_zero_page() {
        let main = Rc::new(RefCell::new(Memory::new(0xC000)));
        let aux = AuxMemoryController::new(main);
        let mut window = aux.window(0x0000);

        window.write8(0x0050, &write_access(0x0050, 0x11));
        assert_eq!(window.read8(0x0050, &read_access(0x0050)), 0x11);

        let mut with_altzp = AuxMemoryController::new(Rc::new(RefCell::new(Memory::new(0xC000))));
        toggle(&mut with_altzp, ALTZP_ON);
        let mut altzp_window = with_altzp.window(0x0000);
        altzp_window.write8(0x0050, &write_access(0x0050, 0x22));
        // Aux zero page is a distinct block: reading it back confirms the
        // write landed there rather than in main.
        assert_eq!(altzp_window.read8(0x0050, &read_access(0x0050)), 0x22);
    }

    #[test]
    fn text_page1_follows_80store_and_page2() {
        let main = Rc::new(RefCell::new(Memory::new(0xC000)));
        let mut aux = AuxMemoryController::new(main);
        toggle(&mut aux, STORE80_ON);
        aux.sync_video_latches(true, false);
        let mut window = aux.window(0x0000);

        window.write8(0x0400, &write_access(0x0400, 0x33));
        assert_eq!(window.read8(0x0400, &read_access(0x0400)), 0x33);

        aux.sync_video_latches(false, false);
        let mut window2 = aux.window(0x0000);
        window2.write8(0x0400, &write_access(0x0400, 0x99));
        assert_eq!(
            window2.read8(0x0400, &read_access(0x0400)),
            0,
            "page2 off again: back to main, unaffected by the aux write above"
        );
    }

    #[test]
    fn ramrd_ramwrt_independently_select_direction() {
        let main = Rc::new(RefCell::new(Memory::new(0xC000)));
        let mut aux = AuxMemoryController::new(main);
        toggle(&mut aux, RAMWRT_ON);
        let mut window = aux.window(0x0000);

        // Write goes to aux (RAMWRT on); main stays zero.
        window.write8(0x0900, &write_access(0x0900, 0x44));
        // Read still comes from main (RAMRD off): untouched.
        assert_eq!(window.read8(0x0900, &read_access(0x0900)), 0);
    }

    #[test]
    fn upper_window_shares_same_switches() {
        let main = Rc::new(RefCell::new(Memory::new(0xC000)));
        let mut aux = AuxMemoryController::new(main);
        toggle(&mut aux, RAMRD_ON);
        toggle(&mut aux, RAMWRT_ON);
        let mut window = aux.window(0x1000);

        window.write8(0x0500, &write_access(0x1500, 0x55));
        assert_eq!(window.read8(0x0500, &read_access(0x1500)), 0x55);
    }
}
