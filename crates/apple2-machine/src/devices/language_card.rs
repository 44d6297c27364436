//! The language card: 16 KiB of bank-switched RAm shadowing the high ROM
//! addresses, selected by any access (read or write) to $C080-$C08F.
//!
//! This device owns the switch latch and the RAM itself; it does **not**
//! touch the bus's page map directly; `IoHandler` only sees one access at a
//! time and has no path to a `&mut PageMap`. Instead the machine reads
//! [`LanguageCard::state`] once after every CPU step and applies it to the
//! three layers it registered at wiring time (`lower_bank1`, `lower_bank2`,
//! `upper`), activating or deactivating them rather than rewriting them —
//! bank switching a layer stack is always a flip of an `active` bit, never
//! a page-table edit.
//!
//! Real hardware also requires two consecutive read accesses to the
//! write-enabling addresses before a write actually takes effect, to avoid
//! a stray `LDA` arming write unintentionally. This model skips that
//! latch-arming step and enables write on the first qualifying access — a
//! deliberate simplification (see DESIGN.md) since this crate targets
//! behavior, not a specific silicon revision.

use std::cell::RefCell;
use std::rc::Rc;

use apple2_bus::{BusAccess, IoHandler, Memory};

use crate::devices::{DeviceKind, SoftSwitchDevice, SoftSwitchState};

const LC_BASE: u8 = 0x80;
const LOWER_BANK_SIZE: usize = 0x1000;
const UPPER_BANK_SIZE: usize = 0x2000;

/// What the language card currently wants the page map's layers to look
/// like, recomputed from the latch on every access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcState {
    /// `true` selects bank 1 at $D000-$DFFF, `false` selects bank 2.
    pub bank1_selected: bool,
    /// Whether language-card RAM (rather than motherboard ROM) answers
    /// reads across $D000-$FFFF.
    pub read_ram: bool,
    /// Whether writes across $D000-$FFFF land in language-card RAM.
    pub write_enabled: bool,
}

/// Bank-switched language-card RAM and its $C08x switch latch.
pub struct LanguageCard {
    bank1: Rc<RefCell<Memory>>,
    bank2: Rc<RefCell<Memory>>,
    upper: Rc<RefCell<Memory>>,
    state: LcState,
}

impl LanguageCard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bank1: Rc::new(RefCell::new(Memory::new(LOWER_BANK_SIZE))),
            bank2: Rc::new(RefCell::new(Memory::new(LOWER_BANK_SIZE))),
            upper: Rc::new(RefCell::new(Memory::new(UPPER_BANK_SIZE))),
            state: LcState {
                bank1_selected: false,
                read_ram: false,
                write_enabled: false,
            },
        }
    }

    /// The three backing RAM blocks, for the machine to wrap in layers at
    /// wiring time: (`$D000` bank 1, `$D000` bank 2, `$E000-$FFFF`).
    #[must_use]
    pub fn banks(&self) -> (Rc<RefCell<Memory>>, Rc<RefCell<Memory>>, Rc<RefCell<Memory>>) {
        (self.bank1.clone(), self.bank2.clone(), self.upper.clone())
    }

    #[must_use]
    pub const fn state(&self) -> LcState {
        self.state
    }

    fn decode(&mut self, offset: u8) {
        let bits = offset & 0x03;
        let read_ram = bits == 0x01 || bits == 0x03;
        let write_enabled = bits == 0x02 || bits == 0x03;
        let bank1_selected = offset & 0x08 != 0;
        self.state = LcState {
            bank1_selected,
            read_ram,
            write_enabled,
        };
    }
}

impl Default for LanguageCard {
    fn default() -> Self {
        Self::new()
    }
}

impl IoHandler for LanguageCard {
    fn io_read(&mut self, offset: u8, access: &BusAccess) -> u8 {
        if (LC_BASE..=0x8F).contains(&offset) && !access.suppresses_side_effects() {
            self.decode(offset);
        }
        0xFF
    }

    fn io_write(&mut self, offset: u8, _value: u8, access: &BusAccess) {
        if (LC_BASE..=0x8F).contains(&offset) && !access.suppresses_side_effects() {
            self.decode(offset);
        }
    }
}

impl SoftSwitchDevice for LanguageCard {
    fn name(&self) -> &'static str {
        "language-card"
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::SlotCard
    }

    fn reset(&mut self) {
        self.state = LcState {
            bank1_selected: false,
            read_ram: false,
            write_enabled: false,
        };
    }

    fn get_soft_switch_states(&self) -> Vec<SoftSwitchState> {
        vec![
            SoftSwitchState {
                name: "LCRAM",
                address: 0xC080,
                is_on: self.state.read_ram,
                description: "language card RAM answers reads $D000-$FFFF",
            },
            SoftSwitchState {
                name: "LCBANK1",
                address: 0xC088,
                is_on: self.state.bank1_selected,
                description: "bank 1 (vs bank 2) selected at $D000",
            },
            SoftSwitchState {
                name: "LCWRITE",
                address: 0xC081,
                is_on: self.state.write_enabled,
                description: "writes $D000-$FFFF land in language card RAM",
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use emu_core::Cycle;

    use super::*;

    fn access(offset: u8) -> BusAccess {
        BusAccess::cpu(0xC000 + u32::from(offset), apple2_bus::Intent::DataRead, 0, Cycle::ZERO)
    }

    #[test]
    fn default_state_is_rom_read_write_protected() {
        let lc = LanguageCard::new();
        assert!(!lc.state().read_ram);
        assert!(!lc.state().write_enabled);
    }

    #[test]
    fn c08b_selects_bank1_ram_read_write_enabled() {
        let mut lc = LanguageCard::new();
        lc.io_read(0x8B, &access(0x8B));
        let state = lc.state();
        assert!(state.bank1_selected);
        assert!(state.read_ram);
        assert!(state.write_enabled);
    }

    #[test]
    fn c080_selects_bank2_rom_read() {
        let mut lc = LanguageCard::new();
        lc.io_read(0x83, &access(0x83)); // arm ram+write first
        lc.io_read(0x80, &access(0x80));
        let state = lc.state();
        assert!(!state.bank1_selected);
        assert!(!state.read_ram);
        assert!(!state.write_enabled);
    }

    #[test]
    fn debug_peek_does_not_change_latch() {
        let mut lc = LanguageCard::new();
        let peek = BusAccess::debug_peek(0xC08B, Cycle::ZERO);
        lc.io_read(0x8B, &peek);
        assert!(!lc.state().read_ram, "peek must not arm the switch");
    }
}
