//! The keyboard latch at $C000/$C010, plus a host-side injection pump that
//! lets a caller (the BASIC interpreter's GET, or a scripted demo) type text
//! without a real keypress ever happening.
//!
//! Real hardware keeps exactly one pending key: a strobe bit set the moment
//! a key goes down, cleared only when something reads $C010. Injection has
//! to respect that — it cannot shove a whole string into the latch at once
//! — so characters queue up and get latched one at a time, each waiting for
//! the strobe to clear before the next goes in.

use std::collections::VecDeque;

use apple2_bus::{BusAccess, IoHandler};

use crate::devices::{DeviceKind, SoftSwitchDevice, SoftSwitchState};

const KBD_OFFSET: u8 = 0x00;
const KBDSTRB_OFFSET: u8 = 0x10;

struct InjectedKey {
    ascii: u8,
    delay_ms: u64,
}

/// What the machine should do after a call to [`Keyboard::pump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// A key was just latched; schedule the next pump attempt `delay_ms`
    /// from now (the key will have been read and its strobe cleared by
    /// then, in the common case).
    Latched { delay_ms: u64 },
    /// The queue still has work but the strobe from the previous key
    /// hasn't cleared yet; retry soon.
    Stalled,
    /// Nothing queued.
    Idle,
}

/// ASCII keyboard latch and host injection queue.
pub struct Keyboard {
    last_key: u8,
    strobe: bool,
    any_key_down: bool,
    queue: VecDeque<InjectedKey>,
}

impl Keyboard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_key: 0,
            strobe: false,
            any_key_down: false,
            queue: VecDeque::new(),
        }
    }

    /// A real key going down: latch it, raise the strobe, mark a key held.
    pub fn key_down(&mut self, ascii: u8) {
        self.last_key = ascii & 0x7F;
        self.strobe = true;
        self.any_key_down = true;
    }

    /// A real key going up. Does not touch `last_key`/strobe — those persist
    /// until read.
    pub fn key_up(&mut self) {
        self.any_key_down = false;
    }

    /// Queue `text` for injection, one character latched every
    /// `per_char_delay_ms` once the previous one has been consumed.
    pub fn type_string(&mut self, text: &str, per_char_delay_ms: u64) {
        for ch in text.bytes() {
            self.queue.push_back(InjectedKey {
                ascii: ch,
                delay_ms: per_char_delay_ms,
            });
        }
    }

    /// Try to advance the injection queue by one character.
    pub fn pump(&mut self) -> PumpOutcome {
        if self.queue.is_empty() {
            return PumpOutcome::Idle;
        }
        if self.strobe {
            return PumpOutcome::Stalled;
        }
        let key = self.queue.pop_front().expect("checked non-empty above");
        self.key_down(key.ascii);
        PumpOutcome::Latched {
            delay_ms: key.delay_ms,
        }
    }

    #[must_use]
    pub fn has_pending_injection(&self) -> bool {
        !self.queue.is_empty()
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl IoHandler for Keyboard {
    fn io_read(&mut self, offset: u8, access: &BusAccess) -> u8 {
        match offset {
            KBD_OFFSET => self.last_key | if self.strobe { 0x80 } else { 0 },
            KBDSTRB_OFFSET => {
                let value = (self.last_key & 0x7F) | if self.any_key_down { 0x80 } else { 0 };
                if !access.suppresses_side_effects() {
                    self.strobe = false;
                }
                value
            }
            _ => 0xFF,
        }
    }

    fn io_write(&mut self, offset: u8, _value: u8, access: &BusAccess) {
        if offset == KBDSTRB_OFFSET && !access.suppresses_side_effects() {
            self.strobe = false;
        }
    }
}

impl SoftSwitchDevice for Keyboard {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Motherboard
    }

    fn reset(&mut self) {
        self.last_key = 0;
        self.strobe = false;
        self.any_key_down = false;
        self.queue.clear();
    }

    fn get_soft_switch_states(&self) -> Vec<SoftSwitchState> {
        vec![
            SoftSwitchState {
                name: "KBD",
                address: 0xC000,
                is_on: self.strobe,
                description: "key data + strobe",
            },
            SoftSwitchState {
                name: "KBDSTRB",
                address: 0xC010,
                is_on: self.any_key_down,
                description: "any-key-down, clears strobe",
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use emu_core::Cycle;

    use super::*;

    fn read(kbd: &mut Keyboard, offset: u8) -> u8 {
        let access = BusAccess::cpu(0xC000 + u32::from(offset), apple2_bus::Intent::DataRead, 0, Cycle::ZERO);
        kbd.io_read(offset, &access)
    }

    #[test]
    fn reading_kbd_does_not_clear_strobe() {
        let mut kbd = Keyboard::new();
        kbd.key_down(b'A');
        assert_eq!(read(&mut kbd, KBD_OFFSET), 0x80 | b'A');
        assert_eq!(read(&mut kbd, KBD_OFFSET), 0x80 | b'A', "strobe still set");
    }

    #[test]
    fn reading_kbdstrb_clears_strobe() {
        let mut kbd = Keyboard::new();
        kbd.key_down(b'A');
        read(&mut kbd, KBDSTRB_OFFSET);
        assert_eq!(read(&mut kbd, KBD_OFFSET), b'A', "strobe cleared");
    }

    #[test]
    fn debug_peek_does_not_clear_strobe() {
        let mut kbd = Keyboard::new();
        kbd.key_down(b'A');
        let peek = BusAccess::debug_peek(0xC010, Cycle::ZERO);
        kbd.io_read(KBDSTRB_OFFSET, &peek);
        assert_eq!(read(&mut kbd, KBD_OFFSET), 0x80 | b'A', "debug peek is side-effect free");
    }

    #[test]
    fn injection_pump_stalls_until_strobe_clears() {
        let mut kbd = Keyboard::new();
        kbd.type_string("HI", 10);

        assert_eq!(kbd.pump(), PumpOutcome::Latched { delay_ms: 10 });
        assert_eq!(kbd.pump(), PumpOutcome::Stalled, "previous key not yet read");

        read(&mut kbd, KBDSTRB_OFFSET);
        assert_eq!(kbd.pump(), PumpOutcome::Latched { delay_ms: 10 });
        assert_eq!(kbd.pump(), PumpOutcome::Stalled);

        read(&mut kbd, KBDSTRB_OFFSET);
        assert_eq!(kbd.pump(), PumpOutcome::Idle);
    }
}
