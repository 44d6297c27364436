//! The speaker toggle at $C030.
//!
//! Real hardware has no audio synthesis behind this soft switch at all: a
//! read or write just flips a mechanical relay's polarity. Everything that
//! sounds like a tone is an artifact of software toggling the switch at an
//! audio-rate cadence. This device therefore only records *when* a toggle
//! happened — an edge list in CPU cycles — and leaves turning that into a
//! waveform to whatever audio backend the host wires up.

use apple2_bus::{BusAccess, IoHandler};
use emu_core::Cycle;

use crate::devices::{DeviceKind, SoftSwitchDevice, SoftSwitchState};

const SPKR_OFFSET: u8 = 0x30;

/// Mechanical-relay speaker: tracks polarity and every toggle's cycle.
pub struct Speaker {
    polarity: bool,
    toggles: Vec<Cycle>,
    /// Cap on retained history so a long-running program typing into a
    /// click-happy loop doesn't grow this unbounded; the oldest toggles are
    /// dropped once a backend has presumably already drained them.
    max_history: usize,
}

impl Speaker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            polarity: false,
            toggles: Vec::new(),
            max_history: 4096,
        }
    }

    fn toggle(&mut self, cycle: Cycle) {
        self.polarity = !self.polarity;
        self.toggles.push(cycle);
        if self.toggles.len() > self.max_history {
            self.toggles.remove(0);
        }
    }

    #[must_use]
    pub const fn polarity(&self) -> bool {
        self.polarity
    }

    /// Drain every toggle edge recorded since the last drain, oldest first.
    pub fn drain_toggles(&mut self) -> Vec<Cycle> {
        std::mem::take(&mut self.toggles)
    }
}

impl Default for Speaker {
    fn default() -> Self {
        Self::new()
    }
}

impl IoHandler for Speaker {
    fn io_read(&mut self, offset: u8, access: &BusAccess) -> u8 {
        if offset == SPKR_OFFSET && !access.suppresses_side_effects() {
            self.toggle(access.cycle);
        }
        0xFF
    }

    fn io_write(&mut self, offset: u8, _value: u8, access: &BusAccess) {
        if offset == SPKR_OFFSET && !access.suppresses_side_effects() {
            self.toggle(access.cycle);
        }
    }
}

impl SoftSwitchDevice for Speaker {
    fn name(&self) -> &'static str {
        "speaker"
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Motherboard
    }

    fn reset(&mut self) {
        self.polarity = false;
        self.toggles.clear();
    }

    fn get_soft_switch_states(&self) -> Vec<SoftSwitchState> {
        vec![SoftSwitchState {
            name: "SPKR",
            address: 0xC030,
            is_on: self.polarity,
            description: "speaker relay polarity, toggles on any access",
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(cycle: u64) -> BusAccess {
        BusAccess::cpu(0xC030, apple2_bus::Intent::DataRead, 0, Cycle::new(cycle))
    }

    #[test]
    fn read_toggles_polarity_and_records_edge() {
        let mut spkr = Speaker::new();
        spkr.io_read(SPKR_OFFSET, &access(100));
        assert!(spkr.polarity());
        spkr.io_read(SPKR_OFFSET, &access(200));
        assert!(!spkr.polarity());

        let edges = spkr.drain_toggles();
        assert_eq!(edges, vec![Cycle::new(100), Cycle::new(200)]);
    }

    #[test]
    fn debug_peek_does_not_toggle() {
        let mut spkr = Speaker::new();
        let peek = BusAccess::debug_peek(0xC030, Cycle::ZERO);
        spkr.io_read(SPKR_OFFSET, &peek);
        assert!(!spkr.polarity());
        assert!(spkr.drain_toggles().is_empty());
    }

    #[test]
    fn drain_empties_the_queue() {
        let mut spkr = Speaker::new();
        spkr.io_read(SPKR_OFFSET, &access(1));
        assert_eq!(spkr.drain_toggles().len(), 1);
        assert!(spkr.drain_toggles().is_empty());
    }
}
