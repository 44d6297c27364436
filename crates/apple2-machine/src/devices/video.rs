//! Video timing and display-mode soft switches.
//!
//! Owns no pixels — rendering is a pure function of memory plus mode and
//! lives entirely outside this crate's scope — only the timing (VBL edges)
//! and the mode latches ($C050-$C057, $C058-$C05F, status at $C019-$C01D)
//! that a renderer or the BASIC interpreter's HOME/TEXT/GR family reads.

use apple2_bus::{BusAccess, IoHandler};

use crate::devices::{DeviceKind, SoftSwitchDevice, SoftSwitchState};

/// NTSC-ish frame timing: 17,030 cycles per frame, 4,550 of which are VBL.
pub const DEFAULT_FRAME_CYCLES: u64 = 17_030;
pub const DEFAULT_VBL_CYCLES: u64 = 4_550;

const TXTCLR: u8 = 0x50;
const TXTSET: u8 = 0x51;
const MIXCLR: u8 = 0x52;
const MIXSET: u8 = 0x53;
const PAGE2CLR: u8 = 0x54;
const PAGE2SET: u8 = 0x55;
const HIRESCLR: u8 = 0x56;
const HIRESSET: u8 = 0x57;
const AN0_OFF: u8 = 0x58;
const AN0_ON: u8 = 0x59;
const AN1_OFF: u8 = 0x5A;
const AN1_ON: u8 = 0x5B;
const AN2_OFF: u8 = 0x5C;
const AN2_ON: u8 = 0x5D;
const AN3_OFF: u8 = 0x5E;
const AN3_ON: u8 = 0x5F;

const RDVBL: u8 = 0x19;
const RDTEXT: u8 = 0x1A;
const RDMIXED: u8 = 0x1B;
const RDPAGE2: u8 = 0x1C;
const RDHIRES: u8 = 0x1D;
const RD80COL: u8 = 0x1F;

/// The derived display mode, per the tie-break order text > hires > dhires >
/// mixed > 80col named in the mode-soft-switch description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    Text40,
    Text80,
    LoRes,
    LoResMixed,
    DoubleLoRes,
    DoubleLoResMixed,
    HiRes,
    HiResMixed,
    DoubleHiRes,
    DoubleHiResMixed,
}

/// Video timing and mode-switch state.
pub struct VideoTiming {
    frame_cycles: u64,
    vbl_cycles: u64,
    vertical_blanking: bool,
    vblank_occurred: bool,
    mode_changed: bool,
    text: bool,
    mixed: bool,
    page2: bool,
    hires: bool,
    col80: bool,
    dhires: bool,
    annunciators: [bool; 4],
}

impl VideoTiming {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame_cycles: DEFAULT_FRAME_CYCLES,
            vbl_cycles: DEFAULT_VBL_CYCLES,
            vertical_blanking: false,
            vblank_occurred: false,
            mode_changed: false,
            text: true,
            mixed: false,
            page2: false,
            hires: false,
            col80: false,
            dhires: false,
            annunciators: [false; 4],
        }
    }

    #[must_use]
    pub const fn frame_cycles(&self) -> u64 {
        self.frame_cycles
    }

    #[must_use]
    pub const fn vbl_cycles(&self) -> u64 {
        self.vbl_cycles
    }

    /// Called by the machine's VBL-start scheduled event.
    pub fn on_vbl_start(&mut self) {
        self.vertical_blanking = true;
        self.vblank_occurred = true;
    }

    /// Called by the machine's VBL-end scheduled event.
    pub fn on_vbl_end(&mut self) {
        self.vertical_blanking = false;
    }

    /// The renderer (or any host polling loop) drains this flag once per
    /// frame rather than the device pushing a callback.
    pub fn take_vblank_occurred(&mut self) -> bool {
        std::mem::take(&mut self.vblank_occurred)
    }

    pub fn take_mode_changed(&mut self) -> bool {
        std::mem::take(&mut self.mode_changed)
    }

    #[must_use]
    pub fn current_mode(&self) -> VideoMode {
        if self.text {
            return if self.col80 { VideoMode::Text80 } else { VideoMode::Text40 };
        }
        if self.hires {
            return match (self.dhires, self.mixed) {
                (true, true) => VideoMode::DoubleHiResMixed,
                (true, false) => VideoMode::DoubleHiRes,
                (false, true) => VideoMode::HiResMixed,
                (false, false) => VideoMode::HiRes,
            };
        }
        match (self.dhires, self.mixed) {
            (true, true) => VideoMode::DoubleLoResMixed,
            (true, false) => VideoMode::DoubleLoRes,
            (false, true) => VideoMode::LoResMixed,
            (false, false) => VideoMode::LoRes,
        }
    }
}

impl Default for VideoTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl IoHandler for VideoTiming {
    fn io_read(&mut self, offset: u8, access: &BusAccess) -> u8 {
        let side_effects = !access.suppresses_side_effects();
        match offset {
            RDVBL => {
                if !self.vertical_blanking {
                    0x80
                } else {
                    0
                }
            }
            RDTEXT => bit7(self.text),
            RDMIXED => bit7(self.mixed),
            RDPAGE2 => bit7(self.page2),
            RDHIRES => bit7(self.hires),
            RD80COL => bit7(self.col80),
            TXTCLR | TXTSET | MIXCLR | MIXSET | PAGE2CLR | PAGE2SET | HIRESCLR | HIRESSET
            | AN0_OFF | AN0_ON | AN1_OFF | AN1_ON | AN2_OFF | AN2_ON | AN3_OFF | AN3_ON => {
                if side_effects {
                    self.apply_toggle(offset);
                }
                0xFF
            }
            _ => 0xFF,
        }
    }

    fn io_write(&mut self, offset: u8, _value: u8, access: &BusAccess) {
        if !access.suppresses_side_effects() {
            self.apply_toggle(offset);
        }
    }
}

fn bit7(set: bool) -> u8 {
    if set {
        0x80
    } else {
        0
    }
}

impl VideoTiming {
    fn apply_toggle(&mut self, offset: u8) {
        match offset {
            TXTCLR => self.text = false,
            TXTSET => self.text = true,
            MIXCLR => self.mixed = false,
            MIXSET => self.mixed = true,
            PAGE2CLR => self.page2 = false,
            PAGE2SET => self.page2 = true,
            HIRESCLR => self.hires = false,
            HIRESSET => self.hires = true,
            AN0_OFF => self.annunciators[0] = false,
            AN0_ON => self.annunciators[0] = true,
            AN1_OFF => self.annunciators[1] = false,
            AN1_ON => self.annunciators[1] = true,
            AN2_OFF => self.annunciators[2] = false,
            AN2_ON => self.annunciators[2] = true,
            AN3_OFF => self.annunciators[3] = false,
            AN3_ON => self.annunciators[3] = true,
            _ => return,
        }
        self.mode_changed = true;
    }

    /// Set by the auxiliary-memory controller's 80COL switch, since 80-column
    /// mode is owned there but affects this device's reported mode.
    pub fn set_col80(&mut self, on: bool) {
        self.col80 = on;
        self.mode_changed = true;
    }

    pub fn set_dhires(&mut self, on: bool) {
        self.dhires = on;
        self.mode_changed = true;
    }

    /// Current `PAGE2` latch, for the auxiliary-memory controller's
    /// composite page routing (80STORE mode reuses this switch to pick
    /// main vs. aux for text page 1 and the hi-res pages).
    #[must_use]
    pub const fn page2(&self) -> bool {
        self.page2
    }

    /// Current `HIRES` latch, consulted the same way as [`VideoTiming::page2`].
    #[must_use]
    pub const fn hires(&self) -> bool {
        self.hires
    }
}

impl SoftSwitchDevice for VideoTiming {
    fn name(&self) -> &'static str {
        "video-timing"
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Motherboard
    }

    fn reset(&mut self) {
        self.vertical_blanking = false;
        self.vblank_occurred = false;
        self.mode_changed = false;
        self.text = true;
        self.mixed = false;
        self.page2 = false;
        self.hires = false;
        self.annunciators = [false; 4];
    }

    fn get_soft_switch_states(&self) -> Vec<SoftSwitchState> {
        vec![
            SoftSwitchState {
                name: "TEXT",
                address: 0xC050,
                is_on: self.text,
                description: "text mode",
            },
            SoftSwitchState {
                name: "MIXED",
                address: 0xC052,
                is_on: self.mixed,
                description: "4-line text window in graphics modes",
            },
            SoftSwitchState {
                name: "PAGE2",
                address: 0xC054,
                is_on: self.page2,
                description: "display page 2",
            },
            SoftSwitchState {
                name: "HIRES",
                address: 0xC056,
                is_on: self.hires,
                description: "high-resolution graphics",
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use emu_core::Cycle;

    use super::*;

    fn write(video: &mut VideoTiming, offset: u8) {
        let access = BusAccess::cpu(0xC000 + u32::from(offset), apple2_bus::Intent::DataWrite, 0, Cycle::ZERO);
        video.io_write(offset, 0, &access);
    }

    #[test]
    fn vbl_inverts_rdvbl() {
        let mut video = VideoTiming::new();
        let peek = BusAccess::debug_peek(0xC019, Cycle::ZERO);
        assert_eq!(video.io_read(RDVBL, &peek), 0x80, "not blanking yet");

        video.on_vbl_start();
        assert_eq!(video.io_read(RDVBL, &peek), 0, "blanking: bit7 clear");

        video.on_vbl_end();
        assert_eq!(video.io_read(RDVBL, &peek), 0x80);
    }

    #[test]
    fn mode_tie_break_prefers_text_over_hires() {
        let mut video = VideoTiming::new();
        write(&mut video, HIRESSET);
        assert_eq!(video.current_mode(), VideoMode::HiRes);
        write(&mut video, TXTSET);
        assert_eq!(video.current_mode(), VideoMode::Text40);
    }

    #[test]
    fn hires_mixed_combination() {
        let mut video = VideoTiming::new();
        write(&mut video, TXTCLR);
        write(&mut video, HIRESSET);
        write(&mut video, MIXSET);
        assert_eq!(video.current_mode(), VideoMode::HiResMixed);
    }
}
