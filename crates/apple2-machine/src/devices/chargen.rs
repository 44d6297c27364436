//! Character generator: 4 KiB of ROM glyph data (two 2 KiB sets, normal and
//! alternate) plus 4 KiB of glyph RAM an 80-column-class card can overlay on
//! top of either set. `get_character_scanline_with_effects` is the only
//! thing a renderer actually needs; everything else here is the soft-switch
//! plumbing that decides which byte that call returns.
//!
//! ALTCHAR changes are latched immediately but only take visible effect at
//! the next VBL (`on_vblank`), the same tearing-avoidance discipline real
//! firmware relies on: a renderer mid-frame should never see the character
//! set change out from under it.

use apple2_bus::{BusAccess, IoHandler};

use crate::devices::{DeviceKind, SoftSwitchDevice, SoftSwitchState};

const ROM_SIZE: usize = 4096;
const GLYPH_RAM_SIZE: usize = 4096;
const BYTES_PER_GLYPH: usize = 8;

const ALTCHAR_OFF: u8 = 0x0E;
const ALTCHAR_ON: u8 = 0x0F;

const RD_ALTGLYPH1: u8 = 0x24;
const RD_ALTGLYPH2: u8 = 0x25;
const RD_NOFLASH1: u8 = 0x26;
const RD_NOFLASH2: u8 = 0x27;
const RD_GLYPHRD: u8 = 0x28;
const RD_GLYPHWRT: u8 = 0x29;

const ALTGLYPH1_OFF: u8 = 0x42;
const ALTGLYPH1_ON: u8 = 0x43;
const ALTGLYPH2_OFF: u8 = 0x44;
const ALTGLYPH2_ON: u8 = 0x45;
const NOFLASH1_OFF: u8 = 0x46;
const NOFLASH1_ON: u8 = 0x47;
const NOFLASH2_OFF: u8 = 0x48;
const NOFLASH2_ON: u8 = 0x49;
const GLYPHRD_OFF: u8 = 0x4A;
const GLYPHRD_ON: u8 = 0x4B;
const GLYPHWRT_OFF: u8 = 0x4C;
const GLYPHWRT_ON: u8 = 0x4D;

/// Character ROM + glyph RAM + the switches that pick between them.
pub struct CharacterGenerator {
    rom: Vec<u8>,
    glyph_ram: Vec<u8>,
    altchar_latched: bool,
    altchar_effective: bool,
    altglyph1: bool,
    altglyph2: bool,
    noflash1: bool,
    noflash2: bool,
    glyph_rd: bool,
    glyph_wrt: bool,
}

impl CharacterGenerator {
    /// Build with a blank (all-zero) ROM. Real firmware loads an actual
    /// 4 KiB dump via [`CharacterGenerator::load_rom`] before use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rom: vec![0; ROM_SIZE],
            glyph_ram: vec![0; GLYPH_RAM_SIZE],
            altchar_latched: false,
            altchar_effective: false,
            altglyph1: false,
            altglyph2: false,
            noflash1: false,
            noflash2: false,
            glyph_rd: false,
            glyph_wrt: false,
        }
    }

    /// Replace the character ROM image. Must be exactly [`ROM_SIZE`] bytes
    /// (two 2 KiB sets back to back); anything else is a configuration
    /// mistake the caller should catch before wiring the machine up.
    pub fn load_rom(&mut self, bytes: &[u8]) -> Result<(), CharRomError> {
        if bytes.len() != ROM_SIZE {
            return Err(CharRomError::WrongSize {
                expected: ROM_SIZE,
                actual: bytes.len(),
            });
        }
        self.rom.copy_from_slice(bytes);
        Ok(())
    }

    /// Called once per VBL so `ALTCHAR` writes mid-frame don't tear the
    /// character set a renderer is part-way through drawing.
    pub fn on_vblank(&mut self) -> bool {
        let changed = self.altchar_effective != self.altchar_latched;
        self.altchar_effective = self.altchar_latched;
        changed
    }

    /// Scanline `scanline` (0..8) of glyph `code`, with flash and glyph-RAM
    /// overlay effects applied. `flash_state` is the renderer's current
    /// flash-phase bit (typically toggled a few times a second).
    #[must_use]
    pub fn get_character_scanline_with_effects(
        &self,
        code: u8,
        scanline: u8,
        flash_state: bool,
    ) -> u8 {
        debug_assert!(scanline < 8, "scanline out of range");
        let use_alt = self.altchar_effective;
        let altglyph_on = if use_alt { self.altglyph2 } else { self.altglyph1 };
        let noflash_on = if use_alt { self.noflash2 } else { self.noflash1 };

        let byte = if altglyph_on {
            let base = usize::from(code) * BYTES_PER_GLYPH;
            self.glyph_ram[base + usize::from(scanline)]
        } else {
            let set_base = if use_alt { 2048 } else { 0 };
            let base = set_base + usize::from(code) * BYTES_PER_GLYPH;
            self.rom[base + usize::from(scanline)]
        };

        let is_flash_range = (0x40..0x80).contains(&code);
        if is_flash_range && !noflash_on && flash_state {
            byte ^ 0x7F
        } else {
            byte
        }
    }

    fn apply_toggle(&mut self, offset: u8) {
        match offset {
            ALTCHAR_OFF => self.altchar_latched = false,
            ALTCHAR_ON => self.altchar_latched = true,
            ALTGLYPH1_OFF => self.altglyph1 = false,
            ALTGLYPH1_ON => self.altglyph1 = true,
            ALTGLYPH2_OFF => self.altglyph2 = false,
            ALTGLYPH2_ON => self.altglyph2 = true,
            NOFLASH1_OFF => self.noflash1 = false,
            NOFLASH1_ON => self.noflash1 = true,
            NOFLASH2_OFF => self.noflash2 = false,
            NOFLASH2_ON => self.noflash2 = true,
            GLYPHRD_OFF => self.glyph_rd = false,
            GLYPHRD_ON => self.glyph_rd = true,
            GLYPHWRT_OFF => self.glyph_wrt = false,
            GLYPHWRT_ON => self.glyph_wrt = true,
            _ => {}
        }
    }

    fn status_bit(&self, canonical_offset: u8) -> u8 {
        let on = match canonical_offset {
            RD_ALTGLYPH1 => self.altglyph1,
            RD_ALTGLYPH2 => self.altglyph2,
            RD_NOFLASH1 => self.noflash1,
            RD_NOFLASH2 => self.noflash2,
            RD_GLYPHRD => self.glyph_rd,
            RD_GLYPHWRT => self.glyph_wrt,
            _ => false,
        };
        if on {
            0x80
        } else {
            0
        }
    }

    /// Whether the CPU should currently see glyph RAM mapped into its own
    /// address space, for the machine's page-map wiring.
    #[must_use]
    pub const fn glyph_ram_readable(&self) -> bool {
        self.glyph_rd
    }

    #[must_use]
    pub const fn glyph_ram_writable(&self) -> bool {
        self.glyph_wrt
    }
}

impl Default for CharacterGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Why loading a character ROM image failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharRomError {
    WrongSize { expected: usize, actual: usize },
}

impl std::fmt::Display for CharRomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongSize { expected, actual } => {
                write!(f, "character ROM must be {expected} bytes, got {actual}")
            }
        }
    }
}

impl std::error::Error for CharRomError {}

impl IoHandler for CharacterGenerator {
    fn io_read(&mut self, offset: u8, access: &BusAccess) -> u8 {
        let side_effects = !access.suppresses_side_effects();
        match offset {
            ALTCHAR_OFF | ALTCHAR_ON | ALTGLYPH1_OFF | ALTGLYPH1_ON | ALTGLYPH2_OFF
            | ALTGLYPH2_ON | NOFLASH1_OFF | NOFLASH1_ON | NOFLASH2_OFF | NOFLASH2_ON
            | GLYPHRD_OFF | GLYPHRD_ON | GLYPHWRT_OFF | GLYPHWRT_ON => {
                if side_effects {
                    self.apply_toggle(offset);
                }
                0xFF
            }
            RD_ALTGLYPH1..=RD_GLYPHWRT => self.status_bit(offset),
            // The second, aliased status range named in the catalog; same
            // bits, offset by 0x10 (see DESIGN.md for the ambiguity this
            // resolves).
            0x34..=0x39 => self.status_bit(offset - 0x10),
            _ => 0xFF,
        }
    }

    fn io_write(&mut self, offset: u8, _value: u8, access: &BusAccess) {
        if !access.suppresses_side_effects() {
            self.apply_toggle(offset);
        }
    }
}

impl SoftSwitchDevice for CharacterGenerator {
    fn name(&self) -> &'static str {
        "character-generator"
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Motherboard
    }

    fn reset(&mut self) {
        self.altchar_latched = false;
        self.altchar_effective = false;
        self.altglyph1 = false;
        self.altglyph2 = false;
        self.noflash1 = false;
        self.noflash2 = false;
        self.glyph_rd = false;
        self.glyph_wrt = false;
    }

    fn get_soft_switch_states(&self) -> Vec<SoftSwitchState> {
        vec![
            SoftSwitchState {
                name: "ALTCHAR",
                address: 0xC00F,
                is_on: self.altchar_effective,
                description: "alternate character set (effective as of last VBL)",
            },
            SoftSwitchState {
                name: "GLYPHRD",
                address: 0xC04B,
                is_on: self.glyph_rd,
                description: "glyph RAM visible for CPU reads",
            },
            SoftSwitchState {
                name: "GLYPHWRT",
                address: 0xC04D,
                is_on: self.glyph_wrt,
                description: "glyph RAM visible for CPU writes",
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use emu_core::Cycle;

    use super::*;

    fn write(gen: &mut CharacterGenerator, offset: u8) {
        let access = BusAccess::cpu(0xC000 + u32::from(offset), apple2_bus::Intent::DataWrite, 0, Cycle::ZERO);
        gen.io_write(offset, 0, &access);
    }

    fn rom_with_pattern() -> Vec<u8> {
        let mut rom = vec![0u8; ROM_SIZE];
        // Glyph 0x41 ('A'), scanline 2, in the primary set: a recognizable byte.
        rom[usize::from(0x41u8) * 8 + 2] = 0x77;
        // Same glyph in the alternate set (offset 2048).
        rom[2048 + usize::from(0x41u8) * 8 + 2] = 0x55;
        rom
    }

    #[test]
    fn altchar_selects_rom_set_only_after_vblank() {
        let mut gen = CharacterGenerator::new();
        gen.load_rom(&rom_with_pattern()).unwrap();

        write(&mut gen, ALTCHAR_ON);
        assert_eq!(
            gen.get_character_scanline_with_effects(0x41, 2, false),
            0x77,
            "ALTCHAR not yet effective mid-frame"
        );

        gen.on_vblank();
        assert_eq!(gen.get_character_scanline_with_effects(0x41, 2, false), 0x55);
    }

    #[test]
    fn flash_range_inverts_low_seven_bits_when_flash_is_on() {
        let mut gen = CharacterGenerator::new();
        let mut rom = vec![0u8; ROM_SIZE];
        rom[usize::from(0x41u8) * 8] = 0b0000_1111;
        gen.load_rom(&rom).unwrap();

        assert_eq!(
            gen.get_character_scanline_with_effects(0x41, 0, true),
            0b0000_1111 ^ 0x7F
        );
        assert_eq!(
            gen.get_character_scanline_with_effects(0x41, 0, false),
            0b0000_1111,
            "flash bit off: unmodified"
        );
    }

    #[test]
    fn noflash_suppresses_inversion() {
        let mut gen = CharacterGenerator::new();
        let mut rom = vec![0u8; ROM_SIZE];
        rom[usize::from(0x41u8) * 8] = 0b0000_1111;
        gen.load_rom(&rom).unwrap();
        write(&mut gen, NOFLASH1_ON);

        assert_eq!(
            gen.get_character_scanline_with_effects(0x41, 0, true),
            0b0000_1111
        );
    }

    #[test]
    fn altglyph_overlays_ram_instead_of_rom() {
        let mut gen = CharacterGenerator::new();
        gen.glyph_ram[usize::from(0x41u8) * 8 + 3] = 0x99;
        write(&mut gen, ALTGLYPH1_ON);

        assert_eq!(gen.get_character_scanline_with_effects(0x41, 3, false), 0x99);
    }

    #[test]
    fn wrong_size_rom_is_rejected() {
        let mut gen = CharacterGenerator::new();
        assert!(gen.load_rom(&[0; 100]).is_err());
    }
}
