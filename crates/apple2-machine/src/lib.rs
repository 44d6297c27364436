//! Apple II-class machine wiring: scheduler, layered memory bus, signal
//! bus, 65C02 core, and the built-in soft-switch device set assembled per
//! the canonical address map, plus [`MachineIoPort`] — the bridge that lets
//! `basic-interp`'s tree-walking executor drive a real machine through
//! nothing but its [`basic_interp::IoPort`] abstraction.
//!
//! The CPU/bus/scheduler core and the BASIC interpreter are parallel
//! workloads: the interpreter never reaches past `IoPort` except for
//! `PEEK`/`POKE`/`CALL`, which this bridge turns into genuine bus accesses
//! and — for `CALL` — a bounded run of the CPU core itself.

pub mod devices;
mod io_page;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;

use apple2_bus::{BusAccess, Intent, IoPageDispatcher, Memory, MemoryBus, Perms};
use basic_interp::{DisplayMode, IoPort, TextStyle};
use devices::aux_memory::AuxMemoryController;
use devices::chargen::CharacterGenerator;
use devices::keyboard::Keyboard;
use devices::language_card::LanguageCard;
use devices::speaker::Speaker;
use devices::video::VideoTiming;
use devices::SoftSwitchDevice;
use emu_core::Address;
use io_page::IoAndSlotRom;
use mos_65c02::{Cpu65C02, HaltState};
use scheduler::Scheduler;
use signal_bus::SignalBus;

/// `$0000`-`$BFFF`: 48 KiB of main RAM.
pub const MAIN_RAM_SIZE: usize = 0xC000;
/// `$C100`-`$CFFF`: slot ROM space behind the I/O page.
pub const SLOT_ROM_SIZE: usize = 0x0F00;
/// `$D000`-`$FFFF`: system ROM, overlaid by the language card.
pub const SYSTEM_ROM_BASE: Address = 0xD000;
pub const SYSTEM_ROM_SIZE: usize = 0x3000;

const CPU_SOURCE_ID: u32 = 0;

/// Periodic housekeeping the scheduler drives regardless of what the CPU is
/// doing: VBL edges and keyboard-injection pumping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    VblStart,
    VblEnd,
    KeyboardPump,
}

/// An assembled Apple II-class machine.
///
/// Address map: `$0000`-`$BFFF` main RAM, `$C000`-`$C0FF` I/O page (device
/// handlers) sharing its page with slot ROM space at `$C100`-`$CFFF`,
/// `$D000`-`$FFFF` system ROM optionally overlaid by language-card RAM.
pub struct Machine {
    pub scheduler: Scheduler<EventKind>,
    pub bus: MemoryBus,
    pub signals: SignalBus,
    pub cpu: Cpu65C02,

    pub keyboard: Rc<RefCell<Keyboard>>,
    pub video: Rc<RefCell<VideoTiming>>,
    pub speaker: Rc<RefCell<Speaker>>,
    pub chargen: Rc<RefCell<CharacterGenerator>>,
    pub language_card: Rc<RefCell<LanguageCard>>,
    pub aux_memory: Rc<RefCell<AuxMemoryController>>,

    system_rom: Rc<RefCell<Memory>>,

    lc_bank1_layer: usize,
    lc_bank2_layer: usize,
    lc_upper_layer: usize,
}

/// A machine-configuration failure: something the caller handed in doesn't
/// fit the slot it was meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    WrongRomSize { expected: usize, actual: usize },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongRomSize { expected, actual } => {
                write!(f, "system ROM must be {expected} bytes, got {actual}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Machine {
    #[must_use]
    pub fn new() -> Self {
        let mut bus = MemoryBus::new();

        let main_ram = Rc::new(RefCell::new(Memory::new(MAIN_RAM_SIZE)));
        bus.page_map.add_layer(
            "main-ram",
            0x0000,
            MAIN_RAM_SIZE / emu_core::PAGE_SIZE as usize,
            Perms::READ_WRITE_EXEC,
            true,
            main_ram.clone(),
        );

        let keyboard = Rc::new(RefCell::new(Keyboard::new()));
        let video = Rc::new(RefCell::new(VideoTiming::new()));
        let speaker = Rc::new(RefCell::new(Speaker::new()));
        let chargen = Rc::new(RefCell::new(CharacterGenerator::new()));
        let language_card = Rc::new(RefCell::new(LanguageCard::new()));
        let aux_memory = Rc::new(RefCell::new(AuxMemoryController::new(main_ram)));

        // The composite auxiliary-memory window shadows the whole
        // $0000-$BFFF range: it routes every access to main or aux RAM per
        // the 80STORE/RAMRD/RAMWRT/ALTZP switches and otherwise behaves
        // exactly like the plain main-RAM layer underneath it, so pushing
        // it on top (rather than replacing that layer) is transparent when
        // every switch is off.
        bus.page_map.add_layer(
            "aux-memory-window",
            0x0000,
            MAIN_RAM_SIZE / emu_core::PAGE_SIZE as usize,
            Perms::READ_WRITE_EXEC,
            true,
            Rc::new(RefCell::new(aux_memory.borrow().window(0x0000))),
        );

        let mut io = IoPageDispatcher::new();
        // $C000 read is KBD data; $C000 write is 80STORE off — two
        // different devices sharing one offset, split by direction.
        io.register_read(0x00, keyboard.clone());
        io.register_write(0x00, aux_memory.clone());
        io.register(0x10, keyboard.clone());
        for offset in 0x01..=0x0D {
            io.register(offset, aux_memory.clone());
        }
        io.register_range(0x13..=0x18, aux_memory.clone());
        io.register_range(0x0E..=0x0F, chargen.clone());
        io.register_range(0x24..=0x29, chargen.clone());
        io.register_range(0x42..=0x4D, chargen.clone());
        io.register(0x30, speaker.clone());
        io.register_range(0x50..=0x5F, video.clone());
        io.register_range(0x19..=0x1F, video.clone());
        io.register_range(0x80..=0x8F, language_card.clone());

        let io_page = IoAndSlotRom::new(io, SLOT_ROM_SIZE);
        bus.page_map.add_layer(
            "io-and-slot-rom",
            0xC000,
            1,
            Perms::READ_WRITE_EXEC,
            true,
            Rc::new(RefCell::new(io_page)),
        );

        let system_rom = Rc::new(RefCell::new(Memory::from_bytes(vec![0xEA; SYSTEM_ROM_SIZE])));
        bus.page_map.add_layer(
            "system-rom",
            SYSTEM_ROM_BASE,
            SYSTEM_ROM_SIZE / emu_core::PAGE_SIZE as usize,
            Perms::READ_EXEC,
            true,
            system_rom.clone(),
        );

        let (bank1, bank2, upper) = language_card.borrow().banks();
        let lc_bank1_layer =
            bus.page_map
                .add_layer("lc-bank1", 0xD000, 1, Perms::READ_WRITE_EXEC, false, bank1);
        let lc_bank2_layer =
            bus.page_map
                .add_layer("lc-bank2", 0xD000, 1, Perms::READ_WRITE_EXEC, false, bank2);
        let lc_upper_layer =
            bus.page_map
                .add_layer("lc-upper", 0xE000, 2, Perms::READ_WRITE_EXEC, false, upper);

        Self {
            scheduler: Scheduler::new(),
            bus,
            signals: SignalBus::new(),
            cpu: Cpu65C02::new(CPU_SOURCE_ID),
            keyboard,
            video,
            speaker,
            chargen,
            language_card,
            aux_memory,
            system_rom,
            lc_bank1_layer,
            lc_bank2_layer,
            lc_upper_layer,
        }
    }

    /// Replaces the blank (`$EA`-filled) system ROM image with a real boot
    /// ROM dump, `SYSTEM_ROM_SIZE` bytes covering `$D000`-`$FFFF`. Loading a
    /// real image is what gives the reset vector a real entry point instead
    /// of looping on `$EAEA`.
    pub fn load_system_rom(&mut self, bytes: &[u8]) -> Result<(), ConfigError> {
        if bytes.len() != SYSTEM_ROM_SIZE {
            return Err(ConfigError::WrongRomSize {
                expected: SYSTEM_ROM_SIZE,
                actual: bytes.len(),
            });
        }
        self.system_rom.borrow_mut().as_mut_slice().copy_from_slice(bytes);
        Ok(())
    }

    /// Power-on reset: every device, the CPU, and the scheduler return to
    /// their initial state.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.signals.reset();
        self.keyboard.borrow_mut().reset();
        self.video.borrow_mut().reset();
        self.speaker.borrow_mut().reset();
        self.chargen.borrow_mut().reset();
        self.language_card.borrow_mut().reset();
        self.aux_memory.borrow_mut().reset();
        self.sync_language_card_layers();
        self.cpu.reset(&self.bus);
        self.schedule_vbl_edges();
        self.schedule_keyboard_pump();
    }

    fn schedule_vbl_edges(&mut self) {
        let vbl = self.video.borrow();
        self.scheduler
            .schedule_after(vbl.frame_cycles() - vbl.vbl_cycles(), 0, EventKind::VblStart);
    }

    fn schedule_keyboard_pump(&mut self) {
        self.scheduler.schedule_after(1000, 0, EventKind::KeyboardPump);
    }

    fn sync_language_card_layers(&mut self) {
        let state = self.language_card.borrow().state();
        self.bus
            .page_map
            .set_active(self.lc_bank1_layer, state.read_ram && state.bank1_selected);
        self.bus
            .page_map
            .set_active(self.lc_bank2_layer, state.read_ram && !state.bank1_selected);
        self.bus.page_map.set_active(self.lc_upper_layer, state.read_ram);
    }

    fn dispatch_event(&mut self, kind: EventKind) {
        match kind {
            EventKind::VblStart => {
                self.video.borrow_mut().on_vbl_start();
                self.chargen.borrow_mut().on_vblank();
                let vbl = self.video.borrow();
                self.scheduler
                    .schedule_after(vbl.vbl_cycles(), 0, EventKind::VblEnd);
            }
            EventKind::VblEnd => {
                self.video.borrow_mut().on_vbl_end();
                let vbl = self.video.borrow();
                self.scheduler
                    .schedule_after(vbl.frame_cycles() - vbl.vbl_cycles(), 0, EventKind::VblStart);
            }
            EventKind::KeyboardPump => {
                let _ = self.keyboard.borrow_mut().pump();
                self.schedule_keyboard_pump();
            }
        }
    }

    /// Run exactly one CPU instruction (or one WAI/STP tick), advancing the
    /// scheduler by however many cycles it took and firing any due events
    /// along the way. Returns the cycle count consumed.
    pub fn step(&mut self) -> u64 {
        let now = self.scheduler.now();
        let cycles = self.cpu.step(&self.bus, &mut self.signals, now);
        let aux_col80 = self.aux_memory.borrow().col80();
        let (page2, hires) = {
            let v = self.video.borrow();
            (v.page2(), v.hires())
        };
        self.aux_memory.borrow_mut().sync_video_latches(page2, hires);
        self.video.borrow_mut().set_col80(aux_col80);
        self.sync_language_card_layers();

        let mut pending = Vec::new();
        self.scheduler.advance(cycles, |_, cycle, kind| pending.push((cycle, kind)));
        for (_, kind) in pending {
            self.dispatch_event(kind);
        }
        cycles
    }

    /// Run until at least `cycles` have elapsed.
    pub fn run_cycles(&mut self, cycles: u64) {
        let target = self.scheduler.now().get() + cycles;
        while self.scheduler.now().get() < target {
            if matches!(self.cpu.halt, HaltState::Stopped) {
                break;
            }
            self.step();
        }
    }

    /// A genuine bus read (side effects included) for BASIC's `PEEK`.
    /// Unmapped/permission faults surface to the interpreter as `0xFF`, per
    /// the documented floating-bus convention.
    pub fn read_byte(&mut self, address: u16) -> u8 {
        let access = BusAccess::cpu(u32::from(address), Intent::DataRead, CPU_SOURCE_ID, self.scheduler.now());
        let value = self.bus.try_read8(&access).unwrap_or(0xFF);
        self.sync_language_card_layers();
        value
    }

    /// A genuine bus write for BASIC's `POKE`. A fault is silently dropped.
    pub fn write_byte(&mut self, address: u16, value: u8) {
        let mut access = BusAccess::cpu(u32::from(address), Intent::DataWrite, CPU_SOURCE_ID, self.scheduler.now());
        access.value = value;
        let _ = self.bus.try_write8(&access);
        self.sync_language_card_layers();
    }

    /// `CALL address`: push a sentinel return address onto the CPU stack,
    /// jump, and run until `RTS` pops it back off (or a cycle budget runs
    /// out, in which case the CPU is left halted and the call reports
    /// failure — the same as a `CALL` into an unmapped region).
    pub fn call(&mut self, address: u16) -> bool {
        const SENTINEL: u16 = 0xFFFF;
        const BUDGET: u64 = 20_000_000;

        let ret = SENTINEL.wrapping_sub(1);
        let hi_addr = self.cpu.regs.push_addr();
        self.write_byte(hi_addr as u16, (ret >> 8) as u8);
        let lo_addr = self.cpu.regs.push_addr();
        self.write_byte(lo_addr as u16, (ret & 0xFF) as u8);
        self.cpu.regs.pc = address;

        let mut spent = 0u64;
        while self.cpu.pc() != SENTINEL && spent < BUDGET {
            if matches!(self.cpu.halt, HaltState::Stopped) {
                return false;
            }
            spent += self.step();
        }
        self.cpu.pc() == SENTINEL
    }
}

impl Default for Machine {
    fn default() -> Self {
        let mut machine = Self::new();
        machine.reset();
        machine
    }
}

/// Bridges `basic-interp`'s [`IoPort`] to a real [`Machine`]: `PEEK`/`POKE`
/// reach the bus, `CALL` runs the CPU core, and everything else (text
/// output, `INPUT`/`GET`) goes to the host terminal since pixel rendering
/// is out of scope and the port's job is only to make the interpreter's
/// observable behavior correct, not to paint a screen.
pub struct MachineIoPort<'m> {
    pub machine: &'m mut Machine,
    pending_chars: VecDeque<char>,
}

impl<'m> MachineIoPort<'m> {
    #[must_use]
    pub fn new(machine: &'m mut Machine) -> Self {
        Self {
            machine,
            pending_chars: VecDeque::new(),
        }
    }
}

impl IoPort for MachineIoPort<'_> {
    fn print(&mut self, text: &str) {
        print!("{text}");
        let _ = io::stdout().flush();
    }

    fn input_line(&mut self, prompt: Option<&str>) -> Option<String> {
        if let Some(p) = prompt {
            self.print(p);
        }
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Some(line)
            }
            Err(_) => None,
        }
    }

    fn get_char(&mut self) -> Option<char> {
        if self.pending_chars.is_empty() {
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => self.pending_chars.extend(line.chars()),
                Err(_) => return None,
            }
        }
        self.pending_chars.pop_front()
    }

    fn peek(&mut self, address: u16) -> u8 {
        self.machine.read_byte(address)
    }

    fn poke(&mut self, address: u16, value: u8) {
        self.machine.write_byte(address, value);
    }

    fn call(&mut self, address: u16) {
        self.machine.call(address);
    }

    fn home(&mut self) {
        self.machine.video.borrow_mut().reset();
    }

    fn set_display_mode(&mut self, _mode: DisplayMode) {}

    fn set_text_style(&mut self, _style: TextStyle) {}

    fn sleep_ticks(&mut self, ticks: u64) {
        let cycles_per_tick = devices::video::DEFAULT_FRAME_CYCLES;
        self.machine.run_cycles(ticks.saturating_mul(cycles_per_tick));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_machine_boots_from_blank_system_rom_vector() {
        // Boot-ROM content is out of scope; the blank system ROM reads
        // back as $EA everywhere, so a fresh machine's reset vector is
        // $EAEA until a real ROM image is loaded.
        let mut machine = Machine::new();
        machine.reset();
        assert_eq!(machine.cpu.pc(), 0xEAEA);
    }

    #[test]
    fn poke_then_peek_round_trips_through_main_ram() {
        let mut machine = Machine::new();
        machine.write_byte(0x1000, 0x42);
        assert_eq!(machine.read_byte(0x1000), 0x42);
    }

    #[test]
    fn load_system_rom_rejects_wrong_size() {
        let mut machine = Machine::new();
        let err = machine.load_system_rom(&[0; 4]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::WrongRomSize {
                expected: SYSTEM_ROM_SIZE,
                actual: 4
            }
        );
    }

    #[test]
    fn load_system_rom_changes_the_reset_vector() {
        let mut machine = Machine::new();
        let mut rom = vec![0xEA; SYSTEM_ROM_SIZE];
        // Reset vector $FFFC/$FFFD, offset from the ROM's own base ($D000).
        rom[0x2FFC] = 0x00;
        rom[0x2FFD] = 0x12;
        machine.load_system_rom(&rom).unwrap();
        machine.reset();
        assert_eq!(machine.cpu.pc(), 0x1200);
    }

    #[test]
    fn aux_memory_window_is_transparent_when_every_switch_is_off() {
        let mut machine = Machine::new();
        machine.write_byte(0x0050, 0x77);
        assert_eq!(machine.read_byte(0x0050), 0x77);
    }

    #[test]
    fn kbd_and_store80_share_offset_zero_by_direction() {
        let mut machine = Machine::new();
        machine.keyboard.borrow_mut().key_down(b'A');
        let value = machine.read_byte(0xC000);
        assert_eq!(value & 0x7F, b'A');
        assert_eq!(value & 0x80, 0x80);
    }

    #[test]
    fn language_card_ram_shadows_system_rom_once_armed() {
        let mut machine = Machine::new();
        machine.reset();
        machine.read_byte(0xC083);
        machine.write_byte(0xD000, 0x99);
        assert_eq!(machine.read_byte(0xD000), 0x99);
    }

    #[test]
    fn disabling_language_card_falls_back_to_system_rom() {
        let mut machine = Machine::new();
        let mut rom = vec![0xEA; SYSTEM_ROM_SIZE];
        rom[0] = 0x55; // $D000 in the system ROM image
        machine.load_system_rom(&rom).unwrap();
        machine.reset();

        machine.read_byte(0xC083); // arm language card RAM, read-enabled
        machine.write_byte(0xD000, 0xAA);
        assert_eq!(machine.read_byte(0xD000), 0xAA);

        machine.read_byte(0xC080); // switch back to ROM, RAM disabled
        assert_eq!(
            machine.read_byte(0xD000),
            0x55,
            "disabled LC layer must fall through to the base ROM, not leak the RAM write"
        );
    }
}
