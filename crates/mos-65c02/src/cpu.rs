//! The 65C02 execution core: one whole instruction per [`Cpu65C02::step`]
//! call, with every bus touch along the way folded into a single Transient
//! Cycle Usage count that the caller commits to its scheduler afterwards.
//! There is no per-cycle tick queue here — unlike a chip with independently
//! clocked sub-units, a 6502-family part has nothing useful to observe
//! between bus cycles of the same instruction.

use emu_core::{Cycle, Observable, Value};

use apple2_bus::{BusAccess, Fault, Intent, MemoryBus};
use signal_bus::{SignalBus, SignalLine};

use crate::flags;
use crate::flags::Status;
use crate::opcodes::opcode_info;
use crate::registers::Registers;
use crate::traps::{ReturnMethod, TrapOutcome, TrapRegistry};

const RESET_VECTOR: u16 = 0xFFFC;
const NMI_VECTOR: u16 = 0xFFFA;
const IRQ_VECTOR: u16 = 0xFFFE;

/// Where the CPU is with respect to `WAI`/`STP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltState {
    Running,
    /// Parked by `WAI`, waiting for any asserted interrupt line.
    Waiting,
    /// Parked by `STP`; only a hardware reset gets out of this state.
    Stopped,
}

/// A record of the instruction just executed, kept when tracing is enabled.
#[derive(Debug, Clone, Copy)]
pub struct InstructionTrace {
    pub pc: u16,
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub cycles: u64,
}

/// A cycle-stepped 65C02 core.
pub struct Cpu65C02 {
    pub regs: Registers,
    pub halt: HaltState,
    pub traps: TrapRegistry,
    pub trace_enabled: bool,
    pub last_trace: Option<InstructionTrace>,
    source_id: u32,
    tcu: u64,
    base_cycle: Cycle,
    bus_faults: u64,
}

impl Cpu65C02 {
    #[must_use]
    pub fn new(source_id: u32) -> Self {
        Self {
            regs: Registers::new(),
            halt: HaltState::Running,
            traps: TrapRegistry::new(),
            trace_enabled: false,
            last_trace: None,
            source_id,
            tcu: 0,
            base_cycle: Cycle::ZERO,
            bus_faults: 0,
        }
    }

    /// Load `PC` from the reset vector and put every register and flag back
    /// in its power-on state.
    pub fn reset(&mut self, bus: &MemoryBus) {
        self.regs = Registers::new();
        self.halt = HaltState::Running;
        self.tcu = 0;
        self.base_cycle = Cycle::ZERO;
        let lo = self.peek_boot(bus, u32::from(RESET_VECTOR));
        let hi = self.peek_boot(bus, u32::from(RESET_VECTOR) + 1);
        self.regs.pc = u16::from(lo) | (u16::from(hi) << 8);
    }

    fn peek_boot(&mut self, bus: &MemoryBus, addr: u32) -> u8 {
        match bus.try_read8(&BusAccess::cpu(addr, Intent::DataRead, self.source_id, Cycle::ZERO)) {
            Ok(v) => v,
            Err(_) => {
                self.bus_faults += 1;
                0xFF
            }
        }
    }

    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.regs.pc
    }

    #[must_use]
    pub const fn bus_fault_count(&self) -> u64 {
        self.bus_faults
    }

    /// Execute exactly one instruction (or one tick of interrupt/WAI/STP
    /// bookkeeping) and return the number of cycles it used. `now` is the
    /// scheduler's current cycle, used only to stamp the `cycle` field of
    /// every [`BusAccess`] this step makes so devices see the real time
    /// each byte was touched rather than a single end-of-instruction value.
    pub fn step(&mut self, bus: &MemoryBus, signals: &mut SignalBus, now: Cycle) -> u64 {
        self.tcu = 0;
        self.base_cycle = now;

        if matches!(self.halt, HaltState::Stopped) {
            self.tcu = 1;
            return self.tcu;
        }

        let woke_from_wai = matches!(self.halt, HaltState::Waiting);
        if woke_from_wai {
            if !signals.is_asserted(SignalLine::Irq) && !signals.is_asserted(SignalLine::Nmi) {
                self.tcu = 1;
                return self.tcu;
            }
            self.halt = HaltState::Running;
        }

        let nmi_edge = signals.consume_nmi_edge();
        let irq_level = signals.is_asserted(SignalLine::Irq);

        if nmi_edge {
            self.service_interrupt(bus, NMI_VECTOR);
            return self.tcu;
        }

        if irq_level && !self.regs.p.is_set(flags::I) {
            self.service_interrupt(bus, IRQ_VECTOR);
            return self.tcu;
        }

        // WAI woke on a line the CPU currently has masked (IRQ with I set):
        // resume the instruction stream exactly where it left off, with no
        // vector fetch at all.
        if woke_from_wai && irq_level {
            self.tcu += 1;
            return self.tcu;
        }

        if let Some(outcome) = self.traps.fire(self.regs.pc, &mut self.regs) {
            if outcome.handled {
                self.tcu += outcome.cycles_consumed;
                self.apply_trap_return(bus, outcome);
                return self.tcu;
            }
        }

        let pc_at_fetch = self.regs.pc;
        let opcode = self.fetch_byte(bus);
        self.execute(bus, opcode);

        if self.trace_enabled {
            let info = opcode_info(opcode);
            self.last_trace = Some(InstructionTrace {
                pc: pc_at_fetch,
                opcode,
                mnemonic: info.mnemonic,
                cycles: self.tcu,
            });
        }

        self.tcu
    }

    fn service_interrupt(&mut self, bus: &MemoryBus, vector: u16) {
        self.tcu += 2;
        let pc = self.regs.pc;
        self.push16(bus, pc);
        let mut p = self.regs.p;
        p.set(flags::B, false);
        self.push8(bus, p.bits());
        self.regs.p.set(flags::I, true);
        self.regs.p.set(flags::D, false);
        self.regs.pc = self.read16(bus, vector);
    }

    fn apply_trap_return(&mut self, bus: &MemoryBus, outcome: TrapOutcome) {
        match outcome.return_method {
            ReturnMethod::None => {
                if let Some(addr) = outcome.return_address {
                    self.regs.pc = addr;
                }
            }
            ReturnMethod::Rts => {
                let popped = self.pop16(bus);
                self.regs.pc = outcome.return_address.unwrap_or(popped.wrapping_add(1));
            }
            ReturnMethod::Rti => {
                let p = self.pop8(bus);
                self.regs.p = Status(p | flags::U);
                let popped = self.pop16(bus);
                self.regs.pc = outcome.return_address.unwrap_or(popped);
            }
        }
    }

    // === Bus helpers ===

    fn bus_access(&mut self, addr: u32, intent: Intent, value: u8) -> BusAccess {
        let mut access = BusAccess::cpu(addr, intent, self.source_id, self.base_cycle + self.tcu);
        access.value = value;
        access
    }

    fn read8(&mut self, bus: &MemoryBus, addr: u32) -> u8 {
        let access = self.bus_access(addr, Intent::DataRead, 0);
        self.tcu += 1;
        match bus.try_read8(&access) {
            Ok(v) => v,
            Err(fault) => {
                self.bus_faults += 1;
                if matches!(fault, Fault::Unmapped(_)) {
                    self.halt = HaltState::Stopped;
                }
                0xFF
            }
        }
    }

    fn write8(&mut self, bus: &MemoryBus, addr: u32, value: u8) {
        let access = self.bus_access(addr, Intent::DataWrite, value);
        self.tcu += 1;
        if bus.try_write8(&access).is_err() {
            self.bus_faults += 1;
        }
    }

    fn fetch_byte(&mut self, bus: &MemoryBus) -> u8 {
        let access = self.bus_access(u32::from(self.regs.pc), Intent::InstructionFetch, 0);
        self.tcu += 1;
        let v = bus.try_read8(&access).unwrap_or_else(|fault| {
            self.bus_faults += 1;
            if matches!(fault, Fault::Unmapped(_)) {
                self.halt = HaltState::Stopped;
            }
            0xFF
        });
        self.regs.pc = self.regs.pc.wrapping_add(1);
        v
    }

    fn fetch_word(&mut self, bus: &MemoryBus) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn read16(&mut self, bus: &MemoryBus, addr: u16) -> u16 {
        let lo = self.read8(bus, u32::from(addr));
        let hi = self.read8(bus, u32::from(addr.wrapping_add(1)));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn push8(&mut self, bus: &MemoryBus, value: u8) {
        let addr = self.regs.push_addr();
        self.write8(bus, addr, value);
    }

    fn pop8(&mut self, bus: &MemoryBus) -> u8 {
        let addr = self.regs.pop_addr();
        self.read8(bus, addr)
    }

    fn push16(&mut self, bus: &MemoryBus, value: u16) {
        self.push8(bus, (value >> 8) as u8);
        self.push8(bus, (value & 0xFF) as u8);
    }

    fn pop16(&mut self, bus: &MemoryBus) -> u16 {
        let lo = self.pop8(bus);
        let hi = self.pop8(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    // === Addressing modes ===
    // Each resolves an effective address, charging whatever extra cycles
    // that addressing mode costs (index-carry page crossings, mostly) as it
    // goes, via the read/fetch helpers above.

    fn addr_zp(&mut self, bus: &MemoryBus) -> u32 {
        u32::from(self.fetch_byte(bus))
    }

    fn addr_zpx(&mut self, bus: &MemoryBus) -> u32 {
        let a = self.fetch_byte(bus).wrapping_add(self.regs.x);
        self.tcu += 1;
        u32::from(a)
    }

    fn addr_zpy(&mut self, bus: &MemoryBus) -> u32 {
        let a = self.fetch_byte(bus).wrapping_add(self.regs.y);
        self.tcu += 1;
        u32::from(a)
    }

    fn addr_abs(&mut self, bus: &MemoryBus) -> u32 {
        u32::from(self.fetch_word(bus))
    }

    fn addr_abx(&mut self, bus: &MemoryBus, penalize_cross: bool) -> u32 {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(u16::from(self.regs.x));
        if penalize_cross && (base & 0xFF00) != (addr & 0xFF00) {
            self.tcu += 1;
        }
        u32::from(addr)
    }

    fn addr_aby(&mut self, bus: &MemoryBus, penalize_cross: bool) -> u32 {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(u16::from(self.regs.y));
        if penalize_cross && (base & 0xFF00) != (addr & 0xFF00) {
            self.tcu += 1;
        }
        u32::from(addr)
    }

    fn addr_izx(&mut self, bus: &MemoryBus) -> u32 {
        let zp = self.fetch_byte(bus).wrapping_add(self.regs.x);
        self.tcu += 1;
        let lo = self.read8(bus, u32::from(zp));
        let hi = self.read8(bus, u32::from(zp.wrapping_add(1)));
        u32::from(u16::from(lo) | (u16::from(hi) << 8))
    }

    fn addr_izy(&mut self, bus: &MemoryBus, penalize_cross: bool) -> u32 {
        let zp = self.fetch_byte(bus);
        let lo = self.read8(bus, u32::from(zp));
        let hi = self.read8(bus, u32::from(zp.wrapping_add(1)));
        let base = u16::from(lo) | (u16::from(hi) << 8);
        let addr = base.wrapping_add(u16::from(self.regs.y));
        if penalize_cross && (base & 0xFF00) != (addr & 0xFF00) {
            self.tcu += 1;
        }
        u32::from(addr)
    }

    /// 65C02 `(zp)` with no index.
    fn addr_zpi(&mut self, bus: &MemoryBus) -> u32 {
        let zp = self.fetch_byte(bus);
        let lo = self.read8(bus, u32::from(zp));
        let hi = self.read8(bus, u32::from(zp.wrapping_add(1)));
        u32::from(u16::from(lo) | (u16::from(hi) << 8))
    }

    /// `JMP (abs)`, with the 65C02's fix for the NMOS page-wrap bug: the
    /// pointer's high byte is fetched from `ptr + 1` even when that crosses
    /// a page boundary, at the cost of one extra cycle.
    fn addr_ind(&mut self, bus: &MemoryBus) -> u32 {
        let ptr = self.fetch_word(bus);
        let lo = self.read8(bus, u32::from(ptr));
        let hi = self.read8(bus, u32::from(ptr.wrapping_add(1)));
        self.tcu += 1;
        u32::from(u16::from(lo) | (u16::from(hi) << 8))
    }

    fn branch(&mut self, bus: &MemoryBus, condition: bool) {
        let offset = self.fetch_byte(bus) as i8;
        if condition {
            self.tcu += 1;
            let old_pc = self.regs.pc;
            let new_pc = (i32::from(old_pc) + i32::from(offset)) as u16;
            if (old_pc & 0xFF00) != (new_pc & 0xFF00) {
                self.tcu += 1;
            }
            self.regs.pc = new_pc;
        }
    }

    // === ALU and register operations ===

    fn lda(&mut self, v: u8) {
        self.regs.a = v;
        self.regs.p.set_zn(v);
    }

    fn ldx(&mut self, v: u8) {
        self.regs.x = v;
        self.regs.p.set_zn(v);
    }

    fn ldy(&mut self, v: u8) {
        self.regs.y = v;
        self.regs.p.set_zn(v);
    }

    fn ora(&mut self, v: u8) {
        self.regs.a |= v;
        self.regs.p.set_zn(self.regs.a);
    }

    fn and(&mut self, v: u8) {
        self.regs.a &= v;
        self.regs.p.set_zn(self.regs.a);
    }

    fn eor(&mut self, v: u8) {
        self.regs.a ^= v;
        self.regs.p.set_zn(self.regs.a);
    }

    fn adc(&mut self, v: u8) {
        if self.regs.p.is_set(flags::D) {
            self.adc_bcd(v);
            return;
        }
        let carry_in = u16::from(self.regs.p.is_set(flags::C));
        let a = self.regs.a;
        let sum = u16::from(a) + u16::from(v) + carry_in;
        let result = sum as u8;
        self.regs.p.set(flags::C, sum > 0xFF);
        self.regs.p.set(flags::V, (!(a ^ v) & (a ^ result) & 0x80) != 0);
        self.regs.a = result;
        self.regs.p.set_zn(result);
    }

    /// 65C02 decimal-mode add: one extra cycle versus binary, and (unlike
    /// NMOS) `N`/`Z`/`V` come out valid for the decimal result.
    fn adc_bcd(&mut self, v: u8) {
        self.tcu += 1;
        let carry_in = u16::from(self.regs.p.is_set(flags::C));
        let a = self.regs.a;
        let bin_result = a.wrapping_add(v).wrapping_add(carry_in as u8);
        self.regs.p.set(flags::V, (!(a ^ v) & (a ^ bin_result) & 0x80) != 0);

        let mut lo = u16::from(a & 0x0F) + u16::from(v & 0x0F) + carry_in;
        if lo > 9 {
            lo += 6;
        }
        let mut hi = u16::from(a >> 4) + u16::from(v >> 4) + u16::from(lo > 0x0F);
        lo &= 0x0F;
        let carry_out = hi > 9;
        if carry_out {
            hi += 6;
        }
        hi &= 0x0F;
        let result = ((hi << 4) | lo) as u8;

        self.regs.p.set(flags::C, carry_out);
        self.regs.a = result;
        self.regs.p.set_zn(result);
    }

    fn sbc(&mut self, v: u8) {
        if self.regs.p.is_set(flags::D) {
            self.sbc_bcd(v);
        } else {
            // SBC is ADC against the one's complement of the operand; the
            // carry flag already means "no borrow" in both directions.
            self.adc(!v);
        }
    }

    fn sbc_bcd(&mut self, v: u8) {
        self.tcu += 1;
        let carry_in: i16 = i16::from(self.regs.p.is_set(flags::C));
        let a = self.regs.a;
        let bin = i16::from(a) - i16::from(v) - (1 - carry_in);
        self.regs.p.set(flags::C, bin >= 0);
        let bin_u8 = (bin & 0xFF) as u8;
        self.regs.p.set(flags::V, ((a ^ v) & (a ^ bin_u8) & 0x80) != 0);

        let mut lo = i16::from(a & 0x0F) - i16::from(v & 0x0F) - (1 - carry_in);
        let mut hi = i16::from(a >> 4) - i16::from(v >> 4);
        if lo < 0 {
            lo += 10;
            hi -= 1;
        }
        if hi < 0 {
            hi += 10;
        }
        let result = (((hi & 0x0F) << 4) | (lo & 0x0F)) as u8;
        self.regs.a = result;
        self.regs.p.set_zn(result);
    }

    fn compare(&mut self, reg: u8, v: u8) {
        let result = reg.wrapping_sub(v);
        self.regs.p.set(flags::C, reg >= v);
        self.regs.p.set_zn(result);
    }

    fn asl_value(&mut self, v: u8) -> u8 {
        self.regs.p.set(flags::C, v & 0x80 != 0);
        let result = v << 1;
        self.regs.p.set_zn(result);
        result
    }

    fn lsr_value(&mut self, v: u8) -> u8 {
        self.regs.p.set(flags::C, v & 0x01 != 0);
        let result = v >> 1;
        self.regs.p.set_zn(result);
        result
    }

    fn rol_value(&mut self, v: u8) -> u8 {
        let carry_in = u8::from(self.regs.p.is_set(flags::C));
        self.regs.p.set(flags::C, v & 0x80 != 0);
        let result = (v << 1) | carry_in;
        self.regs.p.set_zn(result);
        result
    }

    fn ror_value(&mut self, v: u8) -> u8 {
        let carry_in = u8::from(self.regs.p.is_set(flags::C));
        self.regs.p.set(flags::C, v & 0x01 != 0);
        let result = (v >> 1) | (carry_in << 7);
        self.regs.p.set_zn(result);
        result
    }

    fn bit(&mut self, v: u8) {
        self.regs.p.set(flags::Z, (self.regs.a & v) == 0);
        self.regs.p.set(flags::N, v & 0x80 != 0);
        self.regs.p.set(flags::V, v & 0x40 != 0);
    }

    /// `BIT #imm` only ever updates `Z` on a 65C02 — there is no memory
    /// operand to read `N`/`V` from.
    fn bit_immediate(&mut self, v: u8) {
        self.regs.p.set(flags::Z, (self.regs.a & v) == 0);
    }

    fn trb_value(&mut self, v: u8) -> u8 {
        self.regs.p.set(flags::Z, (self.regs.a & v) == 0);
        v & !self.regs.a
    }

    fn tsb_value(&mut self, v: u8) -> u8 {
        self.regs.p.set(flags::Z, (self.regs.a & v) == 0);
        v | self.regs.a
    }

    fn inc_value(v: u8) -> u8 {
        v.wrapping_add(1)
    }

    fn dec_value(v: u8) -> u8 {
        v.wrapping_sub(1)
    }

    // === Dispatch ===

    #[allow(clippy::too_many_lines)]
    fn execute(&mut self, bus: &MemoryBus, opcode: u8) {
        match opcode {
            // --- Loads / stores ---
            0xA9 => {
                let v = self.fetch_byte(bus);
                self.lda(v);
            }
            0xA5 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.lda(v);
            }
            0xB5 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                self.lda(v);
            }
            0xAD => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.lda(v);
            }
            0xBD => {
                let a = self.addr_abx(bus, true);
                let v = self.read8(bus, a);
                self.lda(v);
            }
            0xB9 => {
                let a = self.addr_aby(bus, true);
                let v = self.read8(bus, a);
                self.lda(v);
            }
            0xA1 => {
                let a = self.addr_izx(bus);
                let v = self.read8(bus, a);
                self.lda(v);
            }
            0xB1 => {
                let a = self.addr_izy(bus, true);
                let v = self.read8(bus, a);
                self.lda(v);
            }
            0xB2 => {
                let a = self.addr_zpi(bus);
                let v = self.read8(bus, a);
                self.lda(v);
            }
            0xA2 => {
                let v = self.fetch_byte(bus);
                self.ldx(v);
            }
            0xA6 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.ldx(v);
            }
            0xB6 => {
                let a = self.addr_zpy(bus);
                let v = self.read8(bus, a);
                self.ldx(v);
            }
            0xAE => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.ldx(v);
            }
            0xBE => {
                let a = self.addr_aby(bus, true);
                let v = self.read8(bus, a);
                self.ldx(v);
            }
            0xA0 => {
                let v = self.fetch_byte(bus);
                self.ldy(v);
            }
            0xA4 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.ldy(v);
            }
            0xB4 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                self.ldy(v);
            }
            0xAC => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.ldy(v);
            }
            0xBC => {
                let a = self.addr_abx(bus, true);
                let v = self.read8(bus, a);
                self.ldy(v);
            }
            0x85 => {
                let a = self.addr_zp(bus);
                self.write8(bus, a, self.regs.a);
            }
            0x95 => {
                let a = self.addr_zpx(bus);
                self.write8(bus, a, self.regs.a);
            }
            0x8D => {
                let a = self.addr_abs(bus);
                self.write8(bus, a, self.regs.a);
            }
            0x9D => {
                let a = self.addr_abx(bus, false);
                self.write8(bus, a, self.regs.a);
            }
            0x99 => {
                let a = self.addr_aby(bus, false);
                self.write8(bus, a, self.regs.a);
            }
            0x81 => {
                let a = self.addr_izx(bus);
                self.write8(bus, a, self.regs.a);
            }
            0x91 => {
                let a = self.addr_izy(bus, false);
                self.write8(bus, a, self.regs.a);
            }
            0x92 => {
                let a = self.addr_zpi(bus);
                self.write8(bus, a, self.regs.a);
            }
            0x86 => {
                let a = self.addr_zp(bus);
                self.write8(bus, a, self.regs.x);
            }
            0x96 => {
                let a = self.addr_zpy(bus);
                self.write8(bus, a, self.regs.x);
            }
            0x8E => {
                let a = self.addr_abs(bus);
                self.write8(bus, a, self.regs.x);
            }
            0x84 => {
                let a = self.addr_zp(bus);
                self.write8(bus, a, self.regs.y);
            }
            0x94 => {
                let a = self.addr_zpx(bus);
                self.write8(bus, a, self.regs.y);
            }
            0x8C => {
                let a = self.addr_abs(bus);
                self.write8(bus, a, self.regs.y);
            }
            0x64 => {
                let a = self.addr_zp(bus);
                self.write8(bus, a, 0);
            }
            0x74 => {
                let a = self.addr_zpx(bus);
                self.write8(bus, a, 0);
            }
            0x9C => {
                let a = self.addr_abs(bus);
                self.write8(bus, a, 0);
            }
            0x9E => {
                let a = self.addr_abx(bus, false);
                self.write8(bus, a, 0);
            }

            // --- ALU, accumulator source ---
            0x09 => {
                let v = self.fetch_byte(bus);
                self.ora(v);
            }
            0x05 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.ora(v);
            }
            0x15 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                self.ora(v);
            }
            0x0D => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.ora(v);
            }
            0x1D => {
                let a = self.addr_abx(bus, true);
                let v = self.read8(bus, a);
                self.ora(v);
            }
            0x19 => {
                let a = self.addr_aby(bus, true);
                let v = self.read8(bus, a);
                self.ora(v);
            }
            0x01 => {
                let a = self.addr_izx(bus);
                let v = self.read8(bus, a);
                self.ora(v);
            }
            0x11 => {
                let a = self.addr_izy(bus, true);
                let v = self.read8(bus, a);
                self.ora(v);
            }
            0x12 => {
                let a = self.addr_zpi(bus);
                let v = self.read8(bus, a);
                self.ora(v);
            }
            0x29 => {
                let v = self.fetch_byte(bus);
                self.and(v);
            }
            0x25 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.and(v);
            }
            0x35 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                self.and(v);
            }
            0x2D => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.and(v);
            }
            0x3D => {
                let a = self.addr_abx(bus, true);
                let v = self.read8(bus, a);
                self.and(v);
            }
            0x39 => {
                let a = self.addr_aby(bus, true);
                let v = self.read8(bus, a);
                self.and(v);
            }
            0x21 => {
                let a = self.addr_izx(bus);
                let v = self.read8(bus, a);
                self.and(v);
            }
            0x31 => {
                let a = self.addr_izy(bus, true);
                let v = self.read8(bus, a);
                self.and(v);
            }
            0x32 => {
                let a = self.addr_zpi(bus);
                let v = self.read8(bus, a);
                self.and(v);
            }
            0x49 => {
                let v = self.fetch_byte(bus);
                self.eor(v);
            }
            0x45 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.eor(v);
            }
            0x55 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                self.eor(v);
            }
            0x4D => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.eor(v);
            }
            0x5D => {
                let a = self.addr_abx(bus, true);
                let v = self.read8(bus, a);
                self.eor(v);
            }
            0x59 => {
                let a = self.addr_aby(bus, true);
                let v = self.read8(bus, a);
                self.eor(v);
            }
            0x41 => {
                let a = self.addr_izx(bus);
                let v = self.read8(bus, a);
                self.eor(v);
            }
            0x51 => {
                let a = self.addr_izy(bus, true);
                let v = self.read8(bus, a);
                self.eor(v);
            }
            0x52 => {
                let a = self.addr_zpi(bus);
                let v = self.read8(bus, a);
                self.eor(v);
            }
            0x69 => {
                let v = self.fetch_byte(bus);
                self.adc(v);
            }
            0x65 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.adc(v);
            }
            0x75 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                self.adc(v);
            }
            0x6D => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.adc(v);
            }
            0x7D => {
                let a = self.addr_abx(bus, true);
                let v = self.read8(bus, a);
                self.adc(v);
            }
            0x79 => {
                let a = self.addr_aby(bus, true);
                let v = self.read8(bus, a);
                self.adc(v);
            }
            0x61 => {
                let a = self.addr_izx(bus);
                let v = self.read8(bus, a);
                self.adc(v);
            }
            0x71 => {
                let a = self.addr_izy(bus, true);
                let v = self.read8(bus, a);
                self.adc(v);
            }
            0x72 => {
                let a = self.addr_zpi(bus);
                let v = self.read8(bus, a);
                self.adc(v);
            }
            0xE9 => {
                let v = self.fetch_byte(bus);
                self.sbc(v);
            }
            0xE5 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.sbc(v);
            }
            0xF5 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                self.sbc(v);
            }
            0xED => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.sbc(v);
            }
            0xFD => {
                let a = self.addr_abx(bus, true);
                let v = self.read8(bus, a);
                self.sbc(v);
            }
            0xF9 => {
                let a = self.addr_aby(bus, true);
                let v = self.read8(bus, a);
                self.sbc(v);
            }
            0xE1 => {
                let a = self.addr_izx(bus);
                let v = self.read8(bus, a);
                self.sbc(v);
            }
            0xF1 => {
                let a = self.addr_izy(bus, true);
                let v = self.read8(bus, a);
                self.sbc(v);
            }
            0xF2 => {
                let a = self.addr_zpi(bus);
                let v = self.read8(bus, a);
                self.sbc(v);
            }
            0xC9 => {
                let v = self.fetch_byte(bus);
                self.compare(self.regs.a, v);
            }
            0xC5 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.compare(self.regs.a, v);
            }
            0xD5 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                self.compare(self.regs.a, v);
            }
            0xCD => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.compare(self.regs.a, v);
            }
            0xDD => {
                let a = self.addr_abx(bus, true);
                let v = self.read8(bus, a);
                self.compare(self.regs.a, v);
            }
            0xD9 => {
                let a = self.addr_aby(bus, true);
                let v = self.read8(bus, a);
                self.compare(self.regs.a, v);
            }
            0xC1 => {
                let a = self.addr_izx(bus);
                let v = self.read8(bus, a);
                self.compare(self.regs.a, v);
            }
            0xD1 => {
                let a = self.addr_izy(bus, true);
                let v = self.read8(bus, a);
                self.compare(self.regs.a, v);
            }
            0xD2 => {
                let a = self.addr_zpi(bus);
                let v = self.read8(bus, a);
                self.compare(self.regs.a, v);
            }
            0xE0 => {
                let v = self.fetch_byte(bus);
                self.compare(self.regs.x, v);
            }
            0xE4 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.compare(self.regs.x, v);
            }
            0xEC => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.compare(self.regs.x, v);
            }
            0xC0 => {
                let v = self.fetch_byte(bus);
                self.compare(self.regs.y, v);
            }
            0xC4 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.compare(self.regs.y, v);
            }
            0xCC => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.compare(self.regs.y, v);
            }

            // --- BIT / TRB / TSB ---
            0x89 => {
                let v = self.fetch_byte(bus);
                self.bit_immediate(v);
            }
            0x24 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                self.bit(v);
            }
            0x34 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                self.bit(v);
            }
            0x2C => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                self.bit(v);
            }
            0x3C => {
                let a = self.addr_abx(bus, true);
                let v = self.read8(bus, a);
                self.bit(v);
            }
            0x04 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                let r = self.tsb_value(v);
                self.write8(bus, a, r);
            }
            0x0C => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                let r = self.tsb_value(v);
                self.write8(bus, a, r);
            }
            0x14 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                let r = self.trb_value(v);
                self.write8(bus, a, r);
            }
            0x1C => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                let r = self.trb_value(v);
                self.write8(bus, a, r);
            }

            // --- Shifts / rotates ---
            0x0A => self.regs.a = self.asl_value(self.regs.a),
            0x06 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                let r = self.asl_value(v);
                self.write8(bus, a, r);
            }
            0x16 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                let r = self.asl_value(v);
                self.write8(bus, a, r);
            }
            0x0E => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                let r = self.asl_value(v);
                self.write8(bus, a, r);
            }
            0x1E => {
                let a = self.addr_abx(bus, false);
                let v = self.read8(bus, a);
                let r = self.asl_value(v);
                self.write8(bus, a, r);
            }
            0x4A => self.regs.a = self.lsr_value(self.regs.a),
            0x46 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                let r = self.lsr_value(v);
                self.write8(bus, a, r);
            }
            0x56 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                let r = self.lsr_value(v);
                self.write8(bus, a, r);
            }
            0x4E => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                let r = self.lsr_value(v);
                self.write8(bus, a, r);
            }
            0x5E => {
                let a = self.addr_abx(bus, false);
                let v = self.read8(bus, a);
                let r = self.lsr_value(v);
                self.write8(bus, a, r);
            }
            0x2A => self.regs.a = self.rol_value(self.regs.a),
            0x26 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                let r = self.rol_value(v);
                self.write8(bus, a, r);
            }
            0x36 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                let r = self.rol_value(v);
                self.write8(bus, a, r);
            }
            0x2E => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                let r = self.rol_value(v);
                self.write8(bus, a, r);
            }
            0x3E => {
                let a = self.addr_abx(bus, false);
                let v = self.read8(bus, a);
                let r = self.rol_value(v);
                self.write8(bus, a, r);
            }
            0x6A => self.regs.a = self.ror_value(self.regs.a),
            0x66 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                let r = self.ror_value(v);
                self.write8(bus, a, r);
            }
            0x76 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                let r = self.ror_value(v);
                self.write8(bus, a, r);
            }
            0x6E => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                let r = self.ror_value(v);
                self.write8(bus, a, r);
            }
            0x7E => {
                let a = self.addr_abx(bus, false);
                let v = self.read8(bus, a);
                let r = self.ror_value(v);
                self.write8(bus, a, r);
            }

            // --- Increments / decrements ---
            0x1A => {
                let v = Self::inc_value(self.regs.a);
                self.regs.p.set_zn(v);
                self.regs.a = v;
            }
            0x3A => {
                let v = Self::dec_value(self.regs.a);
                self.regs.p.set_zn(v);
                self.regs.a = v;
            }
            0xE6 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                let r = Self::inc_value(v);
                self.regs.p.set_zn(r);
                self.write8(bus, a, r);
            }
            0xF6 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                let r = Self::inc_value(v);
                self.regs.p.set_zn(r);
                self.write8(bus, a, r);
            }
            0xEE => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                let r = Self::inc_value(v);
                self.regs.p.set_zn(r);
                self.write8(bus, a, r);
            }
            0xFE => {
                let a = self.addr_abx(bus, false);
                let v = self.read8(bus, a);
                let r = Self::inc_value(v);
                self.regs.p.set_zn(r);
                self.write8(bus, a, r);
            }
            0xC6 => {
                let a = self.addr_zp(bus);
                let v = self.read8(bus, a);
                let r = Self::dec_value(v);
                self.regs.p.set_zn(r);
                self.write8(bus, a, r);
            }
            0xD6 => {
                let a = self.addr_zpx(bus);
                let v = self.read8(bus, a);
                let r = Self::dec_value(v);
                self.regs.p.set_zn(r);
                self.write8(bus, a, r);
            }
            0xCE => {
                let a = self.addr_abs(bus);
                let v = self.read8(bus, a);
                let r = Self::dec_value(v);
                self.regs.p.set_zn(r);
                self.write8(bus, a, r);
            }
            0xDE => {
                let a = self.addr_abx(bus, false);
                let v = self.read8(bus, a);
                let r = Self::dec_value(v);
                self.regs.p.set_zn(r);
                self.write8(bus, a, r);
            }
            0xE8 => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.p.set_zn(self.regs.x);
            }
            0xC8 => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.regs.p.set_zn(self.regs.y);
            }
            0xCA => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.regs.p.set_zn(self.regs.x);
            }
            0x88 => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.regs.p.set_zn(self.regs.y);
            }

            // --- Transfers ---
            0xAA => {
                self.regs.x = self.regs.a;
                self.regs.p.set_zn(self.regs.x);
            }
            0xA8 => {
                self.regs.y = self.regs.a;
                self.regs.p.set_zn(self.regs.y);
            }
            0x8A => {
                self.regs.a = self.regs.x;
                self.regs.p.set_zn(self.regs.a);
            }
            0x98 => {
                self.regs.a = self.regs.y;
                self.regs.p.set_zn(self.regs.a);
            }
            0xBA => {
                self.regs.x = self.regs.s;
                self.regs.p.set_zn(self.regs.x);
            }
            0x9A => self.regs.s = self.regs.x,

            // --- Stack ---
            0x48 => self.push8(bus, self.regs.a),
            0x68 => {
                self.tcu += 1;
                let v = self.pop8(bus);
                self.regs.a = v;
                self.regs.p.set_zn(v);
            }
            0x08 => self.push8(bus, self.regs.p.bits()),
            0x28 => {
                self.tcu += 1;
                let v = self.pop8(bus);
                self.regs.p = Status(v | flags::U);
            }
            0xDA => self.push8(bus, self.regs.x),
            0xFA => {
                self.tcu += 1;
                let v = self.pop8(bus);
                self.regs.x = v;
                self.regs.p.set_zn(v);
            }
            0x5A => self.push8(bus, self.regs.y),
            0x7A => {
                self.tcu += 1;
                let v = self.pop8(bus);
                self.regs.y = v;
                self.regs.p.set_zn(v);
            }

            // --- Flags ---
            0x18 => self.regs.p.set(flags::C, false),
            0x38 => self.regs.p.set(flags::C, true),
            0x58 => self.regs.p.set(flags::I, false),
            0x78 => self.regs.p.set(flags::I, true),
            0xD8 => self.regs.p.set(flags::D, false),
            0xF8 => self.regs.p.set(flags::D, true),
            0xB8 => self.regs.p.set(flags::V, false),

            // --- Control flow ---
            0x4C => self.regs.pc = self.addr_abs(bus) as u16,
            0x6C => self.regs.pc = self.addr_ind(bus) as u16,
            0x7C => self.regs.pc = self.addr_abx(bus, false) as u16,
            0x20 => {
                let target = self.addr_abs(bus);
                self.tcu += 1;
                let return_addr = self.regs.pc.wrapping_sub(1);
                self.push16(bus, return_addr);
                self.regs.pc = target as u16;
            }
            0x60 => {
                self.tcu += 2;
                let addr = self.pop16(bus);
                self.regs.pc = addr.wrapping_add(1);
                self.tcu += 1;
            }
            0x40 => {
                self.tcu += 1;
                let p = self.pop8(bus);
                self.regs.p = Status(p | flags::U);
                self.regs.pc = self.pop16(bus);
            }
            0x00 => {
                let _signature = self.fetch_byte(bus);
                self.tcu += 1;
                let pc = self.regs.pc;
                self.push16(bus, pc);
                let mut p = self.regs.p;
                p.set(flags::B, true);
                self.push8(bus, p.bits());
                self.regs.p.set(flags::I, true);
                self.regs.p.set(flags::D, false);
                self.regs.pc = self.read16(bus, IRQ_VECTOR);
            }
            0x80 => self.branch(bus, true),
            0x10 => {
                let c = !self.regs.p.is_set(flags::N);
                self.branch(bus, c);
            }
            0x30 => {
                let c = self.regs.p.is_set(flags::N);
                self.branch(bus, c);
            }
            0x50 => {
                let c = !self.regs.p.is_set(flags::V);
                self.branch(bus, c);
            }
            0x70 => {
                let c = self.regs.p.is_set(flags::V);
                self.branch(bus, c);
            }
            0x90 => {
                let c = !self.regs.p.is_set(flags::C);
                self.branch(bus, c);
            }
            0xB0 => {
                let c = self.regs.p.is_set(flags::C);
                self.branch(bus, c);
            }
            0xD0 => {
                let c = !self.regs.p.is_set(flags::Z);
                self.branch(bus, c);
            }
            0xF0 => {
                let c = self.regs.p.is_set(flags::Z);
                self.branch(bus, c);
            }

            // --- WAI / STP ---
            0xCB => {
                self.tcu += 1;
                self.halt = HaltState::Waiting;
            }
            0xDB => {
                self.tcu += 1;
                self.halt = HaltState::Stopped;
            }

            // --- RMB/SMB/BBR/BBS (65C02 bit-manipulation family) ---
            0x07 => self.rmb_op(bus, 0),
            0x17 => self.rmb_op(bus, 1),
            0x27 => self.rmb_op(bus, 2),
            0x37 => self.rmb_op(bus, 3),
            0x47 => self.rmb_op(bus, 4),
            0x57 => self.rmb_op(bus, 5),
            0x67 => self.rmb_op(bus, 6),
            0x77 => self.rmb_op(bus, 7),
            0x87 => self.smb_op(bus, 0),
            0x97 => self.smb_op(bus, 1),
            0xA7 => self.smb_op(bus, 2),
            0xB7 => self.smb_op(bus, 3),
            0xC7 => self.smb_op(bus, 4),
            0xD7 => self.smb_op(bus, 5),
            0xE7 => self.smb_op(bus, 6),
            0xF7 => self.smb_op(bus, 7),
            0x0F => self.bbr_op(bus, 0),
            0x1F => self.bbr_op(bus, 1),
            0x2F => self.bbr_op(bus, 2),
            0x3F => self.bbr_op(bus, 3),
            0x4F => self.bbr_op(bus, 4),
            0x5F => self.bbr_op(bus, 5),
            0x6F => self.bbr_op(bus, 6),
            0x7F => self.bbr_op(bus, 7),
            0x8F => self.bbs_op(bus, 0),
            0x9F => self.bbs_op(bus, 1),
            0xAF => self.bbs_op(bus, 2),
            0xBF => self.bbs_op(bus, 3),
            0xCF => self.bbs_op(bus, 4),
            0xDF => self.bbs_op(bus, 5),
            0xEF => self.bbs_op(bus, 6),
            0xFF => self.bbs_op(bus, 7),

            // Reserved: the 65C02 defines every one of these as a NOP of
            // one, two, or three bytes depending on the high nibble. We
            // don't distinguish the widths since nothing relies on them —
            // real software never executes a reserved opcode on purpose.
            _ => {}
        }
    }

    fn rmb_op(&mut self, bus: &MemoryBus, bit: u8) {
        let a = self.addr_zp(bus);
        let v = self.read8(bus, a);
        self.write8(bus, a, v & !(1 << bit));
    }

    fn smb_op(&mut self, bus: &MemoryBus, bit: u8) {
        let a = self.addr_zp(bus);
        let v = self.read8(bus, a);
        self.write8(bus, a, v | (1 << bit));
    }

    fn bbr_op(&mut self, bus: &MemoryBus, bit: u8) {
        let a = self.addr_zp(bus);
        let v = self.read8(bus, a);
        let condition = v & (1 << bit) == 0;
        self.branch(bus, condition);
    }

    fn bbs_op(&mut self, bus: &MemoryBus, bit: u8) {
        let a = self.addr_zp(bus);
        let v = self.read8(bus, a);
        let condition = v & (1 << bit) != 0;
        self.branch(bus, condition);
    }
}

impl Observable for Cpu65C02 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "regs.a" => Some(self.regs.a.into()),
            "regs.x" => Some(self.regs.x.into()),
            "regs.y" => Some(self.regs.y.into()),
            "regs.s" => Some(self.regs.s.into()),
            "regs.pc" => Some(self.regs.pc.into()),
            "regs.p" => Some(self.regs.p.bits().into()),
            "halt" => Some(
                match self.halt {
                    HaltState::Running => "running",
                    HaltState::Waiting => "waiting",
                    HaltState::Stopped => "stopped",
                }
                .into(),
            ),
            "bus_faults" => Some(self.bus_faults.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "regs.a",
            "regs.x",
            "regs.y",
            "regs.s",
            "regs.pc",
            "regs.p",
            "halt",
            "bus_faults",
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use apple2_bus::{Memory, Perms};

    use super::*;

    fn new_machine() -> (Cpu65C02, MemoryBus) {
        let mut bus = MemoryBus::new();
        // One layer spanning the full 64 KiB the 65C02 can address, so tests
        // can freely load vectors up near $FFFF without a second layer.
        let ram = Rc::new(RefCell::new(Memory::new(0x1_0000)));
        bus.page_map
            .add_layer("ram", 0x0000, 16, Perms::READ_WRITE_EXEC, true, ram);
        let cpu = Cpu65C02::new(0);
        (cpu, bus)
    }

    fn load(bus: &MemoryBus, addr: u32, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            bus.poke8(addr + i as u32, *b).unwrap();
        }
    }

    fn run_one(cpu: &mut Cpu65C02, bus: &MemoryBus, signals: &mut SignalBus) -> u64 {
        cpu.step(bus, signals, Cycle::ZERO)
    }

    #[test]
    fn lda_immediate_sets_a_and_flags() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.pc = 0x0200;
        load(&bus, 0x0200, &[0xA9, 0x00]);
        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.regs.a, 0);
        assert!(cpu.regs.p.is_set(flags::Z));
    }

    #[test]
    fn adc_sets_carry_and_overflow() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.pc = 0x0200;
        cpu.regs.a = 0x7F;
        load(&bus, 0x0200, &[0x69, 0x01]);
        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.regs.a, 0x80);
        assert!(cpu.regs.p.is_set(flags::V));
        assert!(cpu.regs.p.is_set(flags::N));
    }

    #[test]
    fn adc_decimal_mode_adjusts_nibbles() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.pc = 0x0200;
        cpu.regs.a = 0x29; // BCD 29
        cpu.regs.p.set(flags::D, true);
        load(&bus, 0x0200, &[0x69, 0x19]); // + BCD 19 = 48
        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.regs.a, 0x48);
        assert!(!cpu.regs.p.is_set(flags::C));
    }

    #[test]
    fn jsr_then_rts_round_trips_pc() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.s = 0xFF;
        cpu.regs.pc = 0x0300;
        load(&bus, 0x0300, &[0x20, 0x00, 0x04]); // JSR $0400
        load(&bus, 0x0400, &[0x60]); // RTS
        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.regs.pc, 0x0400);
        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.regs.pc, 0x0303);
    }

    #[test]
    fn branch_taken_crossing_page_costs_extra_cycle() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.pc = 0x01F0;
        cpu.regs.p.set(flags::Z, true);
        load(&bus, 0x01F0, &[0xF0, 0x20]); // BEQ +32, crosses into next page
        let cycles = run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cycles, 4);
        assert_eq!(cpu.regs.pc, 0x0212);
    }

    #[test]
    fn irq_with_i_clear_vectors_and_sets_i() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.s = 0xFF;
        cpu.regs.pc = 0x0500;
        cpu.regs.p.set(flags::I, false);
        load(&bus, 0xFFFE, &[0x00, 0x06]); // IRQ vector -> $0600
        signals.assert(SignalLine::Irq, 1, Cycle::ZERO);

        run_one(&mut cpu, &bus, &mut signals);

        assert_eq!(cpu.regs.pc, 0x0600);
        assert!(cpu.regs.p.is_set(flags::I));
    }

    #[test]
    fn irq_with_i_set_is_ignored() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.pc = 0x0500;
        cpu.regs.p.set(flags::I, true);
        load(&bus, 0x0500, &[0xEA]); // NOP
        signal_bus::SignalBus::assert(&mut signals, SignalLine::Irq, 1, Cycle::ZERO);

        run_one(&mut cpu, &bus, &mut signals);

        assert_eq!(cpu.regs.pc, 0x0501, "IRQ masked, NOP just runs normally");
    }

    #[test]
    fn nmi_takes_priority_over_a_simultaneously_asserted_irq() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.s = 0xFF;
        cpu.regs.pc = 0x0500;
        cpu.regs.p.set(flags::I, false);
        load(&bus, 0xFFFA, &[0x00, 0x07]); // NMI vector -> $0700
        load(&bus, 0xFFFE, &[0x00, 0x08]); // IRQ vector -> $0800
        signals.assert(SignalLine::Irq, 1, Cycle::ZERO);
        signals.assert(SignalLine::Nmi, 2, Cycle::ZERO);

        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.regs.pc, 0x0700, "NMI vectored first");
        assert!(!signals.consume_nmi_edge(), "NMI edge consumed by the CPU");
        assert!(signals.is_asserted(SignalLine::Irq), "IRQ source still holds the line");

        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.regs.pc, 0x0800, "IRQ vectored on the next step");
    }

    #[test]
    fn wai_resumes_without_vectoring_when_woken_by_masked_irq() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.pc = 0x0500;
        cpu.regs.p.set(flags::I, true);
        load(&bus, 0x0500, &[0xCB]); // WAI
        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.halt, HaltState::Waiting);

        signals.assert(SignalLine::Irq, 1, Cycle::ZERO);
        run_one(&mut cpu, &bus, &mut signals);

        assert_eq!(cpu.halt, HaltState::Running);
        assert_eq!(cpu.regs.pc, 0x0501, "resumed after WAI, not vectored");
    }

    #[test]
    fn stp_halts_until_reset() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.pc = 0x0500;
        load(&bus, 0x0500, &[0xDB]); // STP
        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.halt, HaltState::Stopped);
        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.halt, HaltState::Stopped);

        cpu.reset(&bus);
        assert_eq!(cpu.halt, HaltState::Running);
    }

    #[test]
    fn trap_intercepts_before_fetch_and_returns_via_rts() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.s = 0xFF;
        cpu.regs.pc = 0x0300;
        load(&bus, 0x0300, &[0x20, 0xED, 0xFD]); // JSR $FDED
        load(&bus, 0xFDED, &[0xEA]); // real routine would be here; trapped instead

        cpu.traps.register(
            0xFDED,
            Box::new(|regs| {
                regs.a = 0x2A;
                TrapOutcome {
                    handled: true,
                    cycles_consumed: 10,
                    return_method: ReturnMethod::Rts,
                    return_address: None,
                }
            }),
        );

        run_one(&mut cpu, &bus, &mut signals); // JSR
        let cycles = run_one(&mut cpu, &bus, &mut signals); // trapped call
        assert_eq!(cpu.regs.a, 0x2A);
        assert_eq!(cpu.regs.pc, 0x0303);
        assert_eq!(cycles, 10);
    }

    #[test]
    fn jmp_indirect_reads_high_byte_across_page_boundary() {
        // The NMOS 6502 bug wraps the pointer fetch within the page, so
        // JMP ($12FF) would read its high byte from $1200. The 65C02 fixes
        // this and reads from $1300 instead.
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.pc = 0x0200;
        load(&bus, 0x0200, &[0x6C, 0xFF, 0x12]); // JMP ($12FF)
        load(&bus, 0x12FF, &[0x34]);
        load(&bus, 0x1200, &[0xAA]); // bugged NMOS source, must not be read
        load(&bus, 0x1300, &[0x12]); // correct 65C02 source
        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.regs.pc, 0x1234);
    }

    #[test]
    fn bbr_branches_when_bit_clear() {
        let (mut cpu, bus) = new_machine();
        let mut signals = SignalBus::new();
        cpu.regs.pc = 0x0200;
        load(&bus, 0x0010, &[0x00]);
        load(&bus, 0x0200, &[0x0F, 0x10, 0x05]); // BBR0 $10, +5
        run_one(&mut cpu, &bus, &mut signals);
        assert_eq!(cpu.regs.pc, 0x0208);
    }
}
