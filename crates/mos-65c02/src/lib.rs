//! A cycle-stepped 65C02 core: the WDC variant of the 6502 family, with its
//! documented hardware fixes and additions over NMOS (BRA, PHX/PHY/PLX/PLY,
//! STZ, TRB/TSB, `(zp)` addressing, the BBR/BBS/RMB/SMB bit-test family,
//! WAI/STP, and the `JMP (abs)` page-wrap fix) layered on top of the
//! original instruction set.
//!
//! [`Cpu65C02::step`] runs exactly one instruction (or one tick of
//! interrupt/halt bookkeeping) and returns how many cycles it took; the
//! caller is responsible for committing that count to its own scheduler.
//! This crate never depends on the scheduler's event `Kind` — it only needs
//! to know the current cycle, supplied as a plain [`emu_core::Cycle`].

mod addressing;
mod cpu;
mod flags;
mod opcodes;
mod registers;
mod traps;

pub use addressing::AddressingMode;
pub use cpu::{Cpu65C02, HaltState, InstructionTrace};
pub use flags::Status;
pub use opcodes::{opcode_info, OpcodeInfo};
pub use registers::Registers;
pub use traps::{ReturnMethod, TrapOutcome, TrapRegistry};
