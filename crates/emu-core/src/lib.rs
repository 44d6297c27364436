//! Core types shared across the machine emulator crates.
//!
//! Everything in this workspace measures time in [`Cycle`]s of the 65C02's
//! own clock (there is no separate master crystal to divide down from, as
//! there would be on a system with independently clocked chips). Addresses
//! are expressed in the widened [`Address`] space so the bus's page map has
//! room for bank-switched memory above the CPU's 16-bit reach.

mod address;
mod cycle;
mod observable;

pub use address::{offset_in_page, page_of, Address, Byte, DWord, Word, PAGE_COUNT, PAGE_SIZE};
pub use cycle::Cycle;
pub use observable::{Observable, Value};
