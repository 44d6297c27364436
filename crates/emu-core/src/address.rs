//! Address space and fixed-width integer aliases shared by every crate that
//! talks to the bus.

/// A 24-bit virtual address. The 65C02 itself only ever drives the low 16
/// bits; the extra bits exist so a future wider CPU (or a debugger) can
/// address the same virtual space without a second address type.
pub type Address = u32;

/// An 8-bit byte, as stored in memory or a register.
pub type Byte = u8;

/// A 16-bit word, as held in PC or a two-byte memory operand.
pub type Word = u16;

/// A 32-bit double word, used for wide bus accesses.
pub type DWord = u32;

/// Size of a page in the layered memory map.
pub const PAGE_SIZE: Address = 0x1000;

/// Number of pages in the full 24-bit virtual space.
pub const PAGE_COUNT: usize = (1usize << 24) / PAGE_SIZE as usize;

/// Page index (0..`PAGE_COUNT`) that an address falls into.
#[must_use]
pub const fn page_of(address: Address) -> usize {
    (address / PAGE_SIZE) as usize
}

/// Offset of an address within its 4 KiB page.
#[must_use]
pub const fn offset_in_page(address: Address) -> Address {
    address % PAGE_SIZE
}
