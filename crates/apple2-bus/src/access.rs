//! The value record threaded through every bus access, so a target can tell
//! a real CPU fetch from a debugger peek without a second code path.

use emu_core::{Address, Byte, Cycle};

/// Why this access is happening. Devices that mutate state on read (the
/// keyboard's strobe-clear, the video soft switches) consult this to decide
/// whether a debugger peek should count as a "real" read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    InstructionFetch,
    DataRead,
    DataWrite,
    DebugRead,
    DebugWrite,
}

impl Intent {
    /// Debug accesses never fire device side effects, regardless of what the
    /// caller put in `AccessFlags`.
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::DebugRead | Self::DebugWrite)
    }
}

/// How a multi-byte access is carried out against the page map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Split into independent 8-bit accesses, each re-entering the page map
    /// and I/O dispatcher on its own. This is what the CPU always uses —
    /// a 65C02 has no wide bus cycle, so a 16-bit operand read really is two
    /// separate 8-bit reads a cycle apart.
    Decomposed,
    /// A single wide access against one target, for tooling (the debugger's
    /// "read this u16") that wants the value without the side effects of two
    /// separate dispatches. Only targets advertising the matching
    /// `Capabilities::SUPPORTS_ATOMIC16`/`32` bit accept this mode.
    Atomic,
}

/// A bitset of extra conditions attached to an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessFlags(u8);

impl AccessFlags {
    /// The access must not be allowed to mutate device state, even if its
    /// `Intent` would normally do so (a debugger peek through a register
    /// that clears-on-read, for instance).
    pub const NO_SIDE_EFFECTS: Self = Self(1 << 0);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// A pending (or just-completed) bus access, passed by reference to every
/// target and I/O handler so they can see the full context of the access
/// without a dozen separate parameters.
#[derive(Debug, Clone, Copy)]
pub struct BusAccess {
    pub address: Address,
    /// The value being written. Ignored by targets on a read.
    pub value: Byte,
    /// Width of the logical access in bits: 8, 16, or 32.
    pub width_bits: u8,
    pub mode: AccessMode,
    /// The 65C02's `E` (emulation) flag at the time of the access. Always
    /// `true` on this CPU; threaded through for targets shared with a future
    /// wider core.
    pub emulation: bool,
    pub intent: Intent,
    pub source_id: u32,
    pub cycle: Cycle,
    pub flags: AccessFlags,
}

impl BusAccess {
    /// Build the access a CPU instruction fetch or operand read/write makes:
    /// decomposed, full side effects, tagged with the CPU's source id.
    #[must_use]
    pub fn cpu(address: Address, intent: Intent, source_id: u32, cycle: Cycle) -> Self {
        Self {
            address,
            value: 0,
            width_bits: 8,
            mode: AccessMode::Decomposed,
            emulation: true,
            intent,
            source_id,
            cycle,
            flags: AccessFlags::empty(),
        }
    }

    /// Build a side-effect-free debugger peek.
    #[must_use]
    pub fn debug_peek(address: Address, cycle: Cycle) -> Self {
        Self {
            address,
            value: 0,
            width_bits: 8,
            mode: AccessMode::Decomposed,
            emulation: true,
            intent: Intent::DebugRead,
            source_id: u32::MAX,
            cycle,
            flags: AccessFlags::NO_SIDE_EFFECTS,
        }
    }

    #[must_use]
    pub const fn suppresses_side_effects(&self) -> bool {
        self.intent.is_debug() || self.flags.contains(AccessFlags::NO_SIDE_EFFECTS)
    }
}
