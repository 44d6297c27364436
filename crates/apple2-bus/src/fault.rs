//! Reasons a bus access can fail instead of completing.

use emu_core::Address;

/// Why a bus access didn't produce (or accept) a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// No active layer covers this address.
    Unmapped(Address),
    /// A layer covers the address but its permissions reject this kind of
    /// access (a write to a ROM page, for instance).
    PermissionDenied(Address),
    /// The target itself refused the access (an `Atomic` request against a
    /// target that doesn't support it at this width).
    TargetRejected(Address),
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unmapped(addr) => write!(f, "unmapped address ${addr:06X}"),
            Self::PermissionDenied(addr) => write!(f, "permission denied at ${addr:06X}"),
            Self::TargetRejected(addr) => write!(f, "access rejected at ${addr:06X}"),
        }
    }
}

impl std::error::Error for Fault {}
