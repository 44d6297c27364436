//! The layered, paged memory map. Bank switching (the language card, the
//! 80-column aux card) is modeled as activating and deactivating whole
//! layers rather than rewriting page table entries: a layer's pages never
//! move, so a device only ever flips a bool to take effect.

use std::cell::RefCell;
use std::rc::Rc;

use emu_core::{offset_in_page, page_of, Address, PAGE_COUNT, PAGE_SIZE};

use crate::access::{BusAccess, Intent};
use crate::fault::Fault;
use crate::target::BusTarget;

/// Read/write/execute permission bits a layer grants over its pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Perms(u8);

impl Perms {
    pub const READ: Self = Self(1 << 0);
    pub const WRITE: Self = Self(1 << 1);
    pub const EXEC: Self = Self(1 << 2);
    pub const READ_WRITE: Self = Self(Self::READ.0 | Self::WRITE.0);
    pub const READ_EXEC: Self = Self(Self::READ.0 | Self::EXEC.0);
    pub const READ_WRITE_EXEC: Self = Self(Self::READ.0 | Self::WRITE.0 | Self::EXEC.0);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// The permission a layer must grant for a given [`Intent`] to succeed, or
/// `None` if the intent bypasses the permission check entirely.
///
/// Per the spec's access algorithm: `InstructionFetch` requires `EXEC`;
/// `DataRead`/`DebugRead` require `READ`; `DataWrite` requires `WRITE`;
/// `DebugWrite` (a debugger poke) bypasses the write check so a debugger
/// can poke read-only ROM.
const fn required_perm(intent: Intent) -> Option<Perms> {
    match intent {
        Intent::InstructionFetch => Some(Perms::EXEC),
        Intent::DataRead | Intent::DebugRead => Some(Perms::READ),
        Intent::DataWrite => Some(Perms::WRITE),
        Intent::DebugWrite => None,
    }
}

/// One entry in the layer stack: a contiguous page-aligned range backed by
/// one target, with its own permissions and an independent active bit.
pub struct Layer {
    pub name: &'static str,
    base_page: usize,
    page_count: usize,
    perms: Perms,
    active: bool,
    target: Rc<RefCell<dyn BusTarget>>,
}

impl Layer {
    fn covers(&self, page: usize) -> bool {
        self.active && page >= self.base_page && page < self.base_page + self.page_count
    }

    fn base_address(&self) -> Address {
        (self.base_page as Address) * PAGE_SIZE
    }
}

/// The ordered layer stack the CPU and debugger both resolve addresses
/// through. Layers are searched from the end of the stack backwards, so the
/// most recently pushed layer that covers an address and is active wins —
/// exactly the priority a bank-switch-by-activation model needs: push the
/// expansion ROM layer on top of built-in ROM, and flipping it off reveals
/// what was underneath without moving anything.
#[derive(Default)]
pub struct PageMap {
    layers: Vec<Layer>,
}

impl PageMap {
    #[must_use]
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a new layer covering `page_count` pages starting at `base`,
    /// which must be page-aligned. Returns the layer's index, used with
    /// [`PageMap::set_active`] to bank-switch it later.
    pub fn add_layer(
        &mut self,
        name: &'static str,
        base: Address,
        page_count: usize,
        perms: Perms,
        active: bool,
        target: Rc<RefCell<dyn BusTarget>>,
    ) -> usize {
        assert_eq!(base % PAGE_SIZE, 0, "layer base must be page-aligned");
        assert!(
            page_of(base) + page_count <= PAGE_COUNT,
            "layer extends past the addressable page space"
        );
        self.layers.push(Layer {
            name,
            base_page: page_of(base),
            page_count,
            perms,
            active,
            target,
        });
        self.layers.len() - 1
    }

    pub fn set_active(&mut self, index: usize, active: bool) {
        self.layers[index].active = active;
    }

    #[must_use]
    pub fn is_active(&self, index: usize) -> bool {
        self.layers[index].active
    }

    fn find_layer(&self, address: Address, intent: Intent) -> Result<usize, Fault> {
        let page = page_of(address);
        self.layers
            .iter()
            .enumerate()
            .rev()
            .find(|(_, layer)| layer.covers(page))
            .map_or(Err(Fault::Unmapped(address)), |(index, layer)| {
                match required_perm(intent) {
                    Some(required) if !layer.perms.contains(required) => Err(Fault::PermissionDenied(address)),
                    _ => Ok(index),
                }
            })
    }

    /// Resolve `address` under the permission `intent` demands and run `f`
    /// against the covering layer's target and its address translated into
    /// the target's own offset space.
    fn with_target<T>(
        &self,
        address: Address,
        intent: Intent,
        f: impl FnOnce(&Rc<RefCell<dyn BusTarget>>, Address) -> T,
    ) -> Result<T, Fault> {
        let index = self.find_layer(address, intent)?;
        let layer = &self.layers[index];
        let phys = address - layer.base_address();
        Ok(f(&layer.target, phys))
    }

    pub fn read8(&self, access: &BusAccess) -> Result<u8, Fault> {
        self.with_target(access.address, access.intent, |target, phys| {
            target.borrow_mut().read8(phys, access)
        })
    }

    pub fn write8(&self, access: &BusAccess) -> Result<(), Fault> {
        self.with_target(access.address, access.intent, |target, phys| {
            target.borrow_mut().write8(phys, access);
        })
    }

    /// A side-effect-free peek, for the debugger. Checks `DebugRead`
    /// permission (same as a real debug read) but never reaches a target's
    /// mutating path.
    pub fn peek8(&self, address: Address) -> Result<u8, Fault> {
        self.with_target(address, Intent::DebugRead, |target, phys| target.borrow().peek8(phys))
    }

    /// A debugger poke: bypasses the write-permission check (per
    /// [`required_perm`]) so a debugger can write into read-only ROM.
    pub fn poke8(&self, address: Address, value: u8) -> Result<(), Fault> {
        self.with_target(address, Intent::DebugWrite, |target, phys| {
            target.borrow_mut().poke8(phys, value);
        })
    }

    #[must_use]
    pub fn layer_name(&self, index: usize) -> &'static str {
        self.layers[index].name
    }

    pub fn capabilities_at(&self, address: Address) -> Result<crate::target::Capabilities, Fault> {
        self.with_target(address, Intent::DebugRead, |target, _phys| target.borrow().capabilities())
    }
}

#[must_use]
pub const fn page_offset(address: Address) -> Address {
    offset_in_page(address)
}
