//! The $C000-$C0FF soft-switch page: a 256-entry table mapping byte offsets
//! to device handlers, registered once at machine-wiring time instead of
//! matched inline. Several offsets commonly alias the same device (the
//! keyboard's data and strobe-clear registers, for instance), so handlers
//! are reference-counted rather than owned outright by the table.

use std::cell::RefCell;
use std::rc::Rc;

use emu_core::Byte;

use crate::access::BusAccess;
use crate::target::{BusTarget, Capabilities};

/// A device that answers reads and writes on one or more I/O page offsets.
pub trait IoHandler {
    /// Read register `offset` (0..=0xFF, relative to $C000).
    fn io_read(&mut self, offset: u8, access: &BusAccess) -> Byte;

    /// Write `value` to register `offset`.
    fn io_write(&mut self, offset: u8, value: Byte, access: &BusAccess);
}

type HandlerRef = Rc<RefCell<dyn IoHandler>>;

/// The I/O page's offset-to-handler registration table.
pub struct IoPageDispatcher {
    read_handlers: Vec<Option<HandlerRef>>,
    write_handlers: Vec<Option<HandlerRef>>,
}

impl Default for IoPageDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl IoPageDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            read_handlers: (0..256).map(|_| None).collect(),
            write_handlers: (0..256).map(|_| None).collect(),
        }
    }

    pub fn register_read(&mut self, offset: u8, handler: HandlerRef) {
        self.read_handlers[offset as usize] = Some(handler);
    }

    pub fn register_write(&mut self, offset: u8, handler: HandlerRef) {
        self.write_handlers[offset as usize] = Some(handler);
    }

    /// Register the same handler for both directions of `offset`.
    pub fn register(&mut self, offset: u8, handler: HandlerRef) {
        self.register_read(offset, handler.clone());
        self.register_write(offset, handler);
    }

    /// Register the same handler across an inclusive range of offsets, for
    /// devices like the language card that decode several adjacent
    /// addresses with one piece of logic.
    pub fn register_range(&mut self, offsets: std::ops::RangeInclusive<u8>, handler: HandlerRef) {
        for offset in offsets {
            self.register(offset, handler.clone());
        }
    }

    #[must_use]
    pub fn dispatch_read(&self, offset: u8, access: &BusAccess) -> Byte {
        match &self.read_handlers[offset as usize] {
            Some(handler) => handler.borrow_mut().io_read(offset, access),
            // Floating bus: an unmapped soft switch reads as whatever was
            // last driven on the data bus. We don't model the floating bus
            // value, so $FF is the conservative stand-in real hardware
            // rarely actually returns but software shouldn't rely on.
            None => 0xFF,
        }
    }

    pub fn dispatch_write(&self, offset: u8, value: Byte, access: &BusAccess) {
        if let Some(handler) = &self.write_handlers[offset as usize] {
            handler.borrow_mut().io_write(offset, value, access);
        }
    }
}

impl BusTarget for IoPageDispatcher {
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn read8(&mut self, phys_addr: emu_core::Address, access: &BusAccess) -> Byte {
        self.dispatch_read(phys_addr as u8, access)
    }

    fn write8(&mut self, phys_addr: emu_core::Address, access: &BusAccess) {
        self.dispatch_write(phys_addr as u8, access.value, access);
    }
}
