//! Address-keyed trap registry.
//!
//! A trap lets host code intercept execution at a particular PC before the
//! CPU fetches the real opcode there — the machine crate uses this to
//! fast-path ROM routines (Applesoft's `FLTASC`, say) instead of
//! interpreting thousands of real 6502 cycles to get the same answer.

use std::collections::HashMap;

use crate::registers::Registers;

/// How a trap hands control back to the code that "called" it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnMethod {
    /// The trap already left `pc` where execution should continue.
    None,
    /// Pop a return address off the stack the way a real `RTS` would,
    /// advancing past it by one, then jump there (or to `return_address`
    /// if given, while still balancing the stack).
    Rts,
    /// Pop flags and a return address off the stack, as `RTI` would.
    Rti,
}

/// What a trap handler reports back after running.
#[derive(Debug, Clone, Copy)]
pub struct TrapOutcome {
    pub handled: bool,
    pub cycles_consumed: u64,
    pub return_method: ReturnMethod,
    pub return_address: Option<u16>,
}

impl TrapOutcome {
    #[must_use]
    pub const fn not_handled() -> Self {
        Self {
            handled: false,
            cycles_consumed: 0,
            return_method: ReturnMethod::None,
            return_address: None,
        }
    }
}

type TrapHandler = Box<dyn FnMut(&mut Registers) -> TrapOutcome>;

/// Maps PC values to host-side handlers checked once per instruction, right
/// before the real opcode fetch.
#[derive(Default)]
pub struct TrapRegistry {
    handlers: HashMap<u16, TrapHandler>,
}

impl TrapRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, address: u16, handler: TrapHandler) {
        self.handlers.insert(address, handler);
    }

    pub fn unregister(&mut self, address: u16) {
        self.handlers.remove(&address);
    }

    #[must_use]
    pub fn is_trapped(&self, address: u16) -> bool {
        self.handlers.contains_key(&address)
    }

    /// Run the handler registered at `address`, if any.
    pub fn fire(&mut self, address: u16, regs: &mut Registers) -> Option<TrapOutcome> {
        self.handlers.get_mut(&address).map(|handler| handler(regs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_address_is_not_trapped() {
        let registry = TrapRegistry::new();
        assert!(!registry.is_trapped(0xFDED));
    }

    #[test]
    fn registered_handler_fires_with_outcome() {
        let mut registry = TrapRegistry::new();
        registry.register(
            0xFDED,
            Box::new(|regs| {
                regs.a = 0x41;
                TrapOutcome {
                    handled: true,
                    cycles_consumed: 12,
                    return_method: ReturnMethod::Rts,
                    return_address: None,
                }
            }),
        );

        let mut regs = Registers::new();
        let outcome = registry.fire(0xFDED, &mut regs).unwrap();
        assert!(outcome.handled);
        assert_eq!(regs.a, 0x41);
    }
}
