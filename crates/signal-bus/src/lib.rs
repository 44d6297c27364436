//! The interrupt signal bus.
//!
//! `IRQ` is level-triggered: any number of devices can hold it asserted at
//! once, and it stays asserted until every holder has deasserted. `NMI` is
//! edge-triggered: a transition from "nobody holding it" to "someone holding
//! it" posts a single pending edge, consumed exactly once by the CPU on
//! acknowledgment. Holding NMI continuously (or re-asserting before
//! deasserting) never posts a second edge.

use std::collections::HashSet;

use emu_core::Cycle;

/// Identifies the device asserting or deasserting a line, so that one
/// source's deassert doesn't clear a line another source is still holding.
pub type SourceId = u32;

/// An interrupt line on the signal bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalLine {
    Irq,
    Nmi,
    Reset,
}

/// Shared interrupt signal bus.
#[derive(Debug, Default)]
pub struct SignalBus {
    irq_holders: HashSet<SourceId>,
    nmi_holders: HashSet<SourceId>,
    reset_holders: HashSet<SourceId>,
    nmi_edge_pending: bool,
}

impl SignalBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert `line` on behalf of `source_id`.
    ///
    /// `cycle` is accepted for trace/debug purposes (callers that log signal
    /// history may want it); the bus itself is level/edge state only and
    /// does not otherwise use it.
    pub fn assert(&mut self, line: SignalLine, source_id: SourceId, _cycle: Cycle) {
        match line {
            SignalLine::Irq => {
                self.irq_holders.insert(source_id);
            }
            SignalLine::Nmi => {
                // Only a transition from "not held" to "held" by this source
                // posts a new edge; a source re-asserting while it already
                // holds the line changes nothing.
                if self.nmi_holders.insert(source_id) {
                    self.nmi_edge_pending = true;
                }
            }
            SignalLine::Reset => {
                self.reset_holders.insert(source_id);
            }
        }
    }

    /// Deassert `line` on behalf of `source_id`. A no-op if that source was
    /// not holding the line.
    pub fn deassert(&mut self, line: SignalLine, source_id: SourceId) {
        match line {
            SignalLine::Irq => {
                self.irq_holders.remove(&source_id);
            }
            SignalLine::Nmi => {
                self.nmi_holders.remove(&source_id);
            }
            SignalLine::Reset => {
                self.reset_holders.remove(&source_id);
            }
        }
    }

    /// Whether any source currently holds `line` asserted.
    ///
    /// For `Nmi` this reflects whether an edge is still pending consumption,
    /// since NMI has no meaningful "level" once a source re-asserts.
    #[must_use]
    pub fn is_asserted(&self, line: SignalLine) -> bool {
        match line {
            SignalLine::Irq => !self.irq_holders.is_empty(),
            SignalLine::Nmi => self.nmi_edge_pending,
            SignalLine::Reset => !self.reset_holders.is_empty(),
        }
    }

    /// Consume a pending NMI edge. Returns `true` at most once per edge.
    pub fn consume_nmi_edge(&mut self) -> bool {
        std::mem::take(&mut self.nmi_edge_pending)
    }

    /// Clear all holders and pending edges (power-on / scheduler reset).
    pub fn reset(&mut self) {
        self.irq_holders.clear();
        self.nmi_holders.clear();
        self.reset_holders.clear();
        self.nmi_edge_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq_is_level_and_sums_sources() {
        let mut bus = SignalBus::new();
        bus.assert(SignalLine::Irq, 1, Cycle::ZERO);
        bus.assert(SignalLine::Irq, 2, Cycle::ZERO);
        assert!(bus.is_asserted(SignalLine::Irq));

        bus.deassert(SignalLine::Irq, 1);
        assert!(bus.is_asserted(SignalLine::Irq), "source 2 still holds it");

        bus.deassert(SignalLine::Irq, 2);
        assert!(!bus.is_asserted(SignalLine::Irq));
    }

    #[test]
    fn nmi_edge_fires_once_per_assert() {
        let mut bus = SignalBus::new();
        bus.assert(SignalLine::Nmi, 1, Cycle::ZERO);
        assert!(bus.consume_nmi_edge());
        assert!(!bus.consume_nmi_edge(), "edge already consumed");
    }

    #[test]
    fn nmi_reassert_without_deassert_does_not_requeue() {
        let mut bus = SignalBus::new();
        bus.assert(SignalLine::Nmi, 1, Cycle::ZERO);
        assert!(bus.consume_nmi_edge());

        // Same source re-asserts without an intervening deassert: no new edge.
        bus.assert(SignalLine::Nmi, 1, Cycle::ZERO);
        assert!(!bus.consume_nmi_edge());
    }

    #[test]
    fn nmi_deassert_then_reassert_posts_new_edge() {
        let mut bus = SignalBus::new();
        bus.assert(SignalLine::Nmi, 1, Cycle::ZERO);
        assert!(bus.consume_nmi_edge());

        bus.deassert(SignalLine::Nmi, 1);
        bus.assert(SignalLine::Nmi, 1, Cycle::ZERO);
        assert!(bus.consume_nmi_edge());
    }

    #[test]
    fn reset_clears_everything() {
        let mut bus = SignalBus::new();
        bus.assert(SignalLine::Irq, 1, Cycle::ZERO);
        bus.assert(SignalLine::Nmi, 1, Cycle::ZERO);
        bus.reset();
        assert!(!bus.is_asserted(SignalLine::Irq));
        assert!(!bus.consume_nmi_edge());
    }
}
