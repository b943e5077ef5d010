//! Snoop controller.
//!
//! Watches every address cycle on the bus, including this component's own
//! write drains. An external write that matches a valid data cache line
//! raises an invalidation request toward the data cache controller; a write
//! that matches the LL/SC reservation clears it outright, hit or miss.
//!
//! The controller tracks one invalidation at a time. A second external hit
//! while one is still outstanding, or a configured run of consecutive
//! external hits with no intervening local data access, escalates to a full
//! flush — bounded worst-case cost instead of per-line bookkeeping.

use crate::bus::BusInputs;
use crate::cache::CacheArray;
use crate::ctrl::{LlscReservation, SnoopInval};

/// Snoop controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SnoopState {
    /// Watching the bus.
    #[default]
    Idle,
    /// An invalidation request is outstanding.
    Inval,
    /// A flush request is outstanding.
    Flush,
}

/// Snoop controller registers.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SnoopRegs {
    /// Current state.
    pub state: SnoopState,
    /// Consecutive external hits with no intervening local access.
    pub streak: u32,
    /// Address of the previous external hit.
    pub last_addr: u32,
}

/// Per-cycle inputs.
pub(crate) struct SnoopInputs<'a> {
    /// Bus pins (the `avalid`/`addr`/`read` feed).
    pub bus: &'a BusInputs,
    /// Data cache array (probed, never mutated here).
    pub dcache: &'a CacheArray,
    /// Current LL/SC reservation.
    pub llsc: &'a LlscReservation,
    /// The processor presented a data request this cycle.
    pub local_access: bool,
    /// The previously posted invalidation has not been honored yet.
    pub inval_pending: bool,
    /// The previously posted flush has not been honored yet.
    pub flush_pending: bool,
    /// Snoop mechanism enabled at construction.
    pub enabled: bool,
    /// Consecutive-hit count that escalates to a flush.
    pub flush_threshold: u32,
}

/// Commit-phase effects.
#[derive(Debug, Default)]
pub(crate) struct SnoopEffects {
    /// Invalidation request to latch toward the data cache controller.
    pub post_inval: Option<SnoopInval>,
    /// Flush request to latch toward the data cache controller.
    pub post_flush: bool,
    /// Clear the LL/SC reservation (external write on the reserved word).
    pub clear_llsc: bool,
}

/// Result of one combinational evaluation.
#[derive(Debug)]
pub(crate) struct SnoopTransition {
    /// Next register values.
    pub next: SnoopRegs,
    /// Effects to apply at commit.
    pub effects: SnoopEffects,
}

/// Computes the controller's next state from current registers and inputs.
pub(crate) fn transition(regs: &SnoopRegs, inputs: &SnoopInputs<'_>) -> SnoopTransition {
    let mut next = *regs;
    let mut effects = SnoopEffects::default();

    if !inputs.enabled {
        return SnoopTransition { next, effects };
    }

    let ext_write = inputs.bus.avalid && !inputs.bus.read;

    // The reservation is guarded regardless of cache hit or miss.
    if ext_write && inputs.llsc.pending && (inputs.bus.addr & !3) == inputs.llsc.addr {
        effects.clear_llsc = true;
    }

    let ext_hit = ext_write && inputs.dcache.lookup(inputs.bus.addr).is_some();

    match regs.state {
        SnoopState::Idle => {
            if ext_hit {
                external_hit(regs, inputs, &mut next, &mut effects);
            } else if inputs.local_access {
                next.streak = 0;
            }
        }

        SnoopState::Inval => {
            if inputs.inval_pending {
                let same_line = inputs.dcache.line_base(inputs.bus.addr)
                    == inputs.dcache.line_base(regs.last_addr);
                if ext_hit && !same_line {
                    // Only one invalidation can be tracked; a hit on a
                    // second line while it is outstanding forces the flush
                    // path. Repeats on the line already being invalidated
                    // are covered by the pending request.
                    next.streak = regs.streak + 1;
                    next.last_addr = inputs.bus.addr;
                    next.state = SnoopState::Flush;
                    effects.post_flush = true;
                }
            } else if ext_hit {
                external_hit(regs, inputs, &mut next, &mut effects);
            } else {
                next.state = SnoopState::Idle;
                if inputs.local_access {
                    next.streak = 0;
                }
            }
        }

        SnoopState::Flush => {
            if !inputs.flush_pending {
                next.state = SnoopState::Idle;
                next.streak = 0;
            }
        }
    }

    SnoopTransition { next, effects }
}

/// Handles a fresh external hit: invalidate the line, or flush once the
/// consecutive-hit streak reaches the configured threshold.
fn external_hit(
    regs: &SnoopRegs,
    inputs: &SnoopInputs<'_>,
    next: &mut SnoopRegs,
    effects: &mut SnoopEffects,
) {
    let streak = if inputs.local_access {
        1
    } else {
        regs.streak + 1
    };
    next.streak = streak;
    next.last_addr = inputs.bus.addr;

    if streak >= inputs.flush_threshold {
        next.state = SnoopState::Flush;
        effects.post_flush = true;
    } else if let Some(hit) = inputs.dcache.lookup(inputs.bus.addr) {
        next.state = SnoopState::Inval;
        effects.post_inval = Some(SnoopInval {
            set: inputs.dcache.set_of(inputs.bus.addr),
            way: hit.way,
        });
    }
}
