//! Instruction cache controller.
//!
//! Read-only twin of the data path: cacheable fetches are served from the
//! cache array the same cycle they hit; misses evict a pseudo-LRU victim
//! and refill one line over the bus; uncacheable fetches bypass the array
//! with a single-word bus read. Fetches are never buffered, so bus errors
//! on this path are always precise.

use crate::bus::{BusKind, BusRequest, BusResult};
use crate::cache::CacheArray;
use crate::cacheability::CacheabilityTable;
use crate::common::MAX_LINE_WORDS;
use crate::ctrl::CacheOp;
use crate::proc::{InstRequest, InstResponse};

/// Instruction cache controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum IcacheState {
    /// Serving fetches combinationally.
    #[default]
    Idle,
    /// Choosing the pseudo-LRU victim for a refill.
    MissSelect,
    /// Invalidating an occupied victim line.
    MissInval,
    /// Refill transaction in flight.
    MissWait,
    /// Writing the refilled line into the array.
    MissUpdt,
    /// Uncached read transaction in flight.
    UncWait,
    /// Delivering uncached read data.
    UncGo,
    /// Reporting a precise fetch bus error.
    Error,
}

/// Fields captured when a fetch leaves the combinational path.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IcacheSave {
    /// Fetch address.
    pub addr: u32,
    /// Set index of `addr`.
    pub set: usize,
    /// Victim way (valid from `MissSelect` on).
    pub way: usize,
}

/// Instruction cache controller registers.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IcacheRegs {
    /// Current state.
    pub state: IcacheState,
    /// Saved request fields.
    pub save: IcacheSave,
}

/// Per-cycle inputs.
pub(crate) struct IcacheInputs<'a> {
    /// Fetch request presented this cycle.
    pub req: &'a InstRequest,
    /// Instruction cache array (probed, never mutated here).
    pub cache: &'a CacheArray,
    /// Cacheability classification.
    pub cacheable: &'a CacheabilityTable,
    /// Bus engine completion report, if latched.
    pub reply: Option<BusResult>,
    /// Bus engine line buffer (stable once a transaction completed).
    pub line_buf: &'a [u32; MAX_LINE_WORDS],
}

/// Commit-phase effects.
#[derive(Debug, Default)]
pub(crate) struct IcacheEffects {
    /// Cache array mutation.
    pub op: Option<CacheOp>,
    /// Bus request to latch toward the engine.
    pub bus_req: Option<BusRequest>,
    /// Clear the reply latch.
    pub consume_reply: bool,
    /// A fetch was served with data this cycle.
    pub served_fetch: bool,
    /// A line refill was initiated this cycle.
    pub start_miss: bool,
    /// An uncached fetch was initiated this cycle.
    pub start_unc: bool,
}

/// Result of one combinational evaluation.
#[derive(Debug)]
pub(crate) struct IcacheTransition {
    /// Next register values.
    pub next: IcacheRegs,
    /// Fetch response for this cycle.
    pub rsp: InstResponse,
    /// Effects to apply at commit.
    pub effects: IcacheEffects,
}

/// Computes the controller's next state from current registers and inputs.
pub(crate) fn transition(regs: &IcacheRegs, inputs: &IcacheInputs<'_>) -> IcacheTransition {
    let mut next = *regs;
    let mut effects = IcacheEffects::default();
    let rsp = match regs.state {
        IcacheState::Idle => {
            if !inputs.req.valid {
                InstResponse::Retry
            } else if inputs.cacheable.is_cacheable(inputs.req.addr) {
                if let Some(hit) = inputs.cache.lookup(inputs.req.addr) {
                    effects.op = Some(CacheOp::Touch {
                        set: inputs.cache.set_of(inputs.req.addr),
                        way: hit.way,
                    });
                    effects.served_fetch = true;
                    InstResponse::Inst(hit.data)
                } else {
                    next.save = IcacheSave {
                        addr: inputs.req.addr,
                        set: inputs.cache.set_of(inputs.req.addr),
                        way: 0,
                    };
                    next.state = IcacheState::MissSelect;
                    effects.start_miss = true;
                    InstResponse::Retry
                }
            } else {
                next.save.addr = inputs.req.addr;
                next.state = IcacheState::UncWait;
                effects.bus_req = Some(BusRequest::read(BusKind::InstUnc, inputs.req.addr, 1));
                effects.start_unc = true;
                InstResponse::Retry
            }
        }

        IcacheState::MissSelect => {
            let way = inputs.cache.select_victim(regs.save.set);
            next.save.way = way;
            if inputs.cache.line_valid(regs.save.set, way) {
                next.state = IcacheState::MissInval;
            } else {
                next.state = IcacheState::MissWait;
                effects.bus_req = Some(refill_request(inputs.cache, regs.save.addr));
            }
            InstResponse::Retry
        }

        IcacheState::MissInval => {
            effects.op = Some(CacheOp::Invalidate {
                set: regs.save.set,
                way: regs.save.way,
            });
            next.state = IcacheState::MissWait;
            effects.bus_req = Some(refill_request(inputs.cache, regs.save.addr));
            InstResponse::Retry
        }

        IcacheState::MissWait => {
            match inputs.reply {
                Some(BusResult::Ok) => {
                    effects.consume_reply = true;
                    next.state = IcacheState::MissUpdt;
                }
                Some(BusResult::Error) => {
                    effects.consume_reply = true;
                    next.state = IcacheState::Error;
                }
                None => {}
            }
            InstResponse::Retry
        }

        IcacheState::MissUpdt => {
            // The refilled line lands in the array; the held fetch re-probes
            // next cycle and hits.
            effects.op = Some(CacheOp::Fill {
                addr: regs.save.addr,
                way: regs.save.way,
            });
            next.state = IcacheState::Idle;
            InstResponse::Retry
        }

        IcacheState::UncWait => {
            match inputs.reply {
                Some(BusResult::Ok) => {
                    effects.consume_reply = true;
                    next.state = IcacheState::UncGo;
                }
                Some(BusResult::Error) => {
                    effects.consume_reply = true;
                    next.state = IcacheState::Error;
                }
                None => {}
            }
            InstResponse::Retry
        }

        IcacheState::UncGo => {
            next.state = IcacheState::Idle;
            effects.served_fetch = true;
            InstResponse::Inst(inputs.line_buf[0])
        }

        IcacheState::Error => {
            next.state = IcacheState::Idle;
            InstResponse::Error
        }
    };

    IcacheTransition { next, rsp, effects }
}

/// Builds the burst read request refilling the line containing `addr`.
fn refill_request(cache: &CacheArray, addr: u32) -> BusRequest {
    BusRequest::read(
        BusKind::InstMiss,
        cache.line_base(addr),
        cache.words_per_line() as u8,
    )
}
