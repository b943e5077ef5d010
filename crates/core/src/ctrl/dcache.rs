//! Data cache controller.
//!
//! Services loads, stores, LL/SC and line invalidates. Policy summary:
//! write-through with a FIFO write buffer (stores acknowledge as soon as
//! their entry is enqueued, the cached copy is only updated on hit), read
//! misses refill one line with the processor held, uncacheable reads bypass
//! the array, and snoop invalidation requests are honored before any new
//! cacheable access is serviced.
//!
//! Bus errors on reads are precise (reported with the failing access). Bus
//! errors on buffered writes are inherently imprecise: the engine records
//! them in a sticky flag which this controller surfaces on the next
//! completed data read, then clears.

use crate::bus::{BusKind, BusRequest, BusResult};
use crate::cache::CacheArray;
use crate::cacheability::CacheabilityTable;
use crate::common::MAX_LINE_WORDS;
use crate::ctrl::{CacheOp, LlscReservation, SnoopInval};
use crate::proc::{DataOp, DataRequest, DataResponse};
use crate::wbuf::{WriteBufferEntry, WriteKind};

/// Data cache controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum DcacheState {
    /// Serving requests combinationally.
    #[default]
    Idle,
    /// Updating the cached copy of an accepted store that hit.
    WriteUpdt,
    /// Post-accept state for a store that missed the cache.
    WriteReq,
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
    /// Reporting a precise read bus error.
    Error,
    /// Completing an explicit line invalidate.
    Inval,
    /// Store-conditional waiting for write buffer space.
    ScWait,
}

/// Fields captured when a request leaves the combinational path.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DcacheSave {
    /// Request address.
    pub addr: u32,
    /// Store data.
    pub wdata: u32,
    /// Byte enable.
    pub be: u8,
    /// Request kind.
    pub op: DataOp,
    /// Set index of `addr`.
    pub set: usize,
    /// Hit way, or victim way during a refill.
    pub way: usize,
    /// Word index of `addr` within its line.
    pub word: usize,
    /// Whether the request hit the array when accepted.
    pub hit: bool,
}

/// Data cache controller registers.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DcacheRegs {
    /// Current state.
    pub state: DcacheState,
    /// Saved request fields.
    pub save: DcacheSave,
    /// LL/SC reservation.
    pub llsc: LlscReservation,
}

/// Per-cycle inputs.
pub(crate) struct DcacheInputs<'a> {
    /// Data request presented this cycle.
    pub req: &'a DataRequest,
    /// Data cache array (probed, never mutated here).
    pub cache: &'a CacheArray,
    /// Cacheability classification.
    pub cacheable: &'a CacheabilityTable,
    /// Write buffer full (sampled at the start of the cycle).
    pub wbuf_full: bool,
    /// Bus engine completion report, if latched.
    pub reply: Option<BusResult>,
    /// Bus engine line buffer (stable once a transaction completed).
    pub line_buf: &'a [u32; MAX_LINE_WORDS],
    /// Sticky write bus-error flag.
    pub write_error: bool,
    /// Pending snoop invalidation request.
    pub snoop_inval: Option<SnoopInval>,
    /// Pending snoop flush request.
    pub snoop_flush: bool,
}

/// Per-cycle counter events.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DcacheStatEvents {
    /// Cacheable read served.
    pub dread: bool,
    /// Line refill initiated.
    pub dmiss: bool,
    /// Uncached read initiated.
    pub dunc: bool,
    /// Store accepted into the write buffer.
    pub write: bool,
    /// Store-conditional succeeded.
    pub sc_ok: bool,
    /// Store-conditional failed.
    pub sc_ko: bool,
}

/// Commit-phase effects.
#[derive(Debug, Default)]
pub(crate) struct DcacheEffects {
    /// Cached-copy update of the previously accepted store (applied first).
    pub updt_op: Option<CacheOp>,
    /// Cache array mutation for this cycle's service.
    pub op: Option<CacheOp>,
    /// Entry to enqueue into the write buffer.
    pub wbuf_push: Option<WriteBufferEntry>,
    /// Bus request to latch toward the engine.
    pub bus_req: Option<BusRequest>,
    /// Clear the reply latch.
    pub consume_reply: bool,
    /// Clear the sticky write bus-error flag (it was surfaced).
    pub clear_write_error: bool,
    /// Clear the snoop invalidation latch (it was honored).
    pub take_snoop_inval: bool,
    /// Clear the snoop flush latch (it was honored).
    pub take_snoop_flush: bool,
    /// Counter events.
    pub stats: DcacheStatEvents,
}

/// Result of one combinational evaluation.
#[derive(Debug)]
pub(crate) struct DcacheTransition {
    /// Next register values.
    pub next: DcacheRegs,
    /// Data response for this cycle.
    pub rsp: DataResponse,
    /// Effects to apply at commit.
    pub effects: DcacheEffects,
}

/// Computes the controller's next state from current registers and inputs.
pub(crate) fn transition(regs: &DcacheRegs, inputs: &DcacheInputs<'_>) -> DcacheTransition {
    let mut next = *regs;
    let mut effects = DcacheEffects::default();

    let rsp = match regs.state {
        DcacheState::Idle => service(regs, inputs, &mut next, &mut effects),

        // The accepted store's cached copy is updated here; a new processor
        // request is serviced in the same cycle (write pipelining).
        DcacheState::WriteUpdt => {
            effects.updt_op = Some(CacheOp::WriteWord {
                set: regs.save.set,
                way: regs.save.way,
                word: regs.save.word,
                data: regs.save.wdata,
                be: regs.save.be,
            });
            service(regs, inputs, &mut next, &mut effects)
        }

        // Store missed the cache: nothing to update, but the state keeps the
        // write path symmetric and remains request-accepting.
        DcacheState::WriteReq => service(regs, inputs, &mut next, &mut effects),

        DcacheState::MissSelect => {
            let way = inputs.cache.select_victim(regs.save.set);
            next.save.way = way;
            if inputs.cache.line_valid(regs.save.set, way) {
                next.state = DcacheState::MissInval;
            } else {
                next.state = DcacheState::MissWait;
                effects.bus_req = Some(refill_request(inputs.cache, regs.save.addr));
            }
            DataResponse::Retry
        }

        DcacheState::MissInval => {
            effects.op = Some(CacheOp::Invalidate {
                set: regs.save.set,
                way: regs.save.way,
            });
            next.state = DcacheState::MissWait;
            effects.bus_req = Some(refill_request(inputs.cache, regs.save.addr));
            DataResponse::Retry
        }

        DcacheState::MissWait => {
            match inputs.reply {
                Some(BusResult::Ok) => {
                    effects.consume_reply = true;
                    next.state = DcacheState::MissUpdt;
                }
                Some(BusResult::Error) => {
                    effects.consume_reply = true;
                    next.state = DcacheState::Error;
                }
                None => {}
            }
            DataResponse::Retry
        }

        DcacheState::MissUpdt => {
            // No fill on error paths: this state is only reached on success,
            // so the refill cannot install corrupt data.
            effects.op = Some(CacheOp::Fill {
                addr: regs.save.addr,
                way: regs.save.way,
            });
            next.state = DcacheState::Idle;
            DataResponse::Retry
        }

        DcacheState::UncWait => {
            match inputs.reply {
                Some(BusResult::Ok) => {
                    effects.consume_reply = true;
                    next.state = DcacheState::UncGo;
                }
                Some(BusResult::Error) => {
                    effects.consume_reply = true;
                    next.state = DcacheState::Error;
                }
                None => {}
            }
            DataResponse::Retry
        }

        DcacheState::UncGo => {
            next.state = DcacheState::Idle;
            if inputs.write_error {
                effects.clear_write_error = true;
                DataResponse::Error
            } else {
                if regs.save.op == DataOp::LoadLinked {
                    next.llsc = LlscReservation {
                        pending: true,
                        addr: regs.save.addr & !3,
                    };
                }
                DataResponse::Data(inputs.line_buf[0])
            }
        }

        DcacheState::Error => {
            // Precise error for this read. A pending sticky write error is
            // folded into the same indication rather than re-reported on the
            // next read.
            if inputs.write_error {
                effects.clear_write_error = true;
            }
            next.state = DcacheState::Idle;
            DataResponse::Error
        }

        DcacheState::Inval => {
            effects.op = Some(CacheOp::Invalidate {
                set: regs.save.set,
                way: regs.save.way,
            });
            next.state = DcacheState::Idle;
            DataResponse::Data(0)
        }

        DcacheState::ScWait => {
            if !regs.llsc.pending || regs.llsc.addr != (regs.save.addr & !3) {
                // The reservation was stolen (snoop) while waiting for
                // buffer space; the conditional store must not reach the bus.
                effects.stats.sc_ko = true;
                next.state = DcacheState::Idle;
                DataResponse::ScFailure
            } else if inputs.wbuf_full {
                DataResponse::Retry
            } else {
                effects.wbuf_push = Some(WriteBufferEntry {
                    addr: regs.save.addr,
                    data: regs.save.wdata,
                    be: 0b1111,
                    kind: WriteKind::Sc,
                });
                if regs.save.hit {
                    effects.op = Some(CacheOp::WriteWord {
                        set: regs.save.set,
                        way: regs.save.way,
                        word: regs.save.word,
                        data: regs.save.wdata,
                        be: 0b1111,
                    });
                }
                next.llsc.pending = false;
                effects.stats.sc_ok = true;
                next.state = DcacheState::Idle;
                DataResponse::ScSuccess
            }
        }
    };

    DcacheTransition { next, rsp, effects }
}

/// IDLE-equivalent request service, shared by the request-accepting states.
///
/// Snoop maintenance always precedes new cacheable work; a consumed snoop
/// request costs one cycle during which the processor request is refused.
fn service(
    regs: &DcacheRegs,
    inputs: &DcacheInputs<'_>,
    next: &mut DcacheRegs,
    effects: &mut DcacheEffects,
) -> DataResponse {
    next.state = DcacheState::Idle;

    if inputs.snoop_flush {
        effects.take_snoop_flush = true;
        effects.op = Some(CacheOp::Flush);
        next.llsc.pending = false;
        return DataResponse::Retry;
    }
    if let Some(inval) = inputs.snoop_inval {
        effects.take_snoop_inval = true;
        effects.op = Some(CacheOp::Invalidate {
            set: inval.set,
            way: inval.way,
        });
        return DataResponse::Retry;
    }

    let req = inputs.req;
    if !req.valid {
        return DataResponse::Retry;
    }

    match req.op {
        DataOp::Load | DataOp::LoadLinked => {
            if inputs.cacheable.is_cacheable(req.addr) {
                if let Some(hit) = inputs.cache.lookup(req.addr) {
                    effects.stats.dread = true;
                    effects.op = Some(CacheOp::Touch {
                        set: inputs.cache.set_of(req.addr),
                        way: hit.way,
                    });
                    if inputs.write_error {
                        // Deferred write error surfaces here, once.
                        effects.clear_write_error = true;
                        return DataResponse::Error;
                    }
                    if req.op == DataOp::LoadLinked {
                        next.llsc = LlscReservation {
                            pending: true,
                            addr: req.addr & !3,
                        };
                    }
                    DataResponse::Data(hit.data)
                } else {
                    effects.stats.dmiss = true;
                    next.save = DcacheSave {
                        addr: req.addr,
                        wdata: 0,
                        be: 0,
                        op: req.op,
                        set: inputs.cache.set_of(req.addr),
                        way: 0,
                        word: inputs.cache.word_of(req.addr),
                        hit: false,
                    };
                    next.state = DcacheState::MissSelect;
                    DataResponse::Retry
                }
            } else {
                effects.stats.dunc = true;
                next.save = DcacheSave {
                    addr: req.addr,
                    wdata: 0,
                    be: 0,
                    op: req.op,
                    set: 0,
                    way: 0,
                    word: 0,
                    hit: false,
                };
                next.state = DcacheState::UncWait;
                effects.bus_req = Some(BusRequest::read(BusKind::DataUnc, req.addr, 1));
                DataResponse::Retry
            }
        }

        DataOp::Store => {
            if inputs.wbuf_full {
                return DataResponse::Retry;
            }
            effects.stats.write = true;
            effects.wbuf_push = Some(WriteBufferEntry {
                addr: req.addr,
                data: req.wdata,
                be: req.be,
                kind: WriteKind::Write,
            });
            let hit = inputs.cache.lookup(req.addr);
            next.save = DcacheSave {
                addr: req.addr,
                wdata: req.wdata,
                be: req.be,
                op: req.op,
                set: inputs.cache.set_of(req.addr),
                way: hit.map_or(0, |h| h.way),
                word: inputs.cache.word_of(req.addr),
                hit: hit.is_some(),
            };
            next.state = if hit.is_some() {
                DcacheState::WriteUpdt
            } else {
                DcacheState::WriteReq
            };
            DataResponse::Data(0)
        }

        DataOp::StoreConditional => {
            if regs.llsc.pending && regs.llsc.addr == (req.addr & !3) {
                let hit = inputs.cache.lookup(req.addr);
                next.save = DcacheSave {
                    addr: req.addr,
                    wdata: req.wdata,
                    be: 0b1111,
                    op: req.op,
                    set: inputs.cache.set_of(req.addr),
                    way: hit.map_or(0, |h| h.way),
                    word: inputs.cache.word_of(req.addr),
                    hit: hit.is_some(),
                };
                next.state = DcacheState::ScWait;
                DataResponse::Retry
            } else {
                effects.stats.sc_ko = true;
                DataResponse::ScFailure
            }
        }

        DataOp::Invalidate => {
            if let Some(hit) = inputs.cache.lookup(req.addr) {
                next.save = DcacheSave {
                    addr: req.addr,
                    wdata: 0,
                    be: 0,
                    op: req.op,
                    set: inputs.cache.set_of(req.addr),
                    way: hit.way,
                    word: 0,
                    hit: true,
                };
                next.state = DcacheState::Inval;
                DataResponse::Retry
            } else {
                DataResponse::Data(0)
            }
        }
    }
}

/// Builds the burst read request refilling the line containing `addr`.
fn refill_request(cache: &CacheArray, addr: u32) -> BusRequest {
    BusRequest::read(
        BusKind::DataMiss,
        cache.line_base(addr),
        cache.words_per_line() as u8,
    )
}
