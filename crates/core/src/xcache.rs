//! Top-level cache subsystem component.
//!
//! Owns the two cache arrays, the write buffer, the four FSM register
//! blocks, and the cross-FSM request/reply latches. One call to
//! [`Xcache::step`] advances everything by exactly one clock cycle in two
//! phases:
//!
//! 1. **Combinational:** the four transition functions run against the
//!    *current* register values and this cycle's inputs only, producing
//!    next-register values, responses, pins, and effect records.
//! 2. **Commit:** effects are applied and every register is replaced by its
//!    next value. Shared structures have one producer and one consumer per
//!    commit, and the few genuine same-cycle conflicts resolve by fixed
//!    priority (consumption before posting; the snoop reservation-clear
//!    wins over a same-cycle LL).

use tracing::{debug, trace};

use crate::bus::{BusInputs, BusOutputs, BusRequest, BusResult};
use crate::cache::CacheArray;
use crate::cacheability::CacheabilityTable;
use crate::common::ConfigError;
use crate::config::XcacheConfig;
use crate::ctrl::{CacheOp, SnoopInval, dcache, icache, pibus, snoop};
use crate::proc::{DataOp, DataRequest, DataResponse, InstRequest, InstResponse};
use crate::stats::XcacheStats;
use crate::wbuf::WriteBuffer;

/// Everything the component drives in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutputs {
    /// Fetch response.
    pub inst: InstResponse,
    /// Data response.
    pub data: DataResponse,
    /// Bus pins.
    pub bus: BusOutputs,
}

/// Cycle-accurate L1 cache subsystem: instruction and data caches, write
/// buffer, bus transaction engine, and snoop controller.
#[derive(Debug)]
pub struct Xcache {
    config: XcacheConfig,
    cacheable: CacheabilityTable,
    icache: CacheArray,
    dcache: CacheArray,
    wbuf: WriteBuffer,

    iregs: icache::IcacheRegs,
    dregs: dcache::DcacheRegs,
    pregs: pibus::PibusRegs,
    sregs: snoop::SnoopRegs,

    // Cross-FSM latches (the original's request/response flip-flops).
    icache_req: Option<BusRequest>,
    dcache_req: Option<BusRequest>,
    ireply: Option<BusResult>,
    dreply: Option<BusResult>,
    write_error: bool,
    snoop_inval: Option<SnoopInval>,
    snoop_flush: bool,

    stats: XcacheStats,
}

impl Xcache {
    /// Builds the component.
    ///
    /// # Errors
    ///
    /// Fails on illegal geometry; see [`XcacheConfig::validate`]. There is
    /// no runtime recovery from a configuration error.
    pub fn new(config: XcacheConfig, cacheable: CacheabilityTable) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            icache: CacheArray::new(&config.icache),
            dcache: CacheArray::new(&config.dcache),
            wbuf: WriteBuffer::new(config.wbuf_depth),
            config,
            cacheable,
            iregs: icache::IcacheRegs::default(),
            dregs: dcache::DcacheRegs::default(),
            pregs: pibus::PibusRegs::default(),
            sregs: snoop::SnoopRegs::default(),
            icache_req: None,
            dcache_req: None,
            ireply: None,
            dreply: None,
            write_error: false,
            snoop_inval: None,
            snoop_flush: false,
            stats: XcacheStats::default(),
        })
    }

    /// The configuration this instance was built with.
    pub fn config(&self) -> &XcacheConfig {
        &self.config
    }

    /// Instrumentation counters.
    pub fn stats(&self) -> &XcacheStats {
        &self.stats
    }

    /// True when every FSM is idle and no work is buffered or in flight.
    pub fn quiescent(&self) -> bool {
        self.iregs.state == icache::IcacheState::Idle
            && self.dregs.state == dcache::DcacheState::Idle
            && self.pregs.state == pibus::PibusState::Idle
            && self.wbuf.is_empty()
            && self.icache_req.is_none()
            && self.dcache_req.is_none()
            && self.ireply.is_none()
            && self.dreply.is_none()
    }

    /// One-line state summary for trace output.
    pub fn trace_state(&self) -> String {
        format!(
            "dcache={:?} icache={:?} pibus={:?} snoop={:?} wbuf={}/{}",
            self.dregs.state,
            self.iregs.state,
            self.pregs.state,
            self.sregs.state,
            self.wbuf.len(),
            self.wbuf.capacity(),
        )
    }

    /// Advances the component by one clock cycle.
    pub fn step(
        &mut self,
        ireq: &InstRequest,
        dreq: &DataRequest,
        bus: &BusInputs,
    ) -> CycleOutputs {
        // ---------------- combinational phase ----------------
        let it = icache::transition(
            &self.iregs,
            &icache::IcacheInputs {
                req: ireq,
                cache: &self.icache,
                cacheable: &self.cacheable,
                reply: self.ireply,
                line_buf: &self.pregs.buf,
            },
        );
        let dt = dcache::transition(
            &self.dregs,
            &dcache::DcacheInputs {
                req: dreq,
                cache: &self.dcache,
                cacheable: &self.cacheable,
                wbuf_full: self.wbuf.is_full(),
                reply: self.dreply,
                line_buf: &self.pregs.buf,
                write_error: self.write_error,
                snoop_inval: self.snoop_inval,
                snoop_flush: self.snoop_flush,
            },
        );
        let pt = pibus::transition(
            &self.pregs,
            &pibus::PibusInputs {
                bus,
                icache_req: self.icache_req,
                dcache_req: self.dcache_req,
                wbuf_head: self.wbuf.peek().copied(),
            },
        );
        let st = snoop::transition(
            &self.sregs,
            &snoop::SnoopInputs {
                bus,
                dcache: &self.dcache,
                llsc: &self.dregs.llsc,
                local_access: dreq.valid,
                inval_pending: self.snoop_inval.is_some(),
                flush_pending: self.snoop_flush,
                enabled: self.config.snoop_active,
                flush_threshold: self.config.snoop_flush_threshold,
            },
        );

        let outputs = CycleOutputs {
            inst: it.rsp,
            data: dt.rsp,
            bus: pt.out,
        };

        // ---------------- commit phase ----------------
        self.commit(ireq, dreq, it, dt, pt, st);

        outputs
    }

    #[allow(clippy::needless_pass_by_value)]
    fn commit(
        &mut self,
        ireq: &InstRequest,
        dreq: &DataRequest,
        it: icache::IcacheTransition,
        dt: dcache::DcacheTransition,
        pt: pibus::PibusTransition,
        st: snoop::SnoopTransition,
    ) {
        // Cache mutations read the line buffer as it stood this cycle.
        if let Some(op) = it.effects.op {
            Self::apply_cache_op(&mut self.icache, op, &self.pregs.buf);
        }
        if let Some(op) = dt.effects.updt_op {
            Self::apply_cache_op(&mut self.dcache, op, &self.pregs.buf);
        }
        if let Some(op) = dt.effects.op {
            Self::apply_cache_op(&mut self.dcache, op, &self.pregs.buf);
        }

        // Write buffer: single consumer, then single producer.
        if pt.effects.wbuf_pop {
            let drained = self.wbuf.pop();
            debug_assert!(drained.is_some());
        }
        if let Some(entry) = dt.effects.wbuf_push {
            let pushed = self.wbuf.push(entry);
            debug_assert!(pushed, "push decided against a full buffer");
        }

        // Request latches: the engine consumes before controllers post.
        if pt.effects.take_icache_req {
            self.icache_req = None;
        }
        if pt.effects.take_dcache_req {
            self.dcache_req = None;
        }
        if let Some(req) = it.effects.bus_req {
            trace!(kind = ?req.kind, addr = req.addr, "icache bus request");
            self.icache_req = Some(req);
        }
        if let Some(req) = dt.effects.bus_req {
            trace!(kind = ?req.kind, addr = req.addr, "dcache bus request");
            self.dcache_req = Some(req);
        }

        // Reply latches: controllers consume before the engine posts.
        if it.effects.consume_reply {
            self.ireply = None;
        }
        if dt.effects.consume_reply {
            self.dreply = None;
        }
        if let Some(result) = pt.effects.ireply {
            trace!(?result, "bus completion -> icache");
            self.ireply = Some(result);
        }
        if let Some(result) = pt.effects.dreply {
            trace!(?result, "bus completion -> dcache");
            self.dreply = Some(result);
        }

        // Sticky write error: surfacing clears before a same-cycle failure
        // re-arms the flag.
        if dt.effects.clear_write_error {
            debug!("write bus error surfaced on data read");
            self.write_error = false;
        }
        if pt.effects.set_write_error {
            debug!("write bus error recorded");
            self.write_error = true;
        }

        // Snoop request latches: consumption precedes posting.
        if dt.effects.take_snoop_inval {
            self.snoop_inval = None;
        }
        if dt.effects.take_snoop_flush {
            self.snoop_flush = false;
        }
        if let Some(inval) = st.effects.post_inval {
            debug!(set = inval.set, way = inval.way, "snoop invalidation");
            self.snoop_inval = Some(inval);
        }
        if st.effects.post_flush {
            debug!("snoop escalation: full data cache flush");
            self.snoop_flush = true;
        }

        self.update_stats(ireq, dreq, &it, &dt);

        // Register update. The snoop reservation-clear wins over a
        // same-cycle LL completion.
        self.iregs = it.next;
        self.dregs = dt.next;
        if st.effects.clear_llsc {
            trace!("snoop cleared LL/SC reservation");
            self.dregs.llsc.pending = false;
        }
        self.pregs = pt.next;
        self.sregs = st.next;
    }

    /// Applies one cache-array mutation.
    fn apply_cache_op(cache: &mut CacheArray, op: CacheOp, line_buf: &[u32]) {
        match op {
            CacheOp::Touch { set, way } => cache.touch(set, way),
            CacheOp::Fill { addr, way } => {
                let words = cache.words_per_line();
                cache.fill(addr, way, &line_buf[..words]);
            }
            CacheOp::WriteWord {
                set,
                way,
                word,
                data,
                be,
            } => cache.write_word(set, way, word, data, be),
            CacheOp::Invalidate { set, way } => cache.invalidate(set, way),
            CacheOp::Flush => cache.flush(),
        }
    }

    fn update_stats(
        &mut self,
        ireq: &InstRequest,
        dreq: &DataRequest,
        it: &icache::IcacheTransition,
        dt: &dcache::DcacheTransition,
    ) {
        // Stall attribution looks at the state on either side of the clock
        // edge so that both the entry cycle (Idle -> MissSelect) and the
        // exit cycle (MissUpdt -> Idle) land in the right bucket.
        let imiss_path = |s: icache::IcacheState| {
            matches!(
                s,
                icache::IcacheState::MissSelect
                    | icache::IcacheState::MissInval
                    | icache::IcacheState::MissWait
                    | icache::IcacheState::MissUpdt
            )
        };
        let iunc_path = |s: icache::IcacheState| {
            matches!(s, icache::IcacheState::UncWait | icache::IcacheState::UncGo)
        };
        let dmiss_path = |s: dcache::DcacheState| {
            matches!(
                s,
                dcache::DcacheState::MissSelect
                    | dcache::DcacheState::MissInval
                    | dcache::DcacheState::MissWait
                    | dcache::DcacheState::MissUpdt
            )
        };
        let dunc_path = |s: dcache::DcacheState| {
            matches!(s, dcache::DcacheState::UncWait | dcache::DcacheState::UncGo)
        };
        let write_path = |s: dcache::DcacheState| {
            matches!(
                s,
                dcache::DcacheState::WriteUpdt
                    | dcache::DcacheState::WriteReq
                    | dcache::DcacheState::ScWait
            )
        };

        let i_old = self.iregs.state;
        let d_old = self.dregs.state;
        let stats = &mut self.stats;
        stats.total_cycles += 1;

        let ifrz = ireq.valid && !it.rsp.served();
        let dfrz = dreq.valid && !dt.rsp.served();
        if ifrz || dfrz {
            stats.frz_cycles += 1;
        }

        if ifrz {
            if imiss_path(i_old) || imiss_path(it.next.state) {
                stats.imiss_frz += 1;
            } else if iunc_path(i_old) || iunc_path(it.next.state) {
                stats.iunc_frz += 1;
            }
        }
        if dfrz {
            if dmiss_path(d_old) || dmiss_path(dt.next.state) {
                stats.dmiss_frz += 1;
            } else if dunc_path(d_old) || dunc_path(dt.next.state) {
                stats.dunc_frz += 1;
            } else if write_path(d_old)
                || write_path(dt.next.state)
                || matches!(dreq.op, DataOp::Store | DataOp::StoreConditional)
            {
                // Includes stores refused in place on a full write buffer.
                stats.write_frz += 1;
            }
        }

        if it.effects.served_fetch {
            stats.ireq_count += 1;
        }
        if it.effects.start_miss {
            stats.imiss_count += 1;
        }
        if it.effects.start_unc {
            stats.iunc_count += 1;
        }

        let events = dt.effects.stats;
        if events.dread {
            stats.dread_count += 1;
        }
        if events.dmiss {
            stats.dmiss_count += 1;
        }
        if events.dunc {
            stats.dunc_count += 1;
        }
        if events.write {
            stats.write_count += 1;
        }
        if events.sc_ok {
            stats.sc_ok_count += 1;
        }
        if events.sc_ko {
            stats.sc_ko_count += 1;
        }
    }
}
