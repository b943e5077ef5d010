//! Bus transaction engine.
//!
//! Sole owner of the single outstanding bus transaction. Arbitration in the
//! idle state uses a fixed priority: instruction reads, then data reads,
//! then write-buffer drains — reads hold the processor and are serviced
//! eagerly, writes drain opportunistically.
//!
//! Read transactions pipeline one address ahead of the data stream: during
//! `READ_DTAD` the engine drives the address of word *k+1* while sampling
//! the acknowledge and data for word *k*. Words land in the line buffer,
//! which the cache controllers read after the completion report.
//!
//! Writes never report back to a waiting controller; a failed write arms
//! the sticky error flag instead (imprecise by construction). The drained
//! entry is popped from the FIFO when its transaction completes, success or
//! not.

use crate::bus::{BusAck, BusInputs, BusKind, BusOpc, BusOutputs, BusRequest, BusResult};
use crate::common::{MAX_LINE_WORDS, WORD_BYTES};
use crate::wbuf::{WriteBufferEntry, WriteKind};

/// Bus transaction engine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum PibusState {
    /// No transaction; arbitrating among pending requests.
    #[default]
    Idle,
    /// Requesting the bus for a read.
    ReadReq,
    /// Driving the first read address.
    ReadAd,
    /// Burst body: next address out, previous data in.
    ReadDtad,
    /// Sampling the last read data word.
    ReadDt,
    /// Requesting the bus for a write.
    WriteReq,
    /// Driving the write address.
    WriteAd,
    /// Driving write data, sampling the acknowledge.
    WriteDt,
}

/// Bus transaction engine registers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PibusRegs {
    /// Current state.
    pub state: PibusState,
    /// The owned in-flight transaction.
    pub active: Option<BusRequest>,
    /// Words received so far (reads).
    pub wcount: usize,
    /// Line buffer receiving read data.
    pub buf: [u32; MAX_LINE_WORDS],
}

impl Default for PibusRegs {
    fn default() -> Self {
        Self {
            state: PibusState::Idle,
            active: None,
            wcount: 0,
            buf: [0; MAX_LINE_WORDS],
        }
    }
}

/// Per-cycle inputs.
pub(crate) struct PibusInputs<'a> {
    /// Bus pins.
    pub bus: &'a BusInputs,
    /// Latched instruction-side request.
    pub icache_req: Option<BusRequest>,
    /// Latched data-side request.
    pub dcache_req: Option<BusRequest>,
    /// Oldest write buffer entry, if any.
    pub wbuf_head: Option<WriteBufferEntry>,
}

/// Commit-phase effects.
#[derive(Debug, Default)]
pub(crate) struct PibusEffects {
    /// Clear the instruction-side request latch (ownership taken).
    pub take_icache_req: bool,
    /// Clear the data-side request latch (ownership taken).
    pub take_dcache_req: bool,
    /// Pop the drained entry from the write buffer.
    pub wbuf_pop: bool,
    /// Completion report toward the instruction cache controller.
    pub ireply: Option<BusResult>,
    /// Completion report toward the data cache controller.
    pub dreply: Option<BusResult>,
    /// Arm the sticky write bus-error flag.
    pub set_write_error: bool,
}

/// Result of one combinational evaluation.
#[derive(Debug)]
pub(crate) struct PibusTransition {
    /// Next register values.
    pub next: PibusRegs,
    /// Pins driven this cycle.
    pub out: BusOutputs,
    /// Effects to apply at commit.
    pub effects: PibusEffects,
}

/// Computes the engine's next state from current registers and inputs.
pub(crate) fn transition(regs: &PibusRegs, inputs: &PibusInputs<'_>) -> PibusTransition {
    let mut next = *regs;
    let mut out = BusOutputs::default();
    let mut effects = PibusEffects::default();

    match regs.state {
        PibusState::Idle => {
            if let Some(req) = inputs.icache_req {
                effects.take_icache_req = true;
                next.active = Some(req);
                next.wcount = 0;
                next.state = PibusState::ReadReq;
            } else if let Some(req) = inputs.dcache_req {
                effects.take_dcache_req = true;
                next.active = Some(req);
                next.wcount = 0;
                next.state = PibusState::ReadReq;
            } else if let Some(entry) = inputs.wbuf_head {
                next.active = Some(write_request(&entry));
                next.wcount = 0;
                next.state = PibusState::WriteReq;
            }
        }

        PibusState::ReadReq => {
            if let Some(req) = regs.active {
                out.req = true;
                out.read = true;
                out.opc = read_opc(&req);
                out.addr = req.addr;
                if inputs.bus.gnt {
                    next.state = PibusState::ReadAd;
                }
            } else {
                next.state = PibusState::Idle;
            }
        }

        PibusState::ReadAd => {
            if let Some(req) = regs.active {
                out.read = true;
                out.opc = read_opc(&req);
                out.addr = req.addr;
                out.lock = req.words > 1;
                next.state = if req.words > 1 {
                    PibusState::ReadDtad
                } else {
                    PibusState::ReadDt
                };
            } else {
                next.state = PibusState::Idle;
            }
        }

        PibusState::ReadDtad => {
            if let Some(req) = regs.active {
                // Address of the next word goes out while word `wcount`
                // comes back.
                out.read = true;
                out.opc = read_opc(&req);
                out.addr = req.addr + ((regs.wcount as u32 + 1) * WORD_BYTES);
                out.lock = regs.wcount + 2 < req.words as usize;

                if inputs.bus.tout || inputs.bus.ack == BusAck::Error {
                    complete_read(&req, BusResult::Error, &mut next, &mut effects);
                } else if inputs.bus.ack == BusAck::Ready {
                    next.buf[regs.wcount] = inputs.bus.rdata;
                    next.wcount = regs.wcount + 1;
                    if next.wcount == req.words as usize - 1 {
                        next.state = PibusState::ReadDt;
                    }
                }
            } else {
                next.state = PibusState::Idle;
            }
        }

        PibusState::ReadDt => {
            if let Some(req) = regs.active {
                if inputs.bus.tout || inputs.bus.ack == BusAck::Error {
                    complete_read(&req, BusResult::Error, &mut next, &mut effects);
                } else if inputs.bus.ack == BusAck::Ready {
                    next.buf[regs.wcount] = inputs.bus.rdata;
                    complete_read(&req, BusResult::Ok, &mut next, &mut effects);
                }
            } else {
                next.state = PibusState::Idle;
            }
        }

        PibusState::WriteReq => {
            if let Some(req) = regs.active {
                out.req = true;
                out.read = false;
                out.opc = BusOpc::from_byte_enable(req.be);
                out.addr = req.addr;
                if inputs.bus.gnt {
                    next.state = PibusState::WriteAd;
                }
            } else {
                next.state = PibusState::Idle;
            }
        }

        PibusState::WriteAd => {
            if let Some(req) = regs.active {
                out.read = false;
                out.opc = BusOpc::from_byte_enable(req.be);
                out.addr = req.addr;
                next.state = PibusState::WriteDt;
            } else {
                next.state = PibusState::Idle;
            }
        }

        PibusState::WriteDt => {
            if let Some(req) = regs.active {
                out.read = false;
                out.data = req.data;
                if inputs.bus.tout || inputs.bus.ack == BusAck::Error {
                    effects.set_write_error = true;
                    effects.wbuf_pop = true;
                    next.active = None;
                    next.state = PibusState::Idle;
                } else if inputs.bus.ack == BusAck::Ready {
                    effects.wbuf_pop = true;
                    next.active = None;
                    next.state = PibusState::Idle;
                }
            } else {
                next.state = PibusState::Idle;
            }
        }
    }

    PibusTransition { next, out, effects }
}

/// Terminates a read transaction and routes the report to its requester.
fn complete_read(
    req: &BusRequest,
    result: BusResult,
    next: &mut PibusRegs,
    effects: &mut PibusEffects,
) {
    if req.kind.is_instruction() {
        effects.ireply = Some(result);
    } else {
        effects.dreply = Some(result);
    }
    next.active = None;
    next.state = PibusState::Idle;
}

/// Opcode for a read transaction: a burst for line refills, a word otherwise.
fn read_opc(req: &BusRequest) -> BusOpc {
    if req.words > 1 {
        BusOpc::Burst(req.words)
    } else {
        BusOpc::Word
    }
}

/// Builds the single-word write transaction draining `entry`.
fn write_request(entry: &WriteBufferEntry) -> BusRequest {
    BusRequest {
        kind: match entry.kind {
            WriteKind::Write => BusKind::Write,
            WriteKind::Sc => BusKind::Sc,
        },
        addr: entry.addr,
        data: entry.data,
        be: entry.be,
        words: 1,
    }
}
