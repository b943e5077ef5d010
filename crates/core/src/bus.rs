//! Bus-facing signal and transaction types.
//!
//! The component is a bus master: it drives [`BusOutputs`] and samples
//! [`BusInputs`] once per cycle. The pin set mirrors the PIBUS interface:
//! request/grant for arbitration, lock for burst continuation, a shared
//! address/data path with per-cycle acknowledge, a timeout input, and the
//! address-valid feed the snoop controller watches.
//!
//! [`BusRequest`] is the single in-flight transaction descriptor. Ownership
//! moves from the issuing cache controller to the bus engine when the
//! engine leaves its idle state, and the result travels back as a
//! [`BusResult`].

/// Per-cycle acknowledge code sampled during data cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusAck {
    /// Slave not ready; the data cycle extends.
    #[default]
    Wait,
    /// Data cycle completed.
    Ready,
    /// Slave-signaled error; the transaction terminates.
    Error,
}

/// Input pins sampled each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusInputs {
    /// Arbiter grant for this master.
    pub gnt: bool,
    /// Acknowledge code for the current data cycle.
    pub ack: BusAck,
    /// Read data returned by the slave.
    pub rdata: u32,
    /// Bus timeout; terminates the transaction with an error.
    pub tout: bool,
    /// A valid address cycle is on the bus (snoop feed).
    pub avalid: bool,
    /// Address observed on the bus when `avalid` is set.
    pub addr: u32,
    /// Direction observed on the bus when `avalid` is set (true = read).
    pub read: bool,
}

impl BusInputs {
    /// Quiet bus: no grant, no acknowledge, no observed address.
    pub const fn idle() -> Self {
        Self {
            gnt: false,
            ack: BusAck::Wait,
            rdata: 0,
            tout: false,
            avalid: false,
            addr: 0,
            read: true,
        }
    }
}

/// Operation code driven during address cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusOpc {
    /// Single word.
    #[default]
    Word,
    /// Half word (16-bit lanes selected by the address).
    Half,
    /// Single byte.
    Byte,
    /// Read burst of the given number of words.
    Burst(u8),
}

impl BusOpc {
    /// Derives the write opcode from a 4-bit byte enable.
    ///
    /// Contiguous half-word and single-byte enables map to the narrow
    /// opcodes; anything else is driven as a full word.
    pub fn from_byte_enable(be: u8) -> Self {
        match be & 0xF {
            0b0001 | 0b0010 | 0b0100 | 0b1000 => Self::Byte,
            0b0011 | 0b1100 => Self::Half,
            _ => Self::Word,
        }
    }
}

/// Output pins driven each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusOutputs {
    /// Bus request toward the arbiter.
    pub req: bool,
    /// Burst continuation: more address cycles follow.
    pub lock: bool,
    /// Transfer direction (true = read).
    pub read: bool,
    /// Operation code.
    pub opc: BusOpc,
    /// Driven address (valid during address cycles).
    pub addr: u32,
    /// Driven write data (valid during write data cycles).
    pub data: u32,
}

/// Kind of bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    /// Instruction cache line refill (read burst).
    InstMiss,
    /// Uncached instruction fetch (single-word read).
    InstUnc,
    /// Data cache line refill (read burst).
    DataMiss,
    /// Uncached data read (single-word read).
    DataUnc,
    /// Write-through store drained from the write buffer.
    Write,
    /// Store-conditional drained from the write buffer.
    Sc,
}

impl BusKind {
    /// Whether this transaction reads from the bus.
    #[inline]
    pub const fn is_read(&self) -> bool {
        matches!(self, Self::InstMiss | Self::InstUnc | Self::DataMiss | Self::DataUnc)
    }

    /// Whether the requester is the instruction cache controller.
    #[inline]
    pub const fn is_instruction(&self) -> bool {
        matches!(self, Self::InstMiss | Self::InstUnc)
    }
}

/// The single in-flight bus transaction descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRequest {
    /// Transaction kind.
    pub kind: BusKind,
    /// Base address (line-aligned for bursts).
    pub addr: u32,
    /// Write data (writes and store-conditionals).
    pub data: u32,
    /// Byte enable (writes and store-conditionals).
    pub be: u8,
    /// Transfer length in words (1 for everything but line refills).
    pub words: u8,
}

impl BusRequest {
    /// Builds a read request of `words` words starting at `addr`.
    pub const fn read(kind: BusKind, addr: u32, words: u8) -> Self {
        Self {
            kind,
            addr,
            data: 0,
            be: 0,
            words,
        }
    }
}

/// Completion report latched back to the requesting controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusResult {
    /// Transaction completed; read data is in the engine's line buffer.
    Ok,
    /// Transaction terminated with a bus error or timeout.
    Error,
}
