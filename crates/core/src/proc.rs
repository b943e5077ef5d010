//! Processor-facing request and response types.
//!
//! The instruction-set simulator presents at most one fetch request and one
//! data request per cycle and samples one response for each. A response of
//! `Retry` means the request was not serviced this cycle; the processor is
//! expected to hold the request and reissue it unchanged — that is the only
//! backpressure mechanism, there is no queueing on this interface.

/// Kind of data-side request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataOp {
    /// Plain load.
    #[default]
    Load,
    /// Load-linked: a load that also sets the LL/SC reservation.
    LoadLinked,
    /// Plain store (write-through).
    Store,
    /// Store-conditional: succeeds only against a live reservation.
    StoreConditional,
    /// Explicit line invalidate; no bus traffic.
    Invalidate,
}

/// Instruction fetch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstRequest {
    /// Whether a fetch is presented this cycle.
    pub valid: bool,
    /// Word-aligned fetch address.
    pub addr: u32,
}

impl InstRequest {
    /// No fetch this cycle.
    pub const fn none() -> Self {
        Self {
            valid: false,
            addr: 0,
        }
    }

    /// Fetch from `addr`.
    pub const fn fetch(addr: u32) -> Self {
        Self { valid: true, addr }
    }
}

/// Instruction fetch response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstResponse {
    /// Not serviced this cycle; hold and reissue.
    #[default]
    Retry,
    /// The fetched instruction word.
    Inst(u32),
    /// Precise bus error on the fetch.
    Error,
}

/// Data-side request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataRequest {
    /// Whether a data access is presented this cycle.
    pub valid: bool,
    /// Byte address of the access.
    pub addr: u32,
    /// Access kind.
    pub op: DataOp,
    /// Store data (stores and store-conditionals).
    pub wdata: u32,
    /// 4-bit byte enable (stores).
    pub be: u8,
}

impl DataRequest {
    /// No data access this cycle.
    pub const fn none() -> Self {
        Self {
            valid: false,
            addr: 0,
            op: DataOp::Load,
            wdata: 0,
            be: 0,
        }
    }

    /// Word load from `addr`.
    pub const fn load(addr: u32) -> Self {
        Self {
            valid: true,
            addr,
            op: DataOp::Load,
            wdata: 0,
            be: 0,
        }
    }

    /// Load-linked from `addr`.
    pub const fn load_linked(addr: u32) -> Self {
        Self {
            valid: true,
            addr,
            op: DataOp::LoadLinked,
            wdata: 0,
            be: 0,
        }
    }

    /// Store of `wdata` under byte-enable `be`.
    pub const fn store(addr: u32, wdata: u32, be: u8) -> Self {
        Self {
            valid: true,
            addr,
            op: DataOp::Store,
            wdata,
            be,
        }
    }

    /// Word-wide store-conditional of `wdata`.
    pub const fn store_conditional(addr: u32, wdata: u32) -> Self {
        Self {
            valid: true,
            addr,
            op: DataOp::StoreConditional,
            wdata,
            be: 0b1111,
        }
    }

    /// Line invalidate for the line containing `addr`.
    pub const fn invalidate(addr: u32) -> Self {
        Self {
            valid: true,
            addr,
            op: DataOp::Invalidate,
            wdata: 0,
            be: 0,
        }
    }
}

/// Data-side response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataResponse {
    /// Not serviced this cycle; hold and reissue.
    #[default]
    Retry,
    /// Load data. Stores and invalidates acknowledge with `Data(0)`.
    Data(u32),
    /// Bus error: precise for reads, deferred (sticky) for buffered writes.
    Error,
    /// Store-conditional succeeded.
    ScSuccess,
    /// Store-conditional failed; no bus traffic was generated.
    ScFailure,
}

impl DataResponse {
    /// Whether the request was serviced this cycle (anything but `Retry`).
    #[inline]
    pub const fn served(&self) -> bool {
        !matches!(self, Self::Retry)
    }
}

impl InstResponse {
    /// Whether the fetch was serviced this cycle (anything but `Retry`).
    #[inline]
    pub const fn served(&self) -> bool {
        !matches!(self, Self::Retry)
    }
}
