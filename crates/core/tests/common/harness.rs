//! Shared test bench.
//!
//! Wires an [`Xcache`] to the [`MemorySlave`] bus model with the one-cycle
//! input lag the slave implements, and provides request helpers that hold a
//! request until it is served (bounded, so a livelock fails the test
//! instead of hanging it).

use xcache_core::busmodel::MemorySlave;
use xcache_core::bus::BusInputs;
use xcache_core::proc::{DataRequest, DataResponse, InstRequest, InstResponse};
use xcache_core::{CacheabilityTable, Xcache, XcacheConfig};

/// Base of the uncacheable window used by the tests.
pub const UNCACHED_BASE: u32 = 0xB000_0000;

/// Cycle cap for a single held request.
const SERVE_CAP: u32 = 300;

/// Component plus bus model plus the registered input pins.
pub struct TestBench {
    /// Component under test.
    pub xcache: Xcache,
    /// Bus model answering it.
    pub slave: MemorySlave,
    bus_in: BusInputs,
    /// Cycles stepped so far.
    pub cycles: u64,
}

impl TestBench {
    /// Builds a bench with the given configuration.
    ///
    /// The whole address space is cacheable except the 256 MiB window at
    /// [`UNCACHED_BASE`].
    pub fn new(config: XcacheConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let mut table = CacheabilityTable::cacheable_all(4);
        table.set_range(UNCACHED_BASE, 0x1000_0000, false);
        let xcache = match Xcache::new(config, table) {
            Ok(xcache) => xcache,
            Err(err) => panic!("test configuration rejected: {err}"),
        };
        Self {
            xcache,
            slave: MemorySlave::new(),
            bus_in: BusInputs::idle(),
            cycles: 0,
        }
    }

    /// Small default bench: 8-set 4-way 4-word data cache, 8-set 2-way
    /// 4-word instruction cache, depth-4 write buffer, snoop enabled.
    pub fn small() -> Self {
        Self::new(small_config())
    }

    /// Advances one cycle with the given requests.
    pub fn cycle(&mut self, ireq: InstRequest, dreq: DataRequest) -> (InstResponse, DataResponse) {
        let bus_in = self.bus_in;
        let out = self.xcache.step(&ireq, &dreq, &bus_in);
        self.bus_in = self.slave.respond(&out.bus);
        self.cycles += 1;
        (out.inst, out.data)
    }

    /// Advances `n` cycles with no processor requests.
    pub fn idle_cycles(&mut self, n: u32) {
        for _ in 0..n {
            let _ = self.cycle(InstRequest::none(), DataRequest::none());
        }
    }

    /// Runs idle cycles until every FSM is idle and all buffers drained.
    pub fn run_until_quiescent(&mut self) {
        for _ in 0..SERVE_CAP {
            if self.xcache.quiescent() {
                return;
            }
            self.idle_cycles(1);
        }
        panic!("not quiescent after {SERVE_CAP} cycles: {}", self.xcache.trace_state());
    }

    /// Holds a data request until it is served.
    pub fn data(&mut self, req: DataRequest) -> DataResponse {
        for _ in 0..SERVE_CAP {
            let (_, rsp) = self.cycle(InstRequest::none(), req);
            if rsp.served() {
                return rsp;
            }
        }
        panic!("data request not served: {}", self.xcache.trace_state());
    }

    /// Holds a fetch until it is served.
    pub fn fetch(&mut self, addr: u32) -> InstResponse {
        for _ in 0..SERVE_CAP {
            let (rsp, _) = self.cycle(InstRequest::fetch(addr), DataRequest::none());
            if rsp.served() {
                return rsp;
            }
        }
        panic!("fetch not served: {}", self.xcache.trace_state());
    }

    /// Loads a word, asserting the read succeeds.
    pub fn load(&mut self, addr: u32) -> u32 {
        match self.data(DataRequest::load(addr)) {
            DataResponse::Data(data) => data,
            other => panic!("load {addr:#x} answered {other:?}"),
        }
    }

    /// Stores a word, asserting the write is accepted.
    pub fn store(&mut self, addr: u32, data: u32) {
        match self.data(DataRequest::store(addr, data, 0b1111)) {
            DataResponse::Data(_) => {}
            other => panic!("store {addr:#x} answered {other:?}"),
        }
    }

    /// Issues a single-cycle load and asserts it hits (served immediately).
    pub fn assert_hit(&mut self, addr: u32) -> u32 {
        let (_, rsp) = self.cycle(InstRequest::none(), DataRequest::load(addr));
        match rsp {
            DataResponse::Data(data) => data,
            other => panic!("expected same-cycle hit at {addr:#x}, got {other:?}"),
        }
    }

    /// Injects an external bus write and lets the snoop path settle.
    pub fn external_write(&mut self, addr: u32, data: u32) {
        self.slave.inject_external_write(addr, data);
        self.idle_cycles(4);
    }
}

/// The small default configuration (see [`TestBench::small`]).
pub fn small_config() -> XcacheConfig {
    let mut config = XcacheConfig::default();
    config.icache.sets = 8;
    config.icache.ways = 2;
    config.icache.words = 4;
    config.dcache.sets = 8;
    config.dcache.ways = 4;
    config.dcache.words = 4;
    config.wbuf_depth = 4;
    config
}
