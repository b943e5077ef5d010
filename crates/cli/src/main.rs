//! Trace-driven runner for the cache subsystem.
//!
//! Feeds a JSON trace of processor requests through the component against
//! the single-slave bus model, then prints the statistics report. This is
//! the quickest way to watch the subsystem behave without wiring up an
//! instruction-set simulator:
//!
//! ```text
//! xcache-sim run -t traces/basic.json
//! xcache-sim run -t traces/coherence.json -c config.json --wait-states 2 -v
//! ```
//!
//! The trace is a JSON array of events, e.g.
//! `[{"op":"store","addr":4096,"data":7},{"op":"load","addr":4096}]`.
//! Supported ops: `fetch`, `load`, `load_linked`, `store`,
//! `store_conditional`, `invalidate`, `external_write`, `idle`.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::{fs, process};

use xcache_core::busmodel::MemorySlave;
use xcache_core::bus::BusInputs;
use xcache_core::proc::{DataRequest, DataResponse, InstRequest, InstResponse};
use xcache_core::{CacheabilityTable, Xcache, XcacheConfig};

#[derive(Parser, Debug)]
#[command(
    name = "xcache-sim",
    author,
    version,
    about = "Cycle-accurate cache subsystem trace runner",
    long_about = "Run a JSON request trace through the cache subsystem (instruction + data caches,\nwrite buffer, bus engine, snoop controller) against a memory-backed bus model,\nand print the statistics report.\n\nExamples:\n  xcache-sim run -t traces/basic.json\n  xcache-sim run -t traces/coherence.json -c config.json --wait-states 2 -v"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a request trace to completion and print statistics.
    Run {
        /// JSON trace file (array of request events).
        #[arg(short, long)]
        trace: String,

        /// Optional JSON runner configuration (geometry, memory init, ...).
        #[arg(short, long)]
        config: Option<String>,

        /// Wait states the bus model inserts before each data acknowledge.
        #[arg(long, default_value_t = 0)]
        wait_states: u32,

        /// Print every served response and the per-cycle FSM states.
        #[arg(short, long)]
        verbose: bool,
    },
}

/// One trace event.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum TraceEvent {
    /// Instruction fetch.
    Fetch { addr: u32 },
    /// Data load.
    Load { addr: u32 },
    /// Load-linked.
    LoadLinked { addr: u32 },
    /// Store (full word unless `be` narrows it).
    Store {
        addr: u32,
        data: u32,
        #[serde(default = "full_word")]
        be: u8,
    },
    /// Store-conditional.
    StoreConditional { addr: u32, data: u32 },
    /// Explicit line invalidate.
    Invalidate { addr: u32 },
    /// A write by another bus master (snoop traffic).
    ExternalWrite { addr: u32, data: u32 },
    /// Idle cycles.
    Idle { cycles: u32 },
}

fn full_word() -> u8 {
    0b1111
}

/// Runner configuration wrapping the component config.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunnerConfig {
    /// Component configuration.
    xcache: XcacheConfig,
    /// Uncacheable address windows.
    uncacheable: Vec<AddressRange>,
    /// Error-answering address windows.
    errors: Vec<AddressRange>,
    /// Initial memory contents, `[addr, data]` word pairs.
    memory: Vec<[u32; 2]>,
}

/// A `{ "base": ..., "size": ... }` window.
#[derive(Debug, Clone, Copy, Deserialize)]
struct AddressRange {
    base: u32,
    size: u32,
}

/// Cap on cycles spent holding one request.
const SERVE_CAP: u32 = 10_000;

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            trace,
            config,
            wait_states,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_env_filter("xcache_core=trace,xcache_sim=debug")
                    .init();
            }
            if let Err(err) = run(&trace, config.as_deref(), wait_states, verbose) {
                eprintln!("error: {err}");
                process::exit(1);
            }
        }
    }
}

fn run(
    trace_path: &str,
    config_path: Option<&str>,
    wait_states: u32,
    verbose: bool,
) -> Result<(), String> {
    let trace_text = fs::read_to_string(trace_path)
        .map_err(|e| format!("cannot read trace {trace_path}: {e}"))?;
    let events: Vec<TraceEvent> = serde_json::from_str(&trace_text)
        .map_err(|e| format!("malformed trace {trace_path}: {e}"))?;

    let runner: RunnerConfig = match config_path {
        Some(path) => {
            let text =
                fs::read_to_string(path).map_err(|e| format!("cannot read config {path}: {e}"))?;
            serde_json::from_str(&text).map_err(|e| format!("malformed config {path}: {e}"))?
        }
        None => RunnerConfig::default(),
    };

    let mut table = CacheabilityTable::cacheable_all(4);
    for window in &runner.uncacheable {
        table.set_range(window.base, window.size, false);
    }

    let mut xcache =
        Xcache::new(runner.xcache, table).map_err(|e| format!("configuration rejected: {e}"))?;
    let mut slave = MemorySlave::new();
    slave.wait_states = wait_states;
    for window in &runner.errors {
        slave.add_error_range(window.base, window.size);
    }
    for [addr, data] in &runner.memory {
        slave.poke(*addr, *data);
    }

    let mut bus_in = BusInputs::idle();
    let cycle = |xcache: &mut Xcache,
                     slave: &mut MemorySlave,
                     bus_in: &mut BusInputs,
                     ireq: InstRequest,
                     dreq: DataRequest|
     -> (InstResponse, DataResponse) {
        let out = xcache.step(&ireq, &dreq, bus_in);
        *bus_in = slave.respond(&out.bus);
        (out.inst, out.data)
    };

    for (index, event) in events.iter().enumerate() {
        match *event {
            TraceEvent::Idle { cycles } => {
                for _ in 0..cycles {
                    let _ = cycle(
                        &mut xcache,
                        &mut slave,
                        &mut bus_in,
                        InstRequest::none(),
                        DataRequest::none(),
                    );
                }
            }
            TraceEvent::ExternalWrite { addr, data } => {
                slave.inject_external_write(addr, data);
                for _ in 0..4 {
                    let _ = cycle(
                        &mut xcache,
                        &mut slave,
                        &mut bus_in,
                        InstRequest::none(),
                        DataRequest::none(),
                    );
                }
                if verbose {
                    println!("[{index}] external write {addr:#010x} <- {data:#010x}");
                }
            }
            TraceEvent::Fetch { addr } => {
                let mut served = None;
                for _ in 0..SERVE_CAP {
                    let (irsp, _) = cycle(
                        &mut xcache,
                        &mut slave,
                        &mut bus_in,
                        InstRequest::fetch(addr),
                        DataRequest::none(),
                    );
                    if irsp.served() {
                        served = Some(irsp);
                        break;
                    }
                }
                let rsp = served.ok_or_else(|| format!("event {index}: fetch livelocked"))?;
                if verbose {
                    println!("[{index}] fetch {addr:#010x} -> {rsp:?}");
                }
            }
            _ => {
                let dreq = match *event {
                    TraceEvent::Load { addr } => DataRequest::load(addr),
                    TraceEvent::LoadLinked { addr } => DataRequest::load_linked(addr),
                    TraceEvent::Store { addr, data, be } => DataRequest::store(addr, data, be),
                    TraceEvent::StoreConditional { addr, data } => {
                        DataRequest::store_conditional(addr, data)
                    }
                    TraceEvent::Invalidate { addr } => DataRequest::invalidate(addr),
                    _ => unreachable!(),
                };
                let mut served = None;
                for _ in 0..SERVE_CAP {
                    let (_, drsp) = cycle(
                        &mut xcache,
                        &mut slave,
                        &mut bus_in,
                        InstRequest::none(),
                        dreq,
                    );
                    if drsp.served() {
                        served = Some(drsp);
                        break;
                    }
                }
                let rsp = served.ok_or_else(|| format!("event {index}: request livelocked"))?;
                if verbose {
                    println!(
                        "[{index}] {event:?} -> {rsp:?}  [{}]",
                        xcache.trace_state()
                    );
                }
            }
        }
    }

    // Let the write buffer and bus engine finish before reporting.
    for _ in 0..SERVE_CAP {
        if xcache.quiescent() {
            break;
        }
        let _ = cycle(
            &mut xcache,
            &mut slave,
            &mut bus_in,
            InstRequest::none(),
            DataRequest::none(),
        );
    }

    println!("{}", xcache.stats());
    Ok(())
}
