//! Bus error reporting.
//!
//! Reads (fetch, cacheable, uncacheable) report errors precisely: the
//! failing access itself answers `Error` and no cache state changes. Write
//! errors are deferred through the sticky flag and surface exactly once, on
//! the next completed data read.

use pretty_assertions::assert_eq;

use crate::common::harness::{TestBench, UNCACHED_BASE};
use xcache_core::proc::{DataRequest, DataResponse, InstResponse};

/// Address range the slave answers with a bus error.
const BAD_BASE: u32 = 0x0000_F000;

fn bench_with_bad_range() -> TestBench {
    let mut bench = TestBench::small();
    bench.slave.add_error_range(BAD_BASE, 0x100);
    bench
}

/// A cacheable load whose refill errors answers `Error` on that very
/// access, and nothing was filled: retrying misses again.
#[test]
fn read_error_is_precise_and_fills_nothing() {
    let mut bench = bench_with_bad_range();

    assert_eq!(bench.data(DataRequest::load(BAD_BASE)), DataResponse::Error);
    assert_eq!(bench.xcache.stats().dmiss_count, 1);

    // No line was installed by the failing refill.
    assert_eq!(bench.data(DataRequest::load(BAD_BASE)), DataResponse::Error);
    assert_eq!(bench.xcache.stats().dmiss_count, 2);
}

/// An uncacheable read error is precise as well.
#[test]
fn uncached_read_error_is_precise() {
    let mut bench = TestBench::small();
    bench.slave.add_error_range(UNCACHED_BASE, 0x100);

    assert_eq!(bench.data(DataRequest::load(UNCACHED_BASE)), DataResponse::Error);
    assert_eq!(bench.xcache.stats().dunc_count, 1);
}

/// A fetch whose refill errors reports precisely on the fetch path.
#[test]
fn fetch_error_is_precise() {
    let mut bench = bench_with_bad_range();

    assert_eq!(bench.fetch(BAD_BASE), InstResponse::Error);
    assert_eq!(bench.xcache.stats().imiss_count, 1);
    assert_eq!(bench.fetch(BAD_BASE), InstResponse::Error);
    assert_eq!(bench.xcache.stats().imiss_count, 2);
}

/// A write bus error is invisible on the store itself, surfaces on the
/// next data read completion, and is cleared after one report.
#[test]
fn write_error_is_sticky_until_next_read() {
    let mut bench = bench_with_bad_range();
    let good = 0x0000_1000;
    bench.slave.poke(good, 0x600D);

    // Warm a good line so the surfacing read is a plain hit.
    assert_eq!(bench.load(good), 0x600D);

    // The store is acknowledged normally; its failure happens later, in
    // the background.
    bench.store(BAD_BASE, 0x1);
    bench.run_until_quiescent();

    // First read after the failure carries the deferred error...
    assert_eq!(bench.data(DataRequest::load(good)), DataResponse::Error);
    // ...and the flag is clear afterwards.
    assert_eq!(bench.load(good), 0x600D);
}

/// Two failed writes before the next read still produce a single deferred
/// error report (single sticky flag).
#[test]
fn multiple_write_errors_collapse_into_one_report() {
    let mut bench = bench_with_bad_range();
    let good = 0x0000_1100;

    assert_eq!(bench.load(good), 0);
    bench.store(BAD_BASE, 0x1);
    bench.store(BAD_BASE + 4, 0x2);
    bench.run_until_quiescent();

    assert_eq!(bench.data(DataRequest::load(good)), DataResponse::Error);
    assert_eq!(bench.load(good), 0);
}

/// A bus timeout terminates the transaction like an error.
#[test]
fn timeout_reports_as_read_error() {
    let mut bench = TestBench::small();
    bench.slave.arm_timeout();

    assert_eq!(bench.data(DataRequest::load(UNCACHED_BASE)), DataResponse::Error);
}

/// A timed-out buffered write arms the sticky flag too.
#[test]
fn timeout_on_write_is_deferred() {
    let mut bench = TestBench::small();
    let good = 0x0000_1200;
    assert_eq!(bench.load(good), 0);

    bench.slave.arm_timeout();
    bench.store(0x0000_1300, 0x5);
    bench.run_until_quiescent();

    assert_eq!(bench.data(DataRequest::load(good)), DataResponse::Error);
    assert_eq!(bench.load(good), 0);
}
