//! Snoop invalidation details beyond the end-to-end scenarios.

use pretty_assertions::assert_eq;

use crate::common::harness::{TestBench, small_config};
use xcache_core::proc::DataRequest;

/// An external write that misses the data cache invalidates nothing and
/// leaves an unrelated reservation alone.
#[test]
fn external_miss_is_ignored() {
    let mut bench = TestBench::small();
    let cached = 0x0000_D000;
    bench.slave.poke(cached, 0x5);

    assert_eq!(bench.load(cached), 0x5);
    assert_eq!(
        bench.data(DataRequest::load_linked(0x0000_D100)),
        xcache_core::proc::DataResponse::Data(0)
    );
    bench.run_until_quiescent();

    // Write elsewhere: no cache hit, different reservation address.
    bench.external_write(0x0000_E000, 0x9);

    assert_eq!(bench.assert_hit(cached), 0x5);
    assert_eq!(
        bench.data(DataRequest::store_conditional(0x0000_D100, 0x6)),
        xcache_core::proc::DataResponse::ScSuccess
    );
}

/// A local data access between external hits resets the escalation streak:
/// the threshold is about *consecutive* undisturbed hits.
#[test]
fn local_access_resets_flush_streak() {
    let mut config = small_config();
    config.snoop_flush_threshold = 3;
    let mut bench = TestBench::new(config);

    let lines = [0x0000_3000, 0x0000_3010, 0x0000_3020, 0x0000_3030];
    for (i, &addr) in lines.iter().enumerate() {
        bench.slave.poke(addr, i as u32 + 1);
        assert_eq!(bench.load(addr), i as u32 + 1);
    }

    bench.external_write(lines[0], 0xE0);
    bench.external_write(lines[1], 0xE1);
    // Local activity: the streak starts over.
    assert_eq!(bench.load(0x0000_5000), 0);
    bench.external_write(lines[2], 0xE2);

    // No flush: the fourth line is still resident.
    assert_eq!(bench.assert_hit(lines[3]), 4);
    // But each hit line was individually invalidated.
    let misses_before = bench.xcache.stats().dmiss_count;
    assert_eq!(bench.load(lines[0]), 0xE0);
    assert_eq!(bench.xcache.stats().dmiss_count, misses_before + 1);
}

/// Back-to-back external hits while an invalidation is still outstanding
/// escalate straight to a flush (only one invalidation can be tracked).
#[test]
fn overlapping_hits_escalate_to_flush() {
    let mut config = small_config();
    config.snoop_flush_threshold = 100; // streak alone will not trigger
    let mut bench = TestBench::new(config);

    let lines = [0x0000_3000, 0x0000_3010, 0x0000_3020];
    for (i, &addr) in lines.iter().enumerate() {
        bench.slave.poke(addr, i as u32 + 1);
        assert_eq!(bench.load(addr), i as u32 + 1);
    }
    bench.run_until_quiescent();

    // Two external writes injected back-to-back: the second hit lands while
    // the first invalidation is still pending.
    bench.slave.inject_external_write(lines[0], 0xE0);
    bench.slave.inject_external_write(lines[1], 0xE1);
    bench.idle_cycles(8);

    // The third line was never written externally, yet the flush took it.
    let misses_before = bench.xcache.stats().dmiss_count;
    assert_eq!(bench.load(lines[2]), 3);
    assert_eq!(bench.xcache.stats().dmiss_count, misses_before + 1);
}
