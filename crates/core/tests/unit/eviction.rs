//! Pseudo-LRU eviction behavior across geometries.

use rstest::rstest;

use crate::common::harness::TestBench;
use xcache_core::XcacheConfig;
use xcache_core::config::CacheGeometry;
use xcache_core::proc::{DataRequest, DataResponse, InstRequest};

fn bench_with_dcache(sets: usize, ways: usize, words: usize) -> TestBench {
    let mut config = XcacheConfig::default();
    config.dcache = CacheGeometry { sets, ways, words };
    TestBench::new(config)
}

/// Address with tag `tag` mapping to set 0 for the given geometry.
fn tagged(tag: u32, sets: usize, words: usize) -> u32 {
    tag * (sets * words * 4) as u32
}

/// Up to `ways` distinct tags fit in one set without any eviction; the
/// `(ways + 1)`-th evicts a victim that is never the most recently touched
/// line.
#[rstest]
#[case(2, 2, 4)]
#[case(8, 4, 4)]
#[case(4, 8, 2)]
#[case(64, 4, 8)]
#[case(16, 1, 8)]
fn eviction_spares_most_recent_line(
    #[case] sets: usize,
    #[case] ways: usize,
    #[case] words: usize,
) {
    let mut bench = bench_with_dcache(sets, ways, words);

    let fills: Vec<u32> = (0..ways as u32).map(|t| tagged(t, sets, words)).collect();
    for (i, &addr) in fills.iter().enumerate() {
        bench.slave.poke(addr, i as u32 + 0x10);
        assert_eq!(bench.load(addr), i as u32 + 0x10);
    }

    // All `ways` lines co-reside: every re-probe is a same-cycle hit.
    for (i, &addr) in fills.iter().enumerate() {
        assert_eq!(bench.assert_hit(addr), i as u32 + 0x10);
    }

    // One more distinct tag forces an eviction.
    let extra = tagged(ways as u32, sets, words);
    bench.slave.poke(extra, 0xEE);
    assert_eq!(bench.load(extra), 0xEE);

    // The victim was not the most recently touched line.
    if ways > 1 {
        let most_recent = fills[ways - 1];
        assert_eq!(bench.assert_hit(most_recent), ways as u32 - 1 + 0x10);
    }
    assert_eq!(bench.assert_hit(extra), 0xEE);
}

/// The explicit line-invalidate command drops a hit line without bus
/// traffic; on a miss it completes immediately.
#[test]
fn explicit_invalidate_command() {
    let mut bench = TestBench::small();
    let addr = 0x0000_C000;
    bench.slave.poke(addr, 0x77);

    assert_eq!(bench.load(addr), 0x77);
    let writes = bench.slave.write_log().len();

    assert_eq!(bench.data(DataRequest::invalidate(addr)), DataResponse::Data(0));

    let misses_before = bench.xcache.stats().dmiss_count;
    let (_, first) = bench.cycle(InstRequest::none(), DataRequest::load(addr));
    assert_eq!(first, DataResponse::Retry);
    assert_eq!(bench.load(addr), 0x77);
    assert_eq!(bench.xcache.stats().dmiss_count, misses_before + 1);

    // Invalidating a line that is not cached completes in place.
    assert_eq!(
        bench.data(DataRequest::invalidate(0x0000_C800)),
        DataResponse::Data(0)
    );
    assert_eq!(bench.slave.write_log().len(), writes);
}
