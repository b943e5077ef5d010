//! Load-linked / store-conditional.

use pretty_assertions::assert_eq;

use crate::common::harness::{TestBench, UNCACHED_BASE};
use xcache_core::proc::{DataRequest, DataResponse};

/// LL then SC to the same address, no interference: succeeds exactly once;
/// a second SC without a new LL fails.
#[test]
fn ll_sc_succeeds_once() {
    let mut bench = TestBench::small();
    let addr = 0x0000_9000;

    assert_eq!(bench.data(DataRequest::load_linked(addr)), DataResponse::Data(0));
    assert_eq!(
        bench.data(DataRequest::store_conditional(addr, 0xAB)),
        DataResponse::ScSuccess
    );
    assert_eq!(
        bench.data(DataRequest::store_conditional(addr, 0xCD)),
        DataResponse::ScFailure
    );

    bench.run_until_quiescent();
    // Only the successful conditional store reached memory.
    assert_eq!(bench.slave.read_word(addr), 0xAB);
    let stats = bench.xcache.stats();
    assert_eq!(stats.sc_ok_count, 1);
    assert_eq!(stats.sc_ko_count, 1);
}

/// SC without any prior LL fails immediately and produces no bus traffic.
#[test]
fn sc_without_reservation_fails_fast() {
    let mut bench = TestBench::small();
    let addr = 0x0000_9100;

    let rsp = bench.data(DataRequest::store_conditional(addr, 1));
    assert_eq!(rsp, DataResponse::ScFailure);
    bench.run_until_quiescent();
    assert!(bench.slave.write_log().is_empty());
    assert_eq!(bench.slave.read_word(addr), 0);
}

/// SC to a different address than the reservation fails and leaves the
/// reservation intact for the right address.
#[test]
fn sc_to_wrong_address_fails() {
    let mut bench = TestBench::small();

    assert_eq!(
        bench.data(DataRequest::load_linked(0x0000_9200)),
        DataResponse::Data(0)
    );
    assert_eq!(
        bench.data(DataRequest::store_conditional(0x0000_9300, 5)),
        DataResponse::ScFailure
    );
    // The original reservation still stands.
    assert_eq!(
        bench.data(DataRequest::store_conditional(0x0000_9200, 6)),
        DataResponse::ScSuccess
    );
}

/// An external bus write on the reserved address clears the reservation;
/// the following SC fails.
#[test]
fn external_write_steals_reservation() {
    let mut bench = TestBench::small();
    let addr = 0x0000_9400;

    assert_eq!(bench.data(DataRequest::load_linked(addr)), DataResponse::Data(0));
    bench.run_until_quiescent();

    bench.external_write(addr, 0x111);
    assert_eq!(
        bench.data(DataRequest::store_conditional(addr, 0x222)),
        DataResponse::ScFailure
    );
    // The external value survives.
    bench.run_until_quiescent();
    assert_eq!(bench.slave.read_word(addr), 0x111);
}

/// The reservation is guarded on cache miss too: an uncacheable LL sets it
/// and an external write on that address still clears it.
#[test]
fn uncached_ll_reservation_is_guarded() {
    let mut bench = TestBench::small();
    let addr = UNCACHED_BASE + 0x80;
    bench.slave.poke(addr, 0x42);

    assert_eq!(bench.data(DataRequest::load_linked(addr)), DataResponse::Data(0x42));
    bench.external_write(addr, 0x43);
    assert_eq!(
        bench.data(DataRequest::store_conditional(addr, 0x44)),
        DataResponse::ScFailure
    );

    // A fresh LL/SC pair works again.
    assert_eq!(bench.data(DataRequest::load_linked(addr)), DataResponse::Data(0x43));
    assert_eq!(
        bench.data(DataRequest::store_conditional(addr, 0x44)),
        DataResponse::ScSuccess
    );
    bench.run_until_quiescent();
    assert_eq!(bench.slave.read_word(addr), 0x44);
}

/// A successful SC that hits the cache also updates the cached copy.
#[test]
fn sc_hit_updates_cached_copy() {
    let mut bench = TestBench::small();
    let addr = 0x0000_9500;
    bench.slave.poke(addr, 0x10);

    assert_eq!(bench.load(addr), 0x10);
    assert_eq!(bench.data(DataRequest::load_linked(addr)), DataResponse::Data(0x10));
    assert_eq!(
        bench.data(DataRequest::store_conditional(addr, 0x20)),
        DataResponse::ScSuccess
    );

    // Served from the updated line before the drain completes.
    assert_eq!(bench.assert_hit(addr), 0x20);
}
