//! Instrumentation counters.
//!
//! This module tracks the activity counters exposed to external reporting
//! collaborators. It provides:
//! 1. **Cycle accounting:** Total cycles and frozen (stalled) cycles.
//! 2. **Per-category activity:** Miss/uncached/write counts with their stall cycles.
//! 3. **LL/SC outcome counts** and derived miss rates.
//!
//! All counters increase monotonically; the component never resets them.

use std::fmt;

/// Activity counters for one cache subsystem instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct XcacheStats {
    /// Total clock cycles stepped.
    pub total_cycles: u64,
    /// Cycles with at least one unserviced processor request.
    pub frz_cycles: u64,

    /// Serviced instruction fetches.
    pub ireq_count: u64,
    /// Instruction cache line refills.
    pub imiss_count: u64,
    /// Fetch stall cycles attributable to line refills.
    pub imiss_frz: u64,
    /// Uncached instruction reads.
    pub iunc_count: u64,
    /// Fetch stall cycles attributable to uncached reads.
    pub iunc_frz: u64,

    /// Serviced cacheable data reads (loads and load-linked).
    pub dread_count: u64,
    /// Data cache line refills.
    pub dmiss_count: u64,
    /// Data stall cycles attributable to line refills.
    pub dmiss_frz: u64,
    /// Uncached data reads.
    pub dunc_count: u64,
    /// Data stall cycles attributable to uncached reads.
    pub dunc_frz: u64,

    /// Stores accepted into the write buffer.
    pub write_count: u64,
    /// Data stall cycles attributable to stores (full write buffer included).
    pub write_frz: u64,

    /// Successful store-conditionals.
    pub sc_ok_count: u64,
    /// Failed store-conditionals.
    pub sc_ko_count: u64,
}

impl XcacheStats {
    /// Instruction miss rate: refills per serviced fetch.
    pub fn icache_miss_rate(&self) -> f64 {
        if self.ireq_count == 0 {
            0.0
        } else {
            self.imiss_count as f64 / self.ireq_count as f64
        }
    }

    /// Data miss rate: refills per serviced cacheable read.
    pub fn dcache_miss_rate(&self) -> f64 {
        if self.dread_count == 0 {
            0.0
        } else {
            self.dmiss_count as f64 / self.dread_count as f64
        }
    }
}

impl fmt::Display for XcacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cyc = self.total_cycles.max(1);
        writeln!(f, "==================================================")?;
        writeln!(f, "CACHE SUBSYSTEM STATISTICS")?;
        writeln!(f, "==================================================")?;
        writeln!(f, "total_cycles        {}", self.total_cycles)?;
        writeln!(
            f,
            "frz_cycles          {} ({:.2}%)",
            self.frz_cycles,
            (self.frz_cycles as f64 / cyc as f64) * 100.0
        )?;
        writeln!(f, "--------------------------------------------------")?;
        writeln!(f, "ireq_count          {}", self.ireq_count)?;
        writeln!(f, "imiss_count         {}", self.imiss_count)?;
        writeln!(f, "imiss_frz           {}", self.imiss_frz)?;
        writeln!(f, "iunc_count          {}", self.iunc_count)?;
        writeln!(f, "iunc_frz            {}", self.iunc_frz)?;
        writeln!(
            f,
            "icache_miss_rate    {:.4}",
            self.icache_miss_rate()
        )?;
        writeln!(f, "--------------------------------------------------")?;
        writeln!(f, "dread_count         {}", self.dread_count)?;
        writeln!(f, "dmiss_count         {}", self.dmiss_count)?;
        writeln!(f, "dmiss_frz           {}", self.dmiss_frz)?;
        writeln!(f, "dunc_count          {}", self.dunc_count)?;
        writeln!(f, "dunc_frz            {}", self.dunc_frz)?;
        writeln!(
            f,
            "dcache_miss_rate    {:.4}",
            self.dcache_miss_rate()
        )?;
        writeln!(f, "--------------------------------------------------")?;
        writeln!(f, "write_count         {}", self.write_count)?;
        writeln!(f, "write_frz           {}", self.write_frz)?;
        writeln!(f, "sc_ok_count         {}", self.sc_ok_count)?;
        writeln!(f, "sc_ko_count         {}", self.sc_ko_count)?;
        write!(f, "==================================================")
    }
}
