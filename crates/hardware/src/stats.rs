//! Simulation statistics collection and reporting.
//!
//! This module tracks the activity of the Z/stencil stage. It provides:
//! 1. **Traffic:** Samples received and sent, memory transactions and bytes.
//! 2. **Tests:** Samples tested, passed, failed, culled before testing.
//! 3. **Cache:** Successful and retried fetches, reads and writes.
//! 4. **Hazards:** Reads deferred by read-after-write conflicts.

/// Statistics of the Z/stencil stage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZStencilStats {
    /// Total simulator cycles elapsed.
    pub cycles: u64,

    /// Samples received from the upstream unit.
    pub inputs: u64,
    /// Samples sent downstream.
    pub outputs: u64,
    /// Samples that went through the test.
    pub tested: u64,
    /// Tested samples that survived.
    pub passed: u64,
    /// Tested samples that were culled.
    pub failed: u64,
    /// Samples outside the triangle.
    pub outside: u64,
    /// Samples of stamps dropped because every sample was already culled.
    pub culled: u64,

    /// Read transactions sent to memory.
    pub read_trans: u64,
    /// Write transactions sent to memory.
    pub write_trans: u64,
    /// Bytes requested from memory.
    pub read_bytes: u64,
    /// Bytes written to memory.
    pub write_bytes: u64,

    /// Successful cache fetches.
    pub fetch_ok: u64,
    /// Cache fetches that had to be retried.
    pub fetch_fail: u64,
    /// Successful cache reads.
    pub read_ok: u64,
    /// Cache reads that had to be retried.
    pub read_fail: u64,
    /// Successful cache writes.
    pub write_ok: u64,
    /// Cache writes that had to be retried.
    pub write_fail: u64,

    /// Reads deferred by a read-after-write hazard.
    pub raw_dep: u64,
    /// Hierarchical Z updates forwarded.
    pub hz_updates: u64,
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"test"`, `"cache"`, `"memory"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "test", "cache", "memory"];

impl ZStencilStats {
    /// Prints only the requested statistics sections to stdout.
    ///
    /// # Arguments
    ///
    /// * `sections` - Slice of section names to print, or empty for all.
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let percent = |part: u64, whole: u64| {
            if whole == 0 {
                0.0
            } else {
                part as f64 / whole as f64 * 100.0
            }
        };

        if want("summary") {
            let cyc = self.cycles.max(1);
            println!("\n==========================================================");
            println!("Z/STENCIL TEST SIMULATION STATISTICS");
            println!("==========================================================");
            println!("sim_cycles               {}", self.cycles);
            println!("zst.inputs               {}", self.inputs);
            println!("zst.outputs              {}", self.outputs);
            println!("zst.samples_per_cycle    {:.4}", self.outputs as f64 / cyc as f64);
            println!("----------------------------------------------------------");
        }
        if want("test") {
            println!("DEPTH/STENCIL TEST");
            println!("  test.tested            {}", self.tested);
            println!(
                "  test.passed            {} ({:.2}%)",
                self.passed,
                percent(self.passed, self.tested)
            );
            println!(
                "  test.failed            {} ({:.2}%)",
                self.failed,
                percent(self.failed, self.tested)
            );
            println!("  test.outside           {}", self.outside);
            println!("  test.culled            {}", self.culled);
            println!("  test.raw_dependencies  {}", self.raw_dep);
            println!("----------------------------------------------------------");
        }
        if want("cache") {
            let print_port = |name: &str, ok: u64, fail: u64| {
                println!(
                    "  {:<6} ok: {:<10} | retries: {:<10} | retry_rate: {:.2}%",
                    name,
                    ok,
                    fail,
                    percent(fail, ok + fail)
                );
            };
            println!("Z CACHE");
            print_port("fetch", self.fetch_ok, self.fetch_fail);
            print_port("read", self.read_ok, self.read_fail);
            print_port("write", self.write_ok, self.write_fail);
            println!("----------------------------------------------------------");
        }
        if want("memory") {
            println!("MEMORY");
            println!("  mem.read_trans         {}", self.read_trans);
            println!("  mem.read_bytes         {}", self.read_bytes);
            println!("  mem.write_trans        {}", self.write_trans);
            println!("  mem.write_bytes        {}", self.write_bytes);
            println!("  mem.hz_updates         {}", self.hz_updates);
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
