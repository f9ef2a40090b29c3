//! Host inspection used to pick a default model

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use crate::{BenchError, Result};

pub trait MemoryInspector {
    /// Total physical memory of the host in bytes.
    fn total_memory_bytes(&self) -> Result<u64>;
}

/// Reads physical memory through `sysinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoMemory;

impl MemoryInspector for SysinfoMemory {
    fn total_memory_bytes(&self) -> Result<u64> {
        let mut sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();

        let total = sys.total_memory();
        // sysinfo reports 0 on platforms it cannot read
        if total == 0 {
            return Err(BenchError::MemoryInspector(
                "host reported 0 bytes of physical memory".to_string(),
            ));
        }

        tracing::debug!(total_bytes = total, "Read host memory");
        Ok(total)
    }
}

/// Fixed memory size, for hosts where the real value should be overridden.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub u64);

impl MemoryInspector for FixedMemory {
    fn total_memory_bytes(&self) -> Result<u64> {
        Ok(self.0)
    }
}
