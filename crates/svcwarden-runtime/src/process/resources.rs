use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use svcwarden_core::ResourceUsage;

/// Reads memory and CPU usage of a single process.
///
/// Keeps its `System` between samples so CPU usage is measured over the
/// interval since the previous call (the first sample reports 0%).
pub struct ResourceSampler {
    system: System,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Sample `pid`. Returns `None` if the process no longer exists.
    pub fn sample(&mut self, pid: u32) -> Option<ResourceUsage> {
        let pid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );

        self.system.process(pid).map(|process| ResourceUsage {
            memory_bytes: process.memory(),
            cpu_percent: process.cpu_usage(),
        })
    }
}
