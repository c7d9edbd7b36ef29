//! System probe backed by sysinfo.

use cairn_core::ports::{SystemProbe, SystemSample};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Reads machine memory, CPU usage and this process's footprint.
pub struct SysinfoProbe {
    sys: System,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            sys: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for SysinfoProbe {
    fn sample(&mut self) -> SystemSample {
        self.sys.refresh_memory();
        self.sys.refresh_cpu_usage();

        let (process_resident_bytes, process_virtual_bytes) = match self.pid {
            Some(pid) => {
                self.sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                self.sys
                    .process(pid)
                    .map(|process| (process.memory(), process.virtual_memory()))
                    .unwrap_or_default()
            }
            None => (0, 0),
        };

        SystemSample {
            memory_used_bytes: self.sys.used_memory(),
            memory_total_bytes: self.sys.total_memory(),
            process_resident_bytes,
            process_virtual_bytes,
            cpu_percent: self.sys.global_cpu_usage() as f64,
            cpu_cores: self.sys.cpus().len(),
        }
    }
}
