/// Resource ceilings for sandboxed child processes
///
/// Ceilings are applied in the child between fork and exec. They are
/// best effort: a host (or container) that refuses a limit simply runs the
/// child without it. `probe()` lets the parent find out ahead of time.
use nix::sys::resource::{getrlimit, setrlimit, Resource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceCeilings {
    /// RLIMIT_CPU (seconds)
    pub cpu_seconds: u64,
    /// RLIMIT_AS (bytes)
    pub address_space_bytes: u64,
    /// RLIMIT_FSIZE (bytes)
    pub file_size_bytes: u64,
    /// RLIMIT_NOFILE
    pub open_files: u64,
    /// RLIMIT_NPROC
    pub processes: u64,
}

impl Default for ResourceCeilings {
    fn default() -> Self {
        Self {
            cpu_seconds: 20,
            address_space_bytes: 256 * 1024 * 1024,
            file_size_bytes: 20 * 1024 * 1024,
            open_files: 128,
            processes: 64,
        }
    }
}

impl ResourceCeilings {
    fn entries(&self) -> [(&'static str, Resource, u64); 5] {
        [
            ("RLIMIT_CPU", Resource::RLIMIT_CPU, self.cpu_seconds),
            ("RLIMIT_AS", Resource::RLIMIT_AS, self.address_space_bytes),
            ("RLIMIT_FSIZE", Resource::RLIMIT_FSIZE, self.file_size_bytes),
            ("RLIMIT_NOFILE", Resource::RLIMIT_NOFILE, self.open_files),
            ("RLIMIT_NPROC", Resource::RLIMIT_NPROC, self.processes),
        ]
    }

    /// Check from the parent whether every ceiling can be set here.
    ///
    /// A ceiling above the current hard limit would need privileges to
    /// raise it, so it is reported as unavailable. Returns the names of
    /// the ceilings that cannot be applied; empty means all apply.
    pub fn probe(&self) -> Vec<&'static str> {
        if !cfg!(target_os = "linux") {
            return self.entries().iter().map(|(name, _, _)| *name).collect();
        }

        self.entries()
            .iter()
            .filter_map(|(name, resource, value)| match getrlimit(*resource) {
                Ok((_, hard)) if *value <= hard as u64 => None,
                _ => Some(*name),
            })
            .collect()
    }

    /// Apply every ceiling, each independently. Returns true when all of
    /// them were accepted.
    ///
    /// Runs in the forked child before exec: no allocation, no logging.
    pub fn apply(&self) -> bool {
        let mut all_applied = true;
        for (_, resource, value) in self.entries() {
            if setrlimit(resource, value as _, value as _).is_err() {
                all_applied = false;
            }
        }
        all_applied
    }
}
