//! Host resource probing for the concurrency budget.

use sysinfo::System;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemResources {
	/// Total physical RAM in bytes.
	pub ram_total: u64,
	/// Currently available RAM in bytes.
	pub ram_available: u64,
	/// Number of logical CPUs.
	pub cpus: u64,
}

impl SystemResources {
	pub fn probe() -> SystemResources {
		let mut system = System::new();
		system.refresh_memory();
		SystemResources {
			ram_total: system.total_memory(),
			ram_available: system.available_memory(),
			cpus: num_cpus::get() as u64,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn probe_reports_plausible_values() {
		let resources = SystemResources::probe();
		assert!(resources.cpus >= 1);
		assert!(resources.ram_total > 0);
		assert!(resources.ram_available <= resources.ram_total);
	}
}
