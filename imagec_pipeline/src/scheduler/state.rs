//! The job state machine.
//!
//! `Idle → Preparing → Running → {Finished | Error | Stopping →
//! Stopped}`; terminal states are sticky.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
	Idle,
	Preparing,
	Running,
	Finished,
	Error,
	Stopping,
	Stopped,
}

impl JobState {
	pub fn is_terminal(self) -> bool {
		matches!(self, JobState::Finished | JobState::Error | JobState::Stopped)
	}

	pub fn is_active(self) -> bool {
		matches!(self, JobState::Preparing | JobState::Running | JobState::Stopping)
	}
}

impl std::fmt::Display for JobState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			JobState::Idle => "idle",
			JobState::Preparing => "preparing",
			JobState::Running => "running",
			JobState::Finished => "finished",
			JobState::Error => "error",
			JobState::Stopping => "stopping",
			JobState::Stopped => "stopped",
		};
		write!(f, "{name}")
	}
}
