pub mod health;
pub mod monitor;
pub mod scheduler;
pub mod state_machine;

pub use health::HealthRecord;
pub use monitor::{CheckOutcome, HealthMonitor};
pub use scheduler::HealthCheckTask;
pub use state_machine::{AgentStateMachine, LifecycleEvent};
