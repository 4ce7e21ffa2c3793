mod coordinator;
mod synthesis;

pub use coordinator::FusionCoordinator;
pub use synthesis::synthesize;
