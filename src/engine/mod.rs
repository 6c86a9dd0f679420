pub mod coordination;
pub mod plan;
pub mod step_loop;

pub use coordination::CoordinationHub;
pub use plan::PlanRunner;
pub use step_loop::{is_stuck, AgentLoop, AgentMessage, RECOVERY_STRATEGIES};
