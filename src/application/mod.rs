//! Use-case orchestration: the planner tick loop, its services, the
//! RPC request queue, and the battery command protocol.

pub mod battery;
pub mod planner;
pub mod requests;
pub mod services;

pub use battery::{BatteryCommunicator, LogPublisher, MessagePublisher};
pub use planner::{Planner, PlannerConfig};
pub use requests::{JobDetails, PlannerHandle};
pub use services::StationPicker;
