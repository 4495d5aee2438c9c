//! Core business types: job and booking state machines, charger
//! commands, the parking-area layout, and the shared error type.

pub mod booking;
pub mod charger;
pub mod error;
pub mod job;
pub mod layout;

pub use booking::{BookingState, PluginState};
pub use charger::ChargerCommand;
pub use error::{DomainError, DomainResult};
pub use job::{JobState, JobStatus, JobType};
pub use layout::{Layout, CELL_SIZE, MAX_DISTANCE};
