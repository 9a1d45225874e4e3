//! Background job scheduler and job implementations.

mod poll_alerts;
mod scheduler;

pub use poll_alerts::PollAlertsJob;
pub use scheduler::{Job, JobScheduler};
