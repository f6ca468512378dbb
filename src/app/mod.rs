pub mod jobs;
pub mod services;

pub use jobs::{JobReport, ScheduledJob, ScheduledJobs};
pub use services::Services;
