pub mod interval;
pub mod local_time;
pub mod models;
pub mod recurrence;
