pub mod bootstrap;
pub mod commands;
pub mod occurrence_sync;
pub mod window;
