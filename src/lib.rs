pub mod clock;
pub mod config;
pub mod deadline;
pub mod engine;
pub mod feed;
pub mod queue;
pub mod store;
pub mod telegram;
