pub mod context;
pub mod framework;
pub mod outlet;
pub mod qa;
pub mod research;
pub mod state;
pub mod workflow;
