pub mod heartbeat;
pub mod report;
