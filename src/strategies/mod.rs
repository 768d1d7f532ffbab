pub mod consistency;
pub mod types;
