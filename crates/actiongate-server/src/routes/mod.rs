pub mod definitions;
pub mod execute;
pub mod executions;
pub mod health;
pub mod session;
pub mod stats;
