// Re-export route modules
pub mod messages;
pub mod metrics;
pub mod presence;
pub mod rooms;
pub mod wsroute;
