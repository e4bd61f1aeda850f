pub mod config;
pub use config::PlatformConfig;
pub mod ports;
pub use ports::{PortAllocation, PortPlan, PortRangeError};
pub mod registry;
pub use registry::RuntimeRegistry;
pub mod services;
pub use services::RuntimeService;
