// Connection - audio device status and recovery

pub mod reconnect;
pub mod status;

pub use reconnect::ReconnectionStrategy;
pub use status::{AtomicDeviceStatus, DeviceStatus};
