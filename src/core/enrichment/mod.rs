pub mod device;

pub use device::{DeviceInfo, DeviceLookup};
