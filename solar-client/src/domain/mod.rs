pub mod device;
pub mod reading;
pub mod summary;
pub mod weather;

pub use device::{DeviceClass, DeviceReading, DeviceStatus};
pub use reading::{Reading, ReadingSource};
pub use summary::SystemSummary;
pub use weather::WeatherObservation;
