pub mod fallback;
pub mod gateway;
pub mod weather;

pub use fallback::FallbackSource;
pub use gateway::{GatewayClient, RawDevice, RealSource};
pub use weather::WeatherClient;
