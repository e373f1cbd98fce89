//! Radio driver abstraction layer

pub mod mock_driver;
pub mod wifi_driver;

pub use mock_driver::MockWifiDriver;
pub use wifi_driver::WifiDriver;
