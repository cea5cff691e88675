//! Asynchronous WiFi station client for embassy-based firmware.
#![cfg_attr(not(test), no_std)]

mod error;
pub mod wifi_client;
pub mod wifi_config;

#[cfg(all(feature = "wifi", any(feature = "pico1", feature = "pico2")))]
pub mod cyw43_driver;

// Re-export commonly used items
pub use error::{DriverError, Error, Result};
pub use wifi_client::{
    AccessPoint, ApRecord, AuthMode, COMMAND_QUEUE_DEPTH, Controller, DRIVER_EVENT_HEADROOM,
    DisconnectReason, DriverEvent, DriverEventSink, IpInfo, LinkWatch, MAX_SCAN_RESULTS, Outcome,
    Pending, Phase,
    REPLY_SLOT_COUNT, ScanResults, StationConfig, WifiClient, WifiClientStatic, WifiDriver,
    WifiStatus,
};
pub use wifi_config::{
    PASSWORD_MAX_LEN, PowerSave, SSID_MAX_LEN, WifiClientConfig, WifiClientEvent,
    WifiCredentials,
};
