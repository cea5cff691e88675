//! Walks the WiFi client through its whole lifecycle on a Pico W.
//!
//! Starts the radio, scans, connects to `WIFI_SSID`/`WIFI_PASS` (read at build time),
//! reports link events for a while, then disconnects and stops.

#![no_std]
#![no_main]
#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::convert::Infallible;
use defmt::*;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_time::Timer;
use panic_probe as _;
use wifi_client::cyw43_driver::{Cyw43Driver, Cyw43DriverStatic};
use wifi_client::{
    PowerSave, Result, WifiClient, WifiClientConfig, WifiClientEvent, WifiClientStatic,
};

// Exported by build.rs from the environment or `.env`.
const WIFI_SSID: &str = env!("WIFI_SSID");
const WIFI_PASS: &str = env!("WIFI_PASS");

fn log_event(event: WifiClientEvent) {
    info!("Observer: {}", event);
}

// ============================================================================
// Main
// ============================================================================

#[embassy_executor::main]
pub async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    core::panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    info!("Starting WiFi client demo");

    let p = embassy_rp::init(Default::default());

    static CYW43_DRIVER: Cyw43DriverStatic = Cyw43Driver::new_static();
    let driver = Cyw43Driver::new(
        &CYW43_DRIVER,
        p.PIN_23,
        p.PIN_25,
        p.PIO0,
        p.PIN_24,
        p.PIN_29,
        p.DMA_CH0,
        spawner,
    );

    static WIFI_CLIENT: WifiClientStatic = WifiClient::new_static();
    let config = WifiClientConfig::new(log_event)
        .with_connection_attempts(5)
        .with_reconnection_attempts(10)
        .with_power_save(PowerSave::MinModem);
    let (client, controller) = WifiClient::init(&WIFI_CLIENT, config, driver);
    if let Some(controller) = controller {
        Cyw43Driver::spawn_controller(controller, spawner)?;
    }

    loop {
        client.start()?.wait().await?;

        let networks = client.scan(8)?.wait().await?;
        info!("Found {} networks", networks.len());
        for network in &networks {
            info!(
                "  {} strength {} {}",
                network.ssid.as_str(),
                network.strength,
                if network.open { "open" } else { "secured" }
            );
        }

        // Issued twice on purpose: the second request finds the link already up.
        client.connect(WIFI_SSID, WIFI_PASS)?.wait().await?;
        client.connect(WIFI_SSID, WIFI_PASS)?.wait().await?;
        let status = client.status()?.wait().await?;
        info!(
            "Connected ({}), attempts used {}",
            status.phase, status.connection_attempts_used
        );

        // Report link events for a minute.
        let watch = async {
            loop {
                let event = client.wait_event().await;
                info!("Link event: {}", event);
            }
        };
        if let Either::Second(()) = select(watch, Timer::after_secs(60)).await {
            info!("Done watching");
        }

        client.disconnect()?.wait().await;
        client.stop()?.wait().await;
        info!("WiFi client stopped; restarting in 10 s");
        Timer::after_secs(10).await;
    }
}
