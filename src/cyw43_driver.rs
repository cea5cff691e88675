//! [`WifiDriver`] for the CYW43439 radio on the Raspberry Pi Pico W and Pico 2 W.
//!
//! The radio and the embassy-net stack are brought up the first time the client starts and
//! stay up for the life of the program; stopping the client leaves the network and drops the
//! event subscription. Link state is watched by a background task that reports DHCP
//! configuration changes as [`DriverEvent`]s, except the link-down that follows a leave the
//! client asked for.
//!
//! # Example
//!
//! ```no_run
//! # #![no_std]
//! # #![no_main]
//! # use panic_probe as _;
//! # use core::default::Default;
//! use wifi_client::cyw43_driver::{Cyw43Driver, Cyw43DriverStatic};
//! use wifi_client::{WifiClient, WifiClientConfig, WifiClientStatic};
//!
//! # async fn example(spawner: embassy_executor::Spawner) -> wifi_client::Result<()> {
//! let p = embassy_rp::init(Default::default());
//!
//! static CYW43_DRIVER: Cyw43DriverStatic = Cyw43Driver::new_static();
//! static WIFI_CLIENT: WifiClientStatic = WifiClient::new_static();
//!
//! let driver = Cyw43Driver::new(
//!     &CYW43_DRIVER,
//!     p.PIN_23,
//!     p.PIN_25,
//!     p.PIO0,
//!     p.PIN_24,
//!     p.PIN_29,
//!     p.DMA_CH0,
//!     spawner,
//! );
//! let (client, controller) = WifiClient::init(&WIFI_CLIENT, WifiClientConfig::new(|_| {}), driver);
//! if let Some(controller) = controller {
//!     Cyw43Driver::spawn_controller(controller, spawner)?;
//! }
//!
//! client.start()?.wait().await?;
//! client.connect("home", "secret")?.wait().await?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::cell::Cell;
use core::net::Ipv4Addr;

use cyw43::{JoinOptions, PowerManagementMode, ScanOptions};
use cyw43_pio::{DEFAULT_CLOCK_DIVIDER, PioSpi};
use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_net::{Config, Stack, StackResources};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIN_23, PIN_24, PIN_25, PIN_29, PIO0};
use embassy_rp::pio::{Common, InterruptHandler, Pio};
use embassy_rp::{Peri, bind_interrupts};
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use static_cell::StaticCell;

use crate::wifi_client::{
    ApRecord, AuthMode, Controller, DisconnectReason, DriverEvent, DriverEventSink, IpInfo,
    LinkWatch, MAX_SCAN_RESULTS, StationConfig, WifiDriver,
};
use crate::{DriverError, PowerSave, Result};

/// Capability bit set by access points that require encryption.
const CAPABILITY_PRIVACY: u16 = 0x0010;

const NET_SEED: u64 = 0x7c8f_3a2e_9d14_6b5a;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

/// Static resources for [`Cyw43Driver`].
pub struct Cyw43DriverStatic {
    state: StaticCell<cyw43::State>,
    pio_common: StaticCell<Common<'static, PIO0>>,
    net_resources: StaticCell<StackResources<5>>,
    sink: Mutex<CriticalSectionRawMutex, Cell<Option<DriverEventSink>>>,
    link: LinkWatch,
}

impl Cyw43DriverStatic {
    fn post(&self, event: DriverEvent) {
        match self.sink.lock(Cell::get) {
            Some(sink) => {
                sink.notify(event);
            }
            None => info!("No WiFi client subscribed, dropping {}", event),
        }
    }
}

struct Cyw43Pins {
    pin_23: Peri<'static, PIN_23>,
    pin_25: Peri<'static, PIN_25>,
    pio0: Peri<'static, PIO0>,
    pin_24: Peri<'static, PIN_24>,
    pin_29: Peri<'static, PIN_29>,
    dma_ch0: Peri<'static, DMA_CH0>,
}

/// CYW43 radio adapter. Construct with [`Cyw43Driver::new`] and hand to
/// [`WifiClient::init`](crate::WifiClient::init).
pub struct Cyw43Driver {
    resources: &'static Cyw43DriverStatic,
    pins: Option<Cyw43Pins>,
    control: Option<cyw43::Control<'static>>,
    radio_ready: bool,
    spawner: Spawner,
    station: StationConfig,
    records: heapless::Vec<ApRecord, MAX_SCAN_RESULTS>,
}

impl Cyw43Driver {
    /// Create the static resources for the driver.
    #[must_use]
    pub const fn new_static() -> Cyw43DriverStatic {
        Cyw43DriverStatic {
            state: StaticCell::new(),
            pio_common: StaticCell::new(),
            net_resources: StaticCell::new(),
            sink: Mutex::new(Cell::new(None)),
            link: LinkWatch::new(),
        }
    }

    /// Take ownership of the radio pins. Nothing touches the hardware until the client starts.
    ///
    /// # Arguments
    ///
    /// * `pin_23` - WiFi chip power pin (GPIO 23)
    /// * `pin_25` - WiFi chip chip select pin (GPIO 25)
    /// * `pio0` - PIO peripheral for WiFi communication
    /// * `pin_24` - WiFi chip clock pin (GPIO 24)
    /// * `pin_29` - WiFi chip data pin (GPIO 29)
    /// * `dma_ch0` - DMA channel for WiFi SPI communication
    /// * `spawner` - Embassy task spawner, used for the radio, network and link tasks
    #[expect(clippy::too_many_arguments, reason = "one argument per radio pin")]
    #[must_use]
    pub fn new(
        resources: &'static Cyw43DriverStatic,
        pin_23: Peri<'static, PIN_23>,
        pin_25: Peri<'static, PIN_25>,
        pio0: Peri<'static, PIO0>,
        pin_24: Peri<'static, PIN_24>,
        pin_29: Peri<'static, PIN_29>,
        dma_ch0: Peri<'static, DMA_CH0>,
        spawner: Spawner,
    ) -> Self {
        Self {
            resources,
            pins: Some(Cyw43Pins {
                pin_23,
                pin_25,
                pio0,
                pin_24,
                pin_29,
                dma_ch0,
            }),
            control: None,
            radio_ready: false,
            spawner,
            station: StationConfig::default(),
            records: heapless::Vec::new(),
        }
    }

    /// Spawn the task that runs `controller`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskSpawn`](crate::Error::TaskSpawn) if the task is already running.
    pub fn spawn_controller(controller: Controller<Self>, spawner: Spawner) -> Result<()> {
        let token = wifi_client_task(controller)?;
        spawner.spawn(token);
        Ok(())
    }

    fn control(&mut self) -> Result<&mut cyw43::Control<'static>, DriverError> {
        self.control.as_mut().ok_or(DriverError::NotInitialized)
    }

    /// Leave the network without reporting the resulting link-down as a disconnection.
    async fn leave(&mut self) -> Result<(), DriverError> {
        let resources = self.resources;
        let control = self.control()?;
        if resources.link.expect_leave() {
            info!("Leaving network");
        }
        control.leave().await;
        Ok(())
    }
}

impl WifiDriver for Cyw43Driver {
    async fn create_interface(&mut self) -> Result<(), DriverError> {
        if self.control.is_some() {
            return Ok(());
        }
        let pins = self.pins.take().ok_or(DriverError::NotInitialized)?;
        info!("CYW43 bring-up");

        let pwr = Output::new(pins.pin_23, Level::Low);
        let cs = Output::new(pins.pin_25, Level::High);
        let Pio {
            common, sm0, irq0, ..
        } = Pio::new(pins.pio0, Irqs);
        // PIO program memory must outlive the SPI state machine.
        let common = self.resources.pio_common.init(common);
        let spi = PioSpi::new(
            common,
            sm0,
            DEFAULT_CLOCK_DIVIDER,
            irq0,
            cs,
            pins.pin_24,
            pins.pin_29,
            pins.dma_ch0,
        );

        let state = self.resources.state.init(cyw43::State::new());
        let (net_device, control, runner) =
            cyw43::new(state, pwr, spi, cyw43_firmware::CYW43_43439A0).await;
        let radio_token = radio_task(runner).map_err(DriverError::TaskSpawn)?;
        self.spawner.spawn(radio_token);

        let (stack, net_runner) = embassy_net::new(
            net_device,
            Config::dhcpv4(Default::default()),
            self.resources.net_resources.init(StackResources::<5>::new()),
            NET_SEED,
        );
        let net_token = net_task(net_runner).map_err(DriverError::TaskSpawn)?;
        self.spawner.spawn(net_token);
        let link_token = link_task(stack, self.resources).map_err(DriverError::TaskSpawn)?;
        self.spawner.spawn(link_token);

        self.control = Some(control);
        Ok(())
    }

    async fn destroy_interface(&mut self) {
        // The radio runner and network stack live in static storage and are reused on restart.
    }

    async fn init_radio(&mut self) -> Result<(), DriverError> {
        if self.radio_ready {
            return Ok(());
        }
        self.control()?
            .init(cyw43_firmware::CYW43_43439A0_CLM)
            .await;
        self.radio_ready = true;
        Ok(())
    }

    async fn deinit_radio(&mut self) {}

    async fn set_station_mode(&mut self) -> Result<(), DriverError> {
        // The CYW43 firmware starts in station mode.
        self.control().map(|_| ())
    }

    async fn set_power_save(&mut self, power_save: PowerSave) -> Result<(), DriverError> {
        let mode = match power_save {
            PowerSave::None => PowerManagementMode::None,
            PowerSave::MinModem => PowerManagementMode::PowerSave,
            PowerSave::MaxModem => PowerManagementMode::SuperSave,
        };
        self.control()?.set_power_management(mode).await;
        Ok(())
    }

    async fn start_radio(&mut self) -> Result<(), DriverError> {
        self.control().map(|_| ())
    }

    async fn stop_radio(&mut self) {
        if let Err(err) = self.leave().await {
            warn!("CYW43 stop: {}", err);
        }
    }

    async fn subscribe(&mut self, sink: DriverEventSink) -> Result<(), DriverError> {
        self.resources.sink.lock(|cell| cell.set(Some(sink)));
        Ok(())
    }

    async fn unsubscribe(&mut self) {
        self.resources.sink.lock(|cell| cell.set(None));
    }

    async fn station_config(&mut self) -> Result<StationConfig, DriverError> {
        Ok(self.station.clone())
    }

    async fn set_station_config(&mut self, config: &StationConfig) -> Result<(), DriverError> {
        self.station = config.clone();
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), DriverError> {
        let resources = self.resources;
        let credentials = self.station.credentials.clone();
        let options = if credentials.is_open() {
            JoinOptions::new_open()
        } else {
            JoinOptions::new(credentials.password.as_bytes())
        };
        info!("Joining {}", credentials.ssid.as_str());
        let joined = self.control()?.join(credentials.ssid.as_str(), options).await;
        match joined {
            // The link task reports Connected once DHCP has configured the stack.
            Ok(()) => info!("Joined {}, waiting for DHCP", credentials.ssid.as_str()),
            Err(err) => {
                warn!("Join failed: status {}", err.status);
                resources.post(DriverEvent::Disconnected(DisconnectReason::CONNECTION_FAIL));
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        self.leave().await
    }

    async fn scan_start(&mut self) -> Result<(), DriverError> {
        let Some(control) = self.control.as_mut() else {
            return Err(DriverError::NotInitialized);
        };
        self.records.clear();
        let mut scanner = control.scan(ScanOptions::default()).await;
        while let Some(bss) = scanner.next().await {
            // Records past capacity are dropped; the firmware still has to finish the scan.
            self.records.push(ap_record(&bss)).ok();
        }
        drop(scanner);
        info!("CYW43 scan saw {} access points", self.records.len());
        self.resources.post(DriverEvent::ScanDone);
        Ok(())
    }

    async fn scan_stop(&mut self) -> Result<(), DriverError> {
        // Scans run to completion inside `scan_start`.
        Ok(())
    }

    async fn scan_records<const N: usize>(
        &mut self,
        records: &mut heapless::Vec<ApRecord, N>,
        limit: usize,
    ) -> Result<(), DriverError> {
        for record in self.records.iter().take(limit) {
            if records.push(record.clone()).is_err() {
                break;
            }
        }
        self.records.clear();
        Ok(())
    }
}

fn ap_record(bss: &cyw43::BssInfo) -> ApRecord {
    let ssid_len = usize::from(bss.ssid_len);
    let ssid = bss
        .ssid
        .get(..ssid_len)
        .and_then(|bytes| heapless::Vec::from_slice(bytes).ok())
        .unwrap_or_default();
    let rssi = bss.rssi;
    let capability = bss.capability;
    ApRecord {
        ssid,
        rssi: i8::try_from(rssi).unwrap_or(if rssi < 0 { i8::MIN } else { i8::MAX }),
        auth: if capability & CAPABILITY_PRIVACY == 0 {
            AuthMode::Open
        } else {
            AuthMode::Wpa2Personal
        },
    }
}

#[embassy_executor::task]
async fn wifi_client_task(controller: Controller<Cyw43Driver>) -> ! {
    controller.run().await
}

#[embassy_executor::task]
async fn radio_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Report DHCP configuration changes as connection events.
#[embassy_executor::task]
async fn link_task(stack: Stack<'static>, resources: &'static Cyw43DriverStatic) -> ! {
    loop {
        stack.wait_config_up().await;
        if let Some(config) = stack.config_v4() {
            let ip_info = IpInfo {
                address: config.address.address(),
                netmask: config.address.netmask(),
                gateway: config.gateway.unwrap_or(Ipv4Addr::UNSPECIFIED),
            };
            resources.post(resources.link.link_up(ip_info));
        }
        stack.wait_config_down().await;
        match resources.link.link_down() {
            Some(event) => {
                warn!("WiFi link lost");
                resources.post(event);
            }
            None => info!("Left network"),
        }
    }
}
