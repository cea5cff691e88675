use heapless::Vec;

use super::driver::{ApRecord, DriverEvent, DriverEventSink, WifiDriver};
use super::state::{ConnectionState, Phase, WifiStatus};
use super::{Command, WifiClientStatic};
use crate::Error;
use crate::wifi_config::{WifiClientConfig, WifiClientEvent};

/// Bring-up steps in order; tearing down from a step undoes it and everything before it.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BringUp {
    Interface,
    Radio,
    Running,
    Subscribed,
}

/// The WiFi client worker: owns the driver and the connection state.
///
/// Obtained from the first [`WifiClient::init`](crate::WifiClient::init). Firmware spawns a
/// task that awaits [`run`](Self::run); tests and polled loops can call
/// [`process_queued`](Self::process_queued) instead.
pub struct Controller<D: WifiDriver> {
    pub(super) resources: &'static WifiClientStatic,
    pub(super) config: WifiClientConfig,
    pub(super) driver: D,
    pub(super) state: ConnectionState,
    pub(super) started: bool,
}

impl<D: WifiDriver> Controller<D> {
    pub(super) fn new(
        resources: &'static WifiClientStatic,
        config: WifiClientConfig,
        driver: D,
    ) -> Self {
        Self {
            resources,
            config,
            driver,
            state: ConnectionState::default(),
            started: false,
        }
    }

    /// Process commands forever.
    pub async fn run(mut self) -> ! {
        loop {
            let command = self.resources.commands.receive().await;
            self.handle(command).await;
        }
    }

    /// Process every command currently queued, including any the driver posts meanwhile.
    ///
    /// Returns how many commands were handled.
    pub async fn process_queued(&mut self) -> usize {
        let mut handled = 0_usize;
        while let Ok(command) = self.resources.commands.try_receive() {
            self.handle(command).await;
            handled = handled.saturating_add(1);
        }
        handled
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    #[must_use]
    pub const fn status(&self) -> WifiStatus {
        self.state.status()
    }

    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Start(responder) => {
                let result = self.start().await;
                responder.resolve(result);
            }
            Command::Stop(responder) => {
                self.stop().await;
                responder.resolve(());
            }
            Command::Connect {
                credentials,
                responder,
            } => self.connect(credentials, responder).await,
            Command::Disconnect(responder) => {
                self.disconnect().await;
                responder.resolve(());
            }
            Command::Scan {
                capacity,
                responder,
            } => self.scan(capacity, responder).await,
            Command::Status(responder) => responder.resolve(Ok(self.state.status())),
            Command::Driver(event) => self.on_driver_event(event).await,
        }
    }

    async fn start(&mut self) -> crate::Result<()> {
        if self.started {
            #[cfg(feature = "defmt")]
            defmt::warn!("WiFi client start ignored: already started");
            return Err(Error::AlreadyStarted);
        }

        let mut reached = None;
        if let Err(err) = self.bring_up(&mut reached).await {
            #[cfg(feature = "defmt")]
            defmt::error!("WiFi bring-up failed after {}: {}", reached, err);
            if let Some(step) = reached {
                self.tear_down(step).await;
            }
            return Err(Error::Initialization(err));
        }

        self.started = true;
        self.state.phase = Phase::Disconnected;
        #[cfg(feature = "defmt")]
        defmt::info!("WiFi client started");
        Ok(())
    }

    async fn bring_up(
        &mut self,
        reached: &mut Option<BringUp>,
    ) -> Result<(), crate::DriverError> {
        self.driver.create_interface().await?;
        *reached = Some(BringUp::Interface);
        self.driver.init_radio().await?;
        *reached = Some(BringUp::Radio);
        self.driver.set_station_mode().await?;
        self.driver.set_power_save(self.config.power_save).await?;
        self.driver.start_radio().await?;
        *reached = Some(BringUp::Running);
        let sink = DriverEventSink::new(&self.resources.commands);
        self.driver.subscribe(sink).await?;
        *reached = Some(BringUp::Subscribed);
        Ok(())
    }

    async fn tear_down(&mut self, reached: BringUp) {
        if reached >= BringUp::Subscribed {
            self.driver.unsubscribe().await;
        }
        if reached >= BringUp::Running {
            self.driver.stop_radio().await;
        }
        if reached >= BringUp::Radio {
            self.driver.deinit_radio().await;
        }
        self.driver.destroy_interface().await;
    }

    async fn stop(&mut self) {
        if !self.started {
            #[cfg(feature = "defmt")]
            defmt::debug!("WiFi client stop: not started");
            return;
        }
        self.stop_current_scan(Error::Cancelled).await;
        self.force_disconnect(Error::Cancelled).await;
        self.tear_down(BringUp::Subscribed).await;
        self.started = false;
        self.state.phase = Phase::Disconnected;
        #[cfg(feature = "defmt")]
        defmt::info!("WiFi client stopped");
    }

    async fn on_driver_event(&mut self, event: DriverEvent) {
        if !self.started {
            #[cfg(feature = "defmt")]
            defmt::debug!("WiFi client not started, ignoring {}", event);
            return;
        }
        match event {
            DriverEvent::Connected(ip_info) => self.on_connected(ip_info),
            DriverEvent::Disconnected(reason) => self.on_disconnected(reason).await,
            DriverEvent::ScanDone => self.on_scan_done().await,
        }
    }

    /// Ask the driver to drop the link and fail any pending connect with `reason`.
    pub(super) async fn force_disconnect(&mut self, reason: Error) {
        if let Err(_err) = self.driver.disconnect().await {
            #[cfg(feature = "defmt")]
            defmt::warn!("WiFi driver disconnect failed: {}", _err);
        }
        if let Some(responder) = self.state.pending_connect.take() {
            #[cfg(feature = "defmt")]
            defmt::info!("Pending connect failed: {}", reason);
            responder.resolve(Err(reason));
        }
        self.state.phase = Phase::Disconnected;
    }

    /// Cancel the scan in flight, if any, and fail its handle with `reason`.
    pub(super) async fn stop_current_scan(&mut self, reason: Error) {
        let Some(scan) = self.state.pending_scan.take() else {
            return;
        };
        if let Err(_err) = self.driver.scan_stop().await {
            #[cfg(feature = "defmt")]
            defmt::warn!("WiFi driver scan stop failed: {}", _err);
        }
        self.discard_scan_records().await;
        scan.responder.resolve(Err(reason));
    }

    /// Release whatever results the driver is holding.
    pub(super) async fn discard_scan_records(&mut self) {
        let mut nothing: Vec<ApRecord, 0> = Vec::new();
        if let Err(_err) = self.driver.scan_records(&mut nothing, 0).await {
            #[cfg(feature = "defmt")]
            defmt::warn!("WiFi driver failed to release scan records: {}", _err);
        }
    }

    pub(super) fn notify(&self, event: WifiClientEvent) {
        #[cfg(feature = "defmt")]
        defmt::info!("WiFi client event: {}", event);
        (self.config.observer)(event);
        self.resources.events.signal(event);
    }
}
