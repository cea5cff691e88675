//! Recording mock driver and a harness that drives the controller on the host.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::rc::Rc;

use embassy_futures::block_on;
use wifi_client::{
    ApRecord, AuthMode, Controller, DriverError, DriverEvent, DriverEventSink, IpInfo, Outcome,
    Pending, PowerSave, StationConfig, WifiClient, WifiClientConfig, WifiClientEvent,
    WifiClientStatic, WifiDriver,
};

/// One driver call, as seen by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    CreateInterface,
    DestroyInterface,
    InitRadio,
    DeinitRadio,
    SetStationMode,
    SetPowerSave(PowerSave),
    StartRadio,
    StopRadio,
    Subscribe,
    Unsubscribe,
    StationConfig,
    SetStationConfig,
    Connect,
    Disconnect,
    ScanStart,
    ScanStop,
    ScanRecords(usize),
}

pub const START_SEQUENCE: [Call; 6] = [
    Call::CreateInterface,
    Call::InitRadio,
    Call::SetStationMode,
    Call::SetPowerSave(PowerSave::None),
    Call::StartRadio,
    Call::Subscribe,
];

#[derive(Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    /// Calls that fail with `DriverError::Status(7)` until removed.
    pub failing: Vec<Call>,
    pub station: StationConfig,
    pub records: Vec<ApRecord>,
    pub sink: Option<DriverEventSink>,
}

#[derive(Clone, Default)]
pub struct MockDriver(Rc<RefCell<MockState>>);

impl MockDriver {
    fn record(&self, call: Call) -> Result<(), DriverError> {
        let mut state = self.0.borrow_mut();
        state.calls.push(call);
        if state.failing.contains(&call) {
            Err(DriverError::Status(7))
        } else {
            Ok(())
        }
    }
}

impl WifiDriver for MockDriver {
    async fn create_interface(&mut self) -> Result<(), DriverError> {
        self.record(Call::CreateInterface)
    }

    async fn destroy_interface(&mut self) {
        let _ = self.record(Call::DestroyInterface);
    }

    async fn init_radio(&mut self) -> Result<(), DriverError> {
        self.record(Call::InitRadio)
    }

    async fn deinit_radio(&mut self) {
        let _ = self.record(Call::DeinitRadio);
    }

    async fn set_station_mode(&mut self) -> Result<(), DriverError> {
        self.record(Call::SetStationMode)
    }

    async fn set_power_save(&mut self, power_save: PowerSave) -> Result<(), DriverError> {
        self.record(Call::SetPowerSave(power_save))
    }

    async fn start_radio(&mut self) -> Result<(), DriverError> {
        self.record(Call::StartRadio)
    }

    async fn stop_radio(&mut self) {
        let _ = self.record(Call::StopRadio);
    }

    async fn subscribe(&mut self, sink: DriverEventSink) -> Result<(), DriverError> {
        self.record(Call::Subscribe)?;
        self.0.borrow_mut().sink = Some(sink);
        Ok(())
    }

    async fn unsubscribe(&mut self) {
        let _ = self.record(Call::Unsubscribe);
        self.0.borrow_mut().sink = None;
    }

    async fn station_config(&mut self) -> Result<StationConfig, DriverError> {
        self.record(Call::StationConfig)?;
        Ok(self.0.borrow().station.clone())
    }

    async fn set_station_config(&mut self, config: &StationConfig) -> Result<(), DriverError> {
        self.record(Call::SetStationConfig)?;
        self.0.borrow_mut().station = config.clone();
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), DriverError> {
        self.record(Call::Connect)
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        self.record(Call::Disconnect)
    }

    async fn scan_start(&mut self) -> Result<(), DriverError> {
        self.record(Call::ScanStart)
    }

    async fn scan_stop(&mut self) -> Result<(), DriverError> {
        self.record(Call::ScanStop)
    }

    async fn scan_records<const N: usize>(
        &mut self,
        records: &mut heapless::Vec<ApRecord, N>,
        limit: usize,
    ) -> Result<(), DriverError> {
        let result = self.record(Call::ScanRecords(limit));
        let held = std::mem::take(&mut self.0.borrow_mut().records);
        if result.is_ok() {
            for record in held.into_iter().take(limit) {
                if records.push(record).is_err() {
                    break;
                }
            }
        }
        result
    }
}

thread_local! {
    static OBSERVED: RefCell<Vec<WifiClientEvent>> = const { RefCell::new(Vec::new()) };
}

/// Observer that records events for the current test thread.
pub fn record_event(event: WifiClientEvent) {
    OBSERVED.with(|events| events.borrow_mut().push(event));
}

/// Events seen by [`record_event`] since the last call.
pub fn take_events() -> Vec<WifiClientEvent> {
    OBSERVED.with(|events| std::mem::take(&mut *events.borrow_mut()))
}

pub fn config() -> WifiClientConfig {
    WifiClientConfig::new(record_event)
}

pub fn ip(last: u8) -> IpInfo {
    IpInfo {
        address: Ipv4Addr::new(192, 168, 1, last),
        netmask: Ipv4Addr::new(255, 255, 255, 0),
        gateway: Ipv4Addr::new(192, 168, 1, 1),
    }
}

pub fn ap(ssid: &[u8], rssi: i8, auth: AuthMode) -> ApRecord {
    ApRecord {
        ssid: heapless::Vec::from_slice(ssid).expect("ssid fits"),
        rssi,
        auth,
    }
}

pub struct Harness {
    pub resources: &'static WifiClientStatic,
    pub client: WifiClient,
    pub controller: Controller<MockDriver>,
    pub mock: Rc<RefCell<MockState>>,
}

impl Harness {
    pub fn new(config: WifiClientConfig) -> Self {
        let resources: &'static WifiClientStatic = Box::leak(Box::new(WifiClient::new_static()));
        let driver = MockDriver::default();
        let mock = Rc::clone(&driver.0);
        let (client, controller) = WifiClient::init(resources, config, driver);
        Self {
            resources,
            client,
            controller: controller.expect("first init returns the controller"),
            mock,
        }
    }

    /// A harness whose client has already started, with the call log cleared.
    pub fn started(config: WifiClientConfig) -> Self {
        let mut harness = Self::new(config);
        let start = harness.client.start().expect("queued");
        harness.process();
        assert_eq!(harness.resolve(start), Ok(()));
        harness.clear_calls();
        harness
    }

    /// Run the worker until the queue is empty.
    pub fn process(&mut self) -> usize {
        block_on(self.controller.process_queued())
    }

    /// Take the outcome of a handle that must already be resolved.
    pub fn resolve<T: Outcome>(&self, pending: Pending<T>) -> T {
        match pending.try_take() {
            Ok(value) => value,
            Err(_) => panic!("handle is still pending"),
        }
    }

    /// Post a driver notification through the subscribed sink.
    pub fn emit(&self, event: DriverEvent) {
        let sink = self.mock.borrow().sink.expect("driver is subscribed");
        assert!(sink.notify(event), "queue accepted the event");
    }

    /// Connect to `ssid` and complete the association.
    pub fn connect(&mut self, ssid: &str, password: &str) {
        let pending = self.client.connect(ssid, password).expect("queued");
        self.process();
        self.emit(DriverEvent::Connected(ip(20)));
        self.process();
        assert_eq!(self.resolve(pending), Ok(()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.mock.borrow().calls.clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.mock.borrow().calls.iter().filter(|c| **c == call).count()
    }

    pub fn clear_calls(&self) {
        self.mock.borrow_mut().calls.clear();
    }

    pub fn fail(&self, call: Call) {
        self.mock.borrow_mut().failing.push(call);
    }

    pub fn heal(&self) {
        self.mock.borrow_mut().failing.clear();
    }
}
