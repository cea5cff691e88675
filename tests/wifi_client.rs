//! Host-level tests for the client lifecycle and connect/disconnect handling.

mod support;

use embassy_futures::block_on;
use support::{Call, Harness, START_SEQUENCE, config, ip};
use wifi_client::{
    DriverError, DriverEvent, Error, Phase, PowerSave, REPLY_SLOT_COUNT, WifiClient,
    COMMAND_QUEUE_DEPTH,
};

#[test]
fn start_brings_the_radio_up_in_order() {
    let mut harness = Harness::new(config());
    let start = harness.client.start().expect("queued");
    assert!(!start.is_resolved());
    assert_eq!(harness.process(), 1);
    assert_eq!(harness.resolve(start), Ok(()));
    assert_eq!(harness.calls(), START_SEQUENCE);
    assert!(harness.controller.is_started());
    assert_eq!(harness.controller.phase(), Phase::Disconnected);
}

#[test]
fn start_applies_configured_power_save() {
    let mut harness = Harness::new(config().with_power_save(PowerSave::MaxModem));
    let start = harness.client.start().expect("queued");
    harness.process();
    assert_eq!(harness.resolve(start), Ok(()));
    assert_eq!(harness.count(Call::SetPowerSave(PowerSave::MaxModem)), 1);
}

#[test]
fn second_start_reports_already_started() {
    let mut harness = Harness::started(config());
    let start = harness.client.start().expect("queued");
    harness.process();
    assert_eq!(harness.resolve(start), Err(Error::AlreadyStarted));
    assert!(harness.calls().is_empty());
}

#[test]
fn failed_start_rolls_back_completed_steps() {
    let mut harness = Harness::new(config());
    harness.fail(Call::StartRadio);
    let start = harness.client.start().expect("queued");
    harness.process();
    assert_eq!(
        harness.resolve(start),
        Err(Error::Initialization(DriverError::Status(7)))
    );
    assert_eq!(
        harness.calls(),
        [
            Call::CreateInterface,
            Call::InitRadio,
            Call::SetStationMode,
            Call::SetPowerSave(PowerSave::None),
            Call::StartRadio,
            Call::DeinitRadio,
            Call::DestroyInterface,
        ]
    );
    assert!(harness.mock.borrow().sink.is_none());
    assert!(!harness.controller.is_started());

    // A later start succeeds once the driver recovers.
    harness.heal();
    harness.clear_calls();
    let retry = harness.client.start().expect("queued");
    harness.process();
    assert_eq!(harness.resolve(retry), Ok(()));
    assert_eq!(harness.calls(), START_SEQUENCE);
}

#[test]
fn failed_subscribe_stops_the_radio_without_unsubscribing() {
    let mut harness = Harness::new(config());
    harness.fail(Call::Subscribe);
    let start = harness.client.start().expect("queued");
    harness.process();
    assert!(matches!(
        harness.resolve(start),
        Err(Error::Initialization(_))
    ));
    let calls = harness.calls();
    assert_eq!(
        calls[START_SEQUENCE.len()..],
        [Call::StopRadio, Call::DeinitRadio, Call::DestroyInterface]
    );
    assert_eq!(harness.count(Call::Unsubscribe), 0);
}

#[test]
fn init_is_idempotent_and_keeps_first_configuration() {
    let mut harness = Harness::started(config().with_connection_attempts(0));

    let (again, controller) = WifiClient::init(
        harness.resources,
        config().with_connection_attempts(100),
        support::MockDriver::default(),
    );
    assert!(controller.is_none());

    // The second handle feeds the original controller and its configuration.
    let connect = again.connect("home", "pw").expect("queued");
    harness.process();
    harness.emit(DriverEvent::Disconnected(wifi_client::DisconnectReason::NO_AP_FOUND));
    harness.process();
    assert!(!connect.is_resolved());
    harness.emit(DriverEvent::Disconnected(wifi_client::DisconnectReason::NO_AP_FOUND));
    harness.process();
    assert_eq!(
        harness.resolve(connect),
        Err(Error::ConnectAttemptsExhausted { attempts: 1 })
    );
}

#[test]
fn requests_before_start_are_gated() {
    let mut harness = Harness::new(config());
    let connect = harness.client.connect("home", "pw").expect("queued");
    let scan = harness.client.scan(4).expect("queued");
    let disconnect = harness.client.disconnect().expect("queued");
    let status = harness.client.status().expect("queued");
    let stop = harness.client.stop().expect("queued");
    assert_eq!(harness.process(), 5);

    assert_eq!(harness.resolve(connect), Err(Error::NotStarted));
    assert_eq!(harness.resolve(scan), Err(Error::NotStarted));
    harness.resolve(disconnect);
    harness.resolve(stop);
    let status = harness.resolve(status).expect("status is always answered");
    assert_eq!(status.phase, Phase::Disconnected);
    assert!(harness.calls().is_empty());
}

#[test]
fn oversized_credentials_fail_without_queueing() {
    let mut harness = Harness::started(config());
    let long_ssid = "s".repeat(33);
    let connect = harness.client.connect(&long_ssid, "pw").expect("not queued");
    assert!(connect.is_resolved());
    assert_eq!(
        harness.resolve(connect),
        Err(Error::SsidTooLong { len: 33, max: 32 })
    );

    let long_password = "p".repeat(65);
    let connect = harness
        .client
        .connect("home", &long_password)
        .expect("not queued");
    assert_eq!(
        harness.resolve(connect),
        Err(Error::PasswordTooLong { len: 65, max: 64 })
    );

    assert_eq!(harness.process(), 0);
    assert!(harness.calls().is_empty());
}

#[test]
fn connect_resolves_when_the_driver_reports_an_address() {
    let mut harness = Harness::started(config());
    let connect = harness.client.connect("home", "secret").expect("queued");
    harness.process();

    assert_eq!(
        harness.calls(),
        [
            Call::StationConfig,
            Call::Disconnect,
            Call::SetStationConfig,
            Call::Connect
        ]
    );
    assert_eq!(harness.controller.phase(), Phase::Connecting);
    assert!(!connect.is_resolved());
    assert_eq!(harness.mock.borrow().station.credentials.ssid.as_str(), "home");

    harness.emit(DriverEvent::Connected(ip(42)));
    harness.process();
    assert_eq!(harness.resolve(connect), Ok(()));

    let status = harness.controller.status();
    assert_eq!(status.phase, Phase::Connected);
    assert_eq!(status.ip_info, Some(ip(42)));
}

#[test]
fn connect_to_the_current_network_skips_the_driver() {
    let mut harness = Harness::started(config());
    harness.connect("A", "pw");
    harness.clear_calls();

    let again = harness.client.connect("A", "pw").expect("queued");
    harness.process();
    assert_eq!(harness.resolve(again), Ok(()));
    assert_eq!(harness.calls(), [Call::StationConfig]);

    let disconnect = harness.client.disconnect().expect("queued");
    let stop = harness.client.stop().expect("queued");
    harness.process();
    harness.resolve(disconnect);
    harness.resolve(stop);
    assert_eq!(harness.controller.phase(), Phase::Disconnected);
    assert!(!harness.controller.is_started());
}

#[test]
fn connect_with_a_new_password_reconnects() {
    let mut harness = Harness::started(config());
    harness.connect("A", "pw");
    harness.clear_calls();

    let connect = harness.client.connect("A", "other").expect("queued");
    harness.process();
    assert_eq!(harness.count(Call::Connect), 1);
    assert_eq!(harness.controller.phase(), Phase::Connecting);
    drop(connect);
}

#[test]
fn newer_connect_supersedes_the_pending_one() {
    let mut harness = Harness::started(config());
    let first = harness.client.connect("A", "pw").expect("queued");
    let second = harness.client.connect("B", "pw2").expect("queued");
    assert_eq!(harness.process(), 2);

    assert_eq!(harness.resolve(first), Err(Error::Superseded));
    assert!(!second.is_resolved());
    assert_eq!(harness.mock.borrow().station.credentials.ssid.as_str(), "B");

    harness.emit(DriverEvent::Connected(ip(7)));
    harness.process();
    assert_eq!(harness.resolve(second), Ok(()));
}

#[test]
fn connect_reports_station_config_read_failure() {
    let mut harness = Harness::started(config());
    harness.fail(Call::StationConfig);
    let connect = harness.client.connect("home", "pw").expect("queued");
    harness.process();
    assert_eq!(
        harness.resolve(connect),
        Err(Error::ConfigRead(DriverError::Status(7)))
    );
    assert_eq!(harness.count(Call::Connect), 0);
    assert_eq!(harness.controller.phase(), Phase::Disconnected);
}

#[test]
fn connect_reports_station_config_write_failure() {
    let mut harness = Harness::started(config());
    harness.fail(Call::SetStationConfig);
    let connect = harness.client.connect("home", "pw").expect("queued");
    harness.process();
    assert_eq!(
        harness.resolve(connect),
        Err(Error::ConfigWrite(DriverError::Status(7)))
    );
    assert_eq!(harness.count(Call::Connect), 0);
    assert_eq!(harness.controller.phase(), Phase::Disconnected);
}

#[test]
fn connect_reports_issue_failure() {
    let mut harness = Harness::started(config());
    harness.fail(Call::Connect);
    let connect = harness.client.connect("home", "pw").expect("queued");
    harness.process();
    assert_eq!(
        harness.resolve(connect),
        Err(Error::ConnectIssue(DriverError::Status(7)))
    );
    assert_eq!(harness.controller.phase(), Phase::Disconnected);
    assert!(!harness.controller.status().scanning);
}

#[test]
fn disconnect_fails_the_pending_connect() {
    let mut harness = Harness::started(config());
    let connect = harness.client.connect("home", "pw").expect("queued");
    let disconnect = harness.client.disconnect().expect("queued");
    harness.process();
    assert_eq!(harness.resolve(connect), Err(Error::Cancelled));
    harness.resolve(disconnect);
    assert_eq!(harness.controller.phase(), Phase::Disconnected);

    // The late association notification is stale.
    harness.emit(DriverEvent::Connected(ip(9)));
    harness.process();
    assert_eq!(harness.controller.phase(), Phase::Disconnected);
    assert_eq!(harness.controller.status().ip_info, None);
}

#[test]
fn stop_fails_pending_connect_and_scan() {
    let mut harness = Harness::started(config());
    let connect = harness.client.connect("home", "pw").expect("queued");
    let scan = harness.client.scan(4).expect("queued");
    harness.process();
    harness.clear_calls();

    let stop = harness.client.stop().expect("queued");
    harness.process();
    harness.resolve(stop);
    assert_eq!(harness.resolve(connect), Err(Error::Cancelled));
    assert_eq!(harness.resolve(scan), Err(Error::Cancelled));
    assert_eq!(
        harness.calls(),
        [
            Call::ScanStop,
            Call::ScanRecords(0),
            Call::Disconnect,
            Call::Unsubscribe,
            Call::StopRadio,
            Call::DeinitRadio,
            Call::DestroyInterface,
        ]
    );
    assert_eq!(harness.controller.phase(), Phase::Disconnected);
    assert!(!harness.controller.is_started());
}

#[test]
fn driver_events_after_stop_are_ignored() {
    let mut harness = Harness::started(config());
    let connect = harness.client.connect("home", "pw").expect("queued");
    harness.process();
    let sink = harness.mock.borrow().sink.expect("subscribed");

    let stop = harness.client.stop().expect("queued");
    harness.process();
    harness.resolve(stop);
    assert_eq!(harness.resolve(connect), Err(Error::Cancelled));
    harness.clear_calls();

    assert!(sink.notify(DriverEvent::Connected(ip(3))));
    assert!(sink.notify(DriverEvent::ScanDone));
    assert_eq!(harness.process(), 2);
    assert_eq!(harness.controller.phase(), Phase::Disconnected);
    assert!(harness.calls().is_empty());
}

#[test]
fn connect_after_stop_reports_not_started() {
    let mut harness = Harness::started(config());
    let stop = harness.client.stop().expect("queued");
    let connect = harness.client.connect("home", "pw").expect("queued");
    harness.process();
    harness.resolve(stop);
    assert_eq!(harness.resolve(connect), Err(Error::NotStarted));
}

#[test]
fn status_is_answered_in_queue_order() {
    let mut harness = Harness::started(config());
    let before = harness.client.status().expect("queued");
    let connect = harness.client.connect("home", "pw").expect("queued");
    let after = harness.client.status().expect("queued");
    harness.process();

    let before = harness.resolve(before).expect("status");
    let after = harness.resolve(after).expect("status");
    assert_eq!(before.phase, Phase::Disconnected);
    assert_eq!(after.phase, Phase::Connecting);
    assert_eq!(after.connection_attempts_used, 0);
    assert!(!connect.is_resolved());
}

#[test]
fn awaited_handles_complete_once_the_worker_runs() {
    let mut harness = Harness::started(config());
    let connect = harness.client.connect("home", "pw").expect("queued");
    harness.process();
    harness.emit(DriverEvent::Connected(ip(5)));
    harness.process();
    assert_eq!(block_on(connect.wait()), Ok(()));
}

#[test]
fn every_handle_resolves_and_slots_are_recycled() {
    let mut harness = Harness::started(config());
    let handles = [
        harness.client.connect("A", "pw").expect("queued"),
        harness.client.connect("B", "pw").expect("queued"),
        harness.client.connect("C", "pw").expect("queued"),
    ];
    let scan = harness.client.scan(4).expect("queued");
    let stop = harness.client.stop().expect("queued");
    harness.process();

    for handle in handles {
        assert!(handle.is_resolved());
        assert!(harness.resolve(handle).is_err());
    }
    assert_eq!(harness.resolve(scan), Err(Error::Cancelled));
    harness.resolve(stop);
    assert_eq!(harness.resources.free_reply_slots(), REPLY_SLOT_COUNT);
}

#[test]
fn dropped_handles_release_their_slots() {
    let mut harness = Harness::started(config());
    drop(harness.client.connect("home", "pw").expect("queued"));
    drop(harness.client.scan(4).expect("queued"));
    harness.process();
    assert_eq!(harness.resources.free_reply_slots(), REPLY_SLOT_COUNT - 2);

    harness.emit(DriverEvent::Connected(ip(4)));
    harness.emit(DriverEvent::ScanDone);
    harness.process();
    assert_eq!(harness.controller.phase(), Phase::Connected);
    assert_eq!(harness.resources.free_reply_slots(), REPLY_SLOT_COUNT);
}

#[test]
fn issue_time_back_pressure_is_reported() {
    let mut harness = Harness::started(config());

    let held: Vec<_> = (0..REPLY_SLOT_COUNT)
        .map(|_| harness.client.status().expect("queued"))
        .collect();
    assert!(matches!(
        harness.client.status(),
        Err(Error::ReplySlotsExhausted)
    ));
    harness.process();
    drop(held);

    let sink = harness.mock.borrow().sink.expect("subscribed");
    for _ in 0..COMMAND_QUEUE_DEPTH {
        assert!(sink.notify(DriverEvent::ScanDone));
    }
    assert!(!sink.notify(DriverEvent::ScanDone));
    assert!(matches!(harness.client.status(), Err(Error::QueueFull)));
    assert_eq!(harness.resources.free_reply_slots(), REPLY_SLOT_COUNT);
    assert_eq!(harness.process(), COMMAND_QUEUE_DEPTH);
}
