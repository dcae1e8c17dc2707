//! OTA: version check, chunked download, apply and persistence.

use smartcam::app::ports::PersistedState;
use smartcam::config::SystemConfig;
use smartcam::error::{ApplyError, OtaError, TransactionError};
use smartcam::ota::flash::ChipControl;
use smartcam::ota::version::Version;
use smartcam::ota::{OtaConfig, OtaOutcome, OtaTargets, OtaUpdater};

use crate::mock_hw::{MemState, MemStore, TestFlash};
use crate::mock_modem::{MockModem, RecordingDelay, engine_with};

fn urls() -> (String, String) {
    let c = SystemConfig::default();
    (c.version_url(), c.firmware_url())
}

fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn installed(v: &str) -> PersistedState {
    PersistedState {
        firmware_version: Version::parse(v).unwrap(),
        ..PersistedState::default()
    }
}

/// Server publishing `version` with a `firmware` image.
fn server(version: &[u8], firmware: &[u8]) -> impl FnOnce(MockModem) -> MockModem {
    let (v_url, f_url) = urls();
    let (version, firmware) = (version.to_vec(), firmware.to_vec());
    move |m| m.serve(&v_url, &version).serve(&f_url, &firmware)
}

struct Rig {
    store: MemStore,
    flash: TestFlash,
    states: MemState,
    system: ChipControl,
}

impl Rig {
    fn new() -> Self {
        Self {
            store: MemStore::default(),
            flash: TestFlash::default(),
            states: MemState::default(),
            system: ChipControl::default(),
        }
    }

    fn targets(&mut self) -> OtaTargets<'_, MemStore, TestFlash, MemState, ChipControl> {
        OtaTargets {
            store: &mut self.store,
            flash: &mut self.flash,
            state_port: &mut self.states,
            system: &mut self.system,
        }
    }
}

fn updater() -> OtaUpdater {
    OtaUpdater::new(OtaConfig::from(&SystemConfig::default()))
}

#[test]
fn matching_version_downloads_nothing() {
    let (mut engine, clock) = engine_with(server(b"v1.0.0\n", &image(10)));
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    let mut state = PersistedState::default();

    let outcome = updater()
        .run(&mut engine, &mut delay, &mut state, rig.targets())
        .unwrap();

    assert_eq!(outcome, OtaOutcome::UpToDate);
    let modem = engine.transport_mut();
    assert_eq!(modem.count("AT+HTTPACTION"), 1);
    assert_eq!(modem.count("AT+HTTPINIT"), modem.count("AT+HTTPTERM"));
    assert_eq!(rig.store.creates, 0);
    assert!(rig.states.saved.is_empty());
}

#[test]
fn new_version_is_downloaded_in_chunks_flashed_and_persisted() {
    let firmware = image(5000);
    let (mut engine, clock) = engine_with(server(b"v1.2.3\0\0\0\0", &firmware));
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    let mut state = installed("v1.2.2");

    let outcome = updater()
        .run(&mut engine, &mut delay, &mut state, rig.targets())
        .unwrap();

    let v123 = Version::parse("v1.2.3").unwrap();
    assert_eq!(outcome, OtaOutcome::Applied { version: v123.clone() });

    let modem = engine.transport_mut();
    // Version document first, then the image from offset 0.
    assert_eq!(
        modem.reads,
        [(0, 10), (0, 1024), (1024, 1024), (2048, 1024), (3072, 1024), (4096, 904)]
    );
    assert_eq!(modem.count("AT+HTTPINIT"), 2);
    assert_eq!(modem.count("AT+HTTPTERM"), 2);

    assert_eq!(rig.store.data, firmware);
    assert_eq!(rig.flash.image(), firmware.as_slice());
    assert_eq!(state.firmware_version, v123);
    assert_eq!(rig.states.saved.len(), 1);
    assert_eq!(rig.states.last().map(|s| &s.firmware_version), Some(&v123));
    assert!(rig.system.restart_requested);
    assert!(delay.waits_ms.is_empty());
}

#[test]
fn failed_check_is_not_retried() {
    let (v_url, _) = urls();
    let (mut engine, clock) = engine_with(|m| m.on(&format!("AT+HTTPPARA=\"URL\",\"{v_url}\""), &["ERROR"]));
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    let mut state = PersistedState::default();

    let err = updater()
        .run(&mut engine, &mut delay, &mut state, rig.targets())
        .unwrap_err();

    assert_eq!(err, OtaError::Check(TransactionError::Protocol));
    assert!(delay.waits_ms.is_empty());
    assert_eq!(engine.transport_mut().count("AT+HTTPTERM"), 1);
    assert_eq!(rig.store.creates, 0);
}

#[test]
fn missing_version_document_fails_the_check() {
    // Nothing served: the server answers 404.
    let (mut engine, clock) = engine_with(|m| m);
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    let mut state = PersistedState::default();

    let err = updater()
        .run(&mut engine, &mut delay, &mut state, rig.targets())
        .unwrap_err();

    assert_eq!(err, OtaError::Check(TransactionError::Protocol));
    assert_eq!(engine.transport_mut().count("AT+HTTPREAD"), 0);
}

#[test]
fn garbled_version_fails_the_check() {
    let (mut engine, clock) = engine_with(server(b"v1", &image(10)));
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    let mut state = PersistedState::default();

    let err = updater()
        .run(&mut engine, &mut delay, &mut state, rig.targets())
        .unwrap_err();

    assert_eq!(err, OtaError::Check(TransactionError::Protocol));
}

#[test]
fn truncated_download_exhausts_the_attempt_budget() {
    let (v_url, f_url) = urls();
    let (mut engine, clock) = engine_with(|m| {
        m.serve(&v_url, b"v2.0.0")
            .serve(&f_url, &image(5000))
            .cut_http_at(3000)
    });
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    let mut state = installed("v1.0.0");

    let err = updater()
        .run(&mut engine, &mut delay, &mut state, rig.targets())
        .unwrap_err();

    assert_eq!(err, OtaError::RetriesExhausted { attempts: 5 });
    assert_eq!(delay.waits_ms, [10_000; 4]);
    assert_eq!(rig.store.creates, 5);
    assert_eq!(rig.flash.begins, 0);
    assert_eq!(state.firmware_version.as_str(), "v1.0.0");
    assert!(rig.states.saved.is_empty());
    assert!(!rig.system.restart_requested);
}

#[test]
fn transient_read_error_restarts_the_download_from_zero() {
    let firmware = image(3000);
    let (mut engine, clock) = engine_with(|m| {
        server(b"v1.0.1", &firmware)(m).on_times("AT+HTTPREAD=2048,", 1, &["ERROR"])
    });
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    let mut state = PersistedState::default();

    let outcome = updater()
        .run(&mut engine, &mut delay, &mut state, rig.targets())
        .unwrap();

    assert!(matches!(outcome, OtaOutcome::Applied { .. }));
    assert_eq!(delay.waits_ms, [10_000]);
    assert_eq!(rig.store.creates, 2);
    assert_eq!(rig.flash.image(), firmware.as_slice());
    let offsets: Vec<u32> = engine.transport_mut().reads.iter().map(|r| r.0).collect();
    assert_eq!(offsets, [0, 0, 1024, 2048, 0, 1024, 2048]);
}

#[test]
fn empty_image_is_a_download_error() {
    let (mut engine, clock) = engine_with(server(b"v1.0.1", b""));
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    let mut state = PersistedState::default();
    let mut ota = updater();

    let remote = ota
        .check(&mut engine, &state.firmware_version)
        .unwrap()
        .unwrap();
    let mut session = smartcam::ota::OtaSession::new(state.firmware_version.clone(), remote);
    let err = ota.download(&mut engine, &mut session, &mut rig.store).unwrap_err();
    assert_eq!(err, OtaError::Download(TransactionError::Protocol));
    assert_eq!(rig.store.creates, 0);

    let err = ota
        .run(&mut engine, &mut delay, &mut state, rig.targets())
        .unwrap_err();
    assert_eq!(err, OtaError::RetriesExhausted { attempts: 5 });
}

#[test]
fn short_flash_write_aborts_and_keeps_the_old_version() {
    let (mut engine, clock) = engine_with(server(b"v1.0.1", &image(2000)));
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    rig.flash = TestFlash::short();
    let mut state = PersistedState::default();
    let mut ota = updater();

    let remote = ota
        .check(&mut engine, &state.firmware_version)
        .unwrap()
        .unwrap();
    let mut session = smartcam::ota::OtaSession::new(state.firmware_version.clone(), remote);
    ota.download(&mut engine, &mut session, &mut rig.store).unwrap();
    assert!(session.is_complete());

    let err = ota.apply(&session, &mut rig.store, &mut rig.flash).unwrap_err();
    assert_eq!(
        err,
        OtaError::Apply(ApplyError::ShortWrite {
            expected: 1024,
            written: 1023
        })
    );
    assert_eq!(rig.flash.aborts, 1);

    let err = ota
        .run(&mut engine, &mut delay, &mut state, rig.targets())
        .unwrap_err();
    assert_eq!(err, OtaError::RetriesExhausted { attempts: 5 });
    assert_eq!(rig.flash.aborts, 6);
    assert_eq!(state.firmware_version, Version::running());
    assert!(rig.states.saved.is_empty());
}

#[test]
fn unpersistable_version_is_rolled_back_in_memory() {
    let (mut engine, clock) = engine_with(server(b"v1.0.1", &image(1500)));
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    rig.states.fail = true;
    let mut state = PersistedState::default();

    let err = updater()
        .run(&mut engine, &mut delay, &mut state, rig.targets())
        .unwrap_err();

    assert_eq!(err, OtaError::RetriesExhausted { attempts: 5 });
    assert_eq!(state.firmware_version, Version::running());
    assert!(!rig.system.restart_requested);
}

#[test]
fn full_firmware_file_fails_the_attempt() {
    let (mut engine, clock) = engine_with(server(b"v1.0.1", &image(4096)));
    let mut delay = RecordingDelay::new(clock);
    let mut rig = Rig::new();
    rig.store.full_at = Some(2048);
    let mut state = PersistedState::default();
    let mut ota = updater();

    let remote = ota
        .check(&mut engine, &state.firmware_version)
        .unwrap()
        .unwrap();
    let mut session = smartcam::ota::OtaSession::new(state.firmware_version.clone(), remote);
    assert_eq!(
        ota.download(&mut engine, &mut session, &mut rig.store),
        Err(OtaError::Storage(smartcam::app::ports::StorageError::Full))
    );
    assert_eq!(session.bytes_downloaded(), 2048);

    assert!(
        ota.run(&mut engine, &mut delay, &mut state, rig.targets())
            .is_err()
    );
}
