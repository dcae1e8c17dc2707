//! Staging pipeline: declared-length raw upload into modem storage.

use smartcam::app::ports::Clock;
use smartcam::error::{TransactionError, TransferError};
use smartcam::modem::staging::{self, PayloadKind, TransferJob};

use crate::mock_modem::engine_with;

fn jpeg(len: usize) -> TransferJob {
    let payload = (0..len).map(|i| (i % 251) as u8).collect();
    TransferJob::new("cam-20261016_140509.jpg", payload, PayloadKind::Binary).unwrap()
}

#[test]
fn staged_file_matches_payload_byte_for_byte() {
    let (mut engine, _) = engine_with(|m| m);
    let job = jpeg(20_000);

    staging::stage(&mut engine, &job, "C:").unwrap();

    let modem = engine.transport_mut();
    assert_eq!(
        modem.commands,
        ["AT+FSCD=C:", "AT+CFTRANRX=\"C:/cam-20261016_140509.jpg\",20000"]
    );
    assert_eq!(modem.file("C:/cam-20261016_140509.jpg"), Some(job.payload()));
}

#[test]
fn payload_with_line_endings_is_not_mistaken_for_commands() {
    let (mut engine, _) = engine_with(|m| m);
    let payload = b"OK\r\nERROR\r\n>\rAT\r".to_vec();
    let job = TransferJob::new("tricky.bin", payload.clone(), PayloadKind::Binary).unwrap();

    staging::stage(&mut engine, &job, "C:").unwrap();

    let modem = engine.transport_mut();
    assert_eq!(modem.commands.len(), 2);
    assert_eq!(modem.file("C:/tricky.bin"), Some(payload.as_slice()));
}

#[test]
fn empty_payload_still_initiates_and_completes() {
    let (mut engine, _) = engine_with(|m| m);
    let job = TransferJob::new("empty.txt", Vec::new(), PayloadKind::Text).unwrap();

    staging::stage(&mut engine, &job, "C:").unwrap();

    let modem = engine.transport_mut();
    assert_eq!(modem.count("AT+CFTRANRX=\"C:/empty.txt\",0"), 1);
    assert_eq!(modem.file("C:/empty.txt"), Some(&[][..]));
}

#[test]
fn refused_directory_stops_before_initiation() {
    let (mut engine, _) = engine_with(|m| m.on("AT+FSCD", &["ERROR"]));

    let err = staging::stage(&mut engine, &jpeg(100), "D:").unwrap_err();

    assert_eq!(err, TransferError::SelectDirectory(TransactionError::Protocol));
    let modem = engine.transport_mut();
    assert_eq!(modem.count("AT+CFTRANRX"), 0);
    assert!(modem.storage.is_empty());
}

#[test]
fn missing_prompt_times_out_without_writing_payload() {
    let (mut engine, clock) = engine_with(|m| m.silent("AT+CFTRANRX"));
    let start = clock.now_ms();

    let err = staging::stage(&mut engine, &jpeg(100), "C:").unwrap_err();

    assert_eq!(err, TransferError::Initiate(TransactionError::Timeout));
    assert!(clock.now_ms() > start);
    let modem = engine.transport_mut();
    assert_eq!(modem.discards, 1);
    assert!(modem.storage.is_empty());
}

#[test]
fn no_completion_after_payload_is_incomplete() {
    // The modem prompts but never takes the data.
    let (mut engine, _) = engine_with(|m| m.on("AT+CFTRANRX", &[">"]));

    let err = staging::stage(&mut engine, &jpeg(64), "C:").unwrap_err();

    assert_eq!(err, TransferError::Incomplete);
}
