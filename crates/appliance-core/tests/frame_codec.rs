//! Integration tests for the appliance-core wire protocols.
//!
//! These tests drive the public API the way the connection manager and the
//! climate driver do: bytes arrive one at a time, possibly with noise in
//! between, and only verified frames may reach the parameter table.

use std::time::{Duration, Instant};

use appliance_core::protocol::kdk::{
    checksum, parameter, FrameReceiver, KdkFrame, ParameterDescriptor, ParameterId,
    ParameterTable, ParameterValue, Received, TableId,
};
use appliance_core::protocol::mel;
use appliance_core::ProtocolError;

/// Feeds `bytes` and returns every complete frame or SYNC seen.
fn collect(receiver: &mut FrameReceiver, bytes: &[u8], now: Instant) -> Vec<Received> {
    bytes
        .iter()
        .filter_map(|b| match receiver.push(*b, now) {
            Ok(Received::Incomplete) | Err(_) => None,
            Ok(other) => Some(other),
        })
        .collect()
}

fn table() -> ParameterTable {
    let mut table = ParameterTable::new();
    table.set_id(TableId::from_le_bytes([0x01, 0x3A, 0x01]));
    table.load_descriptors(vec![
        ParameterDescriptor {
            id: parameter::ids::LIGHT_STATE,
            metadata: 0xE2,
            size: 1,
        },
        ParameterDescriptor {
            id: parameter::ids::LIGHT_BRIGHTNESS,
            metadata: 0xE2,
            size: 1,
        },
    ]);
    table
}

#[test]
fn test_kdk_stream_with_noise_yields_sync_then_frame() {
    // Arrange: line noise, a power-up SYNC, more noise, a response.
    let mut receiver = FrameReceiver::new();
    let now = Instant::now();
    let mut stream = vec![0x00, 0xFF];
    stream.extend_from_slice(&[0x66, 0x00, 0x00, 0x00, 0x00, 0x00]);
    stream.push(0x13);
    stream.extend(
        KdkFrame::new(0x00, 0x8C00, vec![])
            .encode()
            .expect("encode"),
    );

    // Act
    let received = collect(&mut receiver, &stream, now);

    // Assert
    assert_eq!(received.len(), 2);
    assert_eq!(received[0], Received::Sync);
    match &received[1] {
        Received::Frame(frame) => {
            assert!(frame.is_response());
            assert_eq!(frame.base_command(), 0x0C00);
        }
        other => panic!("expected a frame, got {other:?}"),
    }
}

#[test]
fn test_kdk_change_notification_updates_table() {
    // Arrange: captured 0x0A10 notification turning the light on.
    let mut bytes = vec![
        0x5A, 0x0C, 0x10, 0x0A, 0x00, 0x09, // header
        0x00, 0x01, 0x3A, 0x01, // status + table id
        0x01, // count
        0x00, 0xF3, 0x01, 0x30, // light state = on
    ];
    bytes.push(checksum(&bytes));
    let mut receiver = FrameReceiver::new();
    let mut table = table();

    // Act
    let frame = match collect(&mut receiver, &bytes, Instant::now()).pop() {
        Some(Received::Frame(frame)) => frame,
        other => panic!("expected a frame, got {other:?}"),
    };
    let values = parameter::parse_value_report(&frame.payload).expect("parse");
    let applied = table.apply(&values);

    // Assert
    assert_eq!(frame.command, 0x0A10);
    assert_eq!(applied, vec![parameter::ids::LIGHT_STATE]);
    assert_eq!(table.get(parameter::ids::LIGHT_STATE), &[0x30]);
}

#[test]
fn test_kdk_corrupted_report_never_reaches_table() {
    // Arrange
    let mut bytes = vec![
        0x5A, 0x0C, 0x10, 0x89, 0x00, 0x09, 0x00, 0x01, 0x3A, 0x01, 0x01, 0x00, 0xF5, 0x01, 0x40,
    ];
    bytes.push(checksum(&bytes).wrapping_add(1));
    let mut receiver = FrameReceiver::new();
    let table = table();

    // Act
    let results: Vec<_> = bytes
        .iter()
        .map(|b| receiver.push(*b, Instant::now()))
        .collect();

    // Assert
    assert!(matches!(
        results.last(),
        Some(Err(ProtocolError::ChecksumMismatch { .. }))
    ));
    assert_eq!(table.get(parameter::ids::LIGHT_BRIGHTNESS), &[0x55]);
}

#[test]
fn test_kdk_write_batch_is_rejected_as_a_whole() {
    let table = table();
    let batch = vec![
        ParameterValue::byte(parameter::ids::LIGHT_STATE, 0x30),
        ParameterValue::byte(ParameterId(0xABCD), 0x00),
    ];
    assert!(table.prepare_write(&batch).is_err());
}

#[test]
fn test_mel_response_split_across_slow_bytes_is_dropped() {
    // Arrange: a GET_TEMP response whose second half arrives after the
    // one-second inter-byte limit.
    let mut response = vec![0xFC, 0x62, 0x01, 0x30, 0x10];
    let mut payload = vec![0u8; 16];
    payload[0] = mel::message::kind::GET_TEMP;
    payload[3] = 12;
    response.extend_from_slice(&payload);
    response.push(mel::frame::checksum(&response));

    let mut receiver = mel::FrameReceiver::new();
    let start = Instant::now();
    let late = start + Duration::from_millis(1500);

    // Act
    let mut frames = Vec::new();
    for (i, b) in response.iter().enumerate() {
        let now = if i < 8 { start } else { late };
        if let Ok(Some(frame)) = receiver.push(*b, now) {
            frames.push(frame);
        }
    }

    // Assert
    assert!(frames.is_empty());
}

#[test]
fn test_mel_get_params_response_decodes_end_to_end() {
    // Arrange
    let mut payload = vec![0u8; 16];
    payload[0] = mel::message::kind::GET_PARAMS;
    payload[3] = 1;
    payload[4] = 1;
    payload[11] = 0x80 | 44;
    let mut bytes = vec![0xFC, 0x62, 0x01, 0x30, payload.len() as u8];
    bytes.extend_from_slice(&payload);
    bytes.push(mel::frame::checksum(&bytes));
    let mut receiver = mel::FrameReceiver::new();
    let now = Instant::now();

    // Act
    let frame = bytes
        .iter()
        .filter_map(|b| receiver.push(*b, now).ok().flatten())
        .next()
        .expect("frame");
    let report = mel::message::parse_params(&frame.payload).expect("parse");

    // Assert
    assert!(frame.has_flags(mel::frame::flags::GET));
    assert_eq!(report.power, Ok(mel::Power::On));
    assert_eq!(report.mode, Ok(mel::Mode::Heat));
    assert_eq!(report.target_temperature, 22.0);
}
