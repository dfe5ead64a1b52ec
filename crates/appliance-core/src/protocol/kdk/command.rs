//! Command codes and fixed payloads of the KDK handshake.
//!
//! Most of the handshake commands have no documented meaning; they are the
//! sequence a genuine wireless module sends and the device refuses to report
//! parameter values until it has seen them.  They are named after their code.

/// Bit set in the command field of every response.
pub const RESPONSE_BIT: u16 = 0x8000;

/// Posted (unanswered) request that opens a session.
pub const SYNC: u16 = 0x0600;
pub const HANDSHAKE_0C00: u16 = 0x0C00;
pub const HANDSHAKE_1000: u16 = 0x1000;
/// Returns the `model+serial` string.
pub const DEVICE_INFO: u16 = 0x1100;
pub const HANDSHAKE_1200: u16 = 0x1200;
pub const HANDSHAKE_4100: u16 = 0x4100;
pub const HANDSHAKE_4C01: u16 = 0x4C01;
/// Returns the 3-byte parameter table id.
pub const TABLE_ID: u16 = 0x0010;
/// Returns the parameter descriptor list.
pub const PARAMETER_LIST: u16 = 0x0110;
/// Reads the values of the attribute parameters (descriptor metadata 0x40).
pub const READ_ATTRIBUTES: u16 = 0x0210;
pub const HANDSHAKE_1800: u16 = 0x1800;
/// Publishes the module status.
pub const MODULE_STATUS: u16 = 0x0001;
/// Writes a batch of parameter values.
pub const WRITE_PARAMETERS: u16 = 0x0810;
/// Reads a list of parameter values.
pub const READ_PARAMETERS: u16 = 0x0910;

// ── Device-initiated requests ─────────────────────────────────────────────────

/// Periodic status ping (observed every ~600 s).
pub const STATUS_PING: u16 = 0x0101;
/// Notification that a major state changed (power, light mode).
pub const CHANGE_NOTIFICATION: u16 = 0x0A10;

// ── Fixed payloads ────────────────────────────────────────────────────────────

pub const HANDSHAKE_1000_PAYLOAD: [u8; 1] = [0x20];
pub const DEVICE_INFO_PAYLOAD: [u8; 2] = [0x00, 0x01];
pub const HANDSHAKE_1200_PAYLOAD: [u8; 6] = [0x01, 0x10, 0x11, 0x12, 0x13, 0x14];
pub const MODULE_STATUS_10_PAYLOAD: [u8; 1] = [0x10];
pub const MODULE_STATUS_11_PAYLOAD: [u8; 1] = [0x11];
/// Reply to [`STATUS_PING`] the device is content with.
pub const STATUS_PING_REPLY: [u8; 3] = [0x00, 0x11, 0x13];
