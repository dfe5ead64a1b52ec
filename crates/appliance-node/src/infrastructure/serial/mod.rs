//! Serial transports.
//!
//! A device path is opened through `serialport`, which programs the line
//! (baud rate, parity, data bits, stop bits) from the component's `uart`
//! settings before any byte is exchanged.  A `tcp://host:port` address
//! connects to a serial-over-TCP bridge instead; the bridge owns its line
//! settings, so they are only logged.  The bridge is also handy for driving
//! a simulated device.

use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

use appliance_core::domain::serial::{Parity, UartSettings};
use appliance_core::SerialTransport;
use serialport::{DataBits, FlowControl, StopBits};
use thiserror::Error;
use tracing::{debug, info};

pub mod channel;
pub mod mock;

pub use channel::ChannelTransport;

const TCP_SCHEME: &str = "tcp://";

/// How long a blocking read on a device waits before the reader thread
/// checks in again.
const DEVICE_READ_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("cannot open serial device {port}: {source}")]
    Device {
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot connect to serial bridge {address}: {source}")]
    Tcp {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serial device {port}: {value} {setting} is not supported")]
    UnsupportedLine {
        port: String,
        setting: &'static str,
        value: u8,
    },
}

/// Line settings in the form the serial driver takes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub parity: serialport::Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
}

/// Translates the configured `uart` settings of `port`.
///
/// # Errors
///
/// Returns [`OpenError::UnsupportedLine`] for data bits outside 5..=8 and
/// stop bits other than 1 or 2.
pub fn line_settings(port: &str, uart: &UartSettings) -> Result<LineSettings, OpenError> {
    let unsupported = |setting, value| OpenError::UnsupportedLine {
        port: port.to_string(),
        setting,
        value,
    };
    let data_bits = match uart.data_bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        other => return Err(unsupported("data bits", other)),
    };
    let stop_bits = match uart.stop_bits {
        1 => StopBits::One,
        2 => StopBits::Two,
        other => return Err(unsupported("stop bits", other)),
    };
    let parity = match uart.parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    };
    Ok(LineSettings {
        baud_rate: uart.baud_rate,
        parity,
        data_bits,
        stop_bits,
    })
}

/// Opens `port`, a device path or a `tcp://host:port` address.
///
/// # Errors
///
/// Returns [`OpenError`] if the line settings cannot be expressed, the
/// device cannot be opened or the bridge does not accept the connection.
pub fn open_transport(
    port: &str,
    uart: &UartSettings,
) -> Result<Box<dyn SerialTransport>, OpenError> {
    if let Some(address) = port.strip_prefix(TCP_SCHEME) {
        let tcp_error = |source| OpenError::Tcp {
            address: address.to_string(),
            source,
        };
        let stream = TcpStream::connect(address).map_err(tcp_error)?;
        stream.set_nodelay(true).map_err(tcp_error)?;
        let reader = stream.try_clone().map_err(tcp_error)?;
        let transport = ChannelTransport::spawn(port, reader, Box::new(stream)).map_err(tcp_error)?;
        debug!("{port}: line settings ({uart}) are left to the bridge");
        info!("{port}: connected");
        return Ok(Box::new(transport));
    }

    let line = line_settings(port, uart)?;
    let device_error = |source| OpenError::Device {
        port: port.to_string(),
        source,
    };
    let device = serialport::new(port, line.baud_rate)
        .parity(line.parity)
        .data_bits(line.data_bits)
        .stop_bits(line.stop_bits)
        .flow_control(FlowControl::None)
        .timeout(DEVICE_READ_TIMEOUT)
        .open()
        .map_err(|e| device_error(e.into()))?;
    let reader = device.try_clone().map_err(|e| device_error(e.into()))?;
    let writer: Box<dyn Write + Send> = Box::new(device);
    let transport = ChannelTransport::spawn(port, reader, writer).map_err(device_error)?;
    info!("{port}: opened at {uart}");
    Ok(Box::new(transport))
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn test_missing_device_is_reported_with_its_path() {
        let result = open_transport("/nonexistent/ttyUSB9", &UartSettings::default());
        match result {
            Err(OpenError::Device { port, .. }) => assert_eq!(port, "/nonexistent/ttyUSB9"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("device should not exist"),
        }
    }

    #[test]
    fn test_tcp_bridge_address_is_dialled() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("addr");

        // Act
        let transport = open_transport(&format!("tcp://{address}"), &UartSettings::default());

        // Assert
        assert!(transport.is_ok());
        assert!(listener.accept().is_ok());
    }

    #[test]
    fn test_line_settings_follow_the_configured_uart() {
        // Arrange
        let kdk = UartSettings::default();
        let odd = UartSettings {
            baud_rate: 2400,
            parity: Parity::Odd,
            data_bits: 7,
            stop_bits: 2,
        };

        // Act
        let kdk_line = line_settings("/dev/ttyUSB0", &kdk).expect("supported");
        let odd_line = line_settings("/dev/ttyS1", &odd).expect("supported");

        // Assert
        assert_eq!(
            kdk_line,
            LineSettings {
                baud_rate: 9600,
                parity: serialport::Parity::Even,
                data_bits: DataBits::Eight,
                stop_bits: StopBits::One,
            }
        );
        assert_eq!(
            odd_line,
            LineSettings {
                baud_rate: 2400,
                parity: serialport::Parity::Odd,
                data_bits: DataBits::Seven,
                stop_bits: StopBits::Two,
            }
        );
    }

    #[test]
    fn test_unsupported_data_bits_fail_before_the_device_is_touched() {
        // Arrange: the path does not exist, so only the line check can fail.
        let uart = UartSettings {
            data_bits: 9,
            ..UartSettings::default()
        };

        // Act
        let result = open_transport("/nonexistent/ttyUSB9", &uart);

        // Assert
        match result {
            Err(OpenError::UnsupportedLine { setting, value, .. }) => {
                assert_eq!(setting, "data bits");
                assert_eq!(value, 9);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("9 data bits cannot be opened"),
        }
    }

    #[test]
    fn test_three_stop_bits_are_rejected() {
        let uart = UartSettings {
            stop_bits: 3,
            ..UartSettings::default()
        };
        assert!(matches!(
            line_settings("/dev/ttyUSB0", &uart),
            Err(OpenError::UnsupportedLine { value: 3, .. })
        ));
    }
}
