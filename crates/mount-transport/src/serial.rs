//! Physical serial channel
//!
//! Thin wrapper over the OS serial API. All calls are synchronous and run on
//! the caller's thread; the only logic beyond delegation is the optional
//! NUL stripping on receive.

use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, warn};

use crate::channel::{decode_payload, encode_payload, Channel};
use crate::error::TransportError;

/// Parity mode for the serial line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParityMode {
    /// No parity bit
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Flow control (handshake) mode for the serial line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowControlMode {
    /// No handshake
    #[default]
    None,
    /// XON/XOFF software handshake
    Software,
    /// RTS/CTS hardware handshake
    Hardware,
}

/// Serial line configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per frame (5-8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Stop bits per frame (1 or 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    /// Parity mode
    #[serde(default)]
    pub parity: ParityMode,
    /// Handshake mode
    #[serde(default)]
    pub flow_control: FlowControlMode,
    /// Assert DTR after opening
    #[serde(default)]
    pub dtr_enable: bool,
    /// Assert RTS after opening
    #[serde(default)]
    pub rts_enable: bool,
    /// Strip NUL bytes from received data
    #[serde(default)]
    pub discard_null: bool,
    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_read_timeout_ms() -> u64 {
    1000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: ParityMode::None,
            flow_control: FlowControlMode::None,
            dtr_enable: false,
            rts_enable: true,
            discard_null: true,
            read_timeout_ms: 1000,
        }
    }
}

impl SerialConfig {
    fn data_bits(&self) -> Result<DataBits, TransportError> {
        match self.data_bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(TransportError::InvalidConfig(format!(
                "unsupported data bits: {other}"
            ))),
        }
    }

    fn stop_bits(&self) -> Result<StopBits, TransportError> {
        match self.stop_bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(TransportError::InvalidConfig(format!(
                "unsupported stop bits: {other}"
            ))),
        }
    }

    fn parity(&self) -> Parity {
        match self.parity {
            ParityMode::None => Parity::None,
            ParityMode::Odd => Parity::Odd,
            ParityMode::Even => Parity::Even,
        }
    }

    fn flow_control(&self) -> FlowControl {
        match self.flow_control {
            FlowControlMode::None => FlowControl::None,
            FlowControlMode::Software => FlowControl::Software,
            FlowControlMode::Hardware => FlowControl::Hardware,
        }
    }
}

/// Channel over a physical serial port
pub struct SerialChannel {
    port_name: String,
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialChannel {
    /// Create an unopened channel for the named port (e.g. `COM3`)
    pub fn new(port_name: impl Into<String>, config: SerialConfig) -> Self {
        Self {
            port_name: port_name.into(),
            config,
            port: None,
        }
    }

    /// The OS port name this channel targets
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl Channel for SerialChannel {
    async fn open(&mut self) -> Result<(), TransportError> {
        let mut port = serialport::new(self.port_name.as_str(), self.config.baud_rate)
            .data_bits(self.config.data_bits()?)
            .stop_bits(self.config.stop_bits()?)
            .parity(self.config.parity())
            .flow_control(self.config.flow_control())
            .timeout(self.read_timeout())
            .open()
            .map_err(|e| TransportError::ConnectionFailed {
                target: self.port_name.clone(),
                reason: e.to_string(),
            })?;

        port.write_data_terminal_ready(self.config.dtr_enable)?;
        port.write_request_to_send(self.config.rts_enable)?;

        debug!("Opened {} at {} baud", self.port_name, self.config.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write(&mut self, data: &str) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        let bytes = encode_payload(data);
        port.write_all(&bytes)?;
        port.flush()?;
        Ok(())
    }

    fn read_existing(&mut self) -> String {
        let Some(port) = self.port.as_mut() else {
            return String::new();
        };

        let pending = match port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                warn!("Failed to query receive buffer on {}: {}", self.port_name, e);
                return String::new();
            }
        };
        if pending == 0 {
            return String::new();
        }

        let mut buf = vec![0u8; pending];
        match port.read(&mut buf) {
            Ok(n) => {
                let mut data = decode_payload(&buf[..n]);
                if self.config.discard_null {
                    data.retain(|c| c != '\0');
                }
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => String::new(),
            Err(e) => {
                warn!("Read error on {}: {}", self.port_name, e);
                String::new()
            }
        }
    }

    fn discard_in_buffer(&mut self) {
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.clear(ClearBuffer::Input) {
                warn!("Failed to clear input buffer on {}: {}", self.port_name, e);
            }
        }
    }

    fn discard_out_buffer(&mut self) {
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.clear(ClearBuffer::Output) {
                warn!("Failed to clear output buffer on {}: {}", self.port_name, e);
            }
        }
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.config.read_timeout_ms)
    }
}
