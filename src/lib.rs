//! Firmware core for an E310 RFID scan-and-type keyboard wedge.
//!
//! The device sits between a UHF reader module speaking the E310 serial
//! protocol and a USB host that sees a plain HID keyboard: tags read by
//! the module are deduplicated and typed out as uppercase hex, one EPC
//! per line. This crate holds everything between the two connectors:
//! the wire codec, frame assembly, the router state machine, the EPC
//! debounce filter, keystroke emission and CRC-protected settings.
//!
//! # Features
//!
//! - `uart-esp32` - UART link for ESP32 targets using esp-idf-svc
//! - `serial` - serial port link for desktop hosts using the serialport crate
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use e310_wedge::{ring, Router, SerialPortLink, LinkPump, NullNotifier, SystemClock};
//!
//! let (rx_prod, rx_cons) = ring::channel(1024);
//! let (tx_prod, tx_cons) = ring::channel(512);
//! let pump = LinkPump::new(SerialPortLink::open("/dev/ttyUSB0", 57600)?, rx_prod, tx_cons);
//!
//! let router = Arc::new(Router::new(0x00, rx_cons, tx_prod, hid, Arc::new(NullNotifier), Arc::new(SystemClock)));
//! router.connect()?;
//! router.start_inventory()?;
//! ```

mod assembler;
mod clock;
mod codec;
mod command;
mod crc;
mod filter;
mod hid;
mod notify;
pub mod ring;
mod router;
mod settings;
mod shell;
mod transport;
mod types;

#[cfg(feature = "uart-esp32")]
mod uart;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use assembler::{AssemblerState, FrameAssembler};
pub use clock::{Clock, SystemClock};
pub use codec::{
    parse_auto_upload_tag, parse_inventory_stats, parse_read_response, parse_reader_info,
    parse_response_header, parse_tag_count, parse_tag_data, parse_temperature, response_payload,
    Codec,
};
pub use command::Command;
pub use crc::{crc16_ccitt, crc16_wire, verify_frame};
pub use filter::{Decision, EpcFilter, EpcSummary};
pub use hid::{EpcSink, HidDevice, HidEmitter};
pub use notify::{Notifier, NullNotifier};
pub use router::{Mode, Router, StatsSnapshot};
pub use settings::{Eeprom, FreqRegion, Settings, SettingsStore};
pub use shell::Shell;
pub use transport::{LinkPump, SerialLink};
pub use types::{
    command_name, format_epc, status_desc, Error, InventoryParams, ReadParams, ReaderInfo,
    ResponseHeader, SelectParams, TagData, WriteEpcParams, WriteParams,
};

#[cfg(feature = "uart-esp32")]
pub use uart::UartLink;

#[cfg(feature = "serial")]
pub use serial::SerialPortLink;
