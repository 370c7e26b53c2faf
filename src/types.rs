//! Shared types for the E310 protocol and routing core.

use std::fmt;

/// Maximum frame size on the wire, including the length byte.
pub const MAX_FRAME_SIZE: usize = 256;
/// Minimum well-formed response: Len + Addr + reCmd + Status + CRC-16.
pub const MIN_RESPONSE_SIZE: usize = 5;
/// EPC byte limit; longer values are truncated, never rejected.
pub const MAX_EPC_LENGTH: usize = 62;
/// TID byte limit.
pub const MAX_TID_LENGTH: usize = 32;

/// Default reader address.
pub const ADDR_DEFAULT: u8 = 0x00;
/// Broadcast reader address.
pub const ADDR_BROADCAST: u8 = 0xFF;
/// reCmd marker for reader-initiated auto-upload frames.
pub const RECMD_AUTO_UPLOAD: u8 = 0xEE;

/// Command codes per the E310 protocol manual.
pub mod cmd {
    pub const TAG_INVENTORY: u8 = 0x01;
    pub const READ_DATA: u8 = 0x02;
    pub const WRITE_DATA: u8 = 0x03;
    pub const WRITE_EPC: u8 = 0x04;
    pub const KILL_TAG: u8 = 0x05;
    pub const SET_PROTECTION: u8 = 0x06;
    pub const BLOCK_ERASE: u8 = 0x07;
    pub const SINGLE_TAG_INVENTORY: u8 = 0x0F;
    pub const OBTAIN_READER_INFO: u8 = 0x21;
    pub const MODIFY_FREQUENCY: u8 = 0x22;
    pub const MODIFY_READER_ADDR: u8 = 0x24;
    pub const MODIFY_INVENTORY_TIME: u8 = 0x25;
    pub const MODIFY_BAUD_RATE: u8 = 0x28;
    pub const MODIFY_RF_POWER: u8 = 0x2F;
    pub const LED_BUZZER_CONTROL: u8 = 0x33;
    pub const ANTENNA_MUX: u8 = 0x3F;
    pub const ENABLE_BUZZER: u8 = 0x40;
    pub const GPIO_CONTROL: u8 = 0x46;
    pub const OBTAIN_GPIO_STATE: u8 = 0x47;
    pub const OBTAIN_READER_SN: u8 = 0x4C;
    pub const START_FAST_INVENTORY: u8 = 0x50;
    pub const STOP_FAST_INVENTORY: u8 = 0x51;
    pub const GET_DATA_FROM_BUFFER: u8 = 0x72;
    pub const CLEAR_MEMORY_BUFFER: u8 = 0x73;
    pub const GET_TAG_COUNT: u8 = 0x74;
    pub const SET_WORK_MODE: u8 = 0x7F;
    pub const MEASURE_TEMPERATURE: u8 = 0x92;
    pub const STOP_IMMEDIATELY: u8 = 0x93;
    pub const SELECT: u8 = 0x9A;
}

/// Response status codes.
pub mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const OPERATION_COMPLETE: u8 = 0x01;
    pub const INVENTORY_TIMEOUT: u8 = 0x02;
    pub const MORE_DATA: u8 = 0x03;
    pub const MEMORY_FULL: u8 = 0x04;
    pub const STATISTICS_DATA: u8 = 0x26;
    pub const ANTENNA_ERROR: u8 = 0xF8;
    pub const INVALID_LENGTH: u8 = 0xFD;
    pub const INVALID_COMMAND_CRC: u8 = 0xFE;
    pub const UNKNOWN_PARAMETER: u8 = 0xFF;
}

/// Errors raised across the codec, assembler, router, HID and settings layers.
#[derive(Debug)]
pub enum Error {
    /// Frame shorter than the minimum the operation requires
    FrameTooShort,
    /// Stored wire CRC disagrees with the computed one
    CrcFailed,
    /// Length field disagrees with the byte count on the wire
    LengthMismatch,
    /// Built frame would not fit the 256-byte wire limit
    BufferOverflow,
    /// Out-of-range input to a builder or setter
    InvalidParam(String),
    /// Response payload shorter than its documented shape
    MissingData,
    /// Response payload could not be decoded
    ParseError(String),
    /// Device exists but is not yet usable
    NotReady,
    /// Device is absent or uninitialized
    NoDevice,
    /// Response-wait window expired
    Timeout,
    /// Storage or transport I/O failure
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FrameTooShort => write!(f, "frame too short"),
            Error::CrcFailed => write!(f, "CRC verification failed"),
            Error::LengthMismatch => write!(f, "length field mismatch"),
            Error::BufferOverflow => write!(f, "frame buffer overflow"),
            Error::InvalidParam(msg) => write!(f, "invalid parameter: {}", msg),
            Error::MissingData => write!(f, "missing required data"),
            Error::ParseError(msg) => write!(f, "parse error: {}", msg),
            Error::NotReady => write!(f, "device not ready"),
            Error::NoDevice => write!(f, "no device"),
            Error::Timeout => write!(f, "response timeout"),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Parsed view of a response frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub len: u8,
    pub addr: u8,
    pub recmd: u8,
    pub status: u8,
}

/// A tag observation decoded from an inventory or auto-upload payload.
#[derive(Debug, Clone, Default)]
pub struct TagData {
    pub epc: Vec<u8>,
    pub tid: Option<Vec<u8>>,
    pub rssi: u8,
    pub antenna: u8,
    pub phase: Option<u32>,
    pub frequency_khz: Option<u32>,
}

impl PartialEq for TagData {
    fn eq(&self, other: &Self) -> bool {
        self.epc == other.epc
    }
}

/// Reader identity and configuration reported by Obtain Reader Info (0x21).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderInfo {
    pub firmware_version: u16,
    pub model_type: u8,
    pub protocol_type: u8,
    pub max_freq: u8,
    pub min_freq: u8,
    pub power: u8,
    pub scan_time: u8,
    pub antenna: u8,
    pub check_antenna: u8,
}

/// Read-rate statistics frame payload (status 0x26).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryStats {
    pub antenna: u8,
    pub read_rate: u16,
    pub total_count: u32,
}

/// Tag Inventory (0x01) parameters. The trailing target/antenna/scan-time
/// fields are omitted on the wire when zero, matching reader behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryParams {
    pub q_value: u8,
    pub session: u8,
    pub mask_mem: u8,
    pub mask_addr: u16,
    pub mask_len: u8,
    pub mask_data: Vec<u8>,
    pub tid_addr: u8,
    pub tid_len: u8,
    pub target: u8,
    pub antenna: u8,
    pub scan_time: u8,
}

impl Default for InventoryParams {
    fn default() -> Self {
        Self {
            q_value: 0x04,
            session: 0x00,
            mask_mem: 0x00,
            mask_addr: 0,
            mask_len: 0,
            mask_data: Vec::new(),
            tid_addr: 0,
            tid_len: 0,
            target: 0x00,
            antenna: 0x00,
            scan_time: 0x32,
        }
    }
}

/// Read Data (0x02) parameters. `epc` empty selects mask mode, where the
/// tag is addressed by the select mask instead of its EPC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadParams {
    pub epc: Vec<u8>,
    pub mem_bank: u8,
    pub word_ptr: u8,
    pub word_count: u8,
    pub password: [u8; 4],
    pub mask_mem: u8,
    pub mask_addr: u16,
    pub mask_len: u8,
    pub mask_data: Vec<u8>,
}

/// Write Data (0x03) parameters. `data` must hold `word_count * 2` bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteParams {
    pub epc: Vec<u8>,
    pub mem_bank: u8,
    pub word_ptr: u8,
    pub word_count: u8,
    pub data: Vec<u8>,
    pub password: [u8; 4],
}

/// Write EPC (0x04) parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteEpcParams {
    pub old_epc: Vec<u8>,
    pub new_epc: Vec<u8>,
    pub password: [u8; 4],
}

/// Select (0x9A) parameters. Mask length is in bits; the serialized mask
/// occupies `ceil(mask_len / 8)` bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectParams {
    pub antenna: u8,
    pub target: u8,
    pub action: u8,
    pub mem_bank: u8,
    pub pointer: u16,
    pub mask_len: u8,
    pub mask: Vec<u8>,
    pub truncate: u8,
}

/// Human-readable command name for shell output and logs.
pub fn command_name(code: u8) -> &'static str {
    match code {
        cmd::TAG_INVENTORY => "Tag Inventory",
        cmd::READ_DATA => "Read Data",
        cmd::WRITE_DATA => "Write Data",
        cmd::WRITE_EPC => "Write EPC",
        cmd::KILL_TAG => "Kill Tag",
        cmd::SET_PROTECTION => "Set Protection",
        cmd::BLOCK_ERASE => "Block Erase",
        cmd::SINGLE_TAG_INVENTORY => "Single Tag Inventory",
        cmd::OBTAIN_READER_INFO => "Obtain Reader Info",
        cmd::MODIFY_FREQUENCY => "Modify Frequency",
        cmd::MODIFY_READER_ADDR => "Modify Reader Addr",
        cmd::MODIFY_INVENTORY_TIME => "Modify Inventory Time",
        cmd::MODIFY_BAUD_RATE => "Modify Baud Rate",
        cmd::MODIFY_RF_POWER => "Modify RF Power",
        cmd::LED_BUZZER_CONTROL => "LED/Buzzer Control",
        cmd::ANTENNA_MUX => "Antenna Mux Setup",
        cmd::ENABLE_BUZZER => "Enable/Disable Buzzer",
        cmd::GPIO_CONTROL => "GPIO Control",
        cmd::OBTAIN_GPIO_STATE => "Obtain GPIO State",
        cmd::OBTAIN_READER_SN => "Obtain Reader SN",
        cmd::START_FAST_INVENTORY => "Start Fast Inventory",
        cmd::STOP_FAST_INVENTORY => "Stop Fast Inventory",
        cmd::GET_DATA_FROM_BUFFER => "Get Data From Buffer",
        cmd::CLEAR_MEMORY_BUFFER => "Clear Memory Buffer",
        cmd::GET_TAG_COUNT => "Get Tag Count",
        cmd::SET_WORK_MODE => "Set Work Mode",
        cmd::MEASURE_TEMPERATURE => "Measure Temperature",
        cmd::STOP_IMMEDIATELY => "Stop Immediately",
        cmd::SELECT => "Select",
        RECMD_AUTO_UPLOAD => "Auto-Upload Tag",
        _ => "Unknown Command",
    }
}

/// Human-readable status description.
pub fn status_desc(code: u8) -> &'static str {
    match code {
        status::SUCCESS => "Success",
        status::OPERATION_COMPLETE => "Operation Complete",
        status::INVENTORY_TIMEOUT => "Inventory Timeout",
        status::MORE_DATA => "More Data",
        status::MEMORY_FULL => "Memory Full",
        status::STATISTICS_DATA => "Statistics Data",
        status::ANTENNA_ERROR => "Antenna Error",
        status::INVALID_LENGTH => "Invalid Length",
        status::INVALID_COMMAND_CRC => "Invalid Command/CRC",
        status::UNKNOWN_PARAMETER => "Unknown Parameter",
        _ => "Unknown Status",
    }
}

/// Convert bytes to an uppercase contiguous hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Display form of an EPC: uppercase hex with a space every 4 bytes.
pub fn format_epc(epc: &[u8]) -> String {
    let mut out = String::with_capacity(epc.len() * 2 + epc.len() / 4);
    for (i, b) in epc.iter().enumerate() {
        if i > 0 && i % 4 == 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_hex() {
        assert_eq!(bytes_to_hex(&[0xE2, 0x00, 0x1A]), "E2001A");
        assert_eq!(bytes_to_hex(&[]), "");
    }

    #[test]
    fn test_format_epc_grouping() {
        let epc = [0xE2, 0x00, 0x12, 0x34, 0x56, 0x78];
        assert_eq!(format_epc(&epc), "E2001234 5678");
    }

    #[test]
    fn test_tag_equality_on_epc_only() {
        let a = TagData { epc: vec![1, 2, 3], rssi: 10, ..Default::default() };
        let b = TagData { epc: vec![1, 2, 3], rssi: 99, ..Default::default() };
        assert_eq!(a, b);
    }

    #[test]
    fn test_command_and_status_names() {
        assert_eq!(command_name(cmd::TAG_INVENTORY), "Tag Inventory");
        assert_eq!(command_name(0xAB), "Unknown Command");
        assert_eq!(status_desc(status::MORE_DATA), "More Data");
        assert_eq!(status_desc(0x55), "Unknown Status");
    }
}
