//! Command set for the E310 reader.
//!
//! Every wire command is one variant of [`Command`]; the codec owns the
//! single serializer that turns a variant into frame bytes. Range
//! constraints live in the checked constructors here, so an out-of-range
//! value is rejected before any buffer is touched.

use crate::types::{cmd, Error, InventoryParams, ReadParams, SelectParams, WriteEpcParams, WriteParams};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TagInventory(InventoryParams),
    /// Shortened Tag Inventory with the default parameter block the
    /// vendor tool sends (`Q=4, smart session, no mask, 5 s scan`).
    TagInventoryDefault,
    SingleTagInventory,
    ReadData(ReadParams),
    WriteData(WriteParams),
    WriteEpc(WriteEpcParams),
    KillTag { epc: Vec<u8>, password: [u8; 4] },
    SetProtection { epc: Vec<u8>, select_flag: u8, set_flag: u8, password: [u8; 4] },
    BlockErase { epc: Vec<u8>, mem_bank: u8, word_ptr: u8, word_count: u8, password: [u8; 4] },
    ObtainReaderInfo,
    ObtainReaderSn,
    ModifyFrequency { max_fre: u8, min_fre: u8 },
    ModifyReaderAddr(u8),
    ModifyInventoryTime(u8),
    ModifyBaudRate(u8),
    ModifyRfPower(u8),
    LedBuzzer { active_time: u8, silent_time: u8, times: u8 },
    AntennaMux(u8),
    Buzzer(bool),
    GpioControl(u8),
    ObtainGpioState,
    StartFastInventory { target: u8 },
    StopFastInventory,
    GetDataFromBuffer,
    ClearMemoryBuffer,
    GetTagCount,
    SetWorkMode(u8),
    MeasureTemperature,
    StopImmediately,
    Select(SelectParams),
}

impl Command {
    /// Wire command code for this variant.
    pub fn code(&self) -> u8 {
        match self {
            Command::TagInventory(_) | Command::TagInventoryDefault => cmd::TAG_INVENTORY,
            Command::SingleTagInventory => cmd::SINGLE_TAG_INVENTORY,
            Command::ReadData(_) => cmd::READ_DATA,
            Command::WriteData(_) => cmd::WRITE_DATA,
            Command::WriteEpc(_) => cmd::WRITE_EPC,
            Command::KillTag { .. } => cmd::KILL_TAG,
            Command::SetProtection { .. } => cmd::SET_PROTECTION,
            Command::BlockErase { .. } => cmd::BLOCK_ERASE,
            Command::ObtainReaderInfo => cmd::OBTAIN_READER_INFO,
            Command::ObtainReaderSn => cmd::OBTAIN_READER_SN,
            Command::ModifyFrequency { .. } => cmd::MODIFY_FREQUENCY,
            Command::ModifyReaderAddr(_) => cmd::MODIFY_READER_ADDR,
            Command::ModifyInventoryTime(_) => cmd::MODIFY_INVENTORY_TIME,
            Command::ModifyBaudRate(_) => cmd::MODIFY_BAUD_RATE,
            Command::ModifyRfPower(_) => cmd::MODIFY_RF_POWER,
            Command::LedBuzzer { .. } => cmd::LED_BUZZER_CONTROL,
            Command::AntennaMux(_) => cmd::ANTENNA_MUX,
            Command::Buzzer(_) => cmd::ENABLE_BUZZER,
            Command::GpioControl(_) => cmd::GPIO_CONTROL,
            Command::ObtainGpioState => cmd::OBTAIN_GPIO_STATE,
            Command::StartFastInventory { .. } => cmd::START_FAST_INVENTORY,
            Command::StopFastInventory => cmd::STOP_FAST_INVENTORY,
            Command::GetDataFromBuffer => cmd::GET_DATA_FROM_BUFFER,
            Command::ClearMemoryBuffer => cmd::CLEAR_MEMORY_BUFFER,
            Command::GetTagCount => cmd::GET_TAG_COUNT,
            Command::SetWorkMode(_) => cmd::SET_WORK_MODE,
            Command::MeasureTemperature => cmd::MEASURE_TEMPERATURE,
            Command::StopImmediately => cmd::STOP_IMMEDIATELY,
            Command::Select(_) => cmd::SELECT,
        }
    }

    /// Read Data with range checks: `1 <= word_count <= 120`.
    pub fn read_data(params: ReadParams) -> Result<Self, Error> {
        if params.word_count == 0 || params.word_count > 120 {
            return Err(Error::InvalidParam(format!(
                "word count {} out of range 1-120",
                params.word_count
            )));
        }
        Ok(Command::ReadData(params))
    }

    /// Write Data with range checks: `1 <= word_count <= 120` and the data
    /// buffer holding exactly `word_count * 2` bytes.
    pub fn write_data(params: WriteParams) -> Result<Self, Error> {
        if params.word_count == 0 || params.word_count > 120 {
            return Err(Error::InvalidParam(format!(
                "word count {} out of range 1-120",
                params.word_count
            )));
        }
        if params.data.len() != params.word_count as usize * 2 {
            return Err(Error::InvalidParam(format!(
                "write data is {} bytes, expected {}",
                params.data.len(),
                params.word_count as usize * 2
            )));
        }
        Ok(Command::WriteData(params))
    }

    /// Modify RF Power: valid range 0-30 dBm.
    pub fn modify_rf_power(power: u8) -> Result<Self, Error> {
        if power > 30 {
            return Err(Error::InvalidParam(format!(
                "RF power {} dBm exceeds maximum 30",
                power
            )));
        }
        Ok(Command::ModifyRfPower(power))
    }

    /// Modify Baud Rate: valid indices 0 (9600), 1 (19200), 2 (38400),
    /// 5 (57600), 6 (115200).
    pub fn modify_baud_rate(index: u8) -> Result<Self, Error> {
        match index {
            0 | 1 | 2 | 5 | 6 => Ok(Command::ModifyBaudRate(index)),
            _ => Err(Error::InvalidParam(format!("invalid baud rate index {}", index))),
        }
    }

    /// Modify Inventory Time in 100 ms units; zero is rejected.
    pub fn modify_inventory_time(time_100ms: u8) -> Result<Self, Error> {
        if time_100ms == 0 {
            return Err(Error::InvalidParam("inventory time must be at least 1".into()));
        }
        Ok(Command::ModifyInventoryTime(time_100ms))
    }
}
