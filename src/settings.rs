//! Persistent reader settings.
//!
//! A 48-byte block in EEPROM holds the tunable reader state behind a
//! magic number, a structure version and a CRC-16-CCITT. Any integrity
//! violation at load time silently falls back to factory defaults and
//! re-persists them. Writes are verified by read-back; on a mismatch the
//! RAM copy rolls back so RAM and EEPROM never silently diverge.

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::clock::Clock;
use crate::crc::crc16_ccitt;
use crate::types::Error;

pub const SETTINGS_SIZE: usize = 48;
pub const SETTINGS_EEPROM_OFFSET: usize = 0x0030;
/// "E310" little-endian.
pub const SETTINGS_MAGIC: u32 = 0x3031_3345;
pub const SETTINGS_VERSION: u8 = 0x01;

pub const RF_POWER_MAX: u8 = 30;
pub const FREQ_INDEX_MAX: u8 = 62;
pub const INVENTORY_TIME_MIN: u8 = 1;

/// Bit 0 of the flags byte: the block differs from factory defaults.
pub const FLAG_SETTINGS_CHANGED: u8 = 0x01;

/// EEPROM write-cycle time before read-back verification.
const WRITE_CYCLE_MS: u64 = 5;

const CRC_DATA_SIZE: usize = SETTINGS_SIZE - 2;

/// Seam to the nonvolatile storage device.
pub trait Eeprom: Send {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Error>;
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Error>;
}

/// Frequency regions as stored in the settings block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreqRegion {
    China = 1,
    Us = 2,
    Europe = 3,
    Korea = 4,
}

impl FreqRegion {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FreqRegion::China),
            2 => Some(FreqRegion::Us),
            3 => Some(FreqRegion::Europe),
            4 => Some(FreqRegion::Korea),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FreqRegion::China => "China",
            FreqRegion::Us => "US",
            FreqRegion::Europe => "Europe",
            FreqRegion::Korea => "Korea",
        }
    }

    /// Band bits for Modify Frequency (0x22): the values that go into
    /// bits 7-6 of MaxFre and MinFre respectively.
    pub fn band_bits(self) -> (u8, u8) {
        match self {
            FreqRegion::China => (2, 0),
            FreqRegion::Us => (0, 2),
            FreqRegion::Europe => (1, 0),
            FreqRegion::Korea => (0, 3),
        }
    }

    /// Encode the `(MaxFre, MinFre)` pair for a start/end point range.
    pub fn encode_frequency(self, start: u8, end: u8) -> (u8, u8) {
        let (hi, lo) = self.band_bits();
        ((hi << 6) | (end & 0x3F), (lo << 6) | (start & 0x3F))
    }
}

/// RAM image of the settings block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub flags: u8,
    pub rf_power: u8,
    pub antenna_config: u8,
    pub freq_region: u8,
    pub freq_start: u8,
    pub freq_end: u8,
    pub inventory_time: u8,
    pub reader_addr: u8,
    pub typing_speed: u16,
    reserved: [u8; 29],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            flags: 0,
            rf_power: 20,
            antenna_config: 0x00,
            freq_region: FreqRegion::Korea as u8,
            freq_start: 0,
            freq_end: 19,
            inventory_time: 50,
            reader_addr: 0xFF,
            typing_speed: 600,
            reserved: [0; 29],
        }
    }
}

impl Settings {
    /// Serialize to the fixed wire layout, CRC included.
    pub fn encode(&self) -> [u8; SETTINGS_SIZE] {
        let mut block = [0u8; SETTINGS_SIZE];
        block[0..4].copy_from_slice(&SETTINGS_MAGIC.to_le_bytes());
        block[4] = SETTINGS_VERSION;
        block[5] = self.flags;
        block[6] = self.rf_power;
        block[7] = self.antenna_config;
        block[8] = self.freq_region;
        block[9] = self.freq_start;
        block[10] = self.freq_end;
        block[11] = self.inventory_time;
        block[12] = self.reader_addr;
        block[13..15].copy_from_slice(&self.typing_speed.to_le_bytes());
        block[15..44].copy_from_slice(&self.reserved);
        let crc = crc16_ccitt(&block[..CRC_DATA_SIZE]);
        block[46..48].copy_from_slice(&crc.to_le_bytes());
        block
    }

    /// Deserialize, rejecting any magic, CRC or version violation.
    pub fn decode(block: &[u8; SETTINGS_SIZE]) -> Result<Self, Error> {
        let magic = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        if magic != SETTINGS_MAGIC {
            return Err(Error::ParseError(format!("bad settings magic 0x{:08X}", magic)));
        }

        let stored_crc = u16::from_le_bytes([block[46], block[47]]);
        if crc16_ccitt(&block[..CRC_DATA_SIZE]) != stored_crc {
            return Err(Error::CrcFailed);
        }

        if block[4] != SETTINGS_VERSION {
            return Err(Error::ParseError(format!("unknown settings version {}", block[4])));
        }

        let mut reserved = [0u8; 29];
        reserved.copy_from_slice(&block[15..44]);

        Ok(Self {
            flags: block[5],
            rf_power: block[6],
            antenna_config: block[7],
            freq_region: block[8],
            freq_start: block[9],
            freq_end: block[10],
            inventory_time: block[11],
            reader_addr: block[12],
            typing_speed: u16::from_le_bytes([block[13], block[14]]),
            reserved,
        })
    }
}

pub struct SettingsStore<E: Eeprom> {
    eeprom: Option<E>,
    clock: Arc<dyn Clock>,
    settings: Settings,
    available: bool,
}

impl<E: Eeprom> SettingsStore<E> {
    /// Load from storage, falling back to defaults on any integrity
    /// violation (and re-persisting them).
    pub fn load(mut eeprom: E, clock: Arc<dyn Clock>) -> Self {
        let mut block = [0u8; SETTINGS_SIZE];
        let read = eeprom.read(SETTINGS_EEPROM_OFFSET, &mut block);

        let mut store = Self {
            eeprom: Some(eeprom),
            clock,
            settings: Settings::default(),
            available: true,
        };

        match read {
            Err(e) => {
                error!("Settings read failed: {}", e);
                store.available = false;
            }
            Ok(()) => match Settings::decode(&block) {
                Ok(settings) => {
                    info!(
                        "Settings loaded: RF={} dBm, region={}, speed={} CPM",
                        settings.rf_power, settings.freq_region, settings.typing_speed
                    );
                    store.settings = settings;
                }
                Err(e) => {
                    warn!("Settings invalid ({}), reinitializing defaults", e);
                    store.settings = Settings::default();
                    if let Err(e) = store.persist() {
                        error!("Failed to persist default settings: {}", e);
                        store.available = false;
                    }
                }
            },
        }
        store
    }

    /// A store with no storage device; settings live in RAM only.
    pub fn ram_only(clock: Arc<dyn Clock>) -> Self {
        warn!("EEPROM unavailable, settings in RAM only");
        Self {
            eeprom: None,
            clock,
            settings: Settings::default(),
            available: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Write the RAM copy out with read-back verification.
    fn persist(&mut self) -> Result<(), Error> {
        let Some(eeprom) = self.eeprom.as_mut() else {
            return Ok(());
        };

        let block = self.settings.encode();
        eeprom.write(SETTINGS_EEPROM_OFFSET, &block)?;
        self.clock.sleep_ms(WRITE_CYCLE_MS);

        let mut verify = [0u8; SETTINGS_SIZE];
        eeprom.read(SETTINGS_EEPROM_OFFSET, &mut verify)?;
        if verify != block {
            error!("Settings write verification failed");
            return Err(Error::Io("EEPROM read-back mismatch".into()));
        }
        debug!("Settings saved");
        Ok(())
    }

    /// Apply a mutation, persist it, and roll the RAM copy back if the
    /// verified write fails.
    fn update<F: FnOnce(&mut Settings)>(&mut self, mutate: F) -> Result<(), Error> {
        let previous = self.settings.clone();
        mutate(&mut self.settings);
        self.settings.flags |= FLAG_SETTINGS_CHANGED;

        if !self.available {
            return Ok(());
        }
        if let Err(e) = self.persist() {
            self.settings = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Restore factory defaults and persist them.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.settings = Settings::default();
        if !self.available {
            return Ok(());
        }
        self.persist()?;
        info!("Settings reset to defaults");
        Ok(())
    }

    pub fn set_rf_power(&mut self, power: u8) -> Result<(), Error> {
        if power > RF_POWER_MAX {
            return Err(Error::InvalidParam(format!(
                "RF power {} exceeds {} dBm",
                power, RF_POWER_MAX
            )));
        }
        self.update(|s| s.rf_power = power)
    }

    pub fn set_antenna(&mut self, config: u8) -> Result<(), Error> {
        self.update(|s| s.antenna_config = config)
    }

    pub fn set_frequency(&mut self, region: u8, start: u8, end: u8) -> Result<(), Error> {
        if FreqRegion::from_code(region).is_none() {
            return Err(Error::InvalidParam(format!("unknown frequency region {}", region)));
        }
        if start > FREQ_INDEX_MAX || end > FREQ_INDEX_MAX {
            return Err(Error::InvalidParam(format!(
                "frequency index out of range 0-{}",
                FREQ_INDEX_MAX
            )));
        }
        self.update(|s| {
            s.freq_region = region;
            s.freq_start = start;
            s.freq_end = end;
        })
    }

    pub fn set_inventory_time(&mut self, time_100ms: u8) -> Result<(), Error> {
        if time_100ms < INVENTORY_TIME_MIN {
            return Err(Error::InvalidParam("inventory time must be at least 1".into()));
        }
        self.update(|s| s.inventory_time = time_100ms)
    }

    pub fn set_reader_addr(&mut self, addr: u8) -> Result<(), Error> {
        self.update(|s| s.reader_addr = addr)
    }

    /// Store a typing speed already quantized by the HID emitter.
    pub fn set_typing_speed(&mut self, cpm: u16) -> Result<(), Error> {
        if !(100..=1500).contains(&cpm) {
            return Err(Error::InvalidParam(format!("typing speed {} out of 100-1500", cpm)));
        }
        self.update(|s| s.typing_speed = cpm)
    }

    /// Multi-line human-readable dump for the shell.
    pub fn describe(&self) -> String {
        let s = &self.settings;
        let region = FreqRegion::from_code(s.freq_region)
            .map(|r| r.name())
            .unwrap_or("Unknown");
        format!(
            "EEPROM:       {}\n\
             RF Power:     {} dBm\n\
             Antenna:      0x{:02X}\n\
             Freq Region:  {} ({})\n\
             Freq Range:   {} - {}\n\
             Inv Time:     {} ({:.1} s)\n\
             Reader Addr:  0x{:02X}\n\
             Typing Speed: {} CPM\n\
             Changed:      {}",
            if self.available { "available" } else { "not available" },
            s.rf_power,
            s.antenna_config,
            region,
            s.freq_region,
            s.freq_start,
            s.freq_end,
            s.inventory_time,
            s.inventory_time as f32 * 0.1,
            s.reader_addr,
            s.typing_speed,
            if s.flags & FLAG_SETTINGS_CHANGED != 0 { "yes" } else { "no" },
        )
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Shared in-memory EEPROM; clones view the same backing storage so a
    /// fresh store can simulate a reboot.
    #[derive(Clone)]
    pub struct MemEeprom {
        data: Arc<Mutex<Vec<u8>>>,
    }

    impl MemEeprom {
        pub fn new(size: usize) -> Self {
            Self { data: Arc::new(Mutex::new(vec![0xFF; size])) }
        }

        pub fn corrupt(&self, offset: usize) {
            self.data.lock().unwrap()[offset] ^= 0xA5;
        }
    }

    impl Eeprom for MemEeprom {
        fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
            let data = self.data.lock().unwrap();
            if offset + buf.len() > data.len() {
                return Err(Error::Io("read past end of EEPROM".into()));
            }
            buf.copy_from_slice(&data[offset..offset + buf.len()]);
            Ok(())
        }

        fn write(&mut self, offset: usize, src: &[u8]) -> Result<(), Error> {
            let mut data = self.data.lock().unwrap();
            if offset + src.len() > data.len() {
                return Err(Error::Io("write past end of EEPROM".into()));
            }
            data[offset..offset + src.len()].copy_from_slice(src);
            Ok(())
        }
    }
}
