//! HID keystroke emitter.
//!
//! Turns an ASCII hex EPC string into paced USB keyboard reports: one
//! press and one release per character, Enter as the record terminator.
//! The pace derives from a characters-per-minute setting; an atomic mute
//! flag drops output without touching the USB device.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info};

use crate::clock::Clock;
use crate::types::Error;

pub const HID_REPORT_SIZE: usize = 8;
pub const TYPING_SPEED_MIN: u16 = 100;
pub const TYPING_SPEED_MAX: u16 = 1500;
pub const TYPING_SPEED_DEFAULT: u16 = 600;

const KEY_ENTER: u8 = 0x28;

/// Seam to the USB HID keyboard device.
pub trait HidDevice: Send {
    /// The host has enumerated the interface and accepts reports.
    fn ready(&self) -> bool;
    fn submit_report(&mut self, report: &[u8; HID_REPORT_SIZE]) -> Result<(), Error>;
}

/// Anything that accepts an EPC text line for output. The router talks to
/// the emitter through this seam so tests can record emissions directly.
pub trait EpcSink: Send + Sync {
    fn send_epc(&self, text: &[u8]) -> Result<(), Error>;
}

/// Map an ASCII character to a USB HID keycode. Supports the hex alphabet
/// plus space; anything else maps to 0 and is skipped by the caller.
fn ascii_to_keycode(c: u8) -> u8 {
    let c = c.to_ascii_uppercase();
    match c {
        b'1'..=b'9' => 0x1E + (c - b'1'),
        b'0' => 0x27,
        b'A'..=b'F' => 0x04 + (c - b'A'),
        b' ' => 0x2C,
        _ => 0,
    }
}

pub struct HidEmitter<D: HidDevice> {
    device: Mutex<Option<D>>,
    enabled: AtomicBool,
    typing_speed_cpm: AtomicU16,
    clock: Arc<dyn Clock>,
}

impl<D: HidDevice> HidEmitter<D> {
    pub fn new(device: D, clock: Arc<dyn Clock>) -> Self {
        Self {
            device: Mutex::new(Some(device)),
            enabled: AtomicBool::new(true),
            typing_speed_cpm: AtomicU16::new(TYPING_SPEED_DEFAULT),
            clock,
        }
    }

    /// An emitter with no device attached; every send reports `NoDevice`.
    pub fn detached(clock: Arc<dyn Clock>) -> Self {
        Self {
            device: Mutex::new(None),
            enabled: AtomicBool::new(true),
            typing_speed_cpm: AtomicU16::new(TYPING_SPEED_DEFAULT),
            clock,
        }
    }

    /// Type the given ASCII text followed by Enter.
    ///
    /// Concurrent callers serialize on the device mutex, so interleaved
    /// EPCs can never mix keystrokes.
    pub fn send_epc(&self, text: &[u8]) -> Result<(), Error> {
        if text.is_empty() {
            return Err(Error::InvalidParam("empty EPC text".into()));
        }

        let mut guard = self.device.lock().unwrap();
        let device = guard.as_mut().ok_or(Error::NoDevice)?;
        if !device.ready() {
            return Err(Error::NotReady);
        }

        // Device faults surface even while muted; only output is gated.
        if !self.enabled.load(Ordering::Acquire) {
            debug!("HID muted, dropping {} chars", text.len());
            return Ok(());
        }

        // 60000 ms/min over 2 events (press + release) per character.
        let cpm = self.typing_speed_cpm.load(Ordering::Acquire);
        let delay_ms = 30_000 / cpm as u64;

        for &c in text {
            let keycode = ascii_to_keycode(c);
            if keycode == 0 {
                debug!("Skipping untypeable character 0x{:02X}", c);
                continue;
            }
            self.tap(device, keycode, delay_ms)?;
        }
        self.tap(device, KEY_ENTER, delay_ms)?;

        Ok(())
    }

    fn tap(&self, device: &mut D, keycode: u8, delay_ms: u64) -> Result<(), Error> {
        let mut report = [0u8; HID_REPORT_SIZE];
        report[2] = keycode;
        device.submit_report(&report).map_err(|e| {
            error!("Key press failed: {}", e);
            e
        })?;
        self.clock.sleep_ms(delay_ms);

        device.submit_report(&[0u8; HID_REPORT_SIZE]).map_err(|e| {
            error!("Key release failed: {}", e);
            e
        })?;
        self.clock.sleep_ms(delay_ms);
        Ok(())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        info!("HID output {}", if enabled { "enabled" } else { "muted" });
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.device
            .lock()
            .unwrap()
            .as_ref()
            .map(|d| d.ready())
            .unwrap_or(false)
    }

    /// Set the typing speed, quantized to the nearest 100 CPM step (ties
    /// round up) and clamped to 100..=1500. Returns the applied value.
    pub fn set_typing_speed(&self, cpm: u16) -> u16 {
        let quantized = (cpm as u32 + 50) / 100 * 100;
        let clamped = quantized.clamp(TYPING_SPEED_MIN as u32, TYPING_SPEED_MAX as u32) as u16;
        self.typing_speed_cpm.store(clamped, Ordering::Release);
        clamped
    }

    pub fn typing_speed(&self) -> u16 {
        self.typing_speed_cpm.load(Ordering::Acquire)
    }
}

impl<D: HidDevice> EpcSink for HidEmitter<D> {
    fn send_epc(&self, text: &[u8]) -> Result<(), Error> {
        HidEmitter::send_epc(self, text)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockHidDevice;
    use super::*;

    struct NoSleepClock;
    impl Clock for NoSleepClock {
        fn now_ms(&self) -> u64 {
            0
        }
        fn sleep_ms(&self, _ms: u64) {}
    }

    fn emitter() -> (HidEmitter<MockHidDevice>, Arc<Mutex<Vec<[u8; HID_REPORT_SIZE]>>>) {
        let (device, reports) = MockHidDevice::new();
        (HidEmitter::new(device, Arc::new(NoSleepClock)), reports)
    }

    #[test]
    fn test_keycode_map() {
        assert_eq!(ascii_to_keycode(b'1'), 0x1E);
        assert_eq!(ascii_to_keycode(b'9'), 0x26);
        assert_eq!(ascii_to_keycode(b'0'), 0x27);
        assert_eq!(ascii_to_keycode(b'A'), 0x04);
        assert_eq!(ascii_to_keycode(b'f'), 0x09);
        assert_eq!(ascii_to_keycode(b' '), 0x2C);
        assert_eq!(ascii_to_keycode(b'G'), 0);
        assert_eq!(ascii_to_keycode(b'-'), 0);
    }

    #[test]
    fn test_send_epc_report_sequence() {
        let (emitter, reports) = emitter();
        emitter.send_epc(b"E2").unwrap();

        let reports = reports.lock().unwrap();
        // press+release per char, plus Enter press+release
        assert_eq!(reports.len(), 6);
        assert_eq!(reports[0][2], 0x08); // 'E'
        assert_eq!(reports[1], [0u8; 8]);
        assert_eq!(reports[2][2], 0x1F); // '2'
        assert_eq!(reports[3], [0u8; 8]);
        assert_eq!(reports[4][2], KEY_ENTER);
        assert_eq!(reports[5], [0u8; 8]);
        // No modifier bytes anywhere
        assert!(reports.iter().all(|r| r[0] == 0 && r[1] == 0));
    }

    #[test]
    fn test_lowercase_forced_uppercase() {
        let (emitter, reports) = emitter();
        emitter.send_epc(b"ab").unwrap();
        let reports = reports.lock().unwrap();
        assert_eq!(reports[0][2], 0x04);
        assert_eq!(reports[2][2], 0x05);
    }

    #[test]
    fn test_unsupported_chars_skipped() {
        let (emitter, reports) = emitter();
        emitter.send_epc(b"A-Z1").unwrap();
        let reports = reports.lock().unwrap();
        // 'A' and '1' typed, '-' and 'Z' skipped, plus Enter
        assert_eq!(reports.len(), 6);
    }

    #[test]
    fn test_empty_input_rejected() {
        let (emitter, _) = emitter();
        assert!(matches!(emitter.send_epc(b""), Err(Error::InvalidParam(_))));
    }

    #[test]
    fn test_no_device() {
        let emitter: HidEmitter<MockHidDevice> = HidEmitter::detached(Arc::new(NoSleepClock));
        assert!(matches!(emitter.send_epc(b"AB"), Err(Error::NoDevice)));
        assert!(!emitter.is_ready());
    }

    #[test]
    fn test_not_ready() {
        let (mut device, _) = MockHidDevice::new();
        device.ready = false;
        let emitter = HidEmitter::new(device, Arc::new(NoSleepClock));
        assert!(matches!(emitter.send_epc(b"AB"), Err(Error::NotReady)));
    }

    #[test]
    fn test_mute_swallows_output() {
        let (emitter, reports) = emitter();
        emitter.set_enabled(false);
        assert!(emitter.send_epc(b"AB").is_ok());
        assert!(reports.lock().unwrap().is_empty());

        emitter.set_enabled(true);
        emitter.send_epc(b"AB").unwrap();
        assert!(!reports.lock().unwrap().is_empty());
    }

    #[test]
    fn test_mute_does_not_mask_device_faults() {
        let emitter: HidEmitter<MockHidDevice> = HidEmitter::detached(Arc::new(NoSleepClock));
        emitter.set_enabled(false);
        assert!(matches!(emitter.send_epc(b"AB"), Err(Error::NoDevice)));

        let (mut device, _) = MockHidDevice::new();
        device.ready = false;
        let emitter = HidEmitter::new(device, Arc::new(NoSleepClock));
        emitter.set_enabled(false);
        assert!(matches!(emitter.send_epc(b"AB"), Err(Error::NotReady)));
    }

    #[test]
    fn test_typing_speed_quantization() {
        let (emitter, _) = emitter();
        assert_eq!(emitter.typing_speed(), TYPING_SPEED_DEFAULT);
        assert_eq!(emitter.set_typing_speed(649), 600);
        assert_eq!(emitter.set_typing_speed(650), 700); // tie rounds up
        assert_eq!(emitter.set_typing_speed(1), 100); // clamped low
        assert_eq!(emitter.set_typing_speed(30), 100);
        assert_eq!(emitter.set_typing_speed(5000), 1500); // clamped high
        assert_eq!(emitter.typing_speed(), 1500);
    }
}
