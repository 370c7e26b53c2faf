//! Operator command shell.
//!
//! Parses one command line at a time and dispatches onto the router, HID
//! emitter and settings store. Reader-side changes go over the wire
//! first; the matching setting is persisted only after the reader
//! acknowledges with Success, so stored state never runs ahead of the
//! hardware.

use std::sync::{Arc, Mutex};

use log::LevelFilter;

use crate::codec::{parse_reader_info, parse_tag_count, parse_tag_data, parse_temperature};
use crate::command::Command;
use crate::hid::{HidDevice, HidEmitter};
use crate::router::{Router, DEFAULT_RESPONSE_TIMEOUT_MS};
use crate::settings::{Eeprom, FreqRegion, SettingsStore};
use crate::types::{bytes_to_hex, format_epc, status, status_desc, Error};

pub struct Shell<D: HidDevice, E: Eeprom> {
    router: Arc<Router>,
    hid: Arc<HidEmitter<D>>,
    settings: Mutex<SettingsStore<E>>,
}

impl<D: HidDevice, E: Eeprom> Shell<D, E> {
    pub fn new(router: Arc<Router>, hid: Arc<HidEmitter<D>>, settings: SettingsStore<E>) -> Self {
        // Stored state drives the runtime knobs it mirrors
        router.set_scan_time(settings.get().inventory_time);
        hid.set_typing_speed(settings.get().typing_speed);
        Self { router, hid, settings: Mutex::new(settings) }
    }

    /// Run one command line; the returned string is printed to the
    /// operator verbatim.
    pub fn execute(&self, line: &str) -> Result<String, Error> {
        let args: Vec<&str> = line.split_whitespace().collect();
        match args.as_slice() {
            [] => Ok(String::new()),
            ["help"] => Ok(Self::help().to_string()),
            ["router", rest @ ..] => self.cmd_router(rest),
            ["e310", rest @ ..] => self.cmd_e310(rest),
            ["hid", rest @ ..] => self.cmd_hid(rest),
            ["usb", rest @ ..] => self.cmd_usb(rest),
            [other, ..] => Err(Error::InvalidParam(format!("unknown command '{}'", other))),
        }
    }

    fn cmd_router(&self, args: &[&str]) -> Result<String, Error> {
        match args {
            ["mode"] => Ok(format!("{}", self.router.mode())),
            ["status"] => Ok(format!(
                "Mode:      {}\nConnected: {}\nInterval:  {} ms\nFiltered:  {} EPCs",
                self.router.mode(),
                self.router.is_connected(),
                self.router.interval_ms(),
                self.router.filter_summary().len(),
            )),
            ["stats"] => {
                let s = self.router.stats();
                Ok(format!(
                    "Bytes RX:       {}\nFrames parsed:  {}\nParse errors:   {}\n\
                     Tags seen:      {}\nTags emitted:   {}\nTags suppressed:{}\n\
                     HID errors:     {}\nOverruns:       {}\nRounds:         {}",
                    s.bytes_received,
                    s.frames_parsed,
                    s.parse_errors,
                    s.tags_seen,
                    s.tags_emitted,
                    s.tags_suppressed,
                    s.hid_errors,
                    s.overruns,
                    s.rounds_completed,
                ))
            }
            _ => Err(Error::InvalidParam("usage: router <mode|status|stats>".into())),
        }
    }

    fn cmd_e310(&self, args: &[&str]) -> Result<String, Error> {
        match args {
            ["connect"] => {
                self.router.connect()?;
                Ok("Reader connected".into())
            }
            ["start"] => {
                self.router.start_inventory()?;
                Ok("Inventory started".into())
            }
            ["stop"] => {
                self.router.stop_inventory();
                Ok("Inventory stopped".into())
            }
            ["single"] => self.single_inventory(),
            ["info"] => {
                let (_, payload) = self
                    .router
                    .transact(&Command::ObtainReaderInfo, DEFAULT_RESPONSE_TIMEOUT_MS)?;
                let info = parse_reader_info(&payload)?;
                Ok(format!(
                    "Firmware: {}.{}\nModel:    0x{:02X}\nPower:    {} dBm\n\
                     Freq:     {} - {}\nScanTime: {}\nAntenna:  0x{:02X}",
                    info.firmware_version >> 8,
                    info.firmware_version & 0xFF,
                    info.model_type,
                    info.power,
                    info.min_freq & 0x3F,
                    info.max_freq & 0x3F,
                    info.scan_time,
                    info.antenna,
                ))
            }
            ["sn"] => {
                let (_, payload) = self
                    .router
                    .transact(&Command::ObtainReaderSn, DEFAULT_RESPONSE_TIMEOUT_MS)?;
                Ok(format!("SN: {}", bytes_to_hex(&payload)))
            }
            ["temp"] => {
                let (_, payload) = self
                    .router
                    .transact(&Command::MeasureTemperature, DEFAULT_RESPONSE_TIMEOUT_MS)?;
                Ok(format!("Temperature: {} C", parse_temperature(&payload)?))
            }
            ["power", value] => {
                let dbm = parse_num::<u8>(value)?;
                self.apply(Command::modify_rf_power(dbm)?, |s| s.set_rf_power(dbm))?;
                Ok(format!("RF power set to {} dBm", dbm))
            }
            ["addr", value] => {
                let addr = parse_num::<u8>(value)?;
                self.apply(Command::ModifyReaderAddr(addr), |s| s.set_reader_addr(addr))?;
                self.router.set_reader_addr(addr);
                Ok(format!("Reader address set to 0x{:02X}", addr))
            }
            ["invtime", value] => {
                let time = parse_num::<u8>(value)?;
                self.apply(Command::modify_inventory_time(time)?, |s| {
                    s.set_inventory_time(time)
                })?;
                self.router.set_scan_time(time);
                Ok(format!("Inventory time set to {} x100 ms", time))
            }
            ["interval", value] => {
                let ms = parse_num::<u64>(value)?;
                self.router.set_interval_ms(ms);
                Ok(format!("Inventory interval set to {} ms", ms))
            }
            ["freq", region, start, end] => {
                let region_code = parse_num::<u8>(region)?;
                let start = parse_num::<u8>(start)?;
                let end = parse_num::<u8>(end)?;
                let band = FreqRegion::from_code(region_code).ok_or_else(|| {
                    Error::InvalidParam(format!("unknown frequency region {}", region_code))
                })?;
                let (max_fre, min_fre) = band.encode_frequency(start, end);
                self.apply(Command::ModifyFrequency { max_fre, min_fre }, |s| {
                    s.set_frequency(region_code, start, end)
                })?;
                Ok(format!("Frequency set to {} points {}-{}", band.name(), start, end))
            }
            ["antenna", value] => {
                let config = parse_num::<u8>(value)?;
                self.apply(Command::AntennaMux(config), |s| s.set_antenna(config))?;
                Ok(format!("Antenna config set to 0x{:02X}", config))
            }
            ["gpio"] => {
                let (_, payload) = self
                    .router
                    .transact(&Command::ObtainGpioState, DEFAULT_RESPONSE_TIMEOUT_MS)?;
                Ok(format!("GPIO: {}", bytes_to_hex(&payload)))
            }
            ["gpio", value] => {
                let state = parse_num::<u8>(value)?;
                self.transact_checked(&Command::GpioControl(state))?;
                Ok(format!("GPIO set to 0x{:02X}", state))
            }
            ["buzzer", switch] => {
                let on = parse_switch(switch)?;
                self.transact_checked(&Command::Buzzer(on))?;
                Ok(format!("Buzzer {}", if on { "enabled" } else { "disabled" }))
            }
            ["led", active, silent, times] => {
                let command = Command::LedBuzzer {
                    active_time: parse_num::<u8>(active)?,
                    silent_time: parse_num::<u8>(silent)?,
                    times: parse_num::<u8>(times)?,
                };
                self.transact_checked(&command)?;
                Ok("LED/buzzer triggered".into())
            }
            ["send", hex @ ..] if !hex.is_empty() => {
                let bytes = parse_hex_bytes(hex)?;
                match self.router.transact_raw(&bytes, DEFAULT_RESPONSE_TIMEOUT_MS) {
                    Ok((header, payload)) => Ok(format!(
                        "Sent {} bytes, {} ({}): {}",
                        bytes.len(),
                        status_desc(header.status),
                        crate::types::command_name(header.recmd),
                        bytes_to_hex(&payload),
                    )),
                    Err(Error::Timeout) => Ok(format!("Sent {} bytes, no response", bytes.len())),
                    Err(e) => Err(e),
                }
            }
            ["debug", switch] => {
                let on = parse_switch(switch)?;
                log::set_max_level(if on { LevelFilter::Debug } else { LevelFilter::Info });
                Ok(format!("Debug logging {}", if on { "on" } else { "off" }))
            }
            ["reset"] => {
                self.router.stop_inventory();
                self.router.clear_filter();
                self.router.connect()?;
                Ok("Reader link reset".into())
            }
            ["buffer", "get"] => {
                let (header, payload) = self
                    .router
                    .transact(&Command::GetDataFromBuffer, DEFAULT_RESPONSE_TIMEOUT_MS)?;
                Ok(format!(
                    "Buffer ({}): {}",
                    status_desc(header.status),
                    bytes_to_hex(&payload)
                ))
            }
            ["buffer", "clear"] => {
                self.transact_checked(&Command::ClearMemoryBuffer)?;
                Ok("Buffer cleared".into())
            }
            ["buffer", "count"] => {
                let (_, payload) = self
                    .router
                    .transact(&Command::GetTagCount, DEFAULT_RESPONSE_TIMEOUT_MS)?;
                Ok(format!("Buffered tags: {}", parse_tag_count(&payload)?))
            }
            ["settings", "show"] => Ok(self.settings.lock().unwrap().describe()),
            ["settings", "reset"] => {
                self.settings.lock().unwrap().reset()?;
                Ok("Settings reset to defaults".into())
            }
            _ => Err(Error::InvalidParam("usage: e310 <subcommand>, try 'help'".into())),
        }
    }

    fn cmd_hid(&self, args: &[&str]) -> Result<String, Error> {
        match args {
            ["speed", value] => {
                let requested = parse_num::<u16>(value)?;
                let applied = self.hid.set_typing_speed(requested);
                self.settings.lock().unwrap().set_typing_speed(applied)?;
                Ok(format!("Typing speed set to {} CPM", applied))
            }
            ["debounce", value] => {
                let seconds = parse_num::<u32>(value)?;
                self.router.set_debounce(seconds);
                Ok(format!("Debounce set to {} s", seconds))
            }
            ["clear"] => {
                self.router.clear_filter();
                Ok("EPC filter cleared".into())
            }
            ["status"] => {
                let summary = self.router.filter_summary();
                let mut out = format!(
                    "Enabled: {}\nReady:   {}\nSpeed:   {} CPM\nFilter:  {} EPCs",
                    self.hid.is_enabled(),
                    self.hid.is_ready(),
                    self.hid.typing_speed(),
                    summary.len(),
                );
                for entry in &summary {
                    out.push_str(&format!(
                        "\n  {}  reads={} rssi={}..{}",
                        format_epc(&entry.epc),
                        entry.read_count,
                        entry.rssi_min,
                        entry.rssi_max,
                    ));
                }
                Ok(out)
            }
            ["test"] => {
                self.hid.send_epc(b"0123456789ABCDEF")?;
                Ok("Test pattern typed".into())
            }
            _ => Err(Error::InvalidParam(
                "usage: hid <speed|debounce|clear|status|test>".into(),
            )),
        }
    }

    fn cmd_usb(&self, args: &[&str]) -> Result<String, Error> {
        match args {
            ["hid", switch] => {
                let on = parse_switch(switch)?;
                self.hid.set_enabled(on);
                Ok(format!("HID output {}", if on { "enabled" } else { "muted" }))
            }
            ["status"] => Ok(format!(
                "HID ready: {}, output {}",
                self.hid.is_ready(),
                if self.hid.is_enabled() { "enabled" } else { "muted" },
            )),
            _ => Err(Error::InvalidParam("usage: usb <hid on|off, status>".into())),
        }
    }

    fn single_inventory(&self) -> Result<String, Error> {
        let (header, payload) = self
            .router
            .transact(&Command::SingleTagInventory, DEFAULT_RESPONSE_TIMEOUT_MS)?;
        if payload.len() < 2 {
            return Ok(format!("No tags ({})", status_desc(header.status)));
        }

        let count = payload[1] as usize;
        let mut out = format!("Antenna 0x{:02X}, {} tags", payload[0], count);
        let mut offset = 2;
        for _ in 0..count {
            let (tag, consumed) = parse_tag_data(&payload[offset..])?;
            offset += consumed;
            out.push_str(&format!("\n  {}  rssi={}", format_epc(&tag.epc), tag.rssi));
        }
        Ok(out)
    }

    /// Send a reader command and, on Success, persist the matching
    /// setting. The reader answering with any other status leaves the
    /// stored state untouched.
    fn apply<F>(&self, command: Command, save: F) -> Result<(), Error>
    where
        F: FnOnce(&mut SettingsStore<E>) -> Result<(), Error>,
    {
        self.transact_checked(&command)?;
        save(&mut self.settings.lock().unwrap())
    }

    fn transact_checked(&self, command: &Command) -> Result<(), Error> {
        let (header, _) = self.router.transact(command, DEFAULT_RESPONSE_TIMEOUT_MS)?;
        if header.status != status::SUCCESS {
            return Err(Error::Io(format!(
                "reader refused: {}",
                status_desc(header.status)
            )));
        }
        Ok(())
    }

    fn help() -> &'static str {
        "router mode|status|stats\n\
         e310 connect|start|stop|single|info|sn|temp|reset\n\
         e310 power <dbm> | addr <a> | invtime <n> | interval <ms>\n\
         e310 freq <region> <start> <end> | antenna <cfg>\n\
         e310 gpio [state] | buzzer on|off | led <a> <s> <n> | send <hex..> | debug on|off\n\
         e310 buffer get|clear|count | settings show|reset\n\
         hid speed <cpm> | debounce <s> | clear | status | test\n\
         usb hid on|off | usb status"
    }
}

fn parse_num<T>(s: &str) -> Result<T, Error>
where
    T: TryFrom<u64>,
{
    let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse::<u64>()
    }
    .map_err(|_| Error::InvalidParam(format!("bad number '{}'", s)))?;

    T::try_from(value).map_err(|_| Error::InvalidParam(format!("value {} out of range", value)))
}

fn parse_switch(s: &str) -> Result<bool, Error> {
    match s {
        "on" | "1" => Ok(true),
        "off" | "0" => Ok(false),
        _ => Err(Error::InvalidParam(format!("expected on or off, got '{}'", s))),
    }
}

fn parse_hex_bytes(tokens: &[&str]) -> Result<Vec<u8>, Error> {
    let joined: String = tokens.concat();
    if joined.len() % 2 != 0 {
        return Err(Error::InvalidParam("odd number of hex digits".into()));
    }
    (0..joined.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&joined[i..i + 2], 16)
                .map_err(|_| Error::InvalidParam(format!("bad hex near '{}'", &joined[i..i + 2])))
        })
        .collect()
}
