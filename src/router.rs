//! Frame router and reader lifecycle state machine.
//!
//! A single worker drives [`Router::process`]: it drains the RX ring into
//! the frame assembler, classifies every complete frame, deduplicates tag
//! reads through the EPC filter and forwards accepted EPCs to the HID
//! sink. Shell threads reach the same instance through its public
//! methods; a single-slot compare-and-swap lock keeps their response
//! waits from racing the worker inside `process`.
//!
//! Response waiting is a plain polling loop: senders watch the parsed
//! frame and parse error counters for an increment, sleeping 10 ms
//! between checks. The counters only move forward, so one observed
//! increment past the baseline is a reliable completion edge.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::assembler::FrameAssembler;
use crate::clock::Clock;
use crate::codec::{
    parse_auto_upload_tag, parse_inventory_stats, parse_response_header, parse_tag_data,
    response_payload, Codec,
};
use crate::command::Command;
use crate::filter::{Decision, EpcFilter, EpcSummary};
use crate::hid::EpcSink;
use crate::notify::Notifier;
use crate::ring;
use crate::types::{
    bytes_to_hex, cmd, command_name, status, status_desc, Error, InventoryParams, ResponseHeader,
    TagData, ADDR_BROADCAST, RECMD_AUTO_UPLOAD,
};

/// Response window for each connect probe.
pub const CONNECT_PROBE_WINDOW_MS: u64 = 200;
/// Poll granularity of the response wait loop.
pub const RESPONSE_POLL_MS: u64 = 10;
/// Default window for shell-initiated commands.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Inventory,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Idle => write!(f, "Idle"),
            Mode::Inventory => write!(f, "Inventory"),
        }
    }
}

/// Point-in-time copy of the router counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub bytes_received: u64,
    pub frames_parsed: u32,
    pub parse_errors: u32,
    pub tags_seen: u32,
    pub tags_emitted: u32,
    pub tags_suppressed: u32,
    pub hid_errors: u32,
    pub overruns: u32,
    pub rounds_completed: u32,
}

struct RouterCore {
    codec: Codec,
    assembler: FrameAssembler,
    filter: EpcFilter,
    rx: ring::Consumer,
    tx: ring::Producer,
    params: InventoryParams,
    interval_ms: u64,
    next_round_at_ms: Option<u64>,
    last_response: Option<(ResponseHeader, Vec<u8>)>,
}

pub struct Router {
    core: Mutex<RouterCore>,
    /// Single-slot lock around `process`; the loser of the race skips
    /// the tick instead of blocking.
    busy: AtomicBool,
    connected: AtomicBool,
    inventory_active: AtomicBool,

    bytes_received: AtomicU64,
    frames_parsed: AtomicU32,
    parse_errors: AtomicU32,
    tags_seen: AtomicU32,
    tags_emitted: AtomicU32,
    tags_suppressed: AtomicU32,
    hid_errors: AtomicU32,
    overruns: AtomicU32,
    rounds_completed: AtomicU32,

    sink: Arc<dyn EpcSink>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl Router {
    pub fn new(
        reader_addr: u8,
        rx: ring::Consumer,
        tx: ring::Producer,
        sink: Arc<dyn EpcSink>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            core: Mutex::new(RouterCore {
                codec: Codec::new(reader_addr),
                assembler: FrameAssembler::new(),
                filter: EpcFilter::new(),
                rx,
                tx,
                params: InventoryParams::default(),
                interval_ms: 0,
                next_round_at_ms: None,
                last_response: None,
            }),
            busy: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            inventory_active: AtomicBool::new(false),
            bytes_received: AtomicU64::new(0),
            frames_parsed: AtomicU32::new(0),
            parse_errors: AtomicU32::new(0),
            tags_seen: AtomicU32::new(0),
            tags_emitted: AtomicU32::new(0),
            tags_suppressed: AtomicU32::new(0),
            hid_errors: AtomicU32::new(0),
            overruns: AtomicU32::new(0),
            rounds_completed: AtomicU32::new(0),
            sink,
            notifier,
            clock,
        }
    }

    pub fn mode(&self) -> Mode {
        if self.inventory_active.load(Ordering::Acquire) {
            Mode::Inventory
        } else {
            Mode::Idle
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_inventory_active(&self) -> bool {
        self.inventory_active.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_parsed: self.frames_parsed.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            tags_seen: self.tags_seen.load(Ordering::Relaxed),
            tags_emitted: self.tags_emitted.load(Ordering::Relaxed),
            tags_suppressed: self.tags_suppressed.load(Ordering::Relaxed),
            hid_errors: self.hid_errors.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            rounds_completed: self.rounds_completed.load(Ordering::Relaxed),
        }
    }

    pub fn set_reader_addr(&self, addr: u8) {
        self.core.lock().unwrap().codec.set_reader_addr(addr);
    }

    pub fn reader_addr(&self) -> u8 {
        self.core.lock().unwrap().codec.reader_addr()
    }

    pub fn set_inventory_params(&self, params: InventoryParams) {
        self.core.lock().unwrap().params = params;
    }

    /// Per-round ScanTime byte in 100 ms units, carried in every Tag
    /// Inventory frame.
    pub fn set_scan_time(&self, time_100ms: u8) {
        self.core.lock().unwrap().params.scan_time = time_100ms;
    }

    pub fn scan_time(&self) -> u8 {
        self.core.lock().unwrap().params.scan_time
    }

    /// Delay between inventory rounds; zero means single-round mode where
    /// a finished round stops the inventory.
    pub fn set_interval_ms(&self, interval_ms: u64) {
        self.core.lock().unwrap().interval_ms = interval_ms;
    }

    pub fn interval_ms(&self) -> u64 {
        self.core.lock().unwrap().interval_ms
    }

    pub fn set_debounce(&self, seconds: u32) {
        self.core.lock().unwrap().filter.set_debounce(seconds);
    }

    pub fn clear_filter(&self) {
        self.core.lock().unwrap().filter.clear();
    }

    pub fn filter_summary(&self) -> Vec<EpcSummary> {
        self.core.lock().unwrap().filter.summary()
    }

    /// One worker tick: drain the RX ring through the assembler, classify
    /// complete frames, and fire a scheduled inventory round when due.
    /// Returns false when another thread is already inside.
    pub fn process(&self) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        let mut core = self.core.lock().unwrap();
        let now = self.clock.now_ms();

        if core.rx.take_overrun() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
            warn!("RX ring overrun, resetting frame assembly");
            core.assembler.reset();
        }

        let mut scratch = [0u8; 64];
        loop {
            let n = core.rx.pop_slice(&mut scratch);
            if n == 0 {
                break;
            }
            self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);

            let mut offset = 0;
            while offset < n {
                let consumed = core.assembler.feed(&scratch[offset..n], now);
                offset += consumed;
                if let Some(frame) = core.assembler.take_frame() {
                    self.handle_frame(&mut core, &frame, now);
                } else if consumed == 0 {
                    break;
                }
            }
        }

        if self.inventory_active.load(Ordering::Acquire) {
            if let Some(at) = core.next_round_at_ms {
                if now >= at {
                    core.next_round_at_ms = None;
                    let params = core.params.clone();
                    if let Err(e) = Self::send(&mut core, &Command::TagInventory(params)) {
                        warn!("Failed to start inventory round: {}", e);
                    }
                }
            }
        }

        drop(core);
        self.busy.store(false, Ordering::Release);
        true
    }

    fn send(core: &mut RouterCore, command: &Command) -> Result<(), Error> {
        let frame = core.codec.build(command)?;
        if core.tx.push_slice(frame) != frame.len() {
            return Err(Error::BufferOverflow);
        }
        Ok(())
    }

    /// Push pre-built frame bytes to the reader without codec involvement
    /// and wait for the response window.
    pub fn transact_raw(
        &self,
        frame: &[u8],
        timeout_ms: u64,
    ) -> Result<(ResponseHeader, Vec<u8>), Error> {
        {
            let mut core = self.core.lock().unwrap();
            core.last_response = None;
            if core.tx.push_slice(frame) != frame.len() {
                return Err(Error::BufferOverflow);
            }
        }
        self.wait_response(timeout_ms)
    }

    fn handle_frame(&self, core: &mut RouterCore, frame: &[u8], now: u64) {
        let header = match parse_response_header(frame) {
            Ok(h) => h,
            Err(e) => {
                self.parse_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Discarding bad frame: {}", e);
                return;
            }
        };
        self.frames_parsed.fetch_add(1, Ordering::Relaxed);

        let payload = response_payload(frame).to_vec();
        debug!(
            "Frame: {} status 0x{:02X}, {} data bytes",
            command_name(header.recmd),
            header.status,
            payload.len()
        );

        match header.recmd {
            RECMD_AUTO_UPLOAD => match parse_auto_upload_tag(&payload) {
                Ok(tag) => self.accept_tag(core, &tag, now),
                Err(e) => {
                    self.parse_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Bad auto-upload payload: {}", e);
                }
            },
            cmd::TAG_INVENTORY => match header.status {
                status::SUCCESS | status::MORE_DATA => {
                    self.handle_inventory_payload(core, &payload, now)
                }
                status::OPERATION_COMPLETE | status::INVENTORY_TIMEOUT => {
                    self.round_done(core, now)
                }
                status::STATISTICS_DATA => match parse_inventory_stats(&payload) {
                    Ok(s) => info!(
                        "Read rate {} tags/s, {} total on antenna {}",
                        s.read_rate, s.total_count, s.antenna
                    ),
                    Err(e) => {
                        self.parse_errors.fetch_add(1, Ordering::Relaxed);
                        warn!("Bad statistics payload: {}", e);
                    }
                },
                other => {
                    warn!("Inventory ended: {}", status_desc(other));
                    self.round_done(core, now);
                }
            },
            _ => {}
        }

        // Kept for whoever is inside a response wait
        core.last_response = Some((header, payload));
    }

    /// Inventory response payload: `Ant | TagCount | tag entries`.
    fn handle_inventory_payload(&self, core: &mut RouterCore, payload: &[u8], now: u64) {
        if payload.len() < 2 {
            self.parse_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Inventory payload too short");
            return;
        }
        let antenna = payload[0];
        let tag_count = payload[1] as usize;
        let mut offset = 2;

        for _ in 0..tag_count {
            match parse_tag_data(&payload[offset..]) {
                Ok((mut tag, consumed)) => {
                    tag.antenna = antenna;
                    offset += consumed;
                    self.accept_tag(core, &tag, now);
                }
                Err(e) => {
                    self.parse_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Bad tag entry: {}", e);
                    break;
                }
            }
        }
    }

    fn accept_tag(&self, core: &mut RouterCore, tag: &TagData, now: u64) {
        self.tags_seen.fetch_add(1, Ordering::Relaxed);
        self.notifier.tag_read();

        match core.filter.check(&tag.epc, tag.rssi, now) {
            Decision::Suppress => {
                self.tags_suppressed.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Emit => {
                let hex = bytes_to_hex(&tag.epc);
                debug!("Emitting EPC {}", hex);
                match self.sink.send_epc(hex.as_bytes()) {
                    Ok(()) => {
                        self.tags_emitted.fetch_add(1, Ordering::Relaxed);
                        self.notifier.beep();
                    }
                    Err(e) => {
                        self.hid_errors.fetch_add(1, Ordering::Relaxed);
                        warn!("EPC not delivered: {}", e);
                    }
                }
            }
        }
    }

    fn round_done(&self, core: &mut RouterCore, now: u64) {
        self.rounds_completed.fetch_add(1, Ordering::Relaxed);
        if !self.inventory_active.load(Ordering::Acquire) {
            return;
        }
        if core.interval_ms > 0 {
            core.next_round_at_ms = Some(now + core.interval_ms);
        } else {
            core.filter.log_summary();
            self.inventory_active.store(false, Ordering::Release);
            self.notifier.inventory_active(false);
            info!("Inventory finished");
        }
    }

    fn activity(&self) -> u64 {
        self.frames_parsed.load(Ordering::Acquire) as u64
            + self.parse_errors.load(Ordering::Acquire) as u64
    }

    /// Poll for any response activity past the caller's baseline. Drives
    /// `process` itself so a shell thread gets an answer even when the
    /// main loop is stalled; the CAS inside `process` keeps that safe.
    fn wait_response(&self, timeout_ms: u64) -> Result<(ResponseHeader, Vec<u8>), Error> {
        let baseline = self.activity();
        let deadline = self.clock.now_ms() + timeout_ms;

        loop {
            self.process();
            if self.activity() > baseline {
                let core = self.core.lock().unwrap();
                return match core.last_response.clone() {
                    Some(resp) => Ok(resp),
                    None => Err(Error::ParseError("response frame was unreadable".into())),
                };
            }
            if self.clock.now_ms() >= deadline {
                return Err(Error::Timeout);
            }
            self.clock.sleep_ms(RESPONSE_POLL_MS);
        }
    }

    /// Send one command and wait for its response window.
    pub fn transact(
        &self,
        command: &Command,
        timeout_ms: u64,
    ) -> Result<(ResponseHeader, Vec<u8>), Error> {
        {
            let mut core = self.core.lock().unwrap();
            core.last_response = None;
            Self::send(&mut core, command)?;
        }
        self.wait_response(timeout_ms)
    }

    /// Probe the reader and mark it connected if anything answers.
    ///
    /// Four probes, each with its own 200 ms window: Obtain Reader Info to
    /// the broadcast address, the same to the configured address, Stop
    /// Immediately, and Set Work Mode (answer mode). Any response at all,
    /// even one that fails payload parsing, counts as an ack.
    pub fn connect(&self) -> Result<(), Error> {
        info!("Probing for reader");
        let mut acks = 0u32;

        let addr = {
            let mut core = self.core.lock().unwrap();
            let addr = core.codec.reader_addr();
            core.codec.set_reader_addr(ADDR_BROADCAST);
            core.last_response = None;
            let sent = Self::send(&mut core, &Command::ObtainReaderInfo);
            core.codec.set_reader_addr(addr);
            drop(core);
            if sent.is_ok() && self.probe_acked(self.wait_response(CONNECT_PROBE_WINDOW_MS)) {
                acks += 1;
            }
            addr
        };
        debug!("Broadcast probe done, continuing at address 0x{:02X}", addr);

        for command in [
            Command::ObtainReaderInfo,
            Command::StopImmediately,
            Command::SetWorkMode(0x00),
        ] {
            if self.probe_acked(self.transact(&command, CONNECT_PROBE_WINDOW_MS)) {
                acks += 1;
            }
        }

        let ok = acks > 0;
        self.connected.store(ok, Ordering::Release);
        if ok {
            info!("Reader connected, {} of 4 probes answered", acks);
            Ok(())
        } else {
            warn!("No reader detected");
            Err(Error::Timeout)
        }
    }

    fn probe_acked(&self, result: Result<(ResponseHeader, Vec<u8>), Error>) -> bool {
        match result {
            Ok(_) => true,
            Err(Error::ParseError(_)) => true,
            Err(_) => false,
        }
    }

    /// Begin continuous inventory; connects first when needed.
    pub fn start_inventory(&self) -> Result<(), Error> {
        if !self.connected.load(Ordering::Acquire) {
            self.connect()?;
        }

        let mut core = self.core.lock().unwrap();
        // Mode transition: drop any half-assembled frame from before it.
        core.rx.clear();
        core.assembler.reset();
        core.filter.clear();
        core.last_response = None;
        core.next_round_at_ms = None;
        let params = core.params.clone();
        Self::send(&mut core, &Command::TagInventory(params))?;
        drop(core);

        self.inventory_active.store(true, Ordering::Release);
        self.notifier.inventory_active(true);
        info!("Inventory started");
        Ok(())
    }

    /// Leave inventory mode. Best-effort and idempotent: the transition
    /// to Idle happens even when the Stop frame cannot be emitted.
    pub fn stop_inventory(&self) {
        let was_active = self.inventory_active.swap(false, Ordering::AcqRel);

        let mut core = self.core.lock().unwrap();
        core.rx.clear();
        core.assembler.reset();
        core.next_round_at_ms = None;
        if let Err(e) = Self::send(&mut core, &Command::StopImmediately) {
            warn!("Stop Immediately not sent: {}", e);
        }
        if was_active {
            core.filter.log_summary();
        }
        drop(core);

        if was_active {
            self.notifier.inventory_active(false);
            info!("Inventory stopped");
        }
    }
}
