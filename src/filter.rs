//! EPC deduplication filter.
//!
//! A fixed 32-slot circular cache keyed by the full EPC byte string.
//! Repeated sightings inside the debounce window are suppressed; the
//! slot keeps aggregate statistics either way. Eviction replaces the
//! oldest insertion slot, not the least recently seen tag.

use log::info;

use crate::types::bytes_to_hex;

pub const EPC_CACHE_SIZE: usize = 32;
pub const DEFAULT_DEBOUNCE_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Emit,
    Suppress,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    epc: Vec<u8>,
    last_sent_ms: u64,
    last_seen_ms: u64,
    rssi_max: u8,
    rssi_min: u8,
    read_count: u32,
}

/// Per-EPC aggregate view for summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpcSummary {
    pub epc: Vec<u8>,
    pub read_count: u32,
    pub rssi_min: u8,
    pub rssi_max: u8,
    pub last_seen_ms: u64,
}

pub struct EpcFilter {
    entries: Vec<CacheEntry>,
    next_idx: usize,
    debounce_ms: u64,
}

impl EpcFilter {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(EPC_CACHE_SIZE),
            next_idx: 0,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }

    /// Record a sighting and decide whether to emit it.
    pub fn check(&mut self, epc: &[u8], rssi: u8, now_ms: u64) -> Decision {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.epc == epc) {
            entry.read_count = entry.read_count.saturating_add(1);
            entry.last_seen_ms = now_ms;
            entry.rssi_max = entry.rssi_max.max(rssi);
            entry.rssi_min = entry.rssi_min.min(rssi);

            if now_ms.saturating_sub(entry.last_sent_ms) < self.debounce_ms {
                return Decision::Suppress;
            }
            entry.last_sent_ms = now_ms;
            return Decision::Emit;
        }

        let entry = CacheEntry {
            epc: epc.to_vec(),
            last_sent_ms: now_ms,
            last_seen_ms: now_ms,
            rssi_max: rssi,
            rssi_min: rssi,
            read_count: 1,
        };

        if self.entries.len() < EPC_CACHE_SIZE {
            self.entries.push(entry);
        } else {
            // Oldest insertion slot is recycled, regardless of activity.
            self.entries[self.next_idx] = entry;
        }
        self.next_idx = (self.next_idx + 1) % EPC_CACHE_SIZE;
        Decision::Emit
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_idx = 0;
    }

    pub fn set_debounce(&mut self, seconds: u32) {
        self.debounce_ms = seconds as u64 * 1000;
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-entry statistics in cache index order.
    pub fn summary(&self) -> Vec<EpcSummary> {
        self.entries
            .iter()
            .map(|e| EpcSummary {
                epc: e.epc.clone(),
                read_count: e.read_count,
                rssi_min: e.rssi_min,
                rssi_max: e.rssi_max,
                last_seen_ms: e.last_seen_ms,
            })
            .collect()
    }

    pub fn log_summary(&self) {
        info!("EPC filter: {} distinct tags", self.entries.len());
        for e in &self.entries {
            info!(
                "  {}: reads={} rssi={}..{}",
                bytes_to_hex(&e.epc),
                e.read_count,
                e.rssi_min,
                e.rssi_max
            );
        }
    }
}

impl Default for EpcFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_emits() {
        let mut filter = EpcFilter::new();
        assert_eq!(filter.check(&[0xE2, 0x01], 50, 0), Decision::Emit);
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_debounce_window() {
        let mut filter = EpcFilter::new();
        let epc = [0xE2, 0x01, 0x02];
        assert_eq!(filter.check(&epc, 50, 0), Decision::Emit);
        assert_eq!(filter.check(&epc, 52, 1000), Decision::Suppress);
        assert_eq!(filter.check(&epc, 48, 3500), Decision::Emit);

        let summary = filter.summary();
        assert_eq!(summary[0].read_count, 3);
        assert_eq!(summary[0].rssi_min, 48);
        assert_eq!(summary[0].rssi_max, 52);
    }

    #[test]
    fn test_debounce_boundary_exact() {
        let mut filter = EpcFilter::new();
        let epc = [0x01];
        filter.check(&epc, 10, 0);
        // Exactly at the window edge the gap is no longer < debounce
        assert_eq!(filter.check(&epc, 10, DEFAULT_DEBOUNCE_MS), Decision::Emit);
    }

    #[test]
    fn test_distinct_epcs_independent() {
        let mut filter = EpcFilter::new();
        assert_eq!(filter.check(&[0x01], 10, 0), Decision::Emit);
        assert_eq!(filter.check(&[0x02], 10, 1), Decision::Emit);
        assert_eq!(filter.check(&[0x01], 10, 2), Decision::Suppress);
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_read_count_tracks_all_checks() {
        let mut filter = EpcFilter::new();
        let epc = [0xAB, 0xCD];
        for t in 0..10u64 {
            filter.check(&epc, 40, t * 100);
        }
        assert_eq!(filter.summary()[0].read_count, 10);
    }

    #[test]
    fn test_eviction_at_capacity() {
        let mut filter = EpcFilter::new();
        for i in 0..EPC_CACHE_SIZE as u8 {
            filter.check(&[i], 10, 0);
        }
        assert_eq!(filter.len(), EPC_CACHE_SIZE);

        // The 33rd distinct EPC overwrites slot 0 (oldest insertion)
        filter.check(&[0xFF], 10, 1);
        assert_eq!(filter.len(), EPC_CACHE_SIZE);
        assert_eq!(filter.summary()[0].epc, vec![0xFF]);

        // Evicted EPC is new again and emits despite the debounce window
        assert_eq!(filter.check(&[0x00], 10, 2), Decision::Emit);
    }

    #[test]
    fn test_clear_resets_counts_and_slots() {
        let mut filter = EpcFilter::new();
        filter.check(&[0x01], 10, 0);
        filter.clear();
        assert!(filter.is_empty());
        assert_eq!(filter.check(&[0x01], 10, 1), Decision::Emit);
        assert_eq!(filter.summary()[0].read_count, 1);
    }

    #[test]
    fn test_set_debounce_seconds() {
        let mut filter = EpcFilter::new();
        filter.set_debounce(10);
        assert_eq!(filter.debounce_ms(), 10_000);
        let epc = [0x05];
        filter.check(&epc, 10, 0);
        assert_eq!(filter.check(&epc, 10, 9_999), Decision::Suppress);
        assert_eq!(filter.check(&epc, 10, 10_000), Decision::Emit);
    }
}
