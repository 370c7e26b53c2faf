//! Streaming frame assembler.
//!
//! Bytes arrive from the RX ring in arbitrary slices; the assembler
//! reconstitutes whole frames using the length prefix. A length byte that
//! implies a frame outside the 5..=256 byte window is discarded on the
//! spot, and a stream that stalls mid-frame for more than
//! [`FRAME_TIMEOUT_MS`] is abandoned so a desynced reader cannot wedge
//! the parser.

use crate::types::{MAX_FRAME_SIZE, MIN_RESPONSE_SIZE};

/// Inter-byte timeout while a frame is in flight.
pub const FRAME_TIMEOUT_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    WaitLen,
    Receiving,
    Complete,
}

pub struct FrameAssembler {
    buffer: [u8; MAX_FRAME_SIZE],
    received: usize,
    expected: usize,
    state: AssemblerState,
    last_byte_ms: u64,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buffer: [0; MAX_FRAME_SIZE],
            received: 0,
            expected: 0,
            state: AssemblerState::WaitLen,
            last_byte_ms: 0,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Consume bytes from `data` until a frame completes or the slice is
    /// exhausted. Returns the number of bytes consumed; the caller loops
    /// feed/extract until everything is drained.
    pub fn feed(&mut self, data: &[u8], now_ms: u64) -> usize {
        if self.state == AssemblerState::Receiving
            && self.last_byte_ms > 0
            && now_ms.saturating_sub(self.last_byte_ms) > FRAME_TIMEOUT_MS
        {
            self.reset();
        }

        let mut consumed = 0;
        for &b in data {
            if self.state == AssemblerState::Complete {
                break;
            }
            consumed += 1;
            self.last_byte_ms = now_ms;

            match self.state {
                AssemblerState::WaitLen => {
                    let expected = b as usize + 1;
                    if !(MIN_RESPONSE_SIZE..=MAX_FRAME_SIZE).contains(&expected) {
                        continue;
                    }
                    self.buffer[0] = b;
                    self.received = 1;
                    self.expected = expected;
                    self.state = AssemblerState::Receiving;
                }
                AssemblerState::Receiving => {
                    self.buffer[self.received] = b;
                    self.received += 1;
                    if self.received == self.expected {
                        self.state = AssemblerState::Complete;
                    }
                }
                AssemblerState::Complete => unreachable!(),
            }
        }
        consumed
    }

    /// The completed frame, if one is pending extraction.
    pub fn frame(&self) -> Option<&[u8]> {
        if self.state == AssemblerState::Complete {
            Some(&self.buffer[..self.received])
        } else {
            None
        }
    }

    /// Extract the completed frame and rearm for the next one.
    pub fn take_frame(&mut self) -> Option<Vec<u8>> {
        if self.state != AssemblerState::Complete {
            return None;
        }
        let frame = self.buffer[..self.received].to_vec();
        self.reset();
        Some(frame)
    }

    pub fn reset(&mut self) {
        self.received = 0;
        self.expected = 0;
        self.state = AssemblerState::WaitLen;
        self.last_byte_ms = 0;
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::make_response;

    #[test]
    fn test_single_slice_assembly() {
        let frame = make_response(0x00, 0x21, 0x00, &[0xAA; 12]);
        let mut asm = FrameAssembler::new();
        let consumed = asm.feed(&frame, 0);
        assert_eq!(consumed, frame.len());
        assert_eq!(asm.take_frame().unwrap(), frame);
        assert_eq!(asm.state(), AssemblerState::WaitLen);
    }

    #[test]
    fn test_byte_at_a_time_equals_single_slice() {
        let mut stream = Vec::new();
        stream.extend(make_response(0x00, 0x21, 0x00, &[0x11; 4]));
        stream.extend(make_response(0x00, 0x01, 0x01, &[]));
        stream.extend(make_response(0x00, 0xEE, 0x00, &[0x22; 8]));

        let drain = |asm: &mut FrameAssembler, data: &[u8]| {
            let mut frames = Vec::new();
            let mut offset = 0;
            while offset < data.len() {
                offset += asm.feed(&data[offset..], 0);
                if let Some(f) = asm.take_frame() {
                    frames.push(f);
                }
            }
            frames
        };

        let mut asm = FrameAssembler::new();
        let whole = drain(&mut asm, &stream);

        let mut asm = FrameAssembler::new();
        let mut bytewise = Vec::new();
        for &b in &stream {
            asm.feed(&[b], 0);
            if let Some(f) = asm.take_frame() {
                bytewise.push(f);
            }
        }

        assert_eq!(whole.len(), 3);
        assert_eq!(whole, bytewise);
    }

    #[test]
    fn test_undersized_len_byte_discarded() {
        let mut asm = FrameAssembler::new();
        // Len bytes 0..=3 imply totals below the 5-byte minimum
        asm.feed(&[0x00, 0x01, 0x02, 0x03], 0);
        assert_eq!(asm.state(), AssemblerState::WaitLen);

        let frame = make_response(0x00, 0x93, 0x00, &[]);
        asm.feed(&frame, 0);
        assert_eq!(asm.take_frame().unwrap(), frame);
    }

    #[test]
    fn test_max_length_frame() {
        let frame = make_response(0x00, 0x01, 0x03, &[0x5A; 250]);
        assert_eq!(frame.len(), MAX_FRAME_SIZE);
        let mut asm = FrameAssembler::new();
        asm.feed(&frame, 0);
        assert_eq!(asm.take_frame().unwrap().len(), MAX_FRAME_SIZE);
    }

    #[test]
    fn test_one_frame_per_feed() {
        let a = make_response(0x00, 0x93, 0x00, &[]);
        let b = make_response(0x00, 0x21, 0x00, &[0x01]);
        let mut stream = a.clone();
        stream.extend_from_slice(&b);

        let mut asm = FrameAssembler::new();
        let consumed = asm.feed(&stream, 0);
        assert_eq!(consumed, a.len());
        assert_eq!(asm.take_frame().unwrap(), a);

        asm.feed(&stream[consumed..], 0);
        assert_eq!(asm.take_frame().unwrap(), b);
    }

    #[test]
    fn test_midframe_timeout_resets() {
        let frame = make_response(0x00, 0x21, 0x00, &[0x33; 6]);
        let mut asm = FrameAssembler::new();

        asm.feed(&frame[..3], 1000);
        assert_eq!(asm.state(), AssemblerState::Receiving);

        // Silence past the timeout abandons the partial frame
        asm.feed(&frame[3..4], 1101);
        assert_eq!(asm.state(), AssemblerState::WaitLen);

        // A fresh frame afterwards parses normally
        asm.feed(&frame, 1200);
        assert_eq!(asm.take_frame().unwrap(), frame);
    }

    #[test]
    fn test_timeout_boundary_not_triggered() {
        let frame = make_response(0x00, 0x21, 0x00, &[0x33; 6]);
        let mut asm = FrameAssembler::new();
        asm.feed(&frame[..3], 1000);
        // Exactly at the limit is still within the window
        asm.feed(&frame[3..], 1100);
        assert!(asm.take_frame().is_some());
    }

    #[test]
    fn test_reset_clears_partial_state() {
        let frame = make_response(0x00, 0x21, 0x00, &[0x44; 6]);
        let mut asm = FrameAssembler::new();
        asm.feed(&frame[..5], 0);
        asm.reset();
        assert_eq!(asm.state(), AssemblerState::WaitLen);
        assert!(asm.frame().is_none());
    }
}
