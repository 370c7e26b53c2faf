//! Serial link seam and the pump that bridges it to the rings.
//!
//! On firmware targets the UART ISR fills the RX ring and drains the TX
//! ring directly. Host builds have no ISR, so [`LinkPump`] plays that
//! role from a thread: it moves bytes between a [`SerialLink`] and the
//! ring pair the router owns the other end of.

use log::{trace, warn};

use crate::ring;

/// Byte transport to the reader. Implemented for different backends
/// (ESP32 UART, desktop serial port).
pub trait SerialLink {
    /// Error type for link operations
    type Error: std::fmt::Debug;

    /// Write data to the link
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read data from the link with a timeout in milliseconds.
    ///
    /// An idle link reports `Ok(0)`; backends whose reads error on
    /// timeout map that case to `Ok(0)` so the pump treats it as a
    /// quiet pass rather than a fault.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Clear the input buffer
    fn clear_input(&mut self) -> Result<(), Self::Error>;
}

/// Read timeout per pump pass; short enough to keep TX latency low.
const READ_SLICE_MS: u32 = 10;

pub struct LinkPump<L: SerialLink> {
    link: L,
    rx: ring::Producer,
    tx: ring::Consumer,
}

impl<L: SerialLink> LinkPump<L> {
    pub fn new(link: L, rx: ring::Producer, tx: ring::Consumer) -> Self {
        Self { link, rx, tx }
    }

    /// One pass: drain pending TX frames, then read whatever the link
    /// has into the RX ring. Returns the number of bytes moved.
    pub fn pump(&mut self) -> usize {
        let mut moved = 0;

        // TX side uses claim/finish: bytes stay in the ring until the
        // link has taken them
        let mut out = [0u8; 64];
        loop {
            let claimed = self.tx.peek(&mut out);
            if claimed == 0 {
                break;
            }
            match self.link.write(&out[..claimed]) {
                Ok(written) => {
                    self.tx.skip(written);
                    moved += written;
                    if written < claimed {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Link write failed: {:?}", e);
                    break;
                }
            }
        }

        let mut inbuf = [0u8; 64];
        match self.link.read(&mut inbuf, READ_SLICE_MS) {
            Ok(0) => {}
            Ok(n) => {
                trace!("Link RX {} bytes", n);
                self.rx.push_slice(&inbuf[..n]);
                moved += n;
            }
            Err(e) => {
                // Timeouts surface as errors on some backends; either way
                // there is nothing to move this pass
                trace!("Link read returned: {:?}", e);
            }
        }

        moved
    }
}
