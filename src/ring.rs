//! Single-producer single-consumer byte rings between the serial ISR and
//! the router worker.
//!
//! The producer half lives with the interrupt context and must never
//! block; on a short write it records the loss in a sticky overrun flag
//! that the consumer observes before its next drain. The consumer side
//! also offers a claim/finish pair (`peek` then `skip`) so a transmit
//! path can commit exactly the bytes the device accepted.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

struct Inner {
    buf: Box<[AtomicU8]>,
    /// Free-running write counter, owned by the producer.
    tail: AtomicUsize,
    /// Free-running read counter, owned by the consumer.
    head: AtomicUsize,
    overrun: AtomicBool,
}

impl Inner {
    fn len(&self) -> usize {
        self.tail
            .load(Ordering::Acquire)
            .wrapping_sub(self.head.load(Ordering::Acquire))
    }
}

/// Create a ring of the given capacity and split it into its two halves.
pub fn channel(capacity: usize) -> (Producer, Consumer) {
    assert!(capacity > 0, "ring capacity must be nonzero");
    let inner = Arc::new(Inner {
        buf: (0..capacity).map(|_| AtomicU8::new(0)).collect(),
        tail: AtomicUsize::new(0),
        head: AtomicUsize::new(0),
        overrun: AtomicBool::new(false),
    });
    (Producer { inner: inner.clone() }, Consumer { inner })
}

pub struct Producer {
    inner: Arc<Inner>,
}

impl Producer {
    /// Write as much of `data` as fits. Returns the count written; a short
    /// write sets the overrun flag.
    pub fn push_slice(&self, data: &[u8]) -> usize {
        let inner = &self.inner;
        let cap = inner.buf.len();
        let tail = inner.tail.load(Ordering::Relaxed);
        let head = inner.head.load(Ordering::Acquire);
        let free = cap - tail.wrapping_sub(head);

        let n = data.len().min(free);
        for (i, &b) in data[..n].iter().enumerate() {
            inner.buf[tail.wrapping_add(i) % cap].store(b, Ordering::Relaxed);
        }
        inner.tail.store(tail.wrapping_add(n), Ordering::Release);

        if n < data.len() {
            inner.overrun.store(true, Ordering::Release);
        }
        n
    }

    pub fn free(&self) -> usize {
        self.inner.buf.len() - self.inner.len()
    }
}

pub struct Consumer {
    inner: Arc<Inner>,
}

impl Consumer {
    /// Read up to `buf.len()` bytes, consuming them.
    pub fn pop_slice(&self, buf: &mut [u8]) -> usize {
        let n = self.peek(buf);
        self.skip(n);
        n
    }

    /// Copy up to `buf.len()` bytes without consuming them (claim).
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        let inner = &self.inner;
        let cap = inner.buf.len();
        let head = inner.head.load(Ordering::Relaxed);
        let tail = inner.tail.load(Ordering::Acquire);
        let avail = tail.wrapping_sub(head);

        let n = buf.len().min(avail);
        for (i, slot) in buf[..n].iter_mut().enumerate() {
            *slot = inner.buf[head.wrapping_add(i) % cap].load(Ordering::Relaxed);
        }
        n
    }

    /// Consume `n` previously peeked bytes (finish).
    pub fn skip(&self, n: usize) {
        let inner = &self.inner;
        let head = inner.head.load(Ordering::Relaxed);
        let avail = inner.tail.load(Ordering::Acquire).wrapping_sub(head);
        inner
            .head
            .store(head.wrapping_add(n.min(avail)), Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all pending bytes.
    pub fn clear(&self) {
        let tail = self.inner.tail.load(Ordering::Acquire);
        self.inner.head.store(tail, Ordering::Release);
    }

    /// Read and clear the overrun flag.
    pub fn take_overrun(&self) -> bool {
        self.inner.overrun.swap(false, Ordering::AcqRel)
    }
}
