//! Fixed-capacity ring buffer over caller-provided storage.
//!
//! The buffer never allocates: its capacity is the length of the slice handed to `new`. It can
//! be used directly from one context, or `split` into a `Producer` and a `Consumer` so that one
//! context fills it (e.g. the capture loop) while another drains it.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Bounded FIFO holding at most `capacity` items.
///
/// `head` and `tail` count pops and pushes modulo `2 * capacity`, which keeps "full" and
/// "empty" distinguishable without sacrificing a slot.
pub struct RingBuffer<'a, T> {
    /// Start of the backing storage. Points into the borrowed slice for the lifetime `'a`.
    buf: *mut T,

    /// Number of slots. This field does not change after calling `new`.
    cap: usize,

    /// Read index, only ever advanced by the consumer side.
    head: AtomicUsize,

    /// Write index, only ever advanced by the producer side.
    tail: AtomicUsize,

    storage: PhantomData<&'a mut [T]>,
}

// The buffer owns its storage borrow exclusively, so it may move to another context.
unsafe impl<'a, T: Send> Send for RingBuffer<'a, T> {}

impl<'a, T: Copy> RingBuffer<'a, T> {
    /// Creates an empty ring buffer using all of `storage`.
    pub fn new(storage: &'a mut [T]) -> Self {
        RingBuffer {
            buf: storage.as_mut_ptr(),
            cap: storage.len(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            storage: PhantomData,
        }
    }

    /// Maximum number of items the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Number of items currently stored.
    pub fn len(&self) -> usize {
        self.distance(
            self.head.load(Ordering::Acquire),
            self.tail.load(Ordering::Acquire),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.cap
    }

    /// Append `item`. Returns `false` and leaves the buffer untouched when it is full.
    pub fn push(&mut self, item: T) -> bool {
        self.enqueue(item)
    }

    /// Remove and return the oldest item.
    pub fn pop(&mut self) -> Option<T> {
        self.dequeue()
    }

    /// Return the oldest item without removing it.
    pub fn peek(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if self.distance(head, tail) == 0 {
            return None;
        }
        Some(unsafe { self.buf.add(self.slot(head)).read() })
    }

    /// Drop every stored item.
    pub fn clear(&mut self) {
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
    }

    /// Split the buffer into its producer and consumer halves. Each half may live in a
    /// different execution context; the mutable borrow guarantees there is only one of each.
    pub fn split<'r>(&'r mut self) -> (Producer<'r, 'a, T>, Consumer<'r, 'a, T>) {
        // Slots in [head, tail) belong to the consumer and the rest to the producer. Only the
        // producer moves `tail` and only the consumer moves `head`, so no slot is ever read and
        // written at the same time.
        let ring: &'r RingBuffer<'a, T> = self;
        (Producer { ring }, Consumer { ring })
    }

    /// Producer side of a push: write the slot, then publish it by advancing `tail`.
    fn enqueue(&self, item: T) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if self.distance(head, tail) == self.cap {
            return false;
        }

        unsafe { self.buf.add(self.slot(tail)).write(item) };
        self.tail.store(self.advance(tail), Ordering::Release);
        true
    }

    /// Consumer side of a pop: read the slot, then release it by advancing `head`.
    fn dequeue(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if self.distance(head, tail) == 0 {
            return None;
        }

        let item = unsafe { self.buf.add(self.slot(head)).read() };
        self.head.store(self.advance(head), Ordering::Release);
        Some(item)
    }

    fn distance(&self, head: usize, tail: usize) -> usize {
        if self.cap == 0 {
            return 0;
        }
        if tail >= head {
            tail - head
        } else {
            tail + 2 * self.cap - head
        }
    }

    fn advance(&self, index: usize) -> usize {
        if index + 1 == 2 * self.cap {
            0
        } else {
            index + 1
        }
    }

    fn slot(&self, index: usize) -> usize {
        if index >= self.cap {
            index - self.cap
        } else {
            index
        }
    }
}

/// Write half of a split `RingBuffer`.
pub struct Producer<'r, 'a, T> {
    ring: &'r RingBuffer<'a, T>,
}

unsafe impl<'r, 'a, T: Send> Send for Producer<'r, 'a, T> {}

impl<'r, 'a, T: Copy> Producer<'r, 'a, T> {
    /// Append `item`, returns `false` when the buffer is full.
    pub fn push(&mut self, item: T) -> bool {
        self.ring.enqueue(item)
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Read half of a split `RingBuffer`.
pub struct Consumer<'r, 'a, T> {
    ring: &'r RingBuffer<'a, T>,
}

unsafe impl<'r, 'a, T: Send> Send for Consumer<'r, 'a, T> {}

impl<'r, 'a, T: Copy> Consumer<'r, 'a, T> {
    pub fn pop(&mut self) -> Option<T> {
        self.ring.dequeue()
    }

    pub fn peek(&self) -> Option<T> {
        self.ring.peek()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
