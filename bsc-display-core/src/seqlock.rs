//! Sequence-locked arrays
//!
//! Multi-word fields (cell voltages, temperatures, the IP address text) are
//! too wide for one atomic. [`SeqArray`] stores them as individual atomic
//! words guarded by a sequence counter:
//!
//! - the writer moves the counter to an odd value, stores the words, then
//!   moves it to the next even value
//! - a reader copies the words between two loads of the counter and retries
//!   unless both loads saw the same even value
//!
//! A reader therefore never returns a mix of two writes. Writers claim the
//! odd state with a compare-exchange, so concurrent writers serialize and no
//! write is lost.
//!
//! Readers spin while a write is in flight. The writer must never be preempted
//! by a reader of the same array (the bus interrupt writes, the render task
//! reads, so this holds).

use portable_atomic::{fence, AtomicU16, AtomicU32, Ordering};

/// Fixed-size array of `u16` words readable without tearing
#[derive(Debug)]
pub struct SeqArray<const N: usize> {
    seq: AtomicU32,
    words: [AtomicU16; N],
}

impl<const N: usize> SeqArray<N> {
    /// All words zero
    pub const fn zeroed() -> Self {
        Self {
            seq: AtomicU32::new(0),
            words: [const { AtomicU16::new(0) }; N],
        }
    }

    /// All words `u16::MAX`
    pub const fn unset() -> Self {
        Self {
            seq: AtomicU32::new(0),
            words: [const { AtomicU16::new(u16::MAX) }; N],
        }
    }

    /// Replace the whole array
    pub fn write(&self, values: &[u16; N]) {
        let seq = self.begin_write();

        // Word stores must not become visible before the odd counter
        fence(Ordering::Release);
        for (word, value) in self.words.iter().zip(values) {
            word.store(*value, Ordering::Relaxed);
        }

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Copy out a consistent version of the array
    pub fn read(&self) -> [u16; N] {
        loop {
            if let Some(values) = self.try_read() {
                return values;
            }
            core::hint::spin_loop();
        }
    }

    /// Single read attempt; `None` if a write overlapped it
    pub fn try_read(&self) -> Option<[u16; N]> {
        let before = self.seq.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }

        let mut values = [0u16; N];
        for (value, word) in values.iter_mut().zip(&self.words) {
            *value = word.load(Ordering::Relaxed);
        }

        fence(Ordering::Acquire);
        let after = self.seq.load(Ordering::Relaxed);
        (before == after).then_some(values)
    }

    /// Number of completed writes
    pub fn version(&self) -> u32 {
        self.seq.load(Ordering::Acquire) / 2
    }

    /// Claim the counter's odd state, returning the even value it held
    fn begin_write(&self) -> u32 {
        let mut current = self.seq.load(Ordering::Relaxed);
        loop {
            if current & 1 == 1 {
                core::hint::spin_loop();
                current = self.seq.load(Ordering::Relaxed);
                continue;
            }
            match self.seq.compare_exchange_weak(
                current,
                current.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Pack bytes into little-endian `u16` words
pub(crate) fn bytes_to_words<const B: usize, const W: usize>(bytes: &[u8; B]) -> [u16; W] {
    let mut words = [0u16; W];
    for (word, pair) in words.iter_mut().zip(bytes.chunks(2)) {
        let hi = pair.get(1).copied().unwrap_or(0);
        *word = u16::from_le_bytes([pair[0], hi]);
    }
    words
}

/// Unpack little-endian `u16` words into bytes
pub(crate) fn words_to_bytes<const W: usize, const B: usize>(words: &[u16; W]) -> [u8; B] {
    let mut bytes = [0u8; B];
    for (pair, word) in bytes.chunks_mut(2).zip(words) {
        let le = word.to_le_bytes();
        pair.copy_from_slice(&le[..pair.len()]);
    }
    bytes
}
