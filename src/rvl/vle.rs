// Variable-length nibble coding (the RVL "VLE" layer).
//
// A value is split into 3-bit chunks; each chunk travels in a 4-bit nibble
// whose top bit says whether another chunk follows. Nibbles are packed eight
// to a 32-bit word, most-significant nibble first, and words are stored
// little-endian in the byte buffer regardless of the host.

use crate::error::{Result, RvlError};

/// Payload bits per nibble.
const PAYLOAD_BITS: u32 = 3;

/// Payload mask within a nibble.
const PAYLOAD_MASK: u32 = 0x7;

/// Continuation flag within a nibble.
const CONTINUATION_BIT: u32 = 0x8;

pub const NIBBLES_PER_WORD: u32 = 8;

pub const WORD_BYTES: usize = 4;

/// Longest encoding of a `u32` (ceil(32/3) = 11).
pub const MAX_VLE_NIBBLES: u32 = 11;

/// If any of these bits are set before a `<< 3`, the accumulator overflows.
const U32_OVERFLOW_MASK: u32 = 0xE000_0000;

/// Order in which the 3-bit chunks of one value are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NibbleOrder {
    /// Highest-order chunk first (canonical).
    #[default]
    MostSignificantFirst,
    /// Lowest-order chunk first, as written by the legacy RVL tools.
    LeastSignificantFirst,
}

/// Number of nibbles `value` occupies (1..=11).
#[inline]
pub fn nibble_len(value: u32) -> u32 {
    let bits = 32 - value.leading_zeros();
    bits.max(1).div_ceil(PAYLOAD_BITS)
}

// ---------------------------------------------------------------------------
// Word cursor
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over the 32-bit little-endian words of a payload.
#[derive(Debug, Clone)]
pub struct WordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WordReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// The word at the cursor, if four bytes remain.
    pub fn peek_word(&self) -> Option<u32> {
        let end = self.pos.checked_add(WORD_BYTES)?;
        let bytes: [u8; WORD_BYTES] = self.data.get(self.pos..end)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    /// Skip `words` whole words.
    pub fn advance(&mut self, words: usize) -> Result<()> {
        let end = words
            .checked_mul(WORD_BYTES)
            .and_then(|n| self.pos.checked_add(n))
            .filter(|&end| end <= self.data.len())
            .ok_or(RvlError::TruncatedStream { offset: self.pos })?;
        self.pos = end;
        Ok(())
    }

    pub fn read_word(&mut self) -> Result<u32> {
        let word = self
            .peek_word()
            .ok_or(RvlError::TruncatedStream { offset: self.pos })?;
        self.pos += WORD_BYTES;
        Ok(word)
    }

    /// Byte offset of the next unread word.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet loaded into a word.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Pulls variable-length values out of a word stream.
#[derive(Debug, Clone)]
pub struct NibbleReader<'a> {
    words: WordReader<'a>,
    word: u32,
    /// Unread nibbles left in `word` (0..=8).
    nibbles_left: u32,
    order: NibbleOrder,
}

impl<'a> NibbleReader<'a> {
    pub fn new(payload: &'a [u8], order: NibbleOrder) -> Self {
        Self {
            words: WordReader::new(payload),
            word: 0,
            nibbles_left: 0,
            order,
        }
    }

    pub fn order(&self) -> NibbleOrder {
        self.order
    }

    /// Payload bytes consumed so far (whole words).
    pub fn bytes_consumed(&self) -> usize {
        self.words.position()
    }

    /// Payload bytes never loaded into a word.
    pub fn remaining_bytes(&self) -> usize {
        self.words.remaining().len()
    }

    #[inline]
    fn next_nibble(&mut self) -> Result<u32> {
        if self.nibbles_left == 0 {
            self.word = self.words.read_word()?;
            self.nibbles_left = NIBBLES_PER_WORD;
        }
        let nibble = self.word >> 28;
        self.word <<= 4;
        self.nibbles_left -= 1;
        Ok(nibble)
    }

    /// Decode the next value.
    pub fn decode_next(&mut self) -> Result<u32> {
        match self.order {
            NibbleOrder::MostSignificantFirst => self.decode_msb_first(),
            NibbleOrder::LeastSignificantFirst => self.decode_lsb_first(),
        }
    }

    fn decode_msb_first(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for count in 1..=MAX_VLE_NIBBLES {
            let nibble = self.next_nibble()?;
            if value & U32_OVERFLOW_MASK != 0 {
                return Err(RvlError::ValueOverflow { nibbles: count });
            }
            value = (value << PAYLOAD_BITS) | (nibble & PAYLOAD_MASK);
            if nibble & CONTINUATION_BIT == 0 {
                return Ok(value);
            }
        }
        Err(RvlError::ValueOverflow {
            nibbles: MAX_VLE_NIBBLES,
        })
    }

    fn decode_lsb_first(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for index in 0..MAX_VLE_NIBBLES {
            let nibble = self.next_nibble()?;
            let chunk = u64::from(nibble & PAYLOAD_MASK) << (index * PAYLOAD_BITS);
            let chunk =
                u32::try_from(chunk).map_err(|_| RvlError::ValueOverflow { nibbles: index + 1 })?;
            value |= chunk;
            if nibble & CONTINUATION_BIT == 0 {
                return Ok(value);
            }
        }
        Err(RvlError::ValueOverflow {
            nibbles: MAX_VLE_NIBBLES,
        })
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Packs variable-length values into little-endian words.
#[derive(Debug, Clone)]
pub struct NibbleWriter {
    out: Vec<u8>,
    word: u32,
    nibbles_written: u32,
    order: NibbleOrder,
}

impl NibbleWriter {
    pub fn new(order: NibbleOrder) -> Self {
        Self::with_capacity(0, order)
    }

    /// Pre-size the output for roughly `bytes` bytes.
    pub fn with_capacity(bytes: usize, order: NibbleOrder) -> Self {
        Self {
            out: Vec::with_capacity(bytes),
            word: 0,
            nibbles_written: 0,
            order,
        }
    }

    pub fn order(&self) -> NibbleOrder {
        self.order
    }

    /// Bytes the stream will occupy once finished.
    pub fn len(&self) -> usize {
        self.out.len() + if self.nibbles_written > 0 { WORD_BYTES } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn push_nibble(&mut self, nibble: u32) {
        let shift = 4 * (NIBBLES_PER_WORD - 1 - self.nibbles_written);
        self.word |= (nibble & 0xF) << shift;
        self.nibbles_written += 1;
        if self.nibbles_written == NIBBLES_PER_WORD {
            self.flush_word();
        }
    }

    fn flush_word(&mut self) {
        self.out.extend_from_slice(&self.word.to_le_bytes());
        self.word = 0;
        self.nibbles_written = 0;
    }

    /// Encode one value.
    pub fn encode_next(&mut self, value: u32) {
        let chunks = nibble_len(value);
        match self.order {
            NibbleOrder::MostSignificantFirst => {
                for i in (0..chunks).rev() {
                    let payload = (value >> (i * PAYLOAD_BITS)) & PAYLOAD_MASK;
                    let flag = if i > 0 { CONTINUATION_BIT } else { 0 };
                    self.push_nibble(payload | flag);
                }
            }
            NibbleOrder::LeastSignificantFirst => {
                for i in 0..chunks {
                    let payload = (value >> (i * PAYLOAD_BITS)) & PAYLOAD_MASK;
                    let flag = if i + 1 < chunks { CONTINUATION_BIT } else { 0 };
                    self.push_nibble(payload | flag);
                }
            }
        }
    }

    /// Pad the last word with zero nibbles and return the stream.
    pub fn finish(mut self) -> Vec<u8> {
        if self.nibbles_written > 0 {
            self.flush_word();
        }
        self.out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
