use crate::prelude::*;

/// Forward-only view over product bytes.
///
/// All multi-byte reads are big-endian. There is no way to seek backward; the decoder never
/// needs to re-read.
///
/// # Example
/// ```
/// use decom::ByteCursor;
///
/// let dat = [0x00, 0x03, 0xff];
/// let mut cursor = ByteCursor::new(&dat);
/// assert_eq!(cursor.read_uint(2).unwrap(), 3);
/// assert_eq!(cursor.remaining(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, offset: 0 }
    }

    /// Point this cursor at a new buffer, starting from its beginning.
    pub fn reset(&mut self, data: &'a [u8]) {
        self.data = data;
        self.offset = 0;
    }

    /// Number of bytes consumed so far.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.offset < self.data.len()
    }

    /// Read `n` bytes, advancing the cursor.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if fewer than `n` bytes remain. The cursor is not advanced.
    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::NotEnoughData {
                actual: self.remaining(),
                minimum: n,
            });
        }
        let buf = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(buf)
    }

    /// Skip up to `n` bytes, returning the number actually skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.remaining());
        self.offset += n;
        n
    }

    /// Read a big-endian unsigned integer of `len` bytes, where `len` is at most 8.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if fewer than `len` bytes remain.
    pub fn read_uint(&mut self, len: usize) -> Result<u64> {
        debug_assert!(len <= 8, "unsigned read of {len} bytes");
        let buf = self.read(len)?;
        Ok(be_uint(buf))
    }
}

/// Big-endian unsigned value of up to 8 bytes.
pub(crate) fn be_uint(buf: &[u8]) -> u64 {
    buf.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Extract `bit_len` bits starting `bit_offset` bits into `dat`, most significant bit first.
///
/// # Errors
/// [Error::NotEnoughData] if `dat` does not contain `bit_offset + bit_len` bits.
///
/// # Example
/// ```
/// use decom::extract_bits;
///
/// let dat = [0b1010_1101];
/// assert_eq!(extract_bits(&dat, 0, 3).unwrap(), 0b101);
/// assert_eq!(extract_bits(&dat, 3, 5).unwrap(), 0b01101);
/// ```
pub fn extract_bits(dat: &[u8], bit_offset: usize, bit_len: usize) -> Result<u64> {
    debug_assert!(bit_len <= 64, "cannot extract {bit_len} bits into a u64");
    let end = bit_offset + bit_len;
    if end > dat.len() * 8 {
        return Err(Error::NotEnoughData {
            actual: dat.len(),
            minimum: end.div_ceil(8),
        });
    }
    let mut value = 0u64;
    for bit in bit_offset..end {
        let b = (dat[bit / 8] >> (7 - bit % 8)) & 0x1;
        value = (value << 1) | u64::from(b);
    }
    Ok(value)
}
