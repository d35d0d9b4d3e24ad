// src/classfile/io.rs

//! Big-endian cursor and writer for class-file structures

use super::ClassFormatError;

/// Bounds-checked big-endian reader
///
/// Positions are absolute within the wrapped slice, which lets attribute
/// walkers report offsets that can be patched later.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reader over `data` starting at `pos`
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFormatError> {
        if self.remaining() < len {
            return Err(ClassFormatError::Truncated {
                offset: self.pos,
                wanted: len,
            });
        }
        let data = self.data;
        let out = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ClassFormatError> {
        self.bytes(len).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, ClassFormatError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ClassFormatError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, ClassFormatError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64, ClassFormatError> {
        let hi = self.u32()?;
        let lo = self.u32()?;
        Ok((u64::from(hi) << 32) | u64::from(lo))
    }
}

/// Big-endian writer
#[derive(Debug, Default)]
pub struct ByteWriter {
    out: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity),
        }
    }

    pub fn u8(&mut self, v: u8) {
        self.out.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    pub fn bytes(&mut self, b: &[u8]) {
        self.out.extend_from_slice(b);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

/// Overwrite a big-endian `u16` in place
pub fn patch_u16(buf: &mut [u8], offset: usize, v: u16) -> Result<(), ClassFormatError> {
    let slot = buf
        .get_mut(offset..offset + 2)
        .ok_or(ClassFormatError::Truncated { offset, wanted: 2 })?;
    slot.copy_from_slice(&v.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_reports_truncation_offset() {
        let mut r = ByteReader::new(&[0x01, 0x02, 0x03]);
        assert_eq!(r.u16().unwrap(), 0x0102);
        let err = r.u16().unwrap_err();
        assert!(matches!(err, ClassFormatError::Truncated { offset: 2, wanted: 2 }));
    }

    #[test]
    fn test_writer_and_patch() {
        let mut w = ByteWriter::new();
        w.u8(1);
        w.u16(0xABCD);
        w.u64(1);
        let mut bytes = w.into_bytes();
        assert_eq!(bytes.len(), 11);
        patch_u16(&mut bytes, 1, 0x0102).unwrap();
        assert_eq!(&bytes[..3], &[1, 1, 2]);
        assert!(patch_u16(&mut bytes, 10, 0).is_err());
        assert_eq!(ByteReader::at(&bytes, 3).u64().unwrap(), 1);
    }
}
