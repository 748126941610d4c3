use crate::error::{CodecError, Result};

/// Cursor over an immutable byte slice with bounds-checked reads.
///
/// Every `get_*` operation is symmetric with the corresponding
/// [`WireWriter`](crate::WireWriter) operation. A read past the end of the
/// slice fails with [`CodecError::Underflow`] and leaves the cursor at the
/// point of failure.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Whether `bytes` more bytes can be read without underflow.
    pub fn can_read(&self, bytes: usize) -> bool {
        self.remaining() >= bytes
    }

    /// Bytes left between the cursor and the end of the slice.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current cursor position from the start of the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, bytes: usize) -> Result<&'a [u8]> {
        if !self.can_read(bytes) {
            return Err(CodecError::Underflow {
                needed: bytes,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + bytes];
        self.pos += bytes;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_i8(&mut self) -> Result<i8> {
        Ok(self.get_u8()? as i8)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn get_i16(&mut self) -> Result<i16> {
        Ok(self.get_u16()? as i16)
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        Ok(self.get_u32()? as i32)
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(self.get_u64()? as i64)
    }

    pub fn get_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.get_u32()?))
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.get_u64()?))
    }

    /// Any nonzero byte decodes as true.
    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_char8(&mut self) -> Result<u8> {
        self.get_u8()
    }

    /// Read a u32 byte-length prefix, then that many bytes as UTF-8 text.
    pub fn get_str(&mut self) -> Result<String> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes)?.to_owned())
    }

    /// Read `bytes` raw bytes with no prefix.
    pub fn get_bytes(&mut self, bytes: usize) -> Result<&'a [u8]> {
        self.take(bytes)
    }

    /// Read an i32 ordinal and check it against the declared variant count.
    pub fn get_enum(&mut self, variants: u32) -> Result<i32> {
        let ordinal = self.get_i32()?;
        if ordinal < 0 || ordinal as u32 >= variants {
            return Err(CodecError::BadEnumOrdinal { ordinal, variants });
        }
        Ok(ordinal)
    }
}
