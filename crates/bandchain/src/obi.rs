//! Oracle Binary Interface codec
//!
//! Big-endian fixed width integers, `u32` length prefix before strings and vectors,
//! no padding, no field tags. Fields are written in declaration order.

use thiserror::Error;

use qoracle_core::CoreError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObiError {
    #[error("unexpected end of input: need {needed} bytes, {remaining} left")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),

    #[error("invalid utf-8 string: {0}")]
    InvalidUtf8(String),

    #[error("length {0} does not fit in u32")]
    LengthOverflow(usize),
}

impl From<ObiError> for CoreError {
    fn from(err: ObiError) -> Self {
        CoreError::ResultDecode(err.to_string())
    }
}

pub trait ObiEncode {
    fn encode_into(&self, writer: &mut ObiWriter) -> Result<(), ObiError>;

    fn obi_encode(&self) -> Result<Vec<u8>, ObiError> {
        let mut writer = ObiWriter::default();
        self.encode_into(&mut writer)?;
        Ok(writer.finish())
    }
}

pub trait ObiDecode: Sized {
    fn decode_from(reader: &mut ObiReader<'_>) -> Result<Self, ObiError>;

    /// Decode a full buffer, rejecting leftover bytes
    fn obi_decode(bz: &[u8]) -> Result<Self, ObiError> {
        let mut reader = ObiReader::new(bz);
        let value = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

#[derive(Debug, Default)]
pub struct ObiWriter {
    buf: Vec<u8>,
}

impl ObiWriter {
    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn write_len(&mut self, len: usize) -> Result<(), ObiError> {
        let len = u32::try_from(len).map_err(|_| ObiError::LengthOverflow(len))?;
        self.write_u32(len);
        Ok(())
    }

    pub fn write_string(&mut self, s: &str) -> Result<(), ObiError> {
        self.write_len(s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    pub fn write_vec<T: ObiEncode>(&mut self, items: &[T]) -> Result<(), ObiError> {
        self.write_len(items.len())?;
        for item in items {
            item.encode_into(self)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub struct ObiReader<'a> {
    bz: &'a [u8],
}

impl<'a> ObiReader<'a> {
    pub fn new(bz: &'a [u8]) -> Self {
        Self { bz }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ObiError> {
        if self.bz.len() < n {
            return Err(ObiError::UnexpectedEof {
                needed: n,
                remaining: self.bz.len(),
            });
        }
        let (head, rest) = self.bz.split_at(n);
        self.bz = rest;
        Ok(head)
    }

    pub fn read_u32(&mut self) -> Result<u32, ObiError> {
        let mut word = [0u8; 4];
        word.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(word))
    }

    pub fn read_u64(&mut self) -> Result<u64, ObiError> {
        let mut word = [0u8; 8];
        word.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(word))
    }

    pub fn read_string(&mut self) -> Result<String, ObiError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ObiError::InvalidUtf8(e.to_string()))
    }

    pub fn read_vec<T: ObiDecode>(&mut self) -> Result<Vec<T>, ObiError> {
        let len = self.read_u32()? as usize;
        // Every element takes at least one byte
        if len > self.bz.len() {
            return Err(ObiError::UnexpectedEof {
                needed: len,
                remaining: self.bz.len(),
            });
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode_from(self)?);
        }
        Ok(items)
    }

    pub fn finish(self) -> Result<(), ObiError> {
        if self.bz.is_empty() {
            Ok(())
        } else {
            Err(ObiError::TrailingBytes(self.bz.len()))
        }
    }
}

impl ObiEncode for u64 {
    fn encode_into(&self, writer: &mut ObiWriter) -> Result<(), ObiError> {
        writer.write_u64(*self);
        Ok(())
    }
}

impl ObiDecode for u64 {
    fn decode_from(reader: &mut ObiReader<'_>) -> Result<Self, ObiError> {
        reader.read_u64()
    }
}

impl ObiEncode for String {
    fn encode_into(&self, writer: &mut ObiWriter) -> Result<(), ObiError> {
        writer.write_string(self)
    }
}

impl ObiDecode for String {
    fn decode_from(reader: &mut ObiReader<'_>) -> Result<Self, ObiError> {
        reader.read_string()
    }
}

impl<T: ObiEncode> ObiEncode for Vec<T> {
    fn encode_into(&self, writer: &mut ObiWriter) -> Result<(), ObiError> {
        writer.write_vec(self)
    }
}

impl<T: ObiDecode> ObiDecode for Vec<T> {
    fn decode_from(reader: &mut ObiReader<'_>) -> Result<Self, ObiError> {
        reader.read_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_vector_layout() {
        let symbols = vec!["BTC".to_string(), "ATOM".to_string()];
        let mut writer = ObiWriter::default();
        writer.write_vec(&symbols).unwrap();
        writer.write_u64(1_000_000);
        let bz = writer.finish();

        let expected: Vec<u8> = [
            &[0, 0, 0, 2][..],
            &[0, 0, 0, 3],
            b"BTC",
            &[0, 0, 0, 4],
            b"ATOM",
            &[0, 0, 0, 0, 0, 0x0f, 0x42, 0x40],
        ]
        .concat();
        assert_eq!(bz, expected);
    }

    #[test]
    fn test_rejects_truncated_and_trailing_input() {
        assert!(matches!(
            Vec::<u64>::obi_decode(&[0, 0, 0, 1, 0, 0]),
            Err(ObiError::UnexpectedEof { .. })
        ));
        assert_eq!(u64::obi_decode(&[0; 9]), Err(ObiError::TrailingBytes(1)));
        // Declared length far beyond the buffer
        assert!(Vec::<String>::obi_decode(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
