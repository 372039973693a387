use crate::prelude::DecodeError;
use bytes::Buf;

/// Bounds-checked big-endian field access over a payload slice.
///
/// Every accessor takes an absolute byte offset into the slice and fails with
/// [`DecodeError::Truncated`] instead of reading past the end.
#[derive(Clone, Copy, Debug)]
pub struct FieldReader<'a> {
    data: &'a [u8],
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn slice(&self, offset: usize, length: usize) -> Result<&'a [u8], DecodeError> {
        let end = offset.checked_add(length).ok_or(DecodeError::Truncated {
            expected_length: usize::MAX,
            buffer_length: self.data.len(),
        })?;
        if end > self.data.len() {
            return Err(DecodeError::Truncated {
                expected_length: end,
                buffer_length: self.data.len(),
            });
        }
        Ok(&self.data[offset..end])
    }

    /// A reader over the bytes from `offset` to the end.
    pub fn tail(&self, offset: usize) -> Result<FieldReader<'a>, DecodeError> {
        let length = self.data.len().checked_sub(offset).ok_or(DecodeError::Truncated {
            expected_length: offset,
            buffer_length: self.data.len(),
        })?;
        Ok(FieldReader::new(self.slice(offset, length)?))
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8, DecodeError> {
        Ok(self.slice(offset, 1)?.get_u8())
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16, DecodeError> {
        Ok(self.slice(offset, 2)?.get_u16())
    }

    pub fn i16_at(&self, offset: usize) -> Result<i16, DecodeError> {
        Ok(self.slice(offset, 2)?.get_i16())
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, DecodeError> {
        Ok(self.slice(offset, 4)?.get_u32())
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32, DecodeError> {
        Ok(self.slice(offset, 4)?.get_i32())
    }

    pub fn f32_at(&self, offset: usize) -> Result<f32, DecodeError> {
        Ok(self.slice(offset, 4)?.get_f32())
    }

    /// Fixed-width ASCII text with trailing NULs and blanks removed.
    pub fn text_at(&self, offset: usize, length: usize) -> Result<String, DecodeError> {
        let raw = self.slice(offset, length)?;
        Ok(String::from_utf8_lossy(raw)
            .trim_end_matches(|c: char| c == '\0' || c == ' ')
            .to_string())
    }

    /// `count` big-endian halfwords starting at `offset`.
    pub fn u16_array_at(&self, offset: usize, count: usize) -> Result<Vec<u16>, DecodeError> {
        let length = count.checked_mul(2).ok_or(DecodeError::Truncated {
            expected_length: usize::MAX,
            buffer_length: self.data.len(),
        })?;
        let mut raw = self.slice(offset, length)?;
        let mut out = Vec::with_capacity(count);
        while raw.has_remaining() {
            out.push(raw.get_u16());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_fields() {
        let data = [0x01, 0x02, 0xff, 0xfe, 0x3f, 0x80, 0x00, 0x00];
        let reader = FieldReader::new(&data);
        assert_eq!(reader.u16_at(0).unwrap(), 0x0102);
        assert_eq!(reader.i16_at(2).unwrap(), -2);
        assert_eq!(reader.f32_at(4).unwrap(), 1.0);
    }

    #[test]
    fn rejects_reads_past_end() {
        let data = [0u8; 3];
        let reader = FieldReader::new(&data);
        match reader.u32_at(0) {
            Err(DecodeError::Truncated {
                expected_length,
                buffer_length,
            }) => {
                assert_eq!(expected_length, 4);
                assert_eq!(buffer_length, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(reader.u8_at(3).is_err());
        assert!(reader.tail(4).is_err());
    }

    #[test]
    fn text_trims_padding() {
        let data = *b"KTLX\0\0  ";
        let reader = FieldReader::new(&data);
        assert_eq!(reader.text_at(0, 8).unwrap(), "KTLX");
    }
}
