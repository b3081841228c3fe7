use std::io;

use bytes::Bytes;

/// Zero-copy extraction from a cursor over [`Bytes`].
///
/// The returned buffers share the allocation of the cursor's inner buffer.
pub trait BytesCursorExt {
    /// Extracts `size` bytes and advances the cursor past them.
    ///
    /// Returns `UnexpectedEof` without moving the cursor when fewer than
    /// `size` bytes remain.
    fn extract_bytes(&mut self, size: usize) -> io::Result<Bytes>;

    /// Extracts everything after the cursor position, leaving the cursor at the end.
    fn extract_remaining(&mut self) -> Bytes;
}

impl BytesCursorExt for io::Cursor<Bytes> {
    fn extract_bytes(&mut self, size: usize) -> io::Result<Bytes> {
        let position = self.position() as usize;
        let len = self.get_ref().len();

        if position > len || len - position < size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "not enough bytes: wanted {size}, {} remaining",
                    len.saturating_sub(position)
                ),
            ));
        }

        let slice = self.get_ref().slice(position..position + size);
        self.set_position((position + size) as u64);
        Ok(slice)
    }

    fn extract_remaining(&mut self) -> Bytes {
        let position = (self.position() as usize).min(self.get_ref().len());
        let slice = self.get_ref().slice(position..);
        self.set_position(self.get_ref().len() as u64);
        slice
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bytes() {
        let mut cursor = io::Cursor::new(Bytes::from_static(&[1, 2, 3, 4, 5]));
        assert_eq!(cursor.extract_bytes(2).unwrap(), Bytes::from_static(&[1, 2]));
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.extract_remaining(), Bytes::from_static(&[3, 4, 5]));
        assert_eq!(cursor.position(), 5);
        assert!(cursor.extract_remaining().is_empty());
    }

    #[test]
    fn test_extract_bytes_eof_keeps_position() {
        let mut cursor = io::Cursor::new(Bytes::from_static(&[1, 2, 3]));
        cursor.set_position(1);
        let err = cursor.extract_bytes(3).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(cursor.position(), 1);
    }
}
