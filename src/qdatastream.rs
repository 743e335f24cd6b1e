//! QDataStream codec
//!
//! Reads and writes Qt's QDataStream binary format (version Qt_5_1 = 14),
//! which Telegram Desktop uses inside its tdata files. All integers are Big
//! Endian; QByteArrays are length-prefixed with a `0xFFFFFFFF` null marker.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::{Error, Result};

/// Marker for null QByteArray/QString
const NULL_MARKER: u32 = 0xFFFFFFFF;

/// Marker for extended 64-bit length (Qt 6.7+, not used in tdata)
const EXTENDED_LENGTH_MARKER: u32 = 0xFFFFFFFE;

/// QDataStream reader for parsing Qt binary serialization format
pub struct QDataStream<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> QDataStream<'a> {
    /// Create a new QDataStream reader
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Get current position in the stream
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Check if we've reached the end of the stream
    pub fn at_end(&self) -> bool {
        self.cursor.position() >= self.cursor.get_ref().len() as u64
    }

    /// Get remaining bytes count
    pub fn remaining(&self) -> usize {
        let pos = self.cursor.position() as usize;
        let len = self.cursor.get_ref().len();
        len.saturating_sub(pos)
    }

    /// Read an unsigned 32-bit integer (quint32) - Big Endian
    pub fn read_u32(&mut self) -> Result<u32> {
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| Error::UnexpectedEof {
                offset: self.position(),
            })
    }

    /// Read a signed 32-bit integer (qint32) - Big Endian
    pub fn read_i32(&mut self) -> Result<i32> {
        self.cursor
            .read_i32::<BigEndian>()
            .map_err(|_| Error::UnexpectedEof {
                offset: self.position(),
            })
    }

    /// Read an unsigned 64-bit integer (quint64) - Big Endian
    pub fn read_u64(&mut self) -> Result<u64> {
        self.cursor
            .read_u64::<BigEndian>()
            .map_err(|_| Error::UnexpectedEof {
                offset: self.position(),
            })
    }

    /// Read a signed 64-bit integer (qint64) - Big Endian
    pub fn read_i64(&mut self) -> Result<i64> {
        self.cursor
            .read_i64::<BigEndian>()
            .map_err(|_| Error::UnexpectedEof {
                offset: self.position(),
            })
    }

    /// Read raw bytes of specified length
    pub fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        if self.remaining() < len {
            return Err(Error::UnexpectedEof {
                offset: self.position(),
            });
        }

        let mut buf = vec![0u8; len];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| Error::UnexpectedEof {
                offset: self.position(),
            })?;
        Ok(buf)
    }

    /// Read a QByteArray
    ///
    /// Wire format:
    /// - 4 bytes: length (quint32 BE)
    ///   - 0xFFFFFFFF = null QByteArray (returns empty vec)
    ///   - 0xFFFFFFFE = extended 64-bit length (followed by quint64)
    /// - N bytes: raw data
    pub fn read_qbytearray(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()?;

        match len {
            NULL_MARKER => Ok(Vec::new()),
            EXTENDED_LENGTH_MARKER => {
                // Extended 64-bit length (Qt 6.7+)
                let real_len = self.read_u64()? as usize;
                self.read_raw(real_len)
            }
            _ => self.read_raw(len as usize),
        }
    }
}

/// QDataStream writer producing Qt binary serialization format
#[derive(Default)]
pub struct QDataStreamWriter {
    buf: Vec<u8>,
}

impl QDataStreamWriter {
    /// Create a new empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the writer, returning the serialized bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Write a signed 32-bit integer (qint32) - Big Endian
    pub fn write_i32(&mut self, value: i32) {
        // Writes to Vec cannot fail
        self.buf.write_i32::<BigEndian>(value).unwrap();
    }

    /// Write an unsigned 32-bit integer (quint32) - Big Endian
    pub fn write_u32(&mut self, value: u32) {
        self.buf.write_u32::<BigEndian>(value).unwrap();
    }

    /// Write a signed 64-bit integer (qint64) - Big Endian
    pub fn write_i64(&mut self, value: i64) {
        self.buf.write_i64::<BigEndian>(value).unwrap();
    }

    /// Write raw bytes without a length prefix
    pub fn write_raw(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Write a QByteArray (quint32 BE length prefix + raw data)
    pub fn write_qbytearray(&mut self, data: &[u8]) {
        self.write_u32(data.len() as u32);
        self.write_raw(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u32() {
        let data = [0x12, 0x34, 0x56, 0x78];
        let mut stream = QDataStream::new(&data);
        assert_eq!(stream.read_u32().unwrap(), 0x12345678);
    }

    #[test]
    fn test_read_i32() {
        let data = [0xFF, 0xFF, 0xFF, 0xFE]; // -2 in big endian
        let mut stream = QDataStream::new(&data);
        assert_eq!(stream.read_i32().unwrap(), -2);
    }

    #[test]
    fn test_read_qbytearray() {
        // Length = 4, data = [0x01, 0x02, 0x03, 0x04]
        let data = [0x00, 0x00, 0x00, 0x04, 0x01, 0x02, 0x03, 0x04];
        let mut stream = QDataStream::new(&data);
        assert_eq!(
            stream.read_qbytearray().unwrap(),
            vec![0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn test_read_null_qbytearray() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF];
        let mut stream = QDataStream::new(&data);
        assert!(stream.read_qbytearray().unwrap().is_empty());
    }

    #[test]
    fn test_read_past_end() {
        let data = [0x01, 0x02];
        let mut stream = QDataStream::new(&data);
        assert!(matches!(
            stream.read_u32(),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_write_read_roundtrip() {
        let mut writer = QDataStreamWriter::new();
        writer.write_i32(0x4B);
        writer.write_i64(-1);
        writer.write_qbytearray(&[0xAA, 0xBB, 0xCC]);

        let bytes = writer.into_bytes();
        let mut stream = QDataStream::new(&bytes);
        assert_eq!(stream.read_i32().unwrap(), 0x4B);
        assert_eq!(stream.read_i64().unwrap(), -1);
        assert_eq!(stream.read_qbytearray().unwrap(), vec![0xAA, 0xBB, 0xCC]);
        assert!(stream.at_end());
    }

    #[test]
    fn test_position_and_remaining() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut stream = QDataStream::new(&data);

        assert_eq!(stream.position(), 0);
        assert_eq!(stream.remaining(), 8);

        stream.read_u32().unwrap();
        assert_eq!(stream.position(), 4);
        assert_eq!(stream.remaining(), 4);
    }
}
