//! Blocking `embedded-io` traits for the streams and the circular buffer.

use embedded_io::{ErrorType, Read, Seek, Write};

use super::{FlashReader, FlashWriter, SeekFrom};
use crate::domain::error::FlashError;
use crate::domain::ports::FlashDevice;
use crate::infrastructure::CircularBuffer;

fn convert_seek_from(from: embedded_io::SeekFrom) -> SeekFrom {
    match from {
        embedded_io::SeekFrom::Start(n) => SeekFrom::Start(n),
        embedded_io::SeekFrom::End(n) => SeekFrom::End(n),
        embedded_io::SeekFrom::Current(n) => SeekFrom::Current(n),
    }
}

impl<D: FlashDevice> ErrorType for FlashReader<D> {
    type Error = FlashError;
}

impl<D: FlashDevice> Read for FlashReader<D> {
    /// Returns `Ok(0)` once the end of the device is reached.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let count = buf.len().min(self.remaining() as usize);
        self.read_bytes(&mut buf[..count])?;
        Ok(count)
    }
}

impl<D: FlashDevice> Seek for FlashReader<D> {
    fn seek(&mut self, pos: embedded_io::SeekFrom) -> Result<u64, Self::Error> {
        FlashReader::seek(self, convert_seek_from(pos)).map(u64::from)
    }
}

impl<D: FlashDevice> ErrorType for FlashWriter<D> {
    type Error = FlashError;
}

impl<D: FlashDevice> Write for FlashWriter<D> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let count = buf.len().min(self.remaining() as usize);
        if count == 0 {
            return Err(FlashError::out_of_range(self.position(), buf.len(), self.device().length()));
        }
        self.write_bytes(&buf[..count])?;
        Ok(count)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<D: FlashDevice> Seek for FlashWriter<D> {
    fn seek(&mut self, pos: embedded_io::SeekFrom) -> Result<u64, Self::Error> {
        FlashWriter::seek(self, convert_seek_from(pos)).map(u64::from)
    }
}

impl<D: FlashDevice> ErrorType for CircularBuffer<D> {
    type Error = FlashError;
}

impl<D: FlashDevice> Read for CircularBuffer<D> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_soft(buf)
    }
}

impl<D: FlashDevice> Write for CircularBuffer<D> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.write_soft(buf)? {
            0 => Err(FlashError::BufferFull),
            written => Ok(written),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{PageSpanFlashDevice, RamFlash};

    #[test]
    fn test_reader_stops_at_end() {
        let mut reader = FlashReader::at(RamFlash::new(1, 16), 12);
        let mut buf = [0u8; 8];
        assert_eq!(Read::read(&mut reader, &mut buf).unwrap(), 4);
        assert_eq!(Read::read(&mut reader, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_write_all_then_read_exact() {
        let device = PageSpanFlashDevice::new(RamFlash::new(4, 16));
        let mut writer = FlashWriter::new(device);
        writer.write_all(b"spans more than one page").unwrap();

        let mut reader = FlashReader::new(writer.into_inner());
        let mut buf = [0u8; 24];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"spans more than one page");
    }

    #[test]
    fn test_writer_reports_end_of_device() {
        let mut writer = FlashWriter::at(RamFlash::new(1, 8), 6);
        assert_eq!(Write::write(&mut writer, &[1, 2, 3]).unwrap(), 2);
        assert!(Write::write(&mut writer, &[4]).is_err());
    }

    #[test]
    fn test_seek_through_trait() {
        let mut writer = FlashWriter::new(RamFlash::new(1, 16));
        assert_eq!(Seek::seek(&mut writer, embedded_io::SeekFrom::End(-4)).unwrap(), 12);
        assert!(Seek::seek(&mut writer, embedded_io::SeekFrom::Current(8)).is_err());
    }

    #[test]
    fn test_circular_buffer_io() {
        let mut buffer = CircularBuffer::new(RamFlash::new(2, 8));
        assert_eq!(Write::write(&mut buffer, &[9; 20]).unwrap(), 16);
        assert_eq!(Write::write(&mut buffer, &[9]), Err(FlashError::BufferFull));
        let mut buf = [0u8; 10];
        assert_eq!(Read::read(&mut buffer, &mut buf).unwrap(), 10);
        assert_eq!(buffer.available(), 6);
    }
}
