//! Flat byte buffers
//!
//! Two buffer shapes back the native-memory scenarios: `ByteBuffer`, a flat
//! byte store with typed get/put at arbitrary byte offsets, and
//! `SharedBuffer`, an append-only record sink shared by concurrent writer
//! threads. Both validate or serialize before any byte moves, so a failed
//! or contended access never leaves a half-written range.

use parking_lot::Mutex;

use crate::bounds::check_buffer_range;
use crate::error::{InteropError, InteropResult};
use crate::types::ElementType;
use crate::value::{ForeignValue, Value};

/// Fixed-size flat byte buffer with typed accessors.
///
/// Also usable as a foreign byte array: the array capability exposes the
/// same storage one `I8` element per byte, so reinterpreting array reads
/// and buffer accesses observe the same bytes.
pub struct ByteBuffer {
    bytes: Mutex<Vec<u8>>,
}

impl ByteBuffer {
    pub fn new(size: usize) -> Self {
        ByteBuffer {
            bytes: Mutex::new(vec![0; size]),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        ByteBuffer {
            bytes: Mutex::new(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed read at a byte offset. The full `width(ty)` range is validated
    /// before any byte is read.
    pub fn read(&self, offset: i64, ty: ElementType) -> InteropResult<Value> {
        let bytes = self.bytes.lock();
        let width = ty.width();
        check_buffer_range(bytes.len() as i64, offset, width as i64)?;
        let start = offset as usize;
        let mut bits: u64 = 0;
        for (i, &byte) in bytes[start..start + width].iter().enumerate() {
            bits |= (byte as u64) << (8 * i);
        }
        Ok(match ty {
            ElementType::I8 => Value::I8(bits as i8),
            ElementType::I16 => Value::I16(bits as i16),
            ElementType::I32 => Value::I32(bits as i32),
            ElementType::I64 => Value::I64(bits as i64),
            ElementType::Float => Value::Float(f32::from_bits(bits as u32)),
            ElementType::Double => Value::Double(f64::from_bits(bits)),
            ElementType::Pointer => Value::I64(bits as i64),
        })
    }

    /// Typed write at a byte offset, least significant byte first. Bounds
    /// are validated before the first byte is stored.
    pub fn write(&self, offset: i64, ty: ElementType, value: Value) -> InteropResult<()> {
        let mut bytes = self.bytes.lock();
        let width = ty.width();
        check_buffer_range(bytes.len() as i64, offset, width as i64)?;
        let bits: u64 = match ty {
            ElementType::I8 | ElementType::I16 | ElementType::I32 | ElementType::I64 => value
                .as_i64()
                .ok_or(InteropError::UnsupportedWrite(ty))?
                as u64,
            ElementType::Float => match value {
                Value::Float(v) => v.to_bits() as u64,
                other => (other
                    .as_f64()
                    .ok_or(InteropError::UnsupportedWrite(ty))?
                    as f32)
                    .to_bits() as u64,
            },
            ElementType::Double => match value {
                Value::Double(v) => v.to_bits(),
                other => other
                    .as_f64()
                    .ok_or(InteropError::UnsupportedWrite(ty))?
                    .to_bits(),
            },
            ElementType::Pointer => match value {
                Value::Pointer(p) => p.to_native()? as u64,
                other => other.as_i64().ok_or(InteropError::UnsupportedWrite(ty))? as u64,
            },
        };
        let start = offset as usize;
        for i in 0..width {
            bytes[start + i] = (bits >> (8 * i)) as u8;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }
}

impl ForeignValue for ByteBuffer {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn has_array_elements(&self) -> bool {
        true
    }

    fn array_size(&self) -> InteropResult<u64> {
        Ok(self.len() as u64)
    }

    fn read_array_element(&self, index: u64) -> InteropResult<Value> {
        let bytes = self.bytes.lock();
        bytes
            .get(index as usize)
            .map(|&b| Value::I8(b as i8))
            .ok_or(InteropError::InvalidArrayIndex(index as i64))
    }

    fn write_array_element(&self, index: u64, value: Value) -> InteropResult<()> {
        let mut bytes = self.bytes.lock();
        match bytes.get_mut(index as usize) {
            Some(slot) => {
                *slot = value
                    .low_byte()
                    .ok_or(InteropError::UnsupportedWrite(ElementType::I8))?;
                Ok(())
            }
            None => Err(InteropError::InvalidArrayIndex(index as i64)),
        }
    }

    fn element_type(&self) -> Option<ElementType> {
        Some(ElementType::I8)
    }
}

/// Append-only record buffer shared by concurrent writers.
///
/// Each append holds the lock for the whole record, so records never
/// interleave mid-byte and one thread's records keep their submission
/// order. Ordering between threads is whatever the scheduler produces.
pub struct SharedBuffer {
    records: Mutex<Vec<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        SharedBuffer {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn append(&self, record: &[u8]) {
        self.records.lock().push(record.to_vec());
    }

    pub fn records(&self) -> Vec<Vec<u8>> {
        self.records.lock().clone()
    }

    /// All records flattened in append order.
    pub fn contents(&self) -> Vec<u8> {
        self.records.lock().iter().flatten().copied().collect()
    }
}

impl Default for SharedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueRef;
    use std::sync::Arc;

    #[test]
    fn test_i32_round_trip_at_offset() {
        let buf = ByteBuffer::new(32);
        buf.write(5, ElementType::I32, Value::I32(0x0A0B0C0D)).unwrap();
        assert_eq!(
            buf.read(5, ElementType::I32).unwrap(),
            Value::I32(0x0A0B0C0D)
        );
        // LSB lands at the start offset.
        assert_eq!(buf.read(5, ElementType::I8).unwrap(), Value::I8(0x0D));
    }

    #[test]
    fn test_32_byte_buffer_boundary_scenario() {
        let buf = ByteBuffer::new(32);
        assert!(buf.write(28, ElementType::I32, Value::I32(1)).is_ok());
        assert_eq!(
            buf.write(29, ElementType::I32, Value::I32(1))
                .unwrap_err()
                .to_string(),
            "Out-of-bounds buffer access (offset 29, length 4)"
        );
        assert_eq!(
            buf.write(-1, ElementType::I32, Value::I32(1))
                .unwrap_err()
                .to_string(),
            "Out-of-bounds buffer access (offset -1, length 4)"
        );
    }

    #[test]
    fn test_failed_write_touches_nothing() {
        let buf = ByteBuffer::new(8);
        buf.write(0, ElementType::I64, Value::I64(-1)).unwrap();
        assert!(buf.write(5, ElementType::I32, Value::I32(0)).is_err());
        assert_eq!(buf.read(0, ElementType::I64).unwrap(), Value::I64(-1));
    }

    #[test]
    fn test_double_round_trip() {
        let buf = ByteBuffer::new(16);
        buf.write(8, ElementType::Double, Value::Double(-0.5)).unwrap();
        assert_eq!(
            buf.read(8, ElementType::Double).unwrap(),
            Value::Double(-0.5)
        );
        assert_eq!(
            buf.read(8, ElementType::I64).unwrap(),
            Value::I64((-0.5f64).to_bits() as i64)
        );
    }

    #[test]
    fn test_buffer_doubles_as_byte_array() {
        let buf: ValueRef = Arc::new(ByteBuffer::new(8));
        crate::access::write_element(&buf, 0, ElementType::I32, Value::I32(0x11223344)).unwrap();
        assert_eq!(
            crate::access::read_element(&buf, 0, ElementType::I32).unwrap(),
            Value::I32(0x11223344)
        );
    }

    #[test]
    fn test_concurrent_appends_keep_records_intact_and_ordered() {
        let buf = Arc::new(SharedBuffer::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let buf = Arc::clone(&buf);
                std::thread::spawn(move || {
                    for r in 0..100u32 {
                        let record = format!("t{:02}r{:03};", t, r);
                        buf.append(record.as_bytes());
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let records = buf.records();
        assert_eq!(records.len(), 800);
        let mut last_seen = [None::<u32>; 8];
        for record in records {
            let text = String::from_utf8(record).unwrap();
            let t: usize = text[1..3].parse().unwrap();
            let r: u32 = text[4..7].parse().unwrap();
            // Per-thread submission order survives the interleaving.
            if let Some(prev) = last_seen[t] {
                assert!(r > prev, "thread {} out of order", t);
            }
            last_seen[t] = Some(r);
        }
        for (t, seen) in last_seen.iter().enumerate() {
            assert_eq!(*seen, Some(99), "thread {} incomplete", t);
        }
    }
}
