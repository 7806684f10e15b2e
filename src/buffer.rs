//! Growable byte store backing the bytecode.

/// Smallest capacity allocated on first growth.
const MIN_CAPACITY: usize = 8;

/// Append-only byte buffer with doubling growth.
///
/// The logical capacity is tracked separately from the `Vec` so growth follows
/// `max(8, 2 * old)` exactly, regardless of what the allocator hands back.
#[derive(Debug, Default, Clone)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `additional` more bytes fit without growing again.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.bytes.len() + additional;
        if required <= self.capacity {
            return;
        }

        let mut capacity = self.capacity;
        while capacity < required {
            capacity = grow_capacity(capacity);
        }

        self.bytes.reserve_exact(capacity - self.bytes.len());
        self.capacity = capacity;
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.reserve(1);
        self.bytes.push(byte);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.bytes.extend_from_slice(bytes);
    }

    /// Append a little-endian 32-bit immediate.
    pub fn write_i32_le(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).copied()
    }

    pub fn read_i32_le(&self, offset: usize) -> Option<i32> {
        let end = offset.checked_add(4)?;
        let raw: [u8; 4] = self.bytes.get(offset..end)?.try_into().ok()?;
        Some(i32::from_le_bytes(raw))
    }

    /// Forget the contents but keep the allocation for the next input.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

fn grow_capacity(capacity: usize) -> usize {
    if capacity < MIN_CAPACITY {
        MIN_CAPACITY
    } else {
        capacity * 2
    }
}
