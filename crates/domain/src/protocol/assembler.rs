use super::frame::{LENGTH_PREFIX_LEN, MAX_PAYLOAD_LEN};

/// Splits a byte stream into length-prefixed frames.
///
/// Byte-stream transports (serial SPP) deliver arbitrary chunks; this
/// buffers them until a whole frame is available.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    max_len: usize,
    discarded: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::with_max_len(MAX_PAYLOAD_LEN + 1)
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembler that treats any length field above `max_len` as noise
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_len: max_len.max(1),
            discarded: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next complete frame (length prefix included), if any.
    ///
    /// A zero length field cannot describe a frame (there is always a
    /// command id byte), so that prefix is discarded. A length above the cap
    /// drops a single byte and the scan resumes at the next offset.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.buffer.len() < LENGTH_PREFIX_LEN {
                return None;
            }

            let declared = u16::from_le_bytes([self.buffer[0], self.buffer[1]]) as usize;
            if declared == 0 {
                self.buffer.drain(..LENGTH_PREFIX_LEN);
                self.discarded += LENGTH_PREFIX_LEN;
                continue;
            }
            if declared > self.max_len {
                self.buffer.remove(0);
                self.discarded += 1;
                continue;
            }

            let total = LENGTH_PREFIX_LEN + declared;
            if self.buffer.len() < total {
                return None;
            }

            return Some(self.buffer.drain(..total).collect());
        }
    }

    /// Bytes thrown away while resynchronising
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Bytes buffered but not yet part of a complete frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
