//! Echo wire format.
//!
//! Plain text, no framing: each non-empty receive is answered with
//! [`RESPONSE_PREFIX`] followed by exactly the bytes of that receive.

/// Literal placed before every echoed payload.
pub const RESPONSE_PREFIX: &[u8] = b"\n\rReceived: ";

/// Build the response for one receive.
pub fn frame_response(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(RESPONSE_PREFIX.len() + payload.len());
    out.extend_from_slice(RESPONSE_PREFIX);
    out.extend_from_slice(payload);
    out
}

/// Owned receive buffer with one byte held in reserve.
#[derive(Debug, Clone)]
pub struct EchoBuffer {
    data: Box<[u8]>,
}

impl EchoBuffer {
    /// Allocate a buffer of `capacity` bytes. `capacity` must be at least 2.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "echo buffer needs at least 2 bytes");
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Largest number of bytes a single receive may fill.
    pub fn read_limit(&self) -> usize {
        self.data.len() - 1
    }

    /// Writable region for the next receive.
    pub fn read_slot(&mut self) -> &mut [u8] {
        let limit = self.read_limit();
        &mut self.data[..limit]
    }

    /// The first `len` received bytes.
    pub fn filled(&self, len: usize) -> &[u8] {
        &self.data[..len.min(self.read_limit())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ping_response() {
        assert_eq!(frame_response(b"ping"), b"\n\rReceived: ping".to_vec());
    }

    #[test]
    fn test_payload_passes_through_untouched() {
        let payload = b"a\0b\r\n\xff";
        let response = frame_response(payload);
        assert_eq!(&response[RESPONSE_PREFIX.len()..], payload);
    }

    #[test]
    fn test_buffer_reserves_one_byte() {
        let mut buf = EchoBuffer::new(1024);
        assert_eq!(buf.capacity(), 1024);
        assert_eq!(buf.read_limit(), 1023);
        assert_eq!(buf.read_slot().len(), 1023);

        buf.read_slot()[..3].copy_from_slice(b"abc");
        assert_eq!(buf.filled(3), b"abc");
        assert_eq!(buf.filled(5000).len(), 1023);
    }

    #[test]
    #[should_panic]
    fn test_buffer_rejects_tiny_capacity() {
        EchoBuffer::new(1);
    }
}
