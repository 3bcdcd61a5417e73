//! Per-connection message buffer.
//!
//! The protocol has no framing: a message is everything a client wrote
//! between connecting and closing.  [`MessageAssembler`] collects the chunks
//! as they arrive and hands out the whole message once, on disconnect.

/// Accumulates the bytes of one connection.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buf: Vec<u8>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, preserving arrival order.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes received so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the assembler and return the complete message.
    pub fn finalize(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{classify, EventKind};

    #[test]
    fn chunks_concatenate_in_order() {
        let mut a = MessageAssembler::new();
        a.append(b"USB-");
        a.append(b"plugged");
        assert_eq!(a.len(), 11);
        assert_eq!(a.finalize(), b"USB-plugged".to_vec());
    }

    #[test]
    fn chunked_and_single_write_classify_the_same() {
        let mut split = MessageAssembler::new();
        split.append(b"USB-");
        split.append(b"plugged");

        let mut whole = MessageAssembler::new();
        whole.append(b"USB-plugged");

        let split = classify(&split.finalize());
        assert_eq!(split, classify(&whole.finalize()));
        assert_eq!(split, EventKind::Plugged);
    }

    #[test]
    fn byte_at_a_time() {
        let mut a = MessageAssembler::new();
        for b in b"USB-unplugged" {
            a.append(std::slice::from_ref(b));
        }
        assert_eq!(classify(&a.finalize()), EventKind::Unplugged);
    }

    #[test]
    fn empty_chunks_are_harmless() {
        let mut a = MessageAssembler::new();
        a.append(b"");
        a.append(b"USB-unplugged");
        a.append(b"");
        assert_eq!(classify(&a.finalize()), EventKind::Unplugged);
    }

    #[test]
    fn nothing_received_is_unrecognized() {
        let a = MessageAssembler::new();
        assert!(a.is_empty());
        assert_eq!(classify(&a.finalize()), EventKind::Unrecognized);
    }
}
