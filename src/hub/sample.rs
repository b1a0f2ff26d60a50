//! Audio sample type
//!
//! A sample is one chunk of encoded audio as read from the encoder output.

use bytes::Bytes;

/// One chunk of encoded audio
///
/// Cheap to clone: the payload is reference counted, so fanning a sample out
/// to many subscribers never copies the audio data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sample(Bytes);

impl Sample {
    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sample carries no audio
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the payload
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Take the payload
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for Sample {
    fn from(data: Bytes) -> Self {
        Self(data)
    }
}

impl From<Vec<u8>> for Sample {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

impl From<&'static [u8]> for Sample {
    fn from(data: &'static [u8]) -> Self {
        Self(Bytes::from_static(data))
    }
}

impl AsRef<[u8]> for Sample {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_payload() {
        let sample = Sample::from(vec![1u8, 2, 3, 4]);
        let clone = sample.clone();

        assert_eq!(sample.as_bytes().as_ptr(), clone.as_bytes().as_ptr());
        assert_eq!(clone.len(), 4);
    }

    #[test]
    fn test_empty() {
        assert!(Sample::default().is_empty());
        assert!(Sample::from(&b""[..]).is_empty());
        assert!(!Sample::from(&b"AAAA"[..]).is_empty());
    }
}
