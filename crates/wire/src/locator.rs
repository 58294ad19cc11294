use std::fmt;

/// Wire width of a serialized [`Locator`], in bytes.
pub const LOCATOR_LEN: usize = 12;

/// The only locator wire version this crate understands.
pub const CURRENT_VERSION: u32 = 1;

/// Fixed-width handle naming one clone instance and its registry slot.
///
/// Exchanged as opaque bytes with the peer: the source allocates one at
/// `begin`, the destination echoes the same bytes back on every subsequent
/// call. Two locators name the same clone iff all three fields match.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Locator {
    pub version: u32,
    pub clone_id: u32,
    pub slot_index: u32,
}

impl Locator {
    /// Builds a fresh locator for a newly started clone at `slot_index`,
    /// with a `clone_id` drawn from the caller's counter.
    #[must_use]
    pub fn new(clone_id: u32, slot_index: u32) -> Self {
        Self { version: CURRENT_VERSION, clone_id, slot_index }
    }

    /// Serializes to the stable 12-byte little-endian wire layout:
    /// `version`, `clone_id`, `slot_index`, each a u32.
    #[must_use]
    pub fn to_bytes(self) -> [u8; LOCATOR_LEN] {
        let mut buf = [0u8; LOCATOR_LEN];
        buf[0..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..8].copy_from_slice(&self.clone_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.slot_index.to_le_bytes());
        buf
    }

    /// Deserializes from a peer-supplied, untrusted byte slice.
    ///
    /// Shorter-than-expected input is zero-padded; longer input is
    /// truncated. Never fails: the bytes layer does not judge whether the
    /// result names a live clone.
    #[must_use]
    pub fn from_bytes(serial: &[u8]) -> Self {
        let mut buf = [0u8; LOCATOR_LEN];
        let n = serial.len().min(LOCATOR_LEN);
        buf[..n].copy_from_slice(&serial[..n]);
        Self {
            version: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            clone_id: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            slot_index: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clone#{} (v{}, slot {})", self.clone_id, self.version, self.slot_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let loc = Locator::new(7, 0);
        let bytes = loc.to_bytes();
        assert_eq!(Locator::from_bytes(&bytes), loc);
    }

    #[test]
    fn short_input_is_zero_padded() {
        let loc = Locator::from_bytes(&[1, 0, 0, 0]);
        assert_eq!(loc, Locator { version: 1, clone_id: 0, slot_index: 0 });
    }

    #[test]
    fn long_input_is_truncated() {
        let mut bytes = Locator::new(3, 1).to_bytes().to_vec();
        bytes.extend_from_slice(&[0xAA; 16]);
        assert_eq!(Locator::from_bytes(&bytes), Locator::new(3, 1));
    }

    #[test]
    fn equality_requires_all_three_fields() {
        let a = Locator { version: 1, clone_id: 5, slot_index: 0 };
        let b = Locator { version: 1, clone_id: 5, slot_index: 1 };
        assert_ne!(a, b);
    }
}
