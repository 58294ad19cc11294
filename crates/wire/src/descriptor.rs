use std::fmt;

use thiserror::Error;

/// Platform path-length ceiling used to bound descriptor names on the wire.
///
/// Mirrors `FN_REFLEN`-style limits in the systems this protocol targets;
/// chosen generously rather than tied to any one OS's `PATH_MAX`.
pub const MAX_PATH: usize = 4096;

/// Width of the fixed metadata header for the transactional variant
/// (offset + flags + name_len).
pub const META_TRANSACTIONAL: usize = 16;

/// Width of the fixed metadata header for the common variant (offset +
/// name_len; no per-chunk flags byte).
pub const META_COMMON: usize = 12;

/// Upper bound on a serialized descriptor's length.
pub const MAX_DESCRIPTOR_LEN: usize = META_TRANSACTIONAL + 2 * MAX_PATH + 1;

const RAW_APPEND: u64 = u64::MAX;
const RAW_NO_DATA: u64 = u64::MAX - 1;

/// Bit 0 of the transactional variant's flags field: this chunk belongs to
/// a redo-log file.
pub const FLAG_REDO_LOG: u32 = 0x1;

/// Which engine instantiation's wire shape a descriptor uses.
///
/// The two variants of the protocol (common/MyISAM-style and
/// transactional/log-structured) share the same offset and name_len
/// fields but differ on whether a 4-byte flags word is present.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeaderKind {
    Common,
    Transactional,
}

impl HeaderKind {
    #[must_use]
    pub const fn meta_len(self) -> usize {
        match self {
            HeaderKind::Common => META_COMMON,
            HeaderKind::Transactional => META_TRANSACTIONAL,
        }
    }
}

/// The discriminated meaning of a descriptor's offset field.
///
/// Replaces the wire's overloaded `u64` (two sentinels plus real offsets)
/// with a type that cannot represent an invalid combination away from the
/// wire boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Offset {
    /// Payload is bytes to append at the current write position.
    Append,
    /// Zero-length marker: create the file (if missing) then close it.
    NoData,
    /// Begin writing at this absolute byte position. Only `0` (truncating
    /// write) is emitted by this protocol version; other values are
    /// reserved.
    AtByte(u64),
}

impl Offset {
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        match self {
            Offset::Append => RAW_APPEND,
            Offset::NoData => RAW_NO_DATA,
            Offset::AtByte(n) => n,
        }
    }

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        match raw {
            RAW_APPEND => Offset::Append,
            RAW_NO_DATA => Offset::NoData,
            n => Offset::AtByte(n),
        }
    }
}

/// Per-chunk header accompanying every payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Descriptor {
    pub kind: HeaderKind,
    pub offset: Offset,
    /// Bit 0 set iff this chunk belongs to a redo-log file. Always `0` for
    /// [`HeaderKind::Common`], which carries no flags field on the wire.
    pub flags: u32,
    /// Target file name, relative to the data directory. Empty for
    /// continuation chunks after the first chunk of a file.
    pub name: String,
}

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("descriptor name length {len} exceeds the {max}-byte buffer")]
    NameTooLong { len: usize, max: usize },
    #[error("descriptor buffer of {len} bytes is shorter than the {meta}-byte header")]
    Truncated { len: usize, meta: usize },
}

impl Descriptor {
    #[must_use]
    pub fn is_redo_log(&self) -> bool {
        self.flags & FLAG_REDO_LOG != 0
    }

    /// Serializes into `out`, appending the header followed by the name.
    ///
    /// # Errors
    /// Returns [`DescriptorError::NameTooLong`] if `name` would not fit in
    /// the space left after the header within [`MAX_DESCRIPTOR_LEN`].
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), DescriptorError> {
        let meta = self.kind.meta_len();
        let available = MAX_DESCRIPTOR_LEN - meta;
        if self.name.len() > available {
            return Err(DescriptorError::NameTooLong { len: self.name.len(), max: available });
        }

        out.extend_from_slice(&self.offset.to_raw().to_le_bytes());
        if self.kind == HeaderKind::Transactional {
            out.extend_from_slice(&self.flags.to_le_bytes());
        }
        out.extend_from_slice(&(self.name.len() as u32).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        Ok(())
    }

    /// Deserializes a descriptor of the given variant from untrusted bytes.
    ///
    /// # Errors
    /// Returns [`DescriptorError::Truncated`] if `serial` is shorter than
    /// the fixed header, or [`DescriptorError::NameTooLong`] if the
    /// declared `name_len` claims more bytes than are actually present or
    /// than the wire format allows.
    pub fn read_from(kind: HeaderKind, serial: &[u8]) -> Result<Self, DescriptorError> {
        let meta = kind.meta_len();
        if serial.len() < meta {
            return Err(DescriptorError::Truncated { len: serial.len(), meta });
        }

        let offset = Offset::from_raw(u64::from_le_bytes(serial[0..8].try_into().unwrap()));
        let (flags, name_len_at) = match kind {
            HeaderKind::Transactional => {
                (u32::from_le_bytes(serial[8..12].try_into().unwrap()), 12)
            }
            HeaderKind::Common => (0, 8),
        };
        let name_len =
            u32::from_le_bytes(serial[name_len_at..name_len_at + 4].try_into().unwrap()) as usize;

        let available = MAX_DESCRIPTOR_LEN - meta;
        if name_len > available || serial.len() < meta + name_len {
            return Err(DescriptorError::NameTooLong { len: name_len, max: available });
        }

        let name = String::from_utf8_lossy(&serial[meta..meta + name_len]).into_owned();
        Ok(Self { kind, offset, flags, name })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} name={:?} offset={:?}", self.kind, self.name, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_round_trip() {
        let d = Descriptor {
            kind: HeaderKind::Common,
            offset: Offset::Append,
            flags: 0,
            name: "db1/t1.MYD".to_string(),
        };
        let mut buf = Vec::new();
        d.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), META_COMMON + d.name.len());
        let back = Descriptor::read_from(HeaderKind::Common, &buf).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn transactional_round_trip_carries_flags() {
        let d = Descriptor {
            kind: HeaderKind::Transactional,
            offset: Offset::AtByte(0),
            flags: FLAG_REDO_LOG,
            name: "aria_log.00000001".to_string(),
        };
        let mut buf = Vec::new();
        d.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), META_TRANSACTIONAL + d.name.len());
        let back = Descriptor::read_from(HeaderKind::Transactional, &buf).unwrap();
        assert!(back.is_redo_log());
        assert_eq!(back, d);
    }

    #[test]
    fn empty_name_continuation_chunk() {
        let d = Descriptor {
            kind: HeaderKind::Common,
            offset: Offset::Append,
            flags: 0,
            name: String::new(),
        };
        let mut buf = Vec::new();
        d.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), META_COMMON);
    }

    #[test]
    fn no_data_sentinel_round_trips() {
        assert_eq!(Offset::from_raw(Offset::NoData.to_raw()), Offset::NoData);
        assert_eq!(Offset::from_raw(Offset::Append.to_raw()), Offset::Append);
        assert_eq!(Offset::from_raw(0), Offset::AtByte(0));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let err = Descriptor::read_from(HeaderKind::Transactional, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, DescriptorError::Truncated { .. }));
    }

    #[test]
    fn name_longer_than_declared_is_rejected() {
        let mut buf = vec![0u8; META_COMMON];
        buf[8..12].copy_from_slice(&100u32.to_le_bytes());
        let err = Descriptor::read_from(HeaderKind::Common, &buf).unwrap_err();
        assert!(matches!(err, DescriptorError::NameTooLong { .. }));
    }
}
