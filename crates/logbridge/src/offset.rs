use logbridge_types::Offset as RawOffset;

use crate::BridgeError;

/// Retained range of a partition as reported by its leader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionOffsets {
    /// earliest offset still in the log
    pub start_offset: RawOffset,
    /// offset the next appended record will get
    pub high_watermark: RawOffset,
}

/// Describes the location of a record stored in a partition.
///
/// Offsets are either absolute or relative to the start or end of the
/// retained log. Relative offsets are turned into absolute ones with
/// [`Offset::resolve`] once the partition's [`PartitionOffsets`] are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    inner: OffsetInner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OffsetInner {
    Absolute(RawOffset),
    FromBeginning(RawOffset),
    FromEnd(RawOffset),
}

impl Default for Offset {
    fn default() -> Self {
        Self::beginning()
    }
}

impl Offset {
    /// Creates an absolute offset. Fails for negative values.
    pub fn absolute(index: RawOffset) -> Result<Offset, BridgeError> {
        if index < 0 {
            return Err(BridgeError::NegativeOffset(index));
        }
        Ok(Self {
            inner: OffsetInner::Absolute(index),
        })
    }

    /// The earliest retained offset
    pub fn beginning() -> Offset {
        Self::from_beginning(0)
    }

    /// `offset` records after the earliest retained one
    pub fn from_beginning(offset: u32) -> Offset {
        Self {
            inner: OffsetInner::FromBeginning(offset as RawOffset),
        }
    }

    /// The high watermark, where the next record will be appended
    pub fn end() -> Offset {
        Self::from_end(0)
    }

    /// `offset` records before the high watermark
    pub fn from_end(offset: u32) -> Offset {
        Self {
            inner: OffsetInner::FromEnd(offset as RawOffset),
        }
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self.inner, OffsetInner::Absolute(_))
    }

    /// Turns this offset into an absolute one.
    /// Relative offsets are clamped into `[start_offset, high_watermark]`,
    /// absolute ones are returned unchanged.
    pub fn resolve(&self, offsets: &PartitionOffsets) -> RawOffset {
        match self.inner {
            OffsetInner::Absolute(offset) => offset,
            OffsetInner::FromBeginning(offset) => {
                let target = offsets.start_offset.saturating_add(offset);
                target.min(offsets.high_watermark)
            }
            OffsetInner::FromEnd(offset) => {
                let target = offsets.high_watermark.saturating_sub(offset);
                target.max(offsets.start_offset)
            }
        }
    }
}

#[cfg(test)]
mod test {

    use crate::BridgeError;

    use super::Offset;
    use super::PartitionOffsets;

    const OFFSETS: PartitionOffsets = PartitionOffsets {
        start_offset: 5,
        high_watermark: 20,
    };

    #[test]
    fn test_symbolic_offsets() {
        assert_eq!(Offset::beginning().resolve(&OFFSETS), 5);
        assert_eq!(Offset::end().resolve(&OFFSETS), 20);
        assert_eq!(Offset::from_beginning(3).resolve(&OFFSETS), 8);
        assert_eq!(Offset::from_end(4).resolve(&OFFSETS), 16);
    }

    #[test]
    fn test_relative_offsets_are_clamped() {
        assert_eq!(Offset::from_beginning(100).resolve(&OFFSETS), 20);
        assert_eq!(Offset::from_end(100).resolve(&OFFSETS), 5);
    }

    #[test]
    fn test_absolute_passes_through() {
        let offset = Offset::absolute(42).expect("absolute");
        assert!(offset.is_absolute());
        assert_eq!(offset.resolve(&OFFSETS), 42);
    }

    #[test]
    fn test_negative_absolute() {
        assert!(matches!(
            Offset::absolute(-1),
            Err(BridgeError::NegativeOffset(-1))
        ));
    }

    #[test]
    fn test_empty_partition() {
        let empty = PartitionOffsets {
            start_offset: 0,
            high_watermark: 0,
        };
        assert_eq!(Offset::beginning().resolve(&empty), 0);
        assert_eq!(Offset::end().resolve(&empty), 0);
    }
}
