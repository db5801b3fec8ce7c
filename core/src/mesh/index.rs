//! Index formats and minimal-width packing.

/// Element width of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum IndexFormat {
    /// 8-bit unsigned integers (max index 255).
    U8,
    /// 16-bit unsigned integers (max index 65535).
    #[default]
    U16,
    /// 32-bit unsigned integers.
    U32,
}

impl IndexFormat {
    /// Get the size in bytes of each index.
    pub fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Largest index value representable in this format.
    pub fn max_value(&self) -> u32 {
        match self {
            Self::U8 => u8::MAX as u32,
            Self::U16 => u16::MAX as u32,
            Self::U32 => u32::MAX,
        }
    }

    /// Smallest format able to represent `max_index`.
    pub fn for_max_index(max_index: u32) -> Self {
        if max_index < 256 {
            Self::U8
        } else if max_index < 65536 {
            Self::U16
        } else {
            Self::U32
        }
    }
}

/// Index data packed at its minimal element width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexData {
    format: IndexFormat,
    count: u32,
    max_index: u32,
    bytes: Vec<u8>,
}

impl IndexData {
    /// Pack indices using the narrowest format able to hold the largest one.
    pub fn pack(indices: &[u32]) -> Self {
        let max_index = indices.iter().copied().max().unwrap_or(0);
        let format = IndexFormat::for_max_index(max_index);

        let bytes: Vec<u8> = match format {
            IndexFormat::U8 => indices.iter().map(|&i| i as u8).collect(),
            IndexFormat::U16 => {
                let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
                bytemuck::cast_slice(&narrow).to_vec()
            }
            IndexFormat::U32 => bytemuck::cast_slice(indices).to_vec(),
        };

        Self {
            format,
            count: indices.len() as u32,
            max_index,
            bytes,
        }
    }

    /// Get the element format.
    pub fn format(&self) -> IndexFormat {
        self.format
    }

    /// Get the number of indices.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Get the largest index value.
    pub fn max_index(&self) -> u32 {
        self.max_index
    }

    /// Get the packed bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte offset of the index at position `first`.
    pub fn byte_offset(&self, first: u32) -> usize {
        first as usize * self.format.size()
    }

    /// Check if there are no indices.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_boundaries() {
        assert_eq!(IndexFormat::for_max_index(0), IndexFormat::U8);
        assert_eq!(IndexFormat::for_max_index(255), IndexFormat::U8);
        assert_eq!(IndexFormat::for_max_index(256), IndexFormat::U16);
        assert_eq!(IndexFormat::for_max_index(65535), IndexFormat::U16);
        assert_eq!(IndexFormat::for_max_index(65536), IndexFormat::U32);
    }

    #[test]
    fn test_pack_narrow() {
        let data = IndexData::pack(&[0, 1, 2, 2, 1, 255]);
        assert_eq!(data.format(), IndexFormat::U8);
        assert_eq!(data.bytes(), &[0, 1, 2, 2, 1, 255]);
        assert_eq!(data.byte_offset(3), 3);
    }

    #[test]
    fn test_pack_wide() {
        let data = IndexData::pack(&[0, 70000, 1]);
        assert_eq!(data.format(), IndexFormat::U32);
        assert_eq!(data.bytes().len(), 12);
        assert_eq!(&data.bytes()[4..8], &70000u32.to_ne_bytes());
        assert_eq!(data.byte_offset(2), 8);
    }

    #[test]
    fn test_pack_u16() {
        let data = IndexData::pack(&[300, 2]);
        assert_eq!(data.format(), IndexFormat::U16);
        assert_eq!(&data.bytes()[0..2], &300u16.to_ne_bytes());
        assert_eq!(data.max_index(), 300);
    }

    #[test]
    fn test_empty() {
        let data = IndexData::pack(&[]);
        assert!(data.is_empty());
        assert_eq!(data.format(), IndexFormat::U8);
    }
}
