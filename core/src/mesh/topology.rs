//! Primitive topologies and draw chunking.

/// Primitive topology describing how indices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Each index is a separate point.
    Points,
    /// Every two indices form a line.
    Lines,
    /// Indices form a connected strip of lines.
    LineStrip,
    /// Like [`LineStrip`](Self::LineStrip), closed back to the first index.
    LineLoop,
    /// Every three indices form a triangle.
    #[default]
    Triangles,
    /// Indices form a connected strip of triangles.
    TriangleStrip,
    /// Indices form a fan of triangles around the first index.
    TriangleFan,
    /// Fixed-size groups of control points consumed by tessellation stages.
    Patches {
        /// Number of control points per patch.
        vertices_per_patch: u32,
    },
}

/// Broad topology class, used for minimum-count validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyFamily {
    /// Point lists.
    Point,
    /// Line lists, strips and loops.
    Line,
    /// Triangle lists, strips and fans.
    Triangle,
    /// Tessellation patches.
    Patch,
}

impl PrimitiveTopology {
    /// Get the topology family.
    pub fn family(&self) -> TopologyFamily {
        match self {
            Self::Points => TopologyFamily::Point,
            Self::Lines | Self::LineStrip | Self::LineLoop => TopologyFamily::Line,
            Self::Triangles | Self::TriangleStrip | Self::TriangleFan => TopologyFamily::Triangle,
            Self::Patches { .. } => TopologyFamily::Patch,
        }
    }

    /// Minimum number of indices a buffer of this topology must hold.
    pub fn min_index_count(&self) -> u32 {
        match self.family() {
            TopologyFamily::Triangle => 3,
            TopologyFamily::Line => 2,
            TopologyFamily::Point | TopologyFamily::Patch => 0,
        }
    }

    /// Control points per patch, for patch topologies.
    pub fn vertices_per_patch(&self) -> Option<u32> {
        match self {
            Self::Patches { vertices_per_patch } => Some(*vertices_per_patch),
            _ => None,
        }
    }

    /// Check if this is a tessellation patch topology.
    pub fn is_patches(&self) -> bool {
        matches!(self, Self::Patches { .. })
    }

    /// Largest index count a single patch draw may cover.
    ///
    /// This is `floor(max_patch_vertices / vertices_per_patch) * vertices_per_patch`,
    /// so a chunk never splits a patch. Returns `None` for non-patch topologies
    /// and for degenerate patch sizes (zero, or larger than the device limit).
    pub fn patch_stride(&self, max_patch_vertices: u32) -> Option<u32> {
        let per_patch = self.vertices_per_patch()?;
        if per_patch == 0 || per_patch > max_patch_vertices {
            return None;
        }
        Some((max_patch_vertices / per_patch) * per_patch)
    }

    /// Number of primitives produced by `count` indices.
    pub fn primitive_count(&self, count: u32) -> u32 {
        match self {
            Self::Points => count,
            Self::Lines => count / 2,
            Self::LineStrip => count.saturating_sub(1),
            Self::LineLoop => {
                if count < 2 {
                    0
                } else {
                    count
                }
            }
            Self::Triangles => count / 3,
            Self::TriangleStrip | Self::TriangleFan => count.saturating_sub(2),
            Self::Patches { vertices_per_patch } => {
                count.checked_div(*vertices_per_patch).unwrap_or(0)
            }
        }
    }
}

/// A contiguous run of indices (or vertices) covered by one native draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawRange {
    /// First index of the run.
    pub first: u32,
    /// Number of indices in the run.
    pub count: u32,
}

impl DrawRange {
    /// End of the run (exclusive).
    pub fn end(&self) -> u32 {
        self.first + self.count
    }
}

/// Iterator splitting one logical draw into native draws of bounded size.
///
/// With no stride, a non-empty draw yields a single range.
#[derive(Debug, Clone)]
pub struct DrawChunks {
    next: u32,
    end: u32,
    stride: Option<u32>,
}

impl DrawChunks {
    /// Split `count` items starting at `first` into runs of at most `stride`.
    pub fn new(first: u32, count: u32, stride: Option<u32>) -> Self {
        Self {
            next: first,
            end: first + count,
            stride: stride.filter(|&s| s > 0),
        }
    }
}

impl Iterator for DrawChunks {
    type Item = DrawRange;

    fn next(&mut self) -> Option<DrawRange> {
        if self.next >= self.end {
            return None;
        }
        let remaining = self.end - self.next;
        let count = match self.stride {
            Some(stride) => remaining.min(stride),
            None => remaining,
        };
        let range = DrawRange {
            first: self.next,
            count,
        };
        self.next += count;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next);
        let chunks = match self.stride {
            Some(stride) => remaining.div_ceil(stride),
            None => u32::from(remaining > 0),
        } as usize;
        (chunks, Some(chunks))
    }
}

impl ExactSizeIterator for DrawChunks {}
