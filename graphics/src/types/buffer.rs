//! Buffer targets and usage hints.

/// Binding target a buffer is bound to for uploads and draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data.
    Array,
    /// Index data. Binding this target records into the bound vertex array.
    ElementArray,
    /// Uniform block storage.
    Uniform,
}

/// Expected update frequency of a buffer's contents.
///
/// The hint is fixed once the buffer is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UsageHint {
    /// Written once, drawn many times.
    #[default]
    Static,
    /// Rewritten repeatedly, drawn many times.
    Dynamic,
    /// Rewritten for nearly every draw.
    Stream,
}
