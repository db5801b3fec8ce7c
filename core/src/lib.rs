//! # Tessera Core
//!
//! CPU-side building blocks for the Tessera GPU resource layer.
//!
//! Nothing in this crate talks to a driver. It provides:
//! - [`mesh`] - primitive topologies, index width selection, draw chunking for
//!   patch topologies, declarative vertex schemas and the packed layout deriver
//! - [`profiling`] - optional Tracy instrumentation macros

pub mod mesh;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
