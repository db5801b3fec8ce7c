//! Profiling support via Tracy.
//!
//! Optional instrumentation using the [Tracy profiler](https://github.com/wolfpld/tracy),
//! enabled through the `profiling` Cargo feature. Without the feature every macro
//! expands to nothing (or only evaluates its argument), so call sites can stay in
//! hot paths such as uniform commits and layout derivation.
//!
//! # Usage
//!
//! ```ignore
//! use tessera_core::profiling::{profile_scope, profile_plot};
//!
//! fn commit_blocks() {
//!     profile_scope!("commit_blocks");
//!     let uploaded = 256;
//!     profile_plot!("uniform_bytes_uploaded", uploaded);
//! }
//! ```

// Re-export tracy-client types when profiling is enabled
#[cfg(feature = "profiling")]
pub use tracy_client::{self, plot as tracy_plot, span, Client};

/// Create a profiling span for the current scope.
///
/// The span ends when the enclosing scope exits.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Plot a value over time in Tracy, e.g. bytes uploaded per commit.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

// Re-export macros at module level
pub use profile_plot;
pub use profile_scope;

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile() {
        profile_scope!("test_scope");
        profile_plot!("test_value", 42u32);
    }
}
