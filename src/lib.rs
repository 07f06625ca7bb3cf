//! # geocodec
//!
//! Streaming interchange of point clouds and meshes through PLY and OBJ files.
//!
//! This is the umbrella crate that re-exports the data model and the codecs.
//! Use the individual crates for more granular control over dependencies.
//!
//! ## Features
//!
//! - **Core**: point clouds, scalar fields, meshes, materials, global shift
//! - **I/O**: schema-probing PLY decoder/encoder, OBJ/MTL decoder/encoder
//!
//! ## Quick Start
//!
//! ```no_run
//! use geocodec::prelude::*;
//!
//! let loaded = read_entity("scan.ply").expect("load failed");
//! for warning in loaded.warnings.iter() {
//!     println!("warning: {}", warning);
//! }
//! println!("{} points", loaded.entity.cloud().len());
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: enables `io`
//! - `io`: file format support
//! - `double-precision`: store coordinates as `f64`

// Re-export core functionality
pub use geocodec_core::*;

#[cfg(feature = "io")]
pub use geocodec_io as io;

/// Convenient imports for common use cases
pub mod prelude {
    pub use geocodec_core::*;

    #[cfg(feature = "io")]
    pub use geocodec_io::*;
}
