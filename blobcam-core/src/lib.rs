pub mod admin;
pub mod frame;
pub mod morph;
pub mod pipeline;
pub mod regions;
pub mod segment;

// Re-export the top-level error type so callers only need `blobcam_core::Error`
pub use anyhow::Error;
pub use anyhow::Result;
