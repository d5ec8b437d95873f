//! Batch Transformer
//!
//! Optional resize and metadata stripping over a list of staged files.
//! Non-image files pass through byte-for-byte. One undecodable image marks
//! only its own result as failed.

mod batch;
pub mod image_ops;
pub mod types;

pub use batch::BatchTransformer;
pub use image_ops::{is_image, output_name, JPEG_QUALITY};
pub use types::*;
