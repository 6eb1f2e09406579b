//! Image intake and image records.

mod intake;
mod types;

pub use intake::decode_file;
pub use types::{download_file_name, GenerationResult, ImageFormat, ImageRecord};
