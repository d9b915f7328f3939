pub mod image_ops;

pub use image_ops::{decode_rgb, encode_png, run_blocking};
