pub mod fill;
pub mod mask;

pub use fill::inpaint;
pub use mask::{build_mask, dilate, threshold_mask, OverlayMask};
