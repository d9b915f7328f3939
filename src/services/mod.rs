pub mod archive;
pub mod inpaint;
pub mod strategy;

pub use archive::build_archive;
pub use strategy::{LocalInpaintStrategy, RemoteInferenceStrategy, RemovalStrategy};
