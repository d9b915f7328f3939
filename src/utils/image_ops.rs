use image::{ImageFormat, RgbImage};
use std::io::Cursor;

use crate::core::errors::{ProcessError, ProcessResult};

/// Decode encoded bytes (PNG/JPEG/WEBP) into an owned RGB buffer.
///
/// Decoding fails closed: corrupt or unsupported bytes yield a typed decode
/// error, never a partially-initialized buffer.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Encode an RGB buffer as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut png_bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}

/// Run CPU-intensive image work on the blocking pool.
///
/// Decode, mask, fill, and encode are all synchronous and can take tens of
/// milliseconds on large images; running them inline would stall the runtime.
pub async fn run_blocking<T, F>(f: F) -> ProcessResult<T>
where
    F: FnOnce() -> ProcessResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        // The closure panicked; surface the original panic.
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}

/// Map an encode failure into the per-item error taxonomy.
pub fn encode_png_for_item(img: &RgbImage) -> ProcessResult<Vec<u8>> {
    encode_png(img).map_err(ProcessError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn decode_round_trips_png() {
        let img = RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]));
        let bytes = encode_png(&img).unwrap();
        let decoded = decode_rgb(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.as_raw(), img.as_raw());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_rgb(b"definitely not an image").is_err());
    }

    #[tokio::test]
    async fn run_blocking_propagates_results() {
        let ok: ProcessResult<u32> = run_blocking(|| Ok(7)).await;
        assert_eq!(ok.unwrap(), 7);
    }
}
