//! Image inspection for uploads.

use domain::models::image::UploadRejection;
use image::ImageReader;
use std::io::Cursor;

/// Reads width and height from the image header without decoding pixels.
pub fn probe_dimensions(data: &[u8]) -> Result<(i32, i32), UploadRejection> {
    let (width, height) = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|_| UploadRejection::Unreadable)?
        .into_dimensions()
        .map_err(|_| UploadRejection::Unreadable)?;

    match (i32::try_from(width), i32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(UploadRejection::Unreadable),
    }
}
