//! Thumbnail rendering to PNG data URIs

use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::error::{Result, SightlineError};
use crate::types::Thumbnail;

/// Prefix of every rendered thumbnail
pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Render a snapshot into a transportable thumbnail
///
/// Images larger than `max_width` x `max_height` are downscaled to fit.
/// Empty images are rejected.
pub fn render(image: &RgbaImage, max_width: u32, max_height: u32) -> Result<Thumbnail> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SightlineError::thumbnail("snapshot is empty"));
    }
    if max_width == 0 || max_height == 0 {
        return Err(SightlineError::thumbnail("thumbnail size cannot be zero"));
    }

    let dynamic = DynamicImage::ImageRgba8(image.clone());
    let scaled = if width > max_width || height > max_height {
        // resize() keeps the aspect ratio inside the box
        dynamic.resize(max_width, max_height, FilterType::Triangle)
    } else {
        dynamic
    };

    let mut png = Vec::new();
    scaled.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
    Ok(Thumbnail {
        data_uri: format!("{}{}", DATA_URI_PREFIX, encoded),
        width: scaled.width(),
        height: scaled.height(),
    })
}
