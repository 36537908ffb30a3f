// src/services/image_processor.rs
use crate::errors::MailSketchError;
use crate::models::{
    DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, Element, Layout, LayoutDescription, ReferenceImage,
};
use image::ImageFormat;
use log::debug;
use serde::Serialize;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: String,
    pub media_type: String,
    pub size: usize,
}

pub struct ImageProcessor {
    max_upload_bytes: usize,
}

impl ImageProcessor {
    pub fn new(max_upload_bytes: usize) -> Self {
        Self { max_upload_bytes }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Sniffs format and dimensions from the header only; the pixels are never decoded.
    pub fn read_metadata(&self, data: &[u8]) -> Result<ImageMetadata, MailSketchError> {
        if data.len() > self.max_upload_bytes {
            return Err(MailSketchError::PayloadTooLarge {
                limit: self.max_upload_bytes,
            });
        }
        if data.is_empty() {
            return Err(MailSketchError::Validation(
                "Uploaded image is empty".to_string(),
            ));
        }

        let format = image::guess_format(data).map_err(|_| {
            MailSketchError::UnsupportedMedia("unrecognised image data".to_string())
        })?;
        let (name, media_type) = match format {
            ImageFormat::Png => ("png", "image/png"),
            ImageFormat::Jpeg => ("jpeg", "image/jpeg"),
            ImageFormat::Gif => ("gif", "image/gif"),
            ImageFormat::WebP => ("webp", "image/webp"),
            other => {
                return Err(MailSketchError::UnsupportedMedia(format!(
                    "{:?} images are not supported; use PNG, JPEG, GIF or WebP",
                    other
                )));
            }
        };

        let dimensions =
            match image::io::Reader::with_format(Cursor::new(data), format).into_dimensions() {
                Ok(dimensions) => Some(dimensions),
                Err(e) => {
                    debug!("Could not read {} dimensions: {}", name, e);
                    None
                }
            };

        Ok(ImageMetadata {
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            format: name.to_string(),
            media_type: media_type.to_string(),
            size: data.len(),
        })
    }

    /// One frame the size of the image holding a single full-bleed image element.
    /// The bytes ride along for providers that accept a reference image.
    pub fn layout_from_image(
        &self,
        filename: &str,
        metadata: &ImageMetadata,
        data: Vec<u8>,
    ) -> LayoutDescription {
        let width = metadata.width.filter(|w| *w > 0).unwrap_or(DEFAULT_FRAME_WIDTH);
        let height = metadata.height.filter(|h| *h > 0).unwrap_or(DEFAULT_FRAME_HEIGHT);
        let stem = filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or(filename);

        let mut description = LayoutDescription::new(
            filename,
            Layout {
                name: stem.to_string(),
                width,
                height,
                background_color: None,
                elements: vec![
                    Element::image()
                        .with_bounds(0.0, 0.0, width as f32, height as f32)
                        .with_name(filename),
                ],
            },
        );
        description.reference_image = Some(ReferenceImage {
            media_type: metadata.media_type.clone(),
            data,
        });
        description
    }
}
