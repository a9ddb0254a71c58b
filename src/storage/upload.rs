use std::io::Cursor;

use bytes::Bytes;
use image::{ImageFormat, ImageReader};

use crate::error::{AppError, AppResult};

pub const INVALID_IMAGE: &str = "Failed to create post. Image is invalid.";

/// A file part received with a post form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(file_name: Option<String>, content_type: Option<String>, bytes: Bytes) -> Self {
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Sniff the content and read its header. Returns the canonical file
    /// extension for the detected format; the client-supplied name and
    /// content type are not trusted.
    pub fn extension(&self) -> AppResult<&'static str> {
        if self.bytes.is_empty() {
            return Err(AppError::Validation(INVALID_IMAGE.into()));
        }

        let reader = ImageReader::new(Cursor::new(&self.bytes[..]))
            .with_guessed_format()
            .map_err(|_| AppError::Validation(INVALID_IMAGE.into()))?;

        let extension = match reader.format() {
            Some(ImageFormat::Jpeg) => "jpg",
            Some(ImageFormat::Png) => "png",
            Some(ImageFormat::Gif) => "gif",
            Some(ImageFormat::Bmp) => "bmp",
            Some(ImageFormat::WebP) => "webp",
            other => {
                tracing::debug!(format = ?other, file_name = ?self.file_name, "Unsupported upload");
                return Err(AppError::Validation(INVALID_IMAGE.into()));
            }
        };

        // A truncated or forged header fails here.
        reader.into_dimensions().map_err(|e| {
            tracing::debug!(error = %e, file_name = ?self.file_name, "Unreadable image header");
            AppError::Validation(INVALID_IMAGE.into())
        })?;

        Ok(extension)
    }
}
