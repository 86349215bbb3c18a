//! Loading and validating ingredient photos before they are sent to the model.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageInputError {
    #[error("invalid image data URL")]
    InvalidDataUrl,
    #[error("\"{name}\" es demasiado grande (máx 10MB).")]
    TooLarge { name: String, size: u64 },
    #[error("\"{name}\" tiene un formato no admitido.")]
    UnsupportedFormat { name: String },
    #[error("Error leyendo \"{name}\".")]
    Unreadable { name: String },
}

/// An image ready to be sent inline: declared MIME type plus base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub data_base64: String,
}

impl ImageData {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data_base64: general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Splits `data:<mime>;base64,<data>` into its MIME type and payload.
    pub fn from_data_url(data_url: &str) -> Result<Self, ImageInputError> {
        let data = data_url
            .split_once(',')
            .map(|(_, data)| data)
            .filter(|data| !data.is_empty())
            .ok_or(ImageInputError::InvalidDataUrl)?;
        let mime_type = match (data_url.find(':'), data_url.find(';')) {
            (Some(colon), Some(semi)) if colon < semi => &data_url[colon + 1..semi],
            _ => "",
        };
        Ok(Self {
            mime_type: mime_type.to_string(),
            data_base64: data.to_string(),
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_base64)
    }
}

/// Maps a file extension to one of the accepted MIME types.
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRejection {
    pub path: PathBuf,
    pub error: ImageInputError,
}

/// Result of loading several images: invalid files never abort the others.
#[derive(Debug, Clone, Default)]
pub struct ImageBatch {
    pub accepted: Vec<ImageData>,
    pub rejected: Vec<ImageRejection>,
}

impl ImageBatch {
    /// User-facing messages of every rejected image, one per line.
    pub fn rejection_message(&self) -> Option<String> {
        if self.rejected.is_empty() {
            return None;
        }
        Some(
            self.rejected
                .iter()
                .map(|r| r.error.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    pub fn data_urls(&self) -> Vec<String> {
        self.accepted.iter().map(ImageData::to_data_url).collect()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub async fn load_image(path: &Path) -> Result<ImageData, ImageInputError> {
    let name = display_name(path);
    let metadata = fs::metadata(path)
        .await
        .map_err(|_| ImageInputError::Unreadable { name: name.clone() })?;
    if metadata.len() > MAX_IMAGE_BYTES {
        return Err(ImageInputError::TooLarge {
            name,
            size: metadata.len(),
        });
    }
    let mime_type = mime_type_for_path(path)
        .filter(|mime| ACCEPTED_MIME_TYPES.contains(mime))
        .ok_or_else(|| ImageInputError::UnsupportedFormat { name: name.clone() })?;
    let bytes = fs::read(path)
        .await
        .map_err(|_| ImageInputError::Unreadable { name })?;
    debug!(path = %path.display(), bytes = bytes.len(), mime_type, "loaded image");
    Ok(ImageData::from_bytes(mime_type, &bytes))
}

pub async fn load_images<P: AsRef<Path>>(paths: &[P]) -> ImageBatch {
    let mut batch = ImageBatch::default();
    for path in paths {
        let path = path.as_ref();
        match load_image(path).await {
            Ok(image) => batch.accepted.push(image),
            Err(error) => {
                warn!(path = %path.display(), %error, "rejected image");
                batch.rejected.push(ImageRejection {
                    path: path.to_path_buf(),
                    error,
                });
            }
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn data_url_round_trip_fields() {
        let image = ImageData::from_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data_base64, "iVBORw0KGgo=");
        assert_eq!(image.to_data_url(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[test]
    fn data_url_without_payload_is_invalid() {
        assert_eq!(
            ImageData::from_data_url("data:image/png;base64,"),
            Err(ImageInputError::InvalidDataUrl)
        );
        assert_eq!(
            ImageData::from_data_url("not a data url"),
            Err(ImageInputError::InvalidDataUrl)
        );
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_type_for_path(Path::new("a/b/fridge.JPG")), Some("image/jpeg"));
        assert_eq!(mime_type_for_path(Path::new("pantry.webp")), Some("image/webp"));
        assert_eq!(mime_type_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_type_for_path(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn batch_keeps_valid_images_when_others_fail() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("fridge.png");
        std::fs::File::create(&good)
            .unwrap()
            .write_all(&[0x89, b'P', b'N', b'G'])
            .unwrap();
        let wrong_type = dir.path().join("list.txt");
        std::fs::write(&wrong_type, b"tomates").unwrap();
        let missing = dir.path().join("missing.jpg");

        let batch = load_images(&[good, wrong_type, missing]).await;
        assert_eq!(batch.accepted.len(), 1);
        assert_eq!(batch.accepted[0].mime_type, "image/png");
        assert_eq!(batch.rejected.len(), 2);
        let message = batch.rejection_message().unwrap();
        assert!(message.contains("\"list.txt\" tiene un formato no admitido."));
        assert!(message.contains("Error leyendo \"missing.jpg\"."));

        let copy = batch.clone();
        assert_eq!(copy.rejected, batch.rejected);
        assert_eq!(copy.rejection_message(), batch.rejection_message());
    }

    #[tokio::test]
    async fn oversized_image_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("huge.jpg");
        let file = std::fs::File::create(&big).unwrap();
        file.set_len(MAX_IMAGE_BYTES + 1).unwrap();

        let err = load_image(&big).await.unwrap_err();
        assert!(matches!(err, ImageInputError::TooLarge { .. }));
        assert_eq!(err.to_string(), "\"huge.jpg\" es demasiado grande (máx 10MB).");
    }
}
