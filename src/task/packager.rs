//! Result packaging: one image as-is, several as a zip archive.
//!
//! Packaging runs once, when the last item of a task finishes. The
//! [`Artifact`] is stored on the task and shared by every download, so
//! repeated downloads return identical bytes (and the same ETag).

use super::TaskError;
use crate::imaging::EncodedImage;
use crate::naming::{disambiguate, output_filename};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const ZIP_CONTENT_TYPE: &str = "application/zip";
pub const ZIP_FILENAME: &str = "resized_images.zip";

/// A downloadable task result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Bytes,
    pub content_type: String,
    /// Suggested download name.
    pub filename: String,
    /// SHA-256 of `bytes`, lowercase hex.
    pub etag: String,
}

/// One finished item handed to the packager.
#[derive(Debug, Clone, Copy)]
pub struct PackageEntry<'a> {
    /// The name the image was uploaded under.
    pub original_filename: &'a str,
    pub image: &'a EncodedImage,
}

/// Bundle finished items into a single artifact.
///
/// Exactly one entry is returned raw with its own content type; more are
/// written, in order, to a deflate-compressed zip.
pub fn package(entries: &[PackageEntry<'_>]) -> Result<Artifact, TaskError> {
    match entries {
        [] => Err(TaskError::Packaging("no finished images to package".into())),
        [single] => {
            let image = single.image;
            Ok(Artifact {
                etag: digest(&image.bytes),
                bytes: image.bytes.clone(),
                content_type: image.format.content_type().to_string(),
                filename: output_filename(single.original_filename, image.format.extension()),
            })
        }
        many => {
            let bytes = Bytes::from(write_zip(many)?);
            Ok(Artifact {
                etag: digest(&bytes),
                bytes,
                content_type: ZIP_CONTENT_TYPE.to_string(),
                filename: ZIP_FILENAME.to_string(),
            })
        }
    }
}

fn write_zip(entries: &[PackageEntry<'_>]) -> Result<Vec<u8>, TaskError> {
    let names = disambiguate(
        entries
            .iter()
            .map(|e| output_filename(e.original_filename, e.image.format.extension()))
            .collect(),
    );

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (entry, name) in entries.iter().zip(names) {
        zip.start_file(name, options)?;
        zip.write_all(&entry.image.bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
