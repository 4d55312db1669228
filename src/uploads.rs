/// Image uploads
///
/// Multipart bodies are read into memory, bounded per part and by the file
/// fields a route accepts, then resized and written to the public image
/// folder on the blocking pool.

use actix_multipart::Multipart;
use actix_web::web;
use futures::TryStreamExt;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, ColorType, DynamicImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::AppError;

const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
const MAX_FIELD_BYTES: usize = 10 * 1024;
const MAX_TEXT_FIELDS: usize = 20;

const USER_PHOTO_SIZE: u32 = 500;
const TOUR_IMAGE_WIDTH: u32 = 2000;
const TOUR_IMAGE_HEIGHT: u32 = 1333;
const JPEG_QUALITY: u8 = 90;
pub const MAX_TOUR_IMAGES: usize = 3;

pub const NOT_AN_IMAGE: &str = "Not an image! Please upload only images.";

/// File fields accepted by `PATCH /updateMe`, with their maximum counts
pub const USER_PHOTO_FIELDS: &[(&str, usize)] = &[("photo", 1)];
/// File fields accepted by `PATCH /tours/{id}/images`
pub const TOUR_IMAGE_FIELDS: &[(&str, usize)] = &[("imageCover", 1), ("images", MAX_TOUR_IMAGES)];

/// One uploaded file part
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub bytes: Vec<u8>,
}

/// Text fields and image parts of a multipart body
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl MultipartForm {
    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    pub fn files_named(&self, field: &str) -> impl Iterator<Item = &UploadedFile> {
        let field = field.to_string();
        self.files.iter().filter(move |f| f.field == field)
    }
}

/// Read a multipart body; every file part must be an image.
///
/// `accepted` lists the file fields and how many parts each may carry. A
/// part beyond that is rejected before its content is read.
pub async fn read_multipart(
    mut payload: Multipart,
    accepted: &[(&str, usize)],
) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();
    let mut text_fields = 0;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let is_file = disposition.get_filename().is_some();

        if is_file {
            let max = accepted
                .iter()
                .find(|(accepted_name, _)| *accepted_name == name)
                .map(|(_, max)| *max)
                .ok_or_else(|| AppError::BadRequest(format!("Unexpected field: {}", name)))?;
            if form.files_named(&name).count() >= max {
                return Err(AppError::BadRequest(format!(
                    "Too many files for field {}",
                    name
                )));
            }

            let is_image = field
                .content_type()
                .map(|mime| mime.type_() == "image")
                .unwrap_or(false);
            if !is_image {
                tracing::warn!(field = %name, "Rejected non-image upload");
                return Err(AppError::BadRequest(NOT_AN_IMAGE.to_string()));
            }
        } else {
            text_fields += 1;
            if text_fields > MAX_TEXT_FIELDS {
                return Err(AppError::BadRequest("Too many form fields".to_string()));
            }
        }

        let limit = if is_file { MAX_FILE_BYTES } else { MAX_FIELD_BYTES };
        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            if bytes.len() + chunk.len() > limit {
                return Err(AppError::BadRequest(format!(
                    "Field {} is too large",
                    name
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if is_file {
            form.files.push(UploadedFile { field: name, bytes });
        } else {
            let value = String::from_utf8(bytes)
                .map_err(|_| AppError::BadRequest(format!("Field {} is not valid UTF-8", name)))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    image::load_from_memory(bytes).map_err(|_| AppError::BadRequest(NOT_AN_IMAGE.to_string()))
}

/// Crop to fill `width`x`height` and encode as JPEG
fn to_jpeg(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AppError> {
    let img = decode(bytes)?;
    let resized = img.resize_to_fill(width, height, FilterType::Lanczos3).to_rgb8();

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode(&resized, resized.width(), resized.height(), ColorType::Rgb8)
        .map_err(|e| AppError::Internal(format!("Failed to encode image: {}", e)))?;
    Ok(buffer)
}

fn write_image(dir: &Path, filename: &str, data: &[u8]) -> Result<(), AppError> {
    std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::write(dir.join(filename), data))
        .map_err(|e| AppError::Internal(format!("Failed to store {}: {}", filename, e)))
}

pub fn user_photo_filename(user_id: Uuid, timestamp: i64) -> String {
    format!("user-{}-{}.jpeg", user_id, timestamp)
}

pub fn tour_cover_filename(tour_id: Uuid, timestamp: i64) -> String {
    format!("tour-{}-{}-cover.jpeg", tour_id, timestamp)
}

pub fn tour_image_filename(tour_id: Uuid, timestamp: i64, index: usize) -> String {
    format!("tour-{}-{}-{}.jpeg", tour_id, timestamp, index)
}

/// Resize a user photo to 500x500 and store it under `{root}/users`
pub async fn save_user_photo(root: &str, user_id: Uuid, bytes: Vec<u8>) -> Result<String, AppError> {
    let dir = PathBuf::from(root).join("users");
    let filename = user_photo_filename(user_id, chrono::Utc::now().timestamp_millis());
    let name = filename.clone();

    web::block(move || {
        let jpeg = to_jpeg(&bytes, USER_PHOTO_SIZE, USER_PHOTO_SIZE)?;
        write_image(&dir, &name, &jpeg)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Image processing was cancelled: {}", e)))??;

    tracing::info!(%user_id, filename = %filename, "User photo stored");
    Ok(filename)
}

/// Stored tour image names
#[derive(Debug, Default)]
pub struct TourImages {
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
}

/// Resize tour images to 2000x1333 and store them under `{root}/tours`
pub async fn save_tour_images(
    root: &str,
    tour_id: Uuid,
    cover: Option<Vec<u8>>,
    images: Vec<Vec<u8>>,
) -> Result<TourImages, AppError> {
    if images.len() > MAX_TOUR_IMAGES {
        return Err(AppError::BadRequest(format!(
            "A tour can have at most {} images",
            MAX_TOUR_IMAGES
        )));
    }

    let dir = PathBuf::from(root).join("tours");
    let timestamp = chrono::Utc::now().timestamp_millis();

    let stored = web::block(move || -> Result<TourImages, AppError> {
        let mut stored = TourImages::default();

        if let Some(cover) = cover {
            let filename = tour_cover_filename(tour_id, timestamp);
            let jpeg = to_jpeg(&cover, TOUR_IMAGE_WIDTH, TOUR_IMAGE_HEIGHT)?;
            write_image(&dir, &filename, &jpeg)?;
            stored.image_cover = Some(filename);
        }

        if !images.is_empty() {
            let mut names = Vec::with_capacity(images.len());
            for (i, bytes) in images.iter().enumerate() {
                let filename = tour_image_filename(tour_id, timestamp, i + 1);
                let jpeg = to_jpeg(bytes, TOUR_IMAGE_WIDTH, TOUR_IMAGE_HEIGHT)?;
                write_image(&dir, &filename, &jpeg)?;
                names.push(filename);
            }
            stored.images = Some(names);
        }

        Ok(stored)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Image processing was cancelled: {}", e)))??;

    tracing::info!(%tour_id, "Tour images stored");
    Ok(stored)
}
