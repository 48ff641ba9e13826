//! Request validation for the generation endpoint, applied after
//! deserialization. Shape errors are serde's job; everything here is a
//! limit or content check.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{GenerateBookRequest, ImageUpload};

const MAX_ANSWERS: usize = 50;
const MAX_ANSWER_CHARS: usize = 5000;
const MAX_IMAGES: usize = 8;
const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_TOTAL_IMAGE_BYTES: u64 = 40 * 1024 * 1024;
const MIN_DIMENSION: u32 = 50;
const MAX_DIMENSION: u32 = 8000;
const MAX_ASPECT_RATIO: f64 = 10.0;
const MAX_FILENAME_CHARS: usize = 255;

const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];

static SCRIPT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script>").unwrap());
static XSS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(javascript:|data:text/html|vbscript:|onload=|onerror=)").unwrap()
});
static FILENAME_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"|?*\x00-\x1f]"#).unwrap());
static DATA_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:image/(jpeg|jpg|png|webp);base64,(.+)$").unwrap());

pub fn validate_generate_request(request: &GenerateBookRequest) -> Result<()> {
    if request.answers.is_empty() {
        return Err(Error::Validation("at least one answer is required".into()));
    }
    if request.answers.len() > MAX_ANSWERS {
        return Err(Error::Validation(format!(
            "too many answers (maximum {MAX_ANSWERS})"
        )));
    }
    for (key, value) in &request.answers {
        if key.trim().is_empty() {
            return Err(Error::Validation("question id cannot be empty".into()));
        }
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation(format!("answer for '{key}' is empty")));
        }
        if trimmed.chars().count() > MAX_ANSWER_CHARS {
            return Err(Error::Validation(format!(
                "answer for '{key}' exceeds {MAX_ANSWER_CHARS} characters"
            )));
        }
        if SCRIPT_TAG_RE.is_match(trimmed) || XSS_RE.is_match(trimmed) {
            return Err(Error::Validation(format!(
                "answer for '{key}' contains disallowed content"
            )));
        }
    }

    if request.images.len() > MAX_IMAGES {
        return Err(Error::Validation(format!(
            "too many images (maximum {MAX_IMAGES})"
        )));
    }
    let total_bytes: u64 = request.images.iter().map(|image| image.size).sum();
    if total_bytes > MAX_TOTAL_IMAGE_BYTES {
        return Err(Error::Validation(
            "combined image size exceeds 40MB".into(),
        ));
    }
    for image in &request.images {
        validate_image(image)?;
    }

    Ok(())
}

fn validate_image(image: &ImageUpload) -> Result<()> {
    if image.name.is_empty() || image.name.chars().count() > MAX_FILENAME_CHARS {
        return Err(Error::Validation("invalid image filename length".into()));
    }
    if FILENAME_CHARS_RE.is_match(&image.name) {
        return Err(Error::Validation(format!(
            "image filename '{}' contains disallowed characters",
            image.name
        )));
    }
    let lower = image.name.to_lowercase();
    if !ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Err(Error::Validation(format!(
            "image '{}' has an unsupported extension",
            image.name
        )));
    }

    if image.size == 0 || image.size > MAX_IMAGE_BYTES {
        return Err(Error::Validation(format!(
            "image '{}' must be between 1 byte and 10MB",
            image.name
        )));
    }

    let Some(caps) = DATA_URI_RE.captures(&image.base64) else {
        return Err(Error::Validation(format!(
            "image '{}' is not a supported base64 data URI",
            image.name
        )));
    };
    // Rough decoded size from the payload length; enough to reject payloads
    // that lied about `size`.
    let payload_len = caps.get(2).map(|m| m.as_str().len()).unwrap_or(0);
    if payload_len / 4 * 3 > MAX_IMAGE_BYTES as usize {
        return Err(Error::Validation(format!(
            "image '{}' exceeds 10MB after decoding",
            image.name
        )));
    }

    let (width, height) = (image.dimensions.width, image.dimensions.height);
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&width)
        || !(MIN_DIMENSION..=MAX_DIMENSION).contains(&height)
    {
        return Err(Error::Validation(format!(
            "image '{}' dimensions must be between {MIN_DIMENSION} and {MAX_DIMENSION} pixels",
            image.name
        )));
    }
    let aspect = f64::from(width.max(height)) / f64::from(width.min(height));
    if aspect > MAX_ASPECT_RATIO {
        return Err(Error::Validation(format!(
            "image '{}' has an unsuitable aspect ratio",
            image.name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookCategory, ImageDimensions};
    use std::collections::HashMap;

    fn valid_image() -> ImageUpload {
        ImageUpload {
            name: "wedding.jpg".to_string(),
            base64: "data:image/jpeg;base64,/9j/4AAQSkZJRg==".to_string(),
            size: 2048,
            dimensions: ImageDimensions {
                width: 1200,
                height: 800,
            },
            compressed: true,
        }
    }

    fn valid_request() -> GenerateBookRequest {
        let mut answers = HashMap::new();
        answers.insert(
            "how_met".to_string(),
            "We met at a small bakery on a rainy Tuesday.".to_string(),
        );
        GenerateBookRequest {
            book_type: BookCategory::Romantic,
            answers,
            images: vec![valid_image()],
        }
    }

    #[test]
    fn a_well_formed_request_passes() {
        assert!(validate_generate_request(&valid_request()).is_ok());
    }

    #[test]
    fn empty_answers_are_rejected() {
        let mut request = valid_request();
        request.answers.clear();
        assert!(validate_generate_request(&request).is_err());
    }

    #[test]
    fn script_content_in_answers_is_rejected() {
        let mut request = valid_request();
        request.answers.insert(
            "story".to_string(),
            "nice story <script>alert(1)</script> indeed".to_string(),
        );
        assert!(validate_generate_request(&request).is_err());

        let mut request = valid_request();
        request
            .answers
            .insert("story".to_string(), "click javascript:alert(1)".to_string());
        assert!(validate_generate_request(&request).is_err());
    }

    #[test]
    fn overlong_answers_are_rejected() {
        let mut request = valid_request();
        request
            .answers
            .insert("story".to_string(), "a".repeat(MAX_ANSWER_CHARS + 1));
        assert!(validate_generate_request(&request).is_err());
    }

    #[test]
    fn too_many_images_are_rejected() {
        let mut request = valid_request();
        request.images = (0..9).map(|_| valid_image()).collect();
        assert!(validate_generate_request(&request).is_err());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let mut image = valid_image();
        image.name = "archive.zip".to_string();
        assert!(validate_image(&image).is_err());
    }

    #[test]
    fn non_data_uri_payload_is_rejected() {
        let mut image = valid_image();
        image.base64 = "/9j/4AAQSkZJRg==".to_string();
        assert!(validate_image(&image).is_err());

        let mut image = valid_image();
        image.base64 = "data:image/gif;base64,R0lGOD".to_string();
        assert!(validate_image(&image).is_err());
    }

    #[test]
    fn extreme_dimensions_are_rejected() {
        let mut image = valid_image();
        image.dimensions = ImageDimensions {
            width: 20,
            height: 800,
        };
        assert!(validate_image(&image).is_err());

        let mut image = valid_image();
        image.dimensions = ImageDimensions {
            width: 8000,
            height: 400,
        };
        assert!(validate_image(&image).is_err());
    }

    #[test]
    fn oversized_images_are_rejected() {
        let mut image = valid_image();
        image.size = MAX_IMAGE_BYTES + 1;
        assert!(validate_image(&image).is_err());

        let mut request = valid_request();
        let mut big = valid_image();
        big.size = MAX_IMAGE_BYTES; // 10MB each, five of them
        request.images = (0..5).map(|_| big.clone()).collect();
        assert!(validate_generate_request(&request).is_err());
    }
}
