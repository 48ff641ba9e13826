use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Thematic type of a generated book. Drives the default title, dedication,
/// default chapter titles and the target chapter count used by the
/// paragraph-grouping fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookCategory {
    Romantic,
    Family,
    Friendship,
    Child,
    Travel,
    /// Any unrecognized category tag.
    #[serde(other)]
    Other,
}

/// Static per-category defaults. Kept in one table so the whole set is
/// reviewable at a glance.
pub struct CategoryDefaults {
    pub title: &'static str,
    pub dedication: &'static str,
    pub target_chapters: usize,
    /// Ordered default chapter titles, longer than `target_chapters` as a
    /// safety margin. Position N is used for chapter N+1 when the generated
    /// text carries no usable heading.
    pub chapter_titles: &'static [&'static str],
}

static ROMANTIC: CategoryDefaults = CategoryDefaults {
    title: "Our Love Story",
    dedication: "To my one and only love",
    target_chapters: 6,
    chapter_titles: &[
        "Meeting of Two Hearts",
        "First Steps of Love",
        "Mosaic of Happy Moments",
        "In the Embrace of Everyday Life",
        "Test of Strength",
        "Dreams for Two",
        "Eternal Love",
    ],
};

static FAMILY: CategoryDefaults = CategoryDefaults {
    title: "Family Chronicle",
    dedication: "To my dear family, the most precious thing in life",
    target_chapters: 5,
    chapter_titles: &[
        "Roots and Beginnings",
        "A Home Where Love Lives",
        "Kaleidoscope of Memories",
        "The Strength of Unity",
        "Wisdom of Generations",
        "Gratitude and Dreams",
    ],
};

static FRIENDSHIP: CategoryDefaults = CategoryDefaults {
    title: "Book of Our Friendship",
    dedication: "To my most loyal and dearest friend",
    target_chapters: 5,
    chapter_titles: &[
        "How Our Friendship Began",
        "Adventures and Discoveries",
        "Laughter Through the Years",
        "The Power of True Friendship",
        "Friends Forever",
    ],
};

static CHILD: CategoryDefaults = CategoryDefaults {
    title: "My Little Angel",
    dedication: "To my most precious treasure in the whole world",
    target_chapters: 4,
    chapter_titles: &[
        "Waiting for a Miracle",
        "Little Big Discoveries",
        "The World Through a Child's Eyes",
        "Moments of Happiness",
        "A Message to the Future",
    ],
};

static TRAVEL: CategoryDefaults = CategoryDefaults {
    title: "Traveler's Diary",
    dedication: "To everyone who shared these wonderful moments with me",
    target_chapters: 5,
    chapter_titles: &[
        "The Call of the Road",
        "First Steps in a New World",
        "Diving into Adventure",
        "Trials on the Way",
        "The Road Home",
    ],
};

static OTHER: CategoryDefaults = CategoryDefaults {
    title: "Personal Book",
    dedication: "To the one who makes my life special",
    target_chapters: 5,
    chapter_titles: &[],
};

impl BookCategory {
    pub fn defaults(self) -> &'static CategoryDefaults {
        match self {
            BookCategory::Romantic => &ROMANTIC,
            BookCategory::Family => &FAMILY,
            BookCategory::Friendship => &FRIENDSHIP,
            BookCategory::Child => &CHILD,
            BookCategory::Travel => &TRAVEL,
            BookCategory::Other => &OTHER,
        }
    }
}

/// Body of `POST /api/generate-book`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBookRequest {
    pub book_type: BookCategory,
    pub answers: HashMap<String, String>,
    #[serde(default)]
    pub images: Vec<ImageUpload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    pub name: String,
    /// Data URI with the base64-encoded image bytes.
    pub base64: String,
    pub size: u64,
    pub dimensions: ImageDimensions,
    #[serde(default)]
    pub compressed: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// An uploaded image wrapped for inclusion in a generated book.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub url: String,
    pub caption: String,
    pub description: String,
    pub original_name: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// 1-based, sequential, no gaps.
    pub number: usize,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epigraph: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
}

/// Structured output of one generation request. Built once, never mutated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedBook {
    pub title: String,
    pub chapters: Vec<Chapter>,
    pub total_chapters: usize,
    /// Minutes, at 150 words per minute.
    pub estimated_read_time: usize,
    /// Whitespace-delimited tokens of the original raw text, not the sum of
    /// the cleaned chapters.
    pub word_count: usize,
    pub author: String,
    pub dedicated_to: String,
    pub book_type: BookCategory,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageAttachment>>,
}

/// Body of `POST /api/errors`, as sent by the web client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: String,
    pub stack: Option<String>,
    pub component_stack: Option<String>,
    pub timestamp: String,
    pub user_agent: String,
    pub url: String,
    pub additional_info: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_deserializes_from_lowercase_tag() {
        let category: BookCategory = serde_json::from_str("\"romantic\"").unwrap();
        assert_eq!(category, BookCategory::Romantic);
    }

    #[test]
    fn unknown_category_falls_back_to_other() {
        let category: BookCategory = serde_json::from_str("\"cookbook\"").unwrap();
        assert_eq!(category, BookCategory::Other);
        assert_eq!(category.defaults().title, "Personal Book");
    }

    #[test]
    fn default_title_lists_cover_the_target_count() {
        for category in [
            BookCategory::Romantic,
            BookCategory::Family,
            BookCategory::Friendship,
            BookCategory::Child,
            BookCategory::Travel,
        ] {
            let defaults = category.defaults();
            assert!(defaults.chapter_titles.len() >= defaults.target_chapters);
            assert!(!defaults.title.is_empty());
            assert!(!defaults.dedication.is_empty());
        }
    }

    #[test]
    fn request_accepts_missing_images_field() {
        let request: GenerateBookRequest = serde_json::from_value(serde_json::json!({
            "bookType": "family",
            "answers": { "q1": "We met in the spring of 1998." }
        }))
        .unwrap();
        assert!(request.images.is_empty());
        assert_eq!(request.book_type, BookCategory::Family);
    }
}
