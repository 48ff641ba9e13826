//! Turns the flat narrative text returned by the oracle into a structured
//! book: title, numbered chapters, read-time metadata and image attachments.
//!
//! The oracle is prompted to emit `НАЗВАНИЕ КНИГИ:` before the book title
//! and `ГЛАВА N:` before each chapter, but generations routinely drift from
//! that contract, so segmentation runs through an ordered chain of
//! strategies and keeps the first one that finds more than one usable
//! segment. Everything here is pure and synchronous: identical inputs
//! (including `now`) produce identical output.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{BookCategory, Chapter, GeneratedBook, ImageAttachment, ImageUpload};

/// A candidate segment is usable once its trimmed text exceeds this many
/// characters.
const MIN_SEGMENT_CHARS: usize = 100;
/// Paragraphs shorter than this are ignored by the grouping fallback.
const MIN_PARAGRAPH_CHARS: usize = 50;
/// Below this, a cleaned chapter reverts to its uncleaned segment (unless it
/// is the last one and the input is simply exhausted).
const MIN_CONTENT_CHARS: usize = 200;
const WORDS_PER_MINUTE: usize = 150;

const DEFAULT_IMAGE_DESCRIPTION: &str = "A special moment from your story";

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)НАЗВАНИЕ КНИГИ:\s*(.+)").unwrap());
static TITLE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^.*НАЗВАНИЕ КНИГИ:.*$").unwrap());
static CHAPTER_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ГЛАВА\s+\d+:").unwrap());
static NUMBERED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*\d+\.").unwrap());
static CHAPTER_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:ГЛАВА\s+\d+:\s*)?(.+?)(?:\n\n|\n)").unwrap());
static HEADING_LEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^["\-\s\d\.]+"#).unwrap());
static HEADING_TAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"["\-\s]+$"#).unwrap());

/// One heuristic attempt to split raw generated text into chapter-sized
/// chunks. Strategies are tried in order; the first producing more than one
/// usable segment wins.
pub trait SegmentationStrategy {
    fn name(&self) -> &'static str;

    /// Returns the usable segments found, or `None` when there are none.
    fn try_segment(&self, text: &str, category: BookCategory) -> Option<Vec<String>>;
}

/// Tier A: split at `ГЛАВА N:` markers. Each segment runs from one marker to
/// the next (or to the end of the text) and keeps its marker line.
pub struct MarkerSplit;

impl SegmentationStrategy for MarkerSplit {
    fn name(&self) -> &'static str {
        "chapter markers"
    }

    fn try_segment(&self, text: &str, _category: BookCategory) -> Option<Vec<String>> {
        split_at_matches(text, &CHAPTER_MARKER_RE)
    }
}

/// Tier B: split at lines starting with `N.`, for generations that number
/// chapters as a plain list.
pub struct NumberedListSplit;

impl SegmentationStrategy for NumberedListSplit {
    fn name(&self) -> &'static str {
        "numbered list"
    }

    fn try_segment(&self, text: &str, _category: BookCategory) -> Option<Vec<String>> {
        split_at_matches(text, &NUMBERED_LINE_RE)
    }
}

/// Tier C: split on blank lines and group consecutive paragraphs into
/// roughly equal buckets, sized by the category's target chapter count.
pub struct ParagraphGrouping;

impl SegmentationStrategy for ParagraphGrouping {
    fn name(&self) -> &'static str {
        "paragraph grouping"
    }

    fn try_segment(&self, text: &str, category: BookCategory) -> Option<Vec<String>> {
        let paragraphs: Vec<&str> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| p.chars().count() > MIN_PARAGRAPH_CHARS)
            .collect();
        if paragraphs.is_empty() {
            return None;
        }

        let target = category.defaults().target_chapters;
        let per_chapter = paragraphs.len().div_ceil(target);
        let segments: Vec<String> = paragraphs
            .chunks(per_chapter)
            .map(|bucket| bucket.join("\n\n"))
            .filter(|segment| segment.chars().count() > MIN_SEGMENT_CHARS)
            .collect();

        if segments.is_empty() { None } else { Some(segments) }
    }
}

fn split_at_matches(text: &str, marker: &Regex) -> Option<Vec<String>> {
    let starts: Vec<usize> = marker.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        return None;
    }

    let mut segments = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let segment = text[start..end].trim();
        if segment.chars().count() > MIN_SEGMENT_CHARS {
            segments.push(segment.to_string());
        }
    }

    if segments.is_empty() { None } else { Some(segments) }
}

/// Structures one raw generation into a book.
///
/// Fails only for empty or whitespace-only input; every other anomaly is
/// absorbed by the fallback chain. `descriptions` come from an optional
/// image-analysis collaborator and may be shorter than `images`.
pub fn structure(
    raw_text: &str,
    category: BookCategory,
    images: &[ImageUpload],
    descriptions: &[String],
    now: DateTime<Utc>,
) -> Result<GeneratedBook> {
    if raw_text.trim().is_empty() {
        return Err(Error::EmptyGeneration);
    }

    let title = extract_title(raw_text, category);
    let segments = segment(raw_text, category);
    let total = segments.len();
    let mut chapters: Vec<Chapter> = segments
        .iter()
        .enumerate()
        .map(|(i, seg)| clean_chapter(seg, i, total, category))
        .collect();

    let attachments = wrap_images(images, descriptions);
    distribute_images(&mut chapters, &attachments);

    // Counted on the raw text rather than the cleaned chapters, matching how
    // the reader UI has always reported it.
    let word_count = count_words(raw_text);

    let defaults = category.defaults();
    Ok(GeneratedBook {
        title,
        total_chapters: chapters.len(),
        estimated_read_time: word_count.div_ceil(WORDS_PER_MINUTE),
        word_count,
        author: "VeloraBook AI".to_string(),
        dedicated_to: defaults.dedication.to_string(),
        book_type: category,
        created_at: now,
        images: if attachments.is_empty() {
            None
        } else {
            Some(attachments)
        },
        chapters,
    })
}

/// Whitespace-delimited token count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn extract_title(raw_text: &str, category: BookCategory) -> String {
    TITLE_RE
        .captures(raw_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| category.defaults().title.to_string())
}

fn segment(text: &str, category: BookCategory) -> Vec<String> {
    let strategies: [&dyn SegmentationStrategy; 3] =
        [&MarkerSplit, &NumberedListSplit, &ParagraphGrouping];

    let mut fallback: Option<Vec<String>> = None;
    for strategy in strategies {
        if let Some(segments) = strategy.try_segment(text, category) {
            if segments.len() > 1 {
                tracing::debug!(
                    strategy = strategy.name(),
                    segments = segments.len(),
                    "segmentation strategy selected"
                );
                return segments;
            }
            fallback = Some(segments);
        }
    }

    // No strategy found a real chapter structure; the whole text becomes
    // chapter one.
    fallback.unwrap_or_else(|| vec![text.trim().to_string()])
}

fn clean_chapter(segment: &str, index: usize, total: usize, category: BookCategory) -> Chapter {
    // Drop any line that echoes the book-title marker into a chapter body.
    let without_title_lines = TITLE_LINE_RE
        .replace_all(segment.trim(), "")
        .trim()
        .to_string();

    let mut content = without_title_lines.clone();
    let mut heading: Option<String> = None;
    if let Some(caps) = CHAPTER_TITLE_RE.captures(&content) {
        let matched_end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        heading = caps.get(1).map(|m| m.as_str().trim().to_string());
        content = content[matched_end..].trim().to_string();
    }

    let title = match heading {
        Some(h) => clean_heading(&h),
        None => default_chapter_title(category, index),
    };

    // Over-stripping protection: a near-empty body means the heading match
    // swallowed real content, so fall back to the uncleaned segment. The
    // last chapter is allowed to be short when the input is exhausted.
    if content.chars().count() < MIN_CONTENT_CHARS && index < total - 1 {
        content = without_title_lines;
    }

    Chapter {
        number: index + 1,
        title,
        content,
        epigraph: None,
        images: Vec::new(),
    }
}

fn clean_heading(heading: &str) -> String {
    let lead_trimmed = HEADING_LEAD_RE.replace(heading, "");
    HEADING_TAIL_RE.replace(&lead_trimmed, "").to_string()
}

fn default_chapter_title(category: BookCategory, index: usize) -> String {
    category
        .defaults()
        .chapter_titles
        .get(index)
        .map(|t| t.to_string())
        .unwrap_or_else(|| format!("Chapter {}", index + 1))
}

fn wrap_images(images: &[ImageUpload], descriptions: &[String]) -> Vec<ImageAttachment> {
    images
        .iter()
        .enumerate()
        .map(|(i, image)| ImageAttachment {
            url: image.base64.clone(),
            caption: format!("Photograph {}", i + 1),
            description: descriptions
                .get(i)
                .cloned()
                .unwrap_or_else(|| DEFAULT_IMAGE_DESCRIPTION.to_string()),
            original_name: image.name.clone(),
            size: image.size,
        })
        .collect()
}

/// Distributes attachments evenly: chapter `i` receives the slice
/// `[i * per, min((i + 1) * per, len))` with `per = ceil(images / chapters)`.
/// Later chapters simply receive nothing when images run out.
fn distribute_images(chapters: &mut [Chapter], attachments: &[ImageAttachment]) {
    if attachments.is_empty() || chapters.is_empty() {
        return;
    }

    let per_chapter = attachments.len().div_ceil(chapters.len());
    for (i, chapter) in chapters.iter_mut().enumerate() {
        let start = i * per_chapter;
        if start >= attachments.len() {
            break;
        }
        let end = ((i + 1) * per_chapter).min(attachments.len());
        chapter.images = attachments[start..end].to_vec();
    }
}
