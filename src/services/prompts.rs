//! Prompt templates for the text-generation oracle.
//!
//! The system prompt pins the structural contract the structurer relies on:
//! a `НАЗВАНИЕ КНИГИ:` title line and `ГЛАВА N:` markers before each
//! chapter. The per-category user prompts carry the chapter outline and the
//! questionnaire answers.

use std::collections::HashMap;

use crate::models::BookCategory;

pub const SYSTEM_PROMPT: &str = r#"You are a talented writer of personal books. Write rich, emotional stories.

CRITICALLY IMPORTANT:
- Write the COMPLETE book with ALL chapters in a single response
- Every chapter must be 600-900 words
- Total length: 4000-6000 words
- Use vivid, figurative language with concrete detail
- Include dialogue and emotional scenes

STRUCTURE:
НАЗВАНИЕ КНИГИ: [title]

ГЛАВА 1: [chapter title]
[full chapter content, 600-900 words]

ГЛАВА 2: [chapter title]
[full chapter content, 600-900 words]

...continue for every chapter...

You MUST write ALL chapters in full!"#;

pub const RETRY_SYSTEM_PROMPT: &str = "Write a complete personal book. IMPORTANT: \
write ALL chapters in full, every chapter must be 600-800 words. Keep the \
НАЗВАНИЕ КНИГИ: and ГЛАВА N: structure markers.";

/// Answers shorter than this carry no usable context and are dropped from
/// the prompt.
const MIN_ANSWER_CHARS: usize = 10;

pub fn build_user_prompt(
    category: BookCategory,
    answers: &HashMap<String, String>,
    image_count: usize,
) -> String {
    let mut entries: Vec<(&str, &str)> = answers
        .iter()
        .filter(|(_, value)| value.trim().chars().count() > MIN_ANSWER_CHARS)
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    // HashMap order is arbitrary; sort so identical requests build identical
    // prompts.
    entries.sort_by_key(|(key, _)| *key);
    let key_answers = entries
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n");

    let image_section = if image_count > 0 {
        format!("\n\nPHOTOS: {image_count} images to weave into the story")
    } else {
        String::new()
    };

    match category {
        BookCategory::Romantic => format!(
            "Write a romantic book with 6 chapters (600-900 words each):\n\
             1. The first meeting and first impressions\n\
             2. How the relationship grew\n\
             3. Bright, happy moments\n\
             4. What makes the relationship special, shared traditions\n\
             5. Overcoming hard times and growing together\n\
             6. Gratitude and plans for the future\n\n\
             CONTEXT:\n{key_answers}{image_section}\n\n\
             Write emotionally, with detail and dialogue. You MUST write ALL 6 chapters in full!"
        ),
        BookCategory::Family => format!(
            "Write a family book with 5 chapters (700-1000 words each):\n\
             1. Roots and how the family began\n\
             2. Home and traditions\n\
             3. Bright events and memories\n\
             4. The family's strength and support\n\
             5. Values and legacy\n\n\
             CONTEXT:\n{key_answers}{image_section}\n\n\
             Write warmly and soulfully. You MUST write ALL 5 chapters in full!"
        ),
        BookCategory::Friendship => format!(
            "Write a book about friendship with 5 chapters (600-800 words each):\n\
             1. How the friendship began\n\
             2. Shared adventures\n\
             3. Laughter and fun\n\
             4. Support and understanding\n\
             5. Gratitude and the future\n\n\
             CONTEXT:\n{key_answers}{image_section}\n\n\
             Write in a friendly voice with humor. You MUST write ALL 5 chapters in full!"
        ),
        BookCategory::Child => format!(
            "Write a book about a child with 4 chapters (600-800 words each):\n\
             1. Anticipation and birth\n\
             2. First discoveries and growing up\n\
             3. Character and quirks\n\
             4. Love and wishes\n\n\
             CONTEXT:\n{key_answers}{image_section}\n\n\
             Write tenderly and movingly. You MUST write ALL 4 chapters in full!"
        ),
        BookCategory::Travel => format!(
            "Write a travel book with 5 chapters (600-800 words each):\n\
             1. Plans and setting out\n\
             2. First impressions\n\
             3. Discoveries and adventures\n\
             4. Difficulties and overcoming them\n\
             5. Looking back and what comes next\n\n\
             CONTEXT:\n{key_answers}{image_section}\n\n\
             Write vividly and engagingly. You MUST write ALL 5 chapters in full!"
        ),
        BookCategory::Other => {
            format!("Write a personal book based on:\n{key_answers}{image_section}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn system_prompt_pins_the_structure_markers() {
        assert!(SYSTEM_PROMPT.contains("НАЗВАНИЕ КНИГИ:"));
        assert!(SYSTEM_PROMPT.contains("ГЛАВА 1:"));
        assert!(RETRY_SYSTEM_PROMPT.contains("ГЛАВА N:"));
    }

    #[test]
    fn short_answers_are_filtered_out() {
        let answers = answers(&[
            ("how_met", "We met on a night train to Lisbon in 2011."),
            ("nickname", "Bee"),
        ]);
        let prompt = build_user_prompt(BookCategory::Romantic, &answers, 0);
        assert!(prompt.contains("night train to Lisbon"));
        assert!(!prompt.contains("nickname"));
    }

    #[test]
    fn prompt_is_stable_across_map_iteration_order() {
        let answers = answers(&[
            ("b_question", "The second answer with enough text."),
            ("a_question", "The first answer with enough text."),
        ]);
        let first = build_user_prompt(BookCategory::Family, &answers, 2);
        let second = build_user_prompt(BookCategory::Family, &answers, 2);
        assert_eq!(first, second);
        assert!(first.find("a_question").unwrap() < first.find("b_question").unwrap());
    }

    #[test]
    fn image_section_only_appears_when_images_are_attached() {
        let answers = answers(&[("q", "A long enough answer for the prompt.")]);
        let with = build_user_prompt(BookCategory::Travel, &answers, 3);
        let without = build_user_prompt(BookCategory::Travel, &answers, 0);
        assert!(with.contains("PHOTOS: 3"));
        assert!(!without.contains("PHOTOS"));
    }
}
