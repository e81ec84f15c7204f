//! Prompt construction for the chat model and the title/content split of
//! whatever text it sends back.
//!
//! The split is a heuristic. A short first sentence without a trailing
//! period is taken as a title even when the model meant it as prose; the
//! thresholds are kept as-is because stored stories and clients depend on
//! the exact output.

use crate::{
    errors::{AppError, Result},
    models::StoryResult,
};

/// First lines at or above this many characters are never treated as a title.
pub const MAX_TITLE_LINE_CHARS: usize = 100;

pub const SYSTEM_PROMPT: &str = "You are a warm, imaginative children's author. \
You write gentle, age-appropriate bedtime stories that end calmly and happily. \
Always start with a short title on its own line, followed by a blank line and then the story.";

pub fn build_prompt(name: &str, gender: &str, keywords: &str) -> Result<String> {
    let name = required(name, "name")?;
    let gender = required(gender, "gender")?;
    let keywords = required(keywords, "keywords")?;

    Ok(format!(
        "Write a bedtime story for a {gender} child named {name}. \
The story should feature {name} as the brave hero and include these elements: {keywords}. \
Keep it around 500 words, use simple language suitable for ages 3 to 8, \
and finish with a soothing ending that helps {name} drift off to sleep. \
Give the story a title on the first line."
    ))
}

/// Illustration prompt for the cover, derived from the same inputs as the
/// story so both can be requested at once.
pub fn build_cover_prompt(name: &str, gender: &str, keywords: &str) -> Result<String> {
    let name = required(name, "name")?;
    let gender = required(gender, "gender")?;
    let keywords = required(keywords, "keywords")?;

    Ok(format!(
        "A whimsical children's book cover illustration of a brave little {gender} named {name} \
on an adventure with {keywords}. Soft watercolor style, warm pastel colors, cozy bedtime mood, \
friendly characters, no text or lettering."
    ))
}

/// Splits raw model output into a title and body.
///
/// Precedence:
/// 1. text before the first blank line is the title, the rest is content;
/// 2. otherwise a first line shorter than [`MAX_TITLE_LINE_CHARS`] that does
///    not end with a period is the title;
/// 3. otherwise the title is `"<fallback_name>'s Magical Adventure"` and the
///    untrimmed text, with CRLF line endings normalised, is content.
pub fn parse_story_text(raw: &str, fallback_name: &str) -> StoryResult {
    let normalized = raw.replace("\r\n", "\n");
    let text = normalized.trim();

    if let Some((head, rest)) = text.split_once("\n\n") {
        return with_title(strip_title_marker(head), rest.trim(), fallback_name);
    }

    let mut lines = text.lines();
    if let Some(first) = lines.next() {
        let first = first.trim_end();
        if first.chars().count() < MAX_TITLE_LINE_CHARS && !first.ends_with('.') {
            let content = lines.collect::<Vec<_>>().join("\n");
            return with_title(strip_title_marker(first), content.trim(), fallback_name);
        }
    }

    StoryResult {
        title: fallback_title(fallback_name),
        content: normalized,
    }
}

pub fn fallback_title(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        "A Magical Adventure".to_string()
    } else {
        format!("{}'s Magical Adventure", name)
    }
}

fn with_title(title: &str, content: &str, fallback_name: &str) -> StoryResult {
    let title = if title.is_empty() {
        fallback_title(fallback_name)
    } else {
        title.to_string()
    };

    StoryResult {
        title,
        content: content.to_string(),
    }
}

fn strip_title_marker(line: &str) -> &str {
    let line = line.trim().trim_start_matches('#').trim_start();

    match line.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("title:") => line[6..].trim(),
        _ => line.trim(),
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("Please provide the child's {}", field)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line_split() {
        let story = parse_story_text("Hello\n\nWorld is great.", "Amy");
        assert_eq!(story.title, "Hello");
        assert_eq!(story.content, "World is great.");
    }

    #[test]
    fn test_short_first_line_without_period() {
        let story = parse_story_text("A Short Day\nLine two\nLine three", "Amy");
        assert_eq!(story.title, "A Short Day");
        assert_eq!(story.content, "Line two\nLine three");
    }

    #[test]
    fn test_fallback_title() {
        let raw = "This is a long run-on single paragraph that ends with a period.";
        let story = parse_story_text(raw, "Amy");
        assert_eq!(story.title, "Amy's Magical Adventure");
        assert_eq!(story.content, raw);
    }

    #[test]
    fn test_fallback_keeps_raw_text() {
        let raw = "  This is a long run-on single paragraph that ends with a period.\n";
        let story = parse_story_text(raw, "Amy");
        assert_eq!(story.title, "Amy's Magical Adventure");
        assert_eq!(story.content, raw);

        let story = parse_story_text("It was late.\r\n", "Amy");
        assert_eq!(story.content, "It was late.\n");
    }

    #[test]
    fn test_long_first_line_falls_back() {
        let first = "x".repeat(MAX_TITLE_LINE_CHARS);
        let raw = format!("{}\nsecond line", first);
        let story = parse_story_text(&raw, "Leo");
        assert_eq!(story.title, "Leo's Magical Adventure");
        assert_eq!(story.content, raw);

        let just_under = "y".repeat(MAX_TITLE_LINE_CHARS - 1);
        let story = parse_story_text(&format!("{}\nbody", just_under), "Leo");
        assert_eq!(story.title, just_under);
    }

    #[test]
    fn test_markers_are_stripped() {
        let story = parse_story_text("# The Moon Boat\n\nOnce upon a time.", "Amy");
        assert_eq!(story.title, "The Moon Boat");

        let story = parse_story_text("## Title: Stars Everywhere\n\nOnce.", "Amy");
        assert_eq!(story.title, "Stars Everywhere");

        let story = parse_story_text("TITLE: Quiet Forest\nThe trees whispered.", "Amy");
        assert_eq!(story.title, "Quiet Forest");
        assert_eq!(story.content, "The trees whispered.");
    }

    #[test]
    fn test_only_first_blank_line_splits() {
        let story = parse_story_text("Title\n\nPart one.\n\nPart two.", "Amy");
        assert_eq!(story.title, "Title");
        assert_eq!(story.content, "Part one.\n\nPart two.");
    }

    #[test]
    fn test_crlf_output() {
        let story = parse_story_text("Sleepy Dragon\r\n\r\nThe dragon yawned.", "Amy");
        assert_eq!(story.title, "Sleepy Dragon");
        assert_eq!(story.content, "The dragon yawned.");
    }

    #[test]
    fn test_title_never_empty() {
        let story = parse_story_text("#\n\nA story with an empty heading.", "Mia");
        assert_eq!(story.title, "Mia's Magical Adventure");
        assert_eq!(story.content, "A story with an empty heading.");

        let story = parse_story_text("", "Mia");
        assert_eq!(story.title, "Mia's Magical Adventure");
        assert_eq!(story.content, "");
    }

    #[test]
    fn test_build_prompt_requires_all_fields() {
        let prompt = build_prompt("Amy", "girl", "dragons, moon").unwrap();
        assert!(prompt.contains("Amy"));
        assert!(prompt.contains("girl"));
        assert!(prompt.contains("dragons, moon"));

        assert!(matches!(build_prompt("", "girl", "x"), Err(AppError::Validation(_))));
        assert!(matches!(build_prompt("Amy", "  ", "x"), Err(AppError::Validation(_))));
        assert!(matches!(build_prompt("Amy", "girl", ""), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_cover_prompt() {
        let prompt = build_cover_prompt(" Leo ", "boy", "pirates").unwrap();
        assert!(prompt.contains("boy named Leo"));
        assert!(prompt.contains("no text"));
    }
}
