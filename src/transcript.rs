//! Subtitle (SRT / auto-generated caption) to continuous prose.
//!
//! A subtitle file is a sequence of blocks:
//!
//! ```text
//! 1
//! 00:00:00,160 --> 00:00:05,440
//! Hello world
//!
//! ```
//!
//! Only the text lines matter for an article, so timing and numbering are
//! dropped and the blocks are stitched back into one paragraph.

use std::sync::LazyLock;

use regex::Regex;

/// Non-speech annotations emitted by auto-generated captions
pub const NOISE_TOKENS: [&str; 4] = ["[music]", "[applause]", "[laughter]", "[cheering]"];

/// Speaker change marker used by some caption sources
const SPEAKER_CHANGE: &str = ">> ";

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{2}:\d{2}:\d{2}[,.]\d{3}\s*-->\s*\d{2}:\d{2}:\d{2}[,.]\d{3}")
        .expect("timestamp pattern is valid")
});

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = NOISE_TOKENS
        .iter()
        .map(|token| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){}", alternatives)).expect("noise pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static GLUED_SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])([A-Z])").expect("sentence pattern is valid"));

fn is_sequence_number(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

fn is_timestamp(line: &str) -> bool {
    TIMESTAMP.is_match(line)
}

fn clean_line(line: &str) -> String {
    let line = line.strip_prefix(SPEAKER_CHANGE).unwrap_or(line);
    NOISE.replace_all(line, "").into_owned()
}

/// Turn raw subtitle text into one normalized paragraph.
///
/// Input without any timestamp line is treated as plain text, so already
/// normalized transcripts pass through unchanged.
pub fn normalize_subtitles(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim).collect();

    let mut utterances: Vec<String> = Vec::new();
    let mut loose: Vec<String> = Vec::new();
    let mut saw_timestamp = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if line.is_empty() || is_sequence_number(line) {
            i += 1;
            continue;
        }

        if is_timestamp(line) {
            saw_timestamp = true;
            i += 1;

            let mut block: Vec<String> = Vec::new();
            while i < lines.len() {
                let text = lines[i];
                if text.is_empty() || is_sequence_number(text) || is_timestamp(text) {
                    break;
                }
                block.push(clean_line(text));
                i += 1;
            }

            if !block.is_empty() {
                utterances.push(block.join(" "));
            }
            continue;
        }

        loose.push(clean_line(line));
        i += 1;
    }

    if !saw_timestamp {
        utterances = loose;
    }

    finish(&utterances.join(" "))
}

fn finish(joined: &str) -> String {
    let collapsed = WHITESPACE.replace_all(joined, " ");
    let spaced = GLUED_SENTENCE.replace_all(collapsed.trim(), "$1 $2");

    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_srt_blocks() {
        let raw = "1\n00:00:00,160 --> 00:00:05,440\nHello world\n\n2\n00:00:05,440 --> 00:00:08,000\n>> Goodbye\n";
        assert_eq!(normalize_subtitles(raw), "Hello world Goodbye");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_subtitles(""), "");
        assert_eq!(normalize_subtitles("\n\n  \n"), "");
    }

    #[test]
    fn test_removes_noise_tokens() {
        let raw = "1\n00:00:01.000 --> 00:00:02.000\n[Music] so today [APPLAUSE]\nwe talk [laughter] about\n\n\
                   2\n00:00:02.000 --> 00:00:04.000\n[cheering] caching [music]\n";
        let text = normalize_subtitles(raw);

        assert_eq!(text, "So today we talk about caching");
        for token in NOISE_TOKENS {
            assert!(!text.to_lowercase().contains(token));
        }
    }

    #[test]
    fn test_multiline_block_and_missing_blank_separator() {
        let raw = "00:00:00,000 --> 00:00:01,000\nfirst line\nsecond line\n2\n00:00:01,000 --> 00:00:02,000\nthird\n";
        assert_eq!(normalize_subtitles(raw), "First line second line third");
    }

    #[test]
    fn test_inserts_space_after_glued_sentence() {
        let raw = "1\n00:00:00,000 --> 00:00:02,000\nHi there.Next sentence\n";
        let text = normalize_subtitles(raw);

        assert!(text.contains(". N"));
        assert_eq!(text, "Hi there. Next sentence");
    }

    #[test]
    fn test_glued_fix_leaves_decimals_and_lowercase() {
        let raw = "1\n00:00:00,000 --> 00:00:02,000\nversion 3.5 is out.and more?Yes!Great\n";
        assert_eq!(normalize_subtitles(raw), "Version 3.5 is out.and more? Yes! Great");
    }

    #[test]
    fn test_capitalizes_after_leading_noise() {
        let raw = "1\n00:00:00,000 --> 00:00:02,000\n[music]\nwelcome back\n";
        assert_eq!(normalize_subtitles(raw), "Welcome back");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "1\n00:00:00,160 --> 00:00:05,440\nHello world\n\n2\n00:00:05,440 --> 00:00:08,000\n>> Goodbye\n",
            "1\n00:00:00,000 --> 00:00:02,000\nhi there.Next   sentence\n",
            "Already clean prose. Nothing to do here!",
            "",
        ];

        for input in inputs {
            let once = normalize_subtitles(input);
            assert_eq!(normalize_subtitles(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_stray_text_ignored_once_timestamps_seen() {
        let raw = "WEBVTT header\n\n1\n00:00:00,000 --> 00:00:01,000\nspoken\n";
        assert_eq!(normalize_subtitles(raw), "Spoken");
    }
}
