//! Fragment text cleanup
//!
//! Model output arrives with embedded mood markers: emoji, and explicit
//! `[happy]`-style tags some prompts elicit. Synthesis must never see them
//! (providers read tags aloud and choke on emoji), but the device wants the
//! moods for its expression animation, so stripping returns both halves.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static MOOD_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([A-Za-z_]+)\]").expect("mood tag pattern compiles"));

/// Emoji that map onto a device expression. Anything else emoji-like is
/// stripped without producing a mood.
static EMOJI_MOODS: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ('😀', "happy"),
        ('😄', "happy"),
        ('😊', "happy"),
        ('🙂', "happy"),
        ('😂', "laughing"),
        ('🤣', "laughing"),
        ('😢', "sad"),
        ('😭', "sad"),
        ('😠', "angry"),
        ('😡', "angry"),
        ('😮', "surprised"),
        ('😲', "surprised"),
        ('😍', "loving"),
        ('❤', "loving"),
        ('🤔', "thinking"),
        ('😴', "sleepy"),
        ('😎', "cool"),
        ('😱', "scared"),
    ])
});

fn is_emoji_like(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1F5FF   // symbols & pictographs
        | 0x1F600..=0x1F64F // emoticons
        | 0x1F680..=0x1F6FF // transport & map
        | 0x1F900..=0x1F9FF // supplemental symbols
        | 0x1FA70..=0x1FAFF // extended-A
        | 0x1F1E6..=0x1F1FF // regional indicators
        | 0x2600..=0x27BF   // misc symbols & dingbats
        | 0x2B00..=0x2BFF   // arrows & stars
        | 0xFE00..=0xFE0F   // variation selectors
        | 0x200D..=0x200D   // zero-width joiner
    )
}

/// Split a raw fragment into `(tts_text, moods)`.
///
/// The returned text is what the synthesis provider receives; an empty
/// result means the fragment was pure markup and needs no audio at all.
/// Moods are deduplicated in first-seen order.
pub fn strip_moods(text: &str) -> (String, Vec<String>) {
    let mut moods: Vec<String> = Vec::new();
    let mut push_mood = |mood: &str| {
        if !moods.iter().any(|m| m == mood) {
            moods.push(mood.to_owned());
        }
    };

    let mut cleaned = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(m) = MOOD_TAG.find(rest) {
        cleaned.push_str(&rest[..m.start()]);
        if let Some(captures) = MOOD_TAG.captures(&rest[m.start()..m.end()]) {
            push_mood(&captures[1].to_lowercase());
        }
        rest = &rest[m.end()..];
    }
    cleaned.push_str(rest);

    let mut spoken = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if let Some(mood) = EMOJI_MOODS.get(&c) {
            push_mood(mood);
        } else if !is_emoji_like(c) {
            spoken.push(c);
        }
    }

    (spoken.trim().to_owned(), moods)
}
