//! Title, author and asset kind inferred from a picked file's name

use narrivo_core::AssetKind;
use std::path::Path;

/// Author used when the file name carries none
pub const UNKNOWN_AUTHOR: &str = "Unknown";

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "m4b", "aac", "flac", "wav", "ogg"];
pub const TEXT_EXTENSIONS: &[&str] = &["epub", "pdf", "txt", "mobi"];

/// Metadata inferred from a file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub title: String,
    pub author: String,
}

/// Lowercased extension of `filename`, if any
pub fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Classifies a file by extension; `None` for unsupported types
pub fn file_kind(filename: &str) -> Option<AssetKind> {
    let ext = extension(filename)?;
    if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetKind::Audio)
    } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetKind::Text)
    } else {
        None
    }
}

/// Infers title and author from a file name
///
/// The extension and any leading track number (`01 - `, `07_`) are dropped.
/// `Author - Title` and `Title by Author` name both fields; anything else is
/// a bare title with [`UNKNOWN_AUTHOR`]. `-` and `_` read as spaces and every
/// word gets an upper-case initial.
pub fn extract_metadata(filename: &str) -> FileMetadata {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    let stem = match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    };
    let stem = strip_track_number(stem).trim_end_matches(is_separator);

    if let Some((author, title)) = stem.split_once(" - ") {
        let (author, title) = (display_words(author), display_words(title));
        if !author.is_empty() && !title.is_empty() {
            return FileMetadata { title, author };
        }
    }

    let words: Vec<String> = display_words(stem)
        .split(' ')
        .map(str::to_string)
        .collect();
    let by = words
        .iter()
        .enumerate()
        .skip(1)
        .find(|(i, w)| *i + 1 < words.len() && w.eq_ignore_ascii_case("by"))
        .map(|(i, _)| i);
    if let Some(i) = by {
        return FileMetadata {
            title: words[..i].join(" "),
            author: words[i + 1..].join(" "),
        };
    }

    FileMetadata {
        title: words.join(" "),
        author: UNKNOWN_AUTHOR.to_string(),
    }
}

fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '.' | '_' | '-')
}

/// `03 - Title` becomes `Title`; a name that is only a number is kept
fn strip_track_number(stem: &str) -> &str {
    let rest = stem.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == stem.len() {
        return stem;
    }
    let after = rest.trim_start_matches(is_separator);
    if after.len() == rest.len() || after.is_empty() {
        stem
    } else {
        after
    }
}

fn display_words(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|ch| if ch == '-' || ch == '_' { ' ' } else { ch })
        .collect();

    let mut words = Vec::new();
    for word in spaced.split_whitespace() {
        let mut out = String::with_capacity(word.len());
        let mut at_word_start = true;
        for ch in word.chars() {
            if ch.is_alphanumeric() {
                if at_word_start {
                    out.extend(ch.to_uppercase());
                } else {
                    out.push(ch);
                }
                at_word_start = false;
            } else {
                out.push(ch);
                at_word_start = true;
            }
        }
        words.push(out);
    }
    words.join(" ")
}
