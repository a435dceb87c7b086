//! Legacy Word (.doc) support.
//!
//! Many ".doc" uploads are really DOCX files with the wrong extension; those go
//! through the DOCX reader. Genuine Word 97-2003 files are OLE2 compound files
//! whose text lives in the WordDocument stream either as UTF-16LE or as 8-bit
//! text, so readable runs are recovered by scanning for both encodings.

use tracing::debug;

use super::{docx, ExtractError};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
/// Runs shorter than this are almost always binary noise.
const MIN_RUN_CHARS: usize = 4;
/// OLE2 header sector; never contains document text.
const OLE2_HEADER_LEN: usize = 512;
/// Fewer recognisable words than this and the recovered text is treated as noise.
const MIN_WORDS: usize = 10;

pub(super) fn extract(bytes: &[u8]) -> Result<String, ExtractError> {
    if bytes.starts_with(ZIP_MAGIC) {
        return docx::extract(bytes);
    }
    if !bytes.starts_with(OLE2_MAGIC) {
        return Err(ExtractError::CorruptFile(
            "not a Word document (no OLE2 or OOXML signature)".to_string(),
        ));
    }
    if bytes.len() <= OLE2_HEADER_LEN {
        return Err(ExtractError::CorruptFile("truncated OLE2 file".to_string()));
    }

    let body = &bytes[OLE2_HEADER_LEN..];
    let wide = utf16_runs(body);
    let narrow = ascii_runs(body);
    if wide.is_empty() && narrow.is_empty() {
        return Ok(String::new());
    }

    // Misaligned 8-bit text decodes as CJK under UTF-16, so the encoding with more
    // real words wins.
    let wide = readable_runs(wide);
    let narrow = readable_runs(narrow);
    let (runs, words) = if word_count(&wide) >= word_count(&narrow) {
        let words = word_count(&wide);
        (wide, words)
    } else {
        let words = word_count(&narrow);
        (narrow, words)
    };

    debug!("OLE2 text recovery: {} runs, {} words", runs.len(), words);
    if words < MIN_WORDS {
        return Err(ExtractError::CorruptFile(
            "no readable text in Word document".to_string(),
        ));
    }
    Ok(runs.join("\n"))
}

/// A plausible English word: ASCII letters with a vowel, in lower, Title or UPPER case.
fn is_word(token: &str) -> bool {
    let token = token.trim_matches(|c: char| c.is_ascii_punctuation());
    let len = token.chars().count();
    if !(2..=24).contains(&len) || !token.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    let has_vowel = token.chars().any(|c| "aeiouyAEIOUY".contains(c));
    let title_or_lower = token.chars().skip(1).all(|c| c.is_ascii_lowercase());
    let upper = token.chars().all(|c| c.is_ascii_uppercase());
    has_vowel && (title_or_lower || upper)
}

fn run_words(run: &str) -> impl Iterator<Item = &str> {
    run.split_whitespace().filter(|t| is_word(t))
}

/// Keeps runs where recognisable words make up at least half the visible characters.
fn readable_runs(runs: Vec<String>) -> Vec<String> {
    runs.into_iter()
        .filter(|run| {
            let visible = run.chars().filter(|c| !c.is_whitespace()).count();
            let word_chars: usize = run_words(run).map(|w| w.chars().count()).sum();
            word_chars > 0 && word_chars * 2 >= visible
        })
        .collect()
}

fn word_count(runs: &[String]) -> usize {
    runs.iter().map(|r| run_words(r).count()).sum()
}

fn is_text_char(c: char) -> bool {
    c == ' ' || c == '\t' || !(c.is_control() || c.is_whitespace() || c == '\u{fffd}')
}

/// Collects runs of printable UTF-16LE code units.
fn utf16_runs(bytes: &[u8]) -> Vec<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let mut runs = Vec::new();
    let mut current = String::new();
    for decoded in char::decode_utf16(units.iter().copied()) {
        match decoded {
            Ok(c) if is_text_char(c) => current.push(c),
            _ => flush(&mut runs, &mut current),
        }
    }
    flush(&mut runs, &mut current);
    runs
}

/// Collects runs of printable 8-bit text (Word stores "compressed" text as cp1252).
fn ascii_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for &b in bytes {
        if b == b' ' || b == b'\t' || b.is_ascii_graphic() {
            current.push(b as char);
        } else {
            flush(&mut runs, &mut current);
        }
    }
    flush(&mut runs, &mut current);
    runs
}

fn flush(runs: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if trimmed.chars().filter(|c| c.is_alphanumeric()).count() >= MIN_RUN_CHARS {
        runs.push(trimmed.to_string());
    }
    current.clear();
}
