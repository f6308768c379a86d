#![forbid(unsafe_code)]

//! Whitespace segmentation of the text handed to the speech engine.
//!
//! [`SpeechText::segment`] produces both the exact string that is spoken and
//! the index-aligned word table. Every whitespace run in the source becomes
//! a single space, so the spoken text is the words joined with `' '` and
//! consecutive words are always exactly one unit apart:
//! `words[i + 1].char_start == words[i].char_end + 1`.
//!
//! Offsets are UTF-16 code units because that is what speech engines report
//! in boundary events.

/// One whitespace-delimited token of the spoken text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Position in the word sequence, starting at 0.
    pub index: usize,
    /// The token exactly as split.
    pub text: String,
    /// UTF-16 offset of the first unit in the spoken text.
    pub char_start: u32,
    /// UTF-16 offset one past the last unit.
    pub char_end: u32,
}

impl Word {
    /// Length in UTF-16 code units.
    #[must_use]
    pub const fn char_len(&self) -> u32 {
        self.char_end - self.char_start
    }

    /// Whether `offset` falls inside this word.
    #[must_use]
    pub const fn contains_offset(&self, offset: u32) -> bool {
        offset >= self.char_start && offset < self.char_end
    }
}

/// Normalized spoken text plus its word table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeechText {
    text: String,
    words: Vec<Word>,
    byte_starts: Vec<usize>,
}

impl SpeechText {
    /// Split `source` on whitespace runs, discarding empty tokens.
    #[must_use]
    pub fn segment(source: &str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut words = Vec::new();
        let mut byte_starts = Vec::new();
        let mut units: u32 = 0;
        let mut rest = source;
        loop {
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                break;
            }
            let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
            let token = &trimmed[..end];

            if !words.is_empty() {
                text.push(' ');
                units += 1;
            }
            let len = utf16_len(token);
            byte_starts.push(text.len());
            words.push(Word {
                index: words.len(),
                text: token.to_owned(),
                char_start: units,
                char_end: units + len,
            });
            text.push_str(token);
            units += len;
            rest = &trimmed[end..];
        }
        Self {
            text,
            words,
            byte_starts,
        }
    }

    /// The string to speak.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    #[must_use]
    pub fn word(&self, index: usize) -> Option<&Word> {
        self.words.get(index)
    }

    /// Number of words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Total length of the spoken text in UTF-16 units.
    #[must_use]
    pub fn char_len(&self) -> u32 {
        self.words.last().map_or(0, |w| w.char_end)
    }

    /// The spoken text from the start of word `index` to the end.
    #[must_use]
    pub fn suffix_from(&self, index: usize) -> Option<&str> {
        self.byte_starts.get(index).map(|&start| &self.text[start..])
    }
}

/// Convenience wrapper returning only the word table.
#[must_use]
pub fn segment_words(source: &str) -> Vec<Word> {
    SpeechText::segment(source).words
}

pub(crate) fn utf16_len(s: &str) -> u32 {
    u32::try_from(s.encode_utf16().count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word(index: usize, text: &str, char_start: u32, char_end: u32) -> Word {
        Word {
            index,
            text: text.to_owned(),
            char_start,
            char_end,
        }
    }

    #[test]
    fn splits_on_whitespace_runs() {
        let speech = SpeechText::segment("  alpha   beta\tgamma  ");
        assert_eq!(
            speech.words(),
            &[
                word(0, "alpha", 0, 5),
                word(1, "beta", 6, 10),
                word(2, "gamma", 11, 16),
            ]
        );
        assert_eq!(speech.text(), "alpha beta gamma");
        assert_eq!(speech.char_len(), 16);
    }

    #[test]
    fn newline_runs_become_single_spaces() {
        let speech = SpeechText::segment("Title\n\nFirst line");
        assert_eq!(speech.text(), "Title First line");
        assert_eq!(speech.words()[1].char_start, 6);
        let joined: Vec<&str> = speech.words().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(joined.join(" "), speech.text());
    }

    #[test]
    fn empty_and_blank_sources_have_no_words() {
        assert!(SpeechText::segment("").is_empty());
        assert!(SpeechText::segment(" \n\t ").is_empty());
        assert_eq!(SpeechText::segment("").char_len(), 0);
    }

    #[test]
    fn offsets_count_utf16_units() {
        let speech = SpeechText::segment("café 😀 ok");
        let words = speech.words();
        assert_eq!(words[0].char_len(), 4);
        assert_eq!(words[1].char_start, 5);
        assert_eq!(words[1].char_end, 7);
        assert_eq!(words[2].char_start, 8);
    }

    #[test]
    fn suffix_starts_at_word() {
        let speech = SpeechText::segment("one two\nthree");
        assert_eq!(speech.suffix_from(1), Some("two three"));
        assert_eq!(speech.suffix_from(2), Some("three"));
        assert_eq!(speech.suffix_from(3), None);
    }

    #[test]
    fn non_breaking_space_separates_words() {
        let words = segment_words("a\u{a0}b");
        assert_eq!(words.len(), 2);
    }

    #[test]
    fn contains_offset_is_half_open() {
        let w = word(0, "beta", 6, 10);
        assert!(w.contains_offset(6));
        assert!(w.contains_offset(9));
        assert!(!w.contains_offset(10));
        assert!(!w.contains_offset(5));
    }
}
