//! Text tokenization.
//!
//! Rule texts and query texts go through the same tokenizer so that token
//! positions line up across both sides: split on whitespace and punctuation,
//! lowercase, drop markup stopwords before positions are assigned.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// One token with byte offsets into the original text.
///
/// `text` is the lowercased form used for vocabulary lookups; `start..end`
/// is the byte range of the raw token, kept so matched text can be sliced
/// back out of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Splits on whitespace and punctuation: keep only characters and numbers,
/// and `+` when in the middle or end of a word (as in "gpl2+").
/// Unicode-aware, so non-ASCII letters form tokens too.
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^_\W]+\+?[^_\W]*").expect("invalid token pattern"));

/// Markup and formatting words ignored from matching, such as HTML tags and
/// XML entities. Applied to rule and query texts alike so that stopwords
/// never break token adjacency.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut set = HashSet::new();

    // XML character references as in &quot;
    for word in ["amp", "apos", "gt", "lt", "nbsp", "quot"] {
        set.insert(word);
    }

    // HTML tags and attributes as in <a href=...>
    for word in [
        "a", "abbr", "alt", "blockquote", "body", "br", "class", "div", "em", "h1", "h2", "h3",
        "h4", "h5", "hr", "href", "img", "li", "ol", "p", "pre", "rel", "script", "span", "src",
        "td", "th", "tr", "ul",
    ] {
        set.insert(word);
    }

    // comment line markers
    set.insert("rem"); // batch files
    set.insert("dnl"); // autotools

    // DocBook tags as in <para>
    set.insert("para");
    set.insert("ulink");

    // HTML punctuation entities as in &mdash;
    for word in [
        "bdquo", "bull", "bullet", "colon", "comma", "emdash", "emsp", "ensp", "ge", "hairsp",
        "ldquo", "ldquor", "le", "lpar", "lsaquo", "lsquo", "lsquor", "mdash", "ndash", "numsp",
        "period", "puncsp", "raquo", "rdquo", "rdquor", "rpar", "rsaquo", "rsquo", "rsquor",
        "sbquo", "semi", "thinsp", "tilde",
    ] {
        set.insert(word);
    }

    // XML char entities
    set.insert("x3c");
    set.insert("x3e");

    // seen in many CSS fragments
    for word in [
        "lists", "side", "nav", "height", "auto", "border", "padding", "width",
    ] {
        set.insert(word);
    }

    // Perl POD headers
    set.insert("head1");
    set.insert("head2");
    set.insert("head3");

    // common in C literals
    set.insert("printf");

    // common in shell
    set.insert("echo");

    set
});

/// Tokenize text into lowercased tokens with byte offsets.
///
/// Offsets index the original text, not a lowercased copy, so callers can
/// slice out the raw text a token range covers. Stopwords are removed and
/// do not occupy positions.
pub fn tokenize(text: &str) -> Vec<Token> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut tokens = Vec::new();
    for found in TOKEN_PATTERN.find_iter(text) {
        let lowered = found.as_str().to_lowercase();
        if lowered.is_empty() || STOPWORDS.contains(lowered.as_str()) {
            continue;
        }
        tokens.push(Token {
            text: lowered,
            start: found.start(),
            end: found.end(),
        });
    }
    tokens
}

/// Tokenize text into lowercased token strings, dropping offsets.
///
/// Used where only the token sequence matters, such as indexing rule texts.
pub fn tokenize_words(text: &str) -> Vec<String> {
    tokenize(text).into_iter().map(|t| t.text).collect()
}
