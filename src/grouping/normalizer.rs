//! Question text -> event key.
//!
//! Markets that are buckets of the same metric ("$50B-$100B", "less than
//! $50B", ...) only differ by their numeric clause, so the key is built by
//! stripping that clause with an ordered list of pattern rules. Each rule
//! is a plain `(name, regex, replacement)` entry so it can be tested on its
//! own.

use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

/// Maximum key length, in characters.
pub const MAX_KEY_CHARS: usize = 50;

// Optional currency symbol, number with optional thousands separators and
// decimals.
const NUMBER: &str = r"[$€£]?\s?\d+(?:,\d{3})*(?:\.\d+)?";

// Scale units, longest first so "bn" wins over "b".
const UNIT: &str = r"(?:trillion|billion|million|tn|bn|mn|mm|t|b|m)\b";

const COMPARATOR_WORDS: &str = r"(?:between|less than|more than|greater than|fewer than|at least|at most|no more than|no less than|exceeding|exceeds|exceed|under|over|above|below|up to)";

pub struct Rule {
    pub name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        let pattern = Regex::new(pattern).unwrap();
        Self {
            name,
            pattern,
            replacement,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        let out = self.pattern.replace_all(text, self.replacement);
        if out != text {
            trace!(rule = self.name, "normalizer rule matched");
        }
        out.into_owned()
    }
}

static PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:will|does|is|are|did|has|have)\s+").unwrap());

static MAGNITUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){NUMBER}\s*{UNIT}")).unwrap());

static COMPARATOR_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{COMPARATOR_WORDS}\b")).unwrap());

static COMPARATOR_SYMBOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<=|>=|<|>").unwrap());

static OPEN_ENDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bor\s+(?:more|less|fewer|higher|lower|above|below)\b|{NUMBER}\s*(?:{UNIT})?\s*\+"
    ))
    .unwrap()
});

static DASH_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){NUMBER}\s*(?:{UNIT})?\s*-\s*{NUMBER}\s*{UNIT}")).unwrap()
});

/// Bucket-clause stripping rules, applied in order.
static BUCKET_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(
            "between_and",
            &format!(r"(?i)\bbetween\s+{NUMBER}\s*(?:{UNIT})?\s+and\s+{NUMBER}\s*(?:{UNIT})?"),
            " ",
        ),
        Rule::new(
            "dash_range",
            &format!(
                r"(?i){NUMBER}\s*{UNIT}\s*-\s*{NUMBER}\s*(?:{UNIT})?|{NUMBER}\s*(?:{UNIT})?\s*-\s*{NUMBER}\s*{UNIT}"
            ),
            " ",
        ),
        Rule::new(
            "to_range",
            &format!(r"(?i){NUMBER}\s*(?:{UNIT})?\s+to\s+{NUMBER}\s*(?:{UNIT})?"),
            " ",
        ),
        Rule::new(
            "comparator_amount",
            &format!(r"(?i)(?:\b{COMPARATOR_WORDS}\b|<=|>=|<|>)\s*{NUMBER}\s*(?:{UNIT})?"),
            " ",
        ),
        Rule::new(
            "trailing_modifier",
            &format!(
                r"(?i){NUMBER}\s*(?:{UNIT})?\s*(?:\+|\bor\s+(?:more|less|fewer|higher|lower|above|below)\b)"
            ),
            " ",
        ),
        Rule::new("bare_magnitude", &format!(r"(?i){NUMBER}\s*{UNIT}"), " "),
        // A comparator whose amount was stripped by an earlier rule
        // ("between $100B-$150B" leaves "between" before a double gap).
        Rule::new(
            "dangling_comparator",
            &format!(r"(?i)\b{COMPARATOR_WORDS}\s{{2,}}"),
            " ",
        ),
    ]
});

/// Cleanup rules run on every question, bucket or not.
static CLEANUP_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new("comparator_symbols", r"<=|>=|<|>|\+", " "),
        Rule::new("punctuation", r"[?!]", " "),
        Rule::new("whitespace", r"\s+", " "),
    ]
});

const UNICODE_VARIANTS: &[(char, &str)] = &[
    ('\u{00A0}', " "),
    ('\u{2013}', "-"),
    ('\u{2014}', "-"),
    ('\u{2264}', "<="),
    ('\u{2265}', ">="),
];

/// Canonical grouping key for a market question. Total: never fails.
pub fn normalize(question: &str) -> String {
    let text = strip_prefix(question);
    let text = normalize_unicode(&text);

    let text = if is_bucket_question(&text) {
        BUCKET_RULES.iter().fold(text, |acc, rule| rule.apply(&acc))
    } else {
        text
    };

    let text = CLEANUP_RULES.iter().fold(text, |acc, rule| rule.apply(&acc));

    text.trim()
        .to_lowercase()
        .chars()
        .take(MAX_KEY_CHARS)
        .collect()
}

/// Drop at most one leading auxiliary verb.
pub fn strip_prefix(question: &str) -> String {
    PREFIX.replace(question, "").into_owned()
}

pub fn normalize_unicode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match UNICODE_VARIANTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

/// A magnitude-with-unit token plus a comparator, an open-ended modifier
/// ("+", "or more") or a dash range.
pub fn is_bucket_question(text: &str) -> bool {
    if !MAGNITUDE.is_match(text) {
        return false;
    }
    COMPARATOR_WORD.is_match(text)
        || COMPARATOR_SYMBOL.is_match(text)
        || OPEN_ENDED.is_match(text)
        || DASH_RANGE.is_match(text)
}

/// Run a single named bucket or cleanup rule.
#[cfg(test)]
pub fn apply_rule(name: &str, text: &str) -> Option<String> {
    BUCKET_RULES
        .iter()
        .chain(CLEANUP_RULES.iter())
        .find(|rule| rule.name == name)
        .map(|rule| rule.apply(text))
}
