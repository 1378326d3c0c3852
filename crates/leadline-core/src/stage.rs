//! Deal stage classification from free-text, mixed-script stage labels.
//!
//! Tenants name pipeline stages however they like, so there is no stage enum
//! to match on. Instead a label is normalized and tested against ordered
//! keyword families; the first family with a matching keyword wins.
//!
//! English keywords respect word boundaries so that "Assigned" is not a
//! signed deal. Persian keywords attach suffixes and match as phrases.

use serde::{Deserialize, Serialize};

/// Semantic lifecycle category derived from a stage label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageFamily {
    Signed,
    Canceled,
    Negotiation,
    QuoteSent,
}

impl StageFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageFamily::Signed => "signed",
            StageFamily::Canceled => "canceled",
            StageFamily::Negotiation => "negotiation",
            StageFamily::QuoteSent => "quote_sent",
        }
    }

    /// Signed and canceled deals no longer wait on the customer.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageFamily::Signed | StageFamily::Canceled)
    }
}

/// A stage keyword and how it must sit in the label to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// Whole word: bounded on both sides.
    Word(&'static str),
    /// Word start: bounded on the left, any suffix ("cancel" → "cancelled").
    Stem(&'static str),
    /// Anywhere in the label.
    Phrase(&'static str),
}

impl Keyword {
    pub fn text(&self) -> &'static str {
        match self {
            Keyword::Word(k) | Keyword::Stem(k) | Keyword::Phrase(k) => k,
        }
    }

    /// Test against an already normalized label.
    fn matches(&self, normalized: &str) -> bool {
        match *self {
            Keyword::Phrase(k) => normalized.contains(k),
            Keyword::Stem(k) => normalized
                .match_indices(k)
                .any(|(start, _)| boundary_before(normalized, start)),
            Keyword::Word(k) => normalized.match_indices(k).any(|(start, hit)| {
                boundary_before(normalized, start) && boundary_after(normalized, start + hit.len())
            }),
        }
    }
}

fn boundary_before(text: &str, at: usize) -> bool {
    text[..at]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric())
}

fn boundary_after(text: &str, at: usize) -> bool {
    text[at..]
        .chars()
        .next()
        .map_or(true, |c| !c.is_alphanumeric())
}

/// One keyword family. Keywords are stored already normalized.
#[derive(Debug, Clone, Copy)]
pub struct KeywordFamily {
    pub family: StageFamily,
    pub keywords: &'static [Keyword],
}

impl KeywordFamily {
    fn matches(&self, normalized: &str) -> bool {
        self.keywords.iter().any(|k| k.matches(normalized))
    }
}

/// Keyword families in precedence order.
pub const STAGE_FAMILIES: &[KeywordFamily] = &[
    KeywordFamily {
        family: StageFamily::Signed,
        keywords: &[
            Keyword::Word("signed"),
            Keyword::Word("won"),
            Keyword::Phrase("امضا شد"),
            Keyword::Phrase("قرارداد امضا"),
            Keyword::Phrase("بسته شد"),
            Keyword::Phrase("قرارداد بسته"),
            Keyword::Phrase("برنده"),
        ],
    },
    KeywordFamily {
        family: StageFamily::Canceled,
        keywords: &[
            Keyword::Word("lost"),
            Keyword::Stem("cancel"),
            Keyword::Stem("reject"),
            Keyword::Phrase("لغو"),
            Keyword::Phrase("کنسل"),
            Keyword::Phrase("رد شد"),
            Keyword::Phrase("از دست رفت"),
            Keyword::Phrase("منصرف"),
        ],
    },
    KeywordFamily {
        family: StageFamily::Negotiation,
        keywords: &[Keyword::Stem("negotiation"), Keyword::Phrase("مذاکره")],
    },
    KeywordFamily {
        family: StageFamily::QuoteSent,
        keywords: &[
            Keyword::Stem("quote"),
            Keyword::Stem("proforma"),
            Keyword::Stem("pre invoice"),
            Keyword::Phrase("پیش فاکتور"),
            Keyword::Phrase("پیشفاکتور"),
            Keyword::Phrase("ارسال شد"),
        ],
    },
];

/// Lowercase, fold zero-width joiners, underscores and hyphens into spaces,
/// and collapse runs of whitespace.
pub fn normalize_stage(stage: &str) -> String {
    let folded: String = stage
        .chars()
        .map(|c| match c {
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '_' | '-' => ' ',
            // Arabic keyboard variants of Persian letters
            'ي' => 'ی',
            'ك' => 'ک',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Classify a stage label. The first matching family in precedence order wins.
pub fn classify_stage(stage: &str) -> Option<StageFamily> {
    let normalized = normalize_stage(stage);
    if normalized.is_empty() {
        return None;
    }
    STAGE_FAMILIES
        .iter()
        .find(|f| f.matches(&normalized))
        .map(|f| f.family)
}
