//! Label handles, the universal labels and label text validation.
//!
//! A [`Label`] is an index into the interning arena of a
//! [`LabelTable`](super::table::LabelTable), tagged with the table that
//! issued it. Because every distinct text is interned exactly once,
//! comparing two handles from the same table is the same as comparing their
//! text. The universal labels carry the shared tag and mean the same thing
//! in every table.

use std::fmt;

use thiserror::Error;

/// Labels of this many bytes or more are rejected.
pub const SMK_LONGLABEL: usize = 256;

/// Table tag shared by the universal labels.
pub(crate) const SHARED_TAG: u64 = 0;

/// Opaque handle to an interned label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    tag: u64,
    index: u32,
}

impl Label {
    /// `?`: unknown or unrecognized.
    pub const HUH: Label = Label::shared(0);
    /// `^`: may read and lock anything.
    pub const HAT: Label = Label::shared(1);
    /// `*`: accessible by everyone, useless as a subject.
    pub const STAR: Label = Label::shared(2);
    /// `_`: readable and lockable by everyone.
    pub const FLOOR: Label = Label::shared(3);
    /// Empty text: no such label.
    pub const INVALID: Label = Label::shared(4);
    /// `@`: fully permissive in both directions.
    pub const WEB: Label = Label::shared(5);

    const fn shared(index: u32) -> Self {
        Label {
            tag: SHARED_TAG,
            index,
        }
    }

    pub(crate) fn new(tag: u64, index: u32) -> Self {
        Label { tag, index }
    }

    pub(crate) fn tag(self) -> u64 {
        self.tag
    }

    pub(crate) fn index(self) -> usize {
        // u32 always fits in usize on supported targets.
        usize::try_from(self.index).unwrap_or(usize::MAX)
    }

    /// The universal label this handle denotes, if any.
    pub fn universal(self) -> Option<Universal> {
        if self.tag != SHARED_TAG {
            return None;
        }
        Universal::ALL.get(self.index()).copied()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.universal() {
            Some(u) => write!(f, "{}", u.text()),
            None => write!(f, "#{:x}:{}", self.tag, self.index),
        }
    }
}

/// The fixed labels with rule-independent semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Universal {
    /// `?`
    Huh,
    /// `^`
    Hat,
    /// `*`
    Star,
    /// `_`
    Floor,
    /// empty
    Invalid,
    /// `@`
    Web,
}

impl Universal {
    /// Registration order; a universal label's handle is its position here.
    pub const ALL: [Universal; 6] = [
        Universal::Huh,
        Universal::Hat,
        Universal::Star,
        Universal::Floor,
        Universal::Invalid,
        Universal::Web,
    ];

    /// Label text.
    pub fn text(self) -> &'static str {
        match self {
            Universal::Huh => "?",
            Universal::Hat => "^",
            Universal::Star => "*",
            Universal::Floor => "_",
            Universal::Invalid => "",
            Universal::Web => "@",
        }
    }

    /// Reserved secid.
    pub fn secid(self) -> u32 {
        match self {
            Universal::Huh => 2,
            Universal::Hat => 3,
            Universal::Star => 4,
            Universal::Floor => 5,
            Universal::Invalid => 6,
            Universal::Web => 7,
        }
    }

    /// Handle of this label in every table.
    pub fn label(self) -> Label {
        match self {
            Universal::Huh => Label::HUH,
            Universal::Hat => Label::HAT,
            Universal::Star => Label::STAR,
            Universal::Floor => Label::FLOOR,
            Universal::Invalid => Label::INVALID,
            Universal::Web => Label::WEB,
        }
    }
}

/// Text could not be turned into a label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// Nothing valid before the first disallowed character.
    #[error("empty label")]
    Empty,
    /// Parsed label reached the long-label limit.
    #[error("label of {len} bytes exceeds the 255-byte limit")]
    TooLong {
        /// Length of the parsed prefix.
        len: usize,
    },
    /// Leading `-` is reserved for interface options.
    #[error("labels cannot begin with '-'")]
    ReservedPrefix,
    /// No identifiers left to assign.
    #[error("label identifiers exhausted")]
    Exhausted,
    /// Disallowed characters follow a valid prefix.
    #[error("label has disallowed characters after byte {valid}")]
    Partial {
        /// Length of the valid prefix.
        valid: usize,
    },
}

/// Whether `byte` may appear in a label.
pub fn is_label_byte(byte: u8) -> bool {
    byte > b' ' && byte <= b'~' && !matches!(byte, b'/' | b'"' | b'\\' | b'\'')
}

/// Extract the label prefix of `text`.
///
/// Scans at most `max_len` bytes (`0` scans the whole string) and stops at
/// the first byte that may not appear in a label.
///
/// # Errors
///
/// Returns [`LabelError`] when the text starts with `-`, when the prefix is
/// empty, or when it is [`SMK_LONGLABEL`] bytes or longer.
pub fn parse_label(text: &str, max_len: usize) -> Result<&str, LabelError> {
    if text.starts_with('-') {
        return Err(LabelError::ReservedPrefix);
    }

    let limit = if max_len == 0 {
        text.len()
    } else {
        max_len.min(text.len())
    };
    let len = text
        .bytes()
        .take(limit)
        .position(|b| !is_label_byte(b))
        .unwrap_or(limit);

    if len == 0 {
        return Err(LabelError::Empty);
    }
    if len >= SMK_LONGLABEL {
        return Err(LabelError::TooLong { len });
    }
    // Label bytes are ASCII, so `len` is a char boundary.
    text.get(..len).ok_or(LabelError::Empty)
}

/// Validate that all of `text` is one label, with nothing discarded.
///
/// # Errors
///
/// Returns [`LabelError::Partial`] when only a prefix of `text` is valid,
/// and the errors of [`parse_label`] otherwise.
pub fn parse_whole_label(text: &str) -> Result<&str, LabelError> {
    let label = parse_label(text, 0)?;
    if label.len() == text.len() {
        Ok(label)
    } else {
        Err(LabelError::Partial { valid: label.len() })
    }
}
