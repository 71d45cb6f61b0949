//! Access modes requested by subjects and granted by rules.
//!
//! Bit values follow the kernel `MAY_*` encoding so masks loaded from
//! existing policy tooling keep their meaning.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

bitflags::bitflags! {
    /// Set of access modes (read, write, execute, append, transmute, lock).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u32 {
        /// Execute (`x`).
        const EXEC = 0x0001;
        /// Write (`w`).
        const WRITE = 0x0002;
        /// Read (`r`).
        const READ = 0x0004;
        /// Append (`a`).
        const APPEND = 0x0008;
        /// Transmute (`t`): objects created in a transmuting directory take its label.
        const TRANSMUTE = 0x1000;
        /// Lock (`l`).
        const LOCK = 0x2000;
    }
}

impl Access {
    /// No access.
    pub const NONE: Access = Access::empty();
    /// Any form of reading: read or execute.
    pub const ANYREAD: Access = Access::READ.union(Access::EXEC);
    /// Every mode.
    pub const ALL: Access = Access::all();

    /// Rendering order of the mode characters.
    const CHARS: [(Access, char); 6] = [
        (Access::READ, 'r'),
        (Access::WRITE, 'w'),
        (Access::EXEC, 'x'),
        (Access::APPEND, 'a'),
        (Access::TRANSMUTE, 't'),
        (Access::LOCK, 'l'),
    ];

    /// True when every mode in `self` is also in `other`.
    pub fn is_subset_of(self, other: Access) -> bool {
        other.contains(self)
    }

    /// Granting write also grants lock.
    pub fn with_write_implied_lock(self) -> Self {
        if self.contains(Access::WRITE) {
            self | Access::LOCK
        } else {
            self
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (mode, ch) in Access::CHARS {
            if self.contains(mode) {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

/// Access string contained a character outside `rwxatl-`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid access mode character '{ch}' in \"{input}\"")]
pub struct AccessParseError {
    /// The offending character.
    pub ch: char,
    /// The full input string.
    pub input: String,
}

impl FromStr for Access {
    type Err = AccessParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut access = Access::NONE;
        for ch in s.chars() {
            access |= match ch {
                'r' | 'R' => Access::READ,
                'w' | 'W' => Access::WRITE,
                'x' | 'X' => Access::EXEC,
                'a' | 'A' => Access::APPEND,
                't' | 'T' => Access::TRANSMUTE,
                'l' | 'L' => Access::LOCK,
                '-' => Access::NONE,
                other => {
                    return Err(AccessParseError {
                        ch: other,
                        input: s.to_owned(),
                    })
                }
            };
        }
        Ok(access)
    }
}

impl Serialize for Access {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
