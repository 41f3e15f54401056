//! Keypath Parsing
//!
//! Keypaths are slash-separated steps from a chain's master key,
//! e.g. `m/44'/0'/0'/0/1`. A trailing `'`, `h` or `H` hardens a step.
//! Templates carry a `c` fragment standing for the branch digit
//! (0 external, 1 internal) that must be substituted before parsing.

use std::fmt;

use bitcoin::bip32::ChildNumber;
use thiserror::Error;

use crate::config::HARDENED_MARKERS;
use crate::error::KeyStoreError;
use crate::types::{BRANCH_PLACEHOLDER, HARDENED_OFFSET};

const MASTER_FRAGMENT: &str = "m";

/// Keypath parse failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeypathError {
    #[error("Keypath is empty")]
    Empty,

    #[error("Keypath must start at the master key 'm': {0}")]
    MissingMaster(String),

    #[error("Master fragment 'm' may only appear first")]
    MisplacedMaster,

    #[error("Empty fragment at position {0}")]
    EmptyFragment(usize),

    #[error("Branch placeholder 'c' was not substituted")]
    UnsubstitutedBranch,

    #[error("Invalid child index: {0}")]
    InvalidIndex(String),
}

impl From<KeypathError> for KeyStoreError {
    fn from(e: KeypathError) -> Self {
        KeyStoreError::invalid_keypath(e.to_string())
    }
}

/// One derivation step below the master key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    /// Raw index, always below [`HARDENED_OFFSET`]
    pub index: u32,
    pub hardened: bool,
}

impl PathStep {
    pub fn new(index: u32, hardened: bool) -> Self {
        Self { index, hardened }
    }

    /// Index including the hardened offset
    pub fn full_index(&self) -> u32 {
        if self.hardened {
            self.index | HARDENED_OFFSET
        } else {
            self.index
        }
    }

    pub fn child_number(&self) -> ChildNumber {
        ChildNumber::from(self.full_index())
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// A parsed keypath: the master key followed by zero or more steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypath {
    steps: Vec<PathStep>,
}

impl Keypath {
    /// Parse a keypath, left to right
    pub fn parse(path: &str) -> Result<Self, KeypathError> {
        if path.is_empty() {
            return Err(KeypathError::Empty);
        }

        let mut fragments = path.split('/').enumerate();

        // The first fragment must be the master key
        match fragments.next() {
            Some((_, first)) if strip_marker(first).0 == MASTER_FRAGMENT => {}
            _ => return Err(KeypathError::MissingMaster(path.to_string())),
        }

        let mut steps = Vec::new();
        for (position, fragment) in fragments {
            if fragment.is_empty() {
                return Err(KeypathError::EmptyFragment(position));
            }

            let (body, hardened) = strip_marker(fragment);
            match body {
                MASTER_FRAGMENT => return Err(KeypathError::MisplacedMaster),
                BRANCH_PLACEHOLDER => return Err(KeypathError::UnsubstitutedBranch),
                _ => steps.push(PathStep::new(parse_index(body)?, hardened)),
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }
}

impl fmt::Display for Keypath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", MASTER_FRAGMENT)?;
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

/// Split a trailing hardening marker off a fragment
fn strip_marker(fragment: &str) -> (&str, bool) {
    match fragment.strip_suffix(&HARDENED_MARKERS[..]) {
        Some(body) => (body, true),
        None => (fragment, false),
    }
}

fn parse_index(body: &str) -> Result<u32, KeypathError> {
    // u32::from_str accepts a leading '+'
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(KeypathError::InvalidIndex(body.to_string()));
    }

    match body.parse::<u32>() {
        Ok(index) if index < HARDENED_OFFSET => Ok(index),
        _ => Err(KeypathError::InvalidIndex(body.to_string())),
    }
}

/// Substitute the branch digit into every `c` fragment of a template
pub fn resolve_template(template: &str, internal: bool) -> String {
    let digit = if internal { "1" } else { "0" };

    template
        .split('/')
        .map(|fragment| {
            let (body, _) = strip_marker(fragment);
            if body == BRANCH_PLACEHOLDER {
                format!("{}{}", digit, &fragment[body.len()..])
            } else {
                fragment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
