//! Cell state values
//!
//! A [`CellState`] is the value one cell holds at one generation. The
//! encoding is chosen by the rule (binary, k-state integer, or colour)
//! and every encoding supports the same conversions: a canonical integer,
//! a string form, and "empty"/"full" canonical values.
//!
//! States also carry an optional [`Tag`]. Tags are used by analyses to
//! highlight cells and never take part in equality: two states with the
//! same value are equal whether or not either is tagged.

use crate::color::Rgb;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of whoever placed a tag (usually an analysis)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagOwner(pub u32);

impl fmt::Display for TagOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner:{}", self.0)
    }
}

/// Encoding family of a state, used to build blank states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// Two states, 0 and 1
    Binary,
    /// `states` values numbered `0..states`
    Integer { states: u32 },
    /// 24-bit colour
    Color,
}

impl StateKind {
    /// The empty (zero) state of this kind
    pub fn blank(&self) -> CellState {
        let value = match *self {
            StateKind::Binary => StateValue::Binary(false),
            StateKind::Integer { states } => StateValue::Integer {
                value: 0,
                states: states.max(1),
            },
            StateKind::Color => StateValue::Color(Rgb::BLACK),
        };
        CellState::new(value)
    }

    /// Number of distinct values
    pub fn num_states(&self) -> u32 {
        match *self {
            StateKind::Binary => 2,
            StateKind::Integer { states } => states.max(1),
            StateKind::Color => 1 << 24,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StateKind::Binary => "binary",
            StateKind::Integer { .. } => "integer",
            StateKind::Color => "color",
        }
    }
}

/// The semantic value of a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateValue {
    Binary(bool),
    Integer { value: u32, states: u32 },
    Color(Rgb),
}

/// A marker placed on a state by an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub owner: TagOwner,
}

/// The value of one cell at one generation, plus an optional tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CellState {
    value: StateValue,
    tag: Option<Tag>,
}

impl CellState {
    /// Create an untagged state
    pub fn new(value: StateValue) -> Self {
        Self { value, tag: None }
    }

    /// Binary state
    pub fn binary(alive: bool) -> Self {
        Self::new(StateValue::Binary(alive))
    }

    /// Integer state in `0..states`
    pub fn integer(value: u32, states: u32) -> Result<Self> {
        if states == 0 || value >= states {
            return Err(Error::InvalidState(format!(
                "integer value {} out of range for {} states",
                value, states
            )));
        }
        Ok(Self::new(StateValue::Integer { value, states }))
    }

    /// Colour state
    pub fn color(rgb: Rgb) -> Self {
        Self::new(StateValue::Color(rgb))
    }

    pub fn value(&self) -> StateValue {
        self.value
    }

    /// The encoding family of this state
    pub fn kind(&self) -> StateKind {
        match self.value {
            StateValue::Binary(_) => StateKind::Binary,
            StateValue::Integer { states, .. } => StateKind::Integer { states },
            StateValue::Color(_) => StateKind::Color,
        }
    }

    /// Number of distinct values of this state's kind
    pub fn num_states(&self) -> u32 {
        self.kind().num_states()
    }

    /// Canonical integer form
    ///
    /// Binary maps to 0/1, integer to its value, colour to `0xRRGGBB`.
    pub fn to_int(&self) -> u32 {
        match self.value {
            StateValue::Binary(b) => b as u32,
            StateValue::Integer { value, .. } => value,
            StateValue::Color(rgb) => rgb.to_u32(),
        }
    }

    /// A state of the same kind holding the canonical integer `n`
    ///
    /// The tag is not carried over.
    pub fn with_int(&self, n: u32) -> Result<CellState> {
        let value = match self.value {
            StateValue::Binary(_) => match n {
                0 => StateValue::Binary(false),
                1 => StateValue::Binary(true),
                _ => {
                    return Err(Error::InvalidState(format!(
                        "binary state cannot hold {}",
                        n
                    )))
                }
            },
            StateValue::Integer { states, .. } => return CellState::integer(n, states),
            StateValue::Color(_) => {
                if n > 0x00ff_ffff {
                    return Err(Error::InvalidState(format!(
                        "colour state cannot hold {:#x}",
                        n
                    )));
                }
                StateValue::Color(Rgb::from_u32(n))
            }
        };
        Ok(CellState::new(value))
    }

    /// The empty value of this kind
    pub fn empty(&self) -> CellState {
        self.kind().blank()
    }

    /// The full value of this kind (all ones, highest integer, white)
    pub fn full(&self) -> CellState {
        let value = match self.value {
            StateValue::Binary(_) => StateValue::Binary(true),
            StateValue::Integer { states, .. } => StateValue::Integer {
                value: states.saturating_sub(1),
                states,
            },
            StateValue::Color(_) => StateValue::Color(Rgb::WHITE),
        };
        CellState::new(value)
    }

    pub fn is_empty(&self) -> bool {
        *self == self.empty()
    }

    pub fn is_full(&self) -> bool {
        *self == self.full()
    }

    /// Parse the string form of a state of the same kind as `self`
    pub fn parse_like(&self, input: &str) -> Result<CellState> {
        let trimmed = input.trim();
        let parse_error = || Error::StateParse {
            kind: self.kind().name(),
            input: input.to_string(),
        };
        match self.value {
            StateValue::Color(_) => Rgb::parse_hex(trimmed)
                .map(CellState::color)
                .ok_or_else(parse_error),
            _ => {
                let n: u32 = trimmed.parse().map_err(|_| parse_error())?;
                self.with_int(n).map_err(|_| parse_error())
            }
        }
    }

    // ========================================================================
    // Tags
    // ========================================================================

    pub fn tag(&self) -> Option<Tag> {
        self.tag
    }

    pub fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }

    /// Place (or replace) the tag
    pub fn set_tag(&mut self, owner: TagOwner) {
        self.tag = Some(Tag { owner });
    }

    /// Remove the tag if `owner` placed it
    ///
    /// Returns true if a tag was removed.
    pub fn clear_tag(&mut self, owner: TagOwner) -> bool {
        match self.tag {
            Some(tag) if tag.owner == owner => {
                self.tag = None;
                true
            }
            _ => false,
        }
    }

    /// Copy of `self` carrying the tag of `other`, if any
    pub fn with_tag_from(mut self, other: &CellState) -> CellState {
        if let Some(tag) = other.tag {
            self.tag = Some(tag);
        }
        self
    }
}

impl PartialEq for CellState {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for CellState {}

impl Hash for CellState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            StateValue::Color(rgb) => write!(f, "{}", rgb),
            _ => write!(f, "{}", self.to_int()),
        }
    }
}

impl From<bool> for CellState {
    fn from(alive: bool) -> Self {
        CellState::binary(alive)
    }
}
