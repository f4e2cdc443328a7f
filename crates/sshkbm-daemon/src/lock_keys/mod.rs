//! Remote lock-key state
//!
//! The state is read from `xset q`, whose keyboard section contains lines
//! such as:
//!
//! ```text
//!   00: Caps Lock:   off    01: Num Lock:    on     02: Scroll Lock: off
//! ```

mod monitor;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use monitor::{LockKeyEvent, LockKeyMonitor, DEFAULT_CHANNEL_BUFFER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Caps,
    Num,
    Scroll,
}

impl LockKey {
    pub const ALL: [LockKey; 3] = [LockKey::Caps, LockKey::Num, LockKey::Scroll];

    /// Name as it appears in the query output, before ` Lock`
    pub fn name(self) -> &'static str {
        match self {
            LockKey::Caps => "Caps",
            LockKey::Num => "Num",
            LockKey::Scroll => "Scroll",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    On,
    Off,
    /// Not present in the query output
    #[default]
    Unknown,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::On => write!(f, "on"),
            LockState::Off => write!(f, "off"),
            LockState::Unknown => write!(f, "unknown"),
        }
    }
}

/// State of all three lock keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKeyState {
    pub caps: LockState,
    pub num: LockState,
    pub scroll: LockState,
}

impl LockKeyState {
    pub fn get(&self, key: LockKey) -> LockState {
        match key {
            LockKey::Caps => self.caps,
            LockKey::Num => self.num,
            LockKey::Scroll => self.scroll,
        }
    }

    /// Parse lock-key state from query output.
    ///
    /// Each key takes the first `<Name>` `Lock:` `on|off` match, with optional
    /// whitespace around `Lock:`. The name is case-sensitive, the state is not.
    /// Keys without a match are `Unknown`.
    pub fn parse(output: &str) -> Self {
        Self {
            caps: find_state(output, LockKey::Caps.name()),
            num: find_state(output, LockKey::Num.name()),
            scroll: find_state(output, LockKey::Scroll.name()),
        }
    }
}

impl fmt::Display for LockKeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Caps Lock: {}, Num Lock: {}, Scroll Lock: {}",
            self.caps, self.num, self.scroll
        )
    }
}

fn find_state(output: &str, name: &str) -> LockState {
    output
        .match_indices(name)
        .find_map(|(start, _)| state_after(&output[start + name.len()..]))
        .unwrap_or(LockState::Unknown)
}

/// Match `\s*Lock:\s*(on|off)` at the start of `rest`
fn state_after(rest: &str) -> Option<LockState> {
    let rest = rest.trim_start().strip_prefix("Lock:")?.trim_start();
    let head = |n: usize| rest.get(..n).map(|s| s.to_ascii_lowercase());

    if head(2).as_deref() == Some("on") {
        Some(LockState::On)
    } else if head(3).as_deref() == Some("off") {
        Some(LockState::Off)
    } else {
        None
    }
}
