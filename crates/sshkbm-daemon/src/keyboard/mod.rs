//! Key event encoding
//!
//! Turns a local key press into the key-combination string accepted by
//! `xdotool key`, e.g. `Ctrl+Shift+a` or `KP_Enter`.
//!
//! ## Encoding steps
//!
//! 1. Resolve the raw key to a name: dead keys, ASCII letters, the named key
//!    table, then any printable character (see [`keycodes::resolve_code`]).
//! 2. Clear live modifier bits when `ignore_modifiers` is set. Sticky
//!    modifiers are unaffected.
//! 3. Prefix `KP_` when the key came from the numeric keypad.
//! 4. Substitute punctuation with its keysym name (see [`symbols`]).
//! 5. Lower-case single-character names; case is carried by `Shift`.
//! 6. Prepend modifier tokens in the fixed order
//!    `Multi_key`, `Ctrl`, `Shift`, `Alt`, `Super`, `ISO_Level3_Shift`.
//!
//! A key whose name cannot form a valid token is skipped: no command is sent.

pub mod keycodes;
pub mod symbols;

use std::fmt;

use serde::{Deserialize, Serialize};
use sshkbm_config::StickyModifier;

/// A key as reported by the input surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawKey {
    /// Platform key code (see [`keycodes`])
    Code(u32),
    /// Literal key name or character, e.g. `F5` or `é`
    Text(String),
}

/// Modifier bits carried by the key event itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveModifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
    /// The key was pressed on the numeric keypad
    pub keypad: bool,
}

impl LiveModifiers {
    pub const SHIFT_MASK: u32 = 0x0200_0000;
    pub const CONTROL_MASK: u32 = 0x0400_0000;
    pub const ALT_MASK: u32 = 0x0800_0000;
    pub const META_MASK: u32 = 0x1000_0000;
    pub const KEYPAD_MASK: u32 = 0x2000_0000;

    /// Decode a platform keyboard modifier mask
    pub fn from_mask(mask: u32) -> Self {
        Self {
            ctrl: mask & Self::CONTROL_MASK != 0,
            shift: mask & Self::SHIFT_MASK != 0,
            alt: mask & Self::ALT_MASK != 0,
            meta: mask & Self::META_MASK != 0,
            keypad: mask & Self::KEYPAD_MASK != 0,
        }
    }
}

/// Modifier toggles held down by the UI until switched off
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickyModifiers {
    pub compose: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    #[serde(rename = "super")]
    pub super_key: bool,
    pub altgr: bool,
}

impl StickyModifiers {
    /// Combine two toggle sets (e.g. configured defaults and per-event toggles)
    pub fn union(self, other: Self) -> Self {
        Self {
            compose: self.compose || other.compose,
            ctrl: self.ctrl || other.ctrl,
            shift: self.shift || other.shift,
            alt: self.alt || other.alt,
            super_key: self.super_key || other.super_key,
            altgr: self.altgr || other.altgr,
        }
    }
}

impl From<&[StickyModifier]> for StickyModifiers {
    fn from(modifiers: &[StickyModifier]) -> Self {
        let mut sticky = Self::default();
        for modifier in modifiers {
            match modifier {
                StickyModifier::Compose => sticky.compose = true,
                StickyModifier::Ctrl => sticky.ctrl = true,
                StickyModifier::Shift => sticky.shift = true,
                StickyModifier::Alt => sticky.alt = true,
                StickyModifier::Super => sticky.super_key = true,
                StickyModifier::AltGr => sticky.altgr = true,
            }
        }
        sticky
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Drop live modifier bits, keeping only sticky modifiers
    pub ignore_modifiers: bool,
}

/// Modifier token in a key combination.
///
/// Variant order is the order tokens appear in the serialized combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModifierToken {
    Compose,
    Ctrl,
    Shift,
    Alt,
    Super,
    AltGr,
}

impl fmt::Display for ModifierToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierToken::Compose => write!(f, "Multi_key"),
            ModifierToken::Ctrl => write!(f, "Ctrl"),
            ModifierToken::Shift => write!(f, "Shift"),
            ModifierToken::Alt => write!(f, "Alt"),
            ModifierToken::Super => write!(f, "Super"),
            ModifierToken::AltGr => write!(f, "ISO_Level3_Shift"),
        }
    }
}

/// Modifier tokens followed by exactly one base key token.
///
/// Serializes as the tokens joined by `+`, e.g. `Ctrl+Shift+a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombination {
    modifiers: Vec<ModifierToken>,
    key: String,
}

impl KeyCombination {
    pub fn modifiers(&self) -> &[ModifierToken] {
        &self.modifiers
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for KeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}+", modifier)?;
        }
        write!(f, "{}", self.key)
    }
}

/// Result of encoding a key event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    Combination(KeyCombination),
    /// The key has no representable name; nothing should be sent
    Skip,
}

impl Encoded {
    pub fn combination(self) -> Option<KeyCombination> {
        match self {
            Encoded::Combination(combination) => Some(combination),
            Encoded::Skip => None,
        }
    }
}

/// Encode a key event into a key combination.
pub fn encode(
    raw: &RawKey,
    live: LiveModifiers,
    sticky: StickyModifiers,
    config: &EncoderConfig,
) -> Encoded {
    let Some(mut name) = resolve(raw) else {
        tracing::trace!(?raw, "Skipping key without a text representation");
        return Encoded::Skip;
    };

    let live = if config.ignore_modifiers {
        LiveModifiers::default()
    } else {
        live
    };

    if live.keypad {
        name = format!("KP_{}", name);
    }

    if let Some(keysym) = symbols::substitute(&name) {
        name = keysym.to_string();
    }

    if name.chars().count() == 1 {
        name = name.to_lowercase();
    }

    if !is_valid_token(&name) {
        tracing::trace!(?raw, name, "Skipping key with an invalid token");
        return Encoded::Skip;
    }

    let flags = [
        (ModifierToken::Compose, sticky.compose),
        (ModifierToken::Ctrl, sticky.ctrl || live.ctrl),
        (ModifierToken::Shift, sticky.shift || live.shift),
        (ModifierToken::Alt, sticky.alt || live.alt),
        (ModifierToken::Super, sticky.super_key || live.meta),
        (ModifierToken::AltGr, sticky.altgr),
    ];
    let modifiers = flags
        .into_iter()
        .filter_map(|(token, active)| active.then_some(token))
        .collect();

    Encoded::Combination(KeyCombination {
        modifiers,
        key: name,
    })
}

fn resolve(raw: &RawKey) -> Option<String> {
    match raw {
        RawKey::Code(code) => keycodes::resolve_code(*code),
        RawKey::Text(text) if text.is_empty() => None,
        RawKey::Text(text) => Some(text.clone()),
    }
}

/// A base token must survive being joined with `+` and passed as one shell word
fn is_valid_token(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('+')
        && !name.chars().any(|c| c.is_whitespace() || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(raw: RawKey, live: LiveModifiers) -> String {
        match encode(&raw, live, StickyModifiers::default(), &EncoderConfig::default()) {
            Encoded::Combination(c) => c.to_string(),
            Encoded::Skip => panic!("unexpected skip for {:?}", raw),
        }
    }

    fn ctrl() -> LiveModifiers {
        LiveModifiers {
            ctrl: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_letters_always_lower_case() {
        let shift = LiveModifiers {
            shift: true,
            ..Default::default()
        };
        for code in (0x41..=0x5a).chain(0x61..=0x7a) {
            let expected = char::from_u32(code).unwrap().to_ascii_lowercase().to_string();

            let plain = encode(
                &RawKey::Code(code),
                LiveModifiers::default(),
                StickyModifiers::default(),
                &EncoderConfig::default(),
            )
            .combination()
            .unwrap();
            assert_eq!(plain.key(), expected);
            assert!(plain.modifiers().is_empty());

            let shifted = encode(
                &RawKey::Code(code),
                shift,
                StickyModifiers::default(),
                &EncoderConfig::default(),
            )
            .combination()
            .unwrap();
            assert_eq!(shifted.key(), expected);
            assert_eq!(shifted.modifiers(), &[ModifierToken::Shift]);
        }
    }

    #[test]
    fn test_ctrl_a() {
        assert_eq!(enc(RawKey::Code(0x41), ctrl()), "Ctrl+a");
    }

    #[test]
    fn test_ctrl_shift_a() {
        let live = LiveModifiers {
            ctrl: true,
            shift: true,
            ..Default::default()
        };
        assert_eq!(enc(RawKey::Code(0x41), live), "Ctrl+Shift+a");
    }

    #[test]
    fn test_named_key_keeps_case() {
        let live = LiveModifiers {
            alt: true,
            ..Default::default()
        };
        assert_eq!(enc(RawKey::Code(0x0100_0034), live), "Alt+F5");
        assert_eq!(enc(RawKey::Code(0x0100_0000), LiveModifiers::default()), "Escape");
    }

    #[test]
    fn test_dead_key() {
        assert_eq!(
            enc(RawKey::Code(0x0100_1253), LiveModifiers::default()),
            "dead_tilde"
        );
    }

    #[test]
    fn test_modifier_order_is_fixed() {
        let live = LiveModifiers {
            ctrl: true,
            shift: true,
            alt: true,
            meta: true,
            keypad: false,
        };
        let sticky = StickyModifiers {
            compose: true,
            altgr: true,
            ..Default::default()
        };
        let combo = encode(&RawKey::Code(0x58), live, sticky, &EncoderConfig::default())
            .combination()
            .unwrap();
        assert_eq!(
            combo.to_string(),
            "Multi_key+Ctrl+Shift+Alt+Super+ISO_Level3_Shift+x"
        );
    }

    #[test]
    fn test_sticky_and_live_are_or_ed() {
        let sticky = StickyModifiers {
            ctrl: true,
            ..Default::default()
        };
        let combo = encode(&RawKey::Code(0x41), ctrl(), sticky, &EncoderConfig::default())
            .combination()
            .unwrap();
        assert_eq!(combo.to_string(), "Ctrl+a");
    }

    #[test]
    fn test_ignore_modifiers_keeps_sticky() {
        let live = LiveModifiers {
            ctrl: true,
            shift: true,
            keypad: true,
            ..Default::default()
        };
        let sticky = StickyModifiers {
            alt: true,
            ..Default::default()
        };
        let config = EncoderConfig {
            ignore_modifiers: true,
        };
        let combo = encode(&RawKey::Code(0x31), live, sticky, &config)
            .combination()
            .unwrap();
        assert_eq!(combo.to_string(), "Alt+1");
    }

    #[test]
    fn test_keypad_prefix() {
        let keypad = LiveModifiers {
            keypad: true,
            ..Default::default()
        };
        assert_eq!(enc(RawKey::Code(0x35), keypad), "KP_5");
        assert_eq!(enc(RawKey::Code(0x2b), keypad), "KP_Add");
        assert_eq!(enc(RawKey::Code(0x0100_0005), keypad), "KP_Enter");
        assert_eq!(enc(RawKey::Code(0x0100_0016), keypad), "KP_Page_Up");
    }

    #[test]
    fn test_keypad_mask_decoding() {
        let live = LiveModifiers::from_mask(LiveModifiers::KEYPAD_MASK | LiveModifiers::CONTROL_MASK);
        assert!(live.keypad);
        assert!(live.ctrl);
        assert!(!live.shift);
        assert_eq!(enc(RawKey::Code(0x37), live), "Ctrl+KP_7");
    }

    #[test]
    fn test_symbol_substitution() {
        assert_eq!(enc(RawKey::Code(0x21), LiveModifiers::default()), "exclam");
        assert_eq!(enc(RawKey::Code(0x2b), ctrl()), "Ctrl+plus");
        assert_eq!(enc(RawKey::Code(0x20), LiveModifiers::default()), "space");
        assert_eq!(enc(RawKey::Text("!".into()), LiveModifiers::default()), "exclam");
    }

    #[test]
    fn test_literal_text() {
        assert_eq!(enc(RawKey::Text("A".into()), LiveModifiers::default()), "a");
        assert_eq!(enc(RawKey::Text("Page_Up".into()), ctrl()), "Ctrl+Page_Up");
        assert_eq!(enc(RawKey::Text("É".into()), LiveModifiers::default()), "é");
    }

    #[test]
    fn test_skip_unrepresentable() {
        let skip = |raw: RawKey| {
            encode(
                &raw,
                ctrl(),
                StickyModifiers::default(),
                &EncoderConfig::default(),
            )
        };
        assert_eq!(skip(RawKey::Code(0xd800)), Encoded::Skip);
        assert_eq!(skip(RawKey::Code(0x0100_ffff)), Encoded::Skip);
        assert_eq!(skip(RawKey::Text(String::new())), Encoded::Skip);
        assert_eq!(skip(RawKey::Text("a b".into())), Encoded::Skip);
        assert_eq!(skip(RawKey::Text("Ctrl+a".into())), Encoded::Skip);
    }

    #[test]
    fn test_sticky_from_config() {
        let sticky = StickyModifiers::from(
            [StickyModifier::Compose, StickyModifier::Super].as_slice(),
        );
        assert!(sticky.compose);
        assert!(sticky.super_key);
        assert!(!sticky.ctrl);
    }

    #[test]
    fn test_sticky_union() {
        let a = StickyModifiers {
            ctrl: true,
            ..Default::default()
        };
        let b = StickyModifiers {
            altgr: true,
            ..Default::default()
        };
        let both = a.union(b);
        assert!(both.ctrl && both.altgr);
        assert!(!both.shift);
    }

    #[test]
    fn test_sticky_serde_uses_super_name() {
        let json = r#"{"super":true}"#;
        let sticky: StickyModifiers = serde_json::from_str(json).unwrap();
        assert!(sticky.super_key);
        assert!(!sticky.ctrl);
    }
}
