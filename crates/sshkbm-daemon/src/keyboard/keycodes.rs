//! Platform key codes and their X keysym names
//!
//! Key events arrive with Qt-style key codes: printable keys use their
//! Unicode code point (letters are reported upper-case, `0x41..=0x5A`), and
//! special keys live above `0x0100_0000`. The tables here resolve a code to the
//! keysym name xdotool expects (see `X11/keysymdef.h`).

/// First code of the dead-key sub-range
pub const DEAD_KEY_FIRST: u32 = 0x0100_1250;
/// Last code of the dead-key sub-range
pub const DEAD_KEY_LAST: u32 = 0x0100_1262;
/// Codes at or above this value are special keys, never characters
pub const SPECIAL_KEY_BASE: u32 = 0x0100_0000;

/// Diacritic-composing keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadKey {
    Grave,
    Acute,
    Circumflex,
    Tilde,
    Macron,
    Breve,
    Abovedot,
    Diaeresis,
    Abovering,
    Doubleacute,
    Caron,
    Cedilla,
    Ogonek,
    Iota,
    VoicedSound,
    SemivoicedSound,
    Belowdot,
    Hook,
    Horn,
}

impl DeadKey {
    /// Look up a code in the dead-key sub-range
    pub fn from_code(code: u32) -> Option<Self> {
        let key = match code {
            0x0100_1250 => Self::Grave,
            0x0100_1251 => Self::Acute,
            0x0100_1252 => Self::Circumflex,
            0x0100_1253 => Self::Tilde,
            0x0100_1254 => Self::Macron,
            0x0100_1255 => Self::Breve,
            0x0100_1256 => Self::Abovedot,
            0x0100_1257 => Self::Diaeresis,
            0x0100_1258 => Self::Abovering,
            0x0100_1259 => Self::Doubleacute,
            0x0100_125a => Self::Caron,
            0x0100_125b => Self::Cedilla,
            0x0100_125c => Self::Ogonek,
            0x0100_125d => Self::Iota,
            0x0100_125e => Self::VoicedSound,
            0x0100_125f => Self::SemivoicedSound,
            0x0100_1260 => Self::Belowdot,
            0x0100_1261 => Self::Hook,
            0x0100_1262 => Self::Horn,
            _ => return None,
        };
        Some(key)
    }

    pub fn keysym_name(self) -> &'static str {
        match self {
            Self::Grave => "dead_grave",
            Self::Acute => "dead_acute",
            Self::Circumflex => "dead_circumflex",
            Self::Tilde => "dead_tilde",
            Self::Macron => "dead_macron",
            Self::Breve => "dead_breve",
            Self::Abovedot => "dead_abovedot",
            Self::Diaeresis => "dead_diaeresis",
            Self::Abovering => "dead_abovering",
            Self::Doubleacute => "dead_doubleacute",
            Self::Caron => "dead_caron",
            Self::Cedilla => "dead_cedilla",
            Self::Ogonek => "dead_ogonek",
            Self::Iota => "dead_iota",
            Self::VoicedSound => "dead_voiced_sound",
            Self::SemivoicedSound => "dead_semivoiced_sound",
            Self::Belowdot => "dead_belowdot",
            Self::Hook => "dead_hook",
            Self::Horn => "dead_horn",
        }
    }
}

/// Non-character keys with a multi-character keysym name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Escape,
    Tab,
    Backtab,
    Backspace,
    Return,
    Enter,
    Insert,
    Delete,
    Pause,
    Print,
    SysReq,
    Clear,
    Home,
    End,
    Left,
    Up,
    Right,
    Down,
    PageUp,
    PageDown,
    Shift,
    Control,
    Meta,
    Alt,
    CapsLock,
    NumLock,
    ScrollLock,
    /// F1 to F35
    Function(u8),
    SuperL,
    SuperR,
    Menu,
    HyperL,
    HyperR,
    Help,
    AltGr,
    MultiKey,
    VolumeDown,
    VolumeMute,
    VolumeUp,
    MediaPlay,
    MediaStop,
    MediaPrevious,
    MediaNext,
    MediaPause,
    MediaTogglePlayPause,
}

impl NamedKey {
    pub fn from_code(code: u32) -> Option<Self> {
        let key = match code {
            0x0100_0000 => Self::Escape,
            0x0100_0001 => Self::Tab,
            0x0100_0002 => Self::Backtab,
            0x0100_0003 => Self::Backspace,
            0x0100_0004 => Self::Return,
            0x0100_0005 => Self::Enter,
            0x0100_0006 => Self::Insert,
            0x0100_0007 => Self::Delete,
            0x0100_0008 => Self::Pause,
            0x0100_0009 => Self::Print,
            0x0100_000a => Self::SysReq,
            0x0100_000b => Self::Clear,
            0x0100_0010 => Self::Home,
            0x0100_0011 => Self::End,
            0x0100_0012 => Self::Left,
            0x0100_0013 => Self::Up,
            0x0100_0014 => Self::Right,
            0x0100_0015 => Self::Down,
            0x0100_0016 => Self::PageUp,
            0x0100_0017 => Self::PageDown,
            0x0100_0020 => Self::Shift,
            0x0100_0021 => Self::Control,
            0x0100_0022 => Self::Meta,
            0x0100_0023 => Self::Alt,
            0x0100_0024 => Self::CapsLock,
            0x0100_0025 => Self::NumLock,
            0x0100_0026 => Self::ScrollLock,
            0x0100_0030..=0x0100_0052 => Self::Function((code - 0x0100_0030 + 1) as u8),
            0x0100_0053 => Self::SuperL,
            0x0100_0054 => Self::SuperR,
            0x0100_0055 => Self::Menu,
            0x0100_0056 => Self::HyperL,
            0x0100_0057 => Self::HyperR,
            0x0100_0058 => Self::Help,
            0x0100_0070 => Self::VolumeDown,
            0x0100_0071 => Self::VolumeMute,
            0x0100_0072 => Self::VolumeUp,
            0x0100_0080 => Self::MediaPlay,
            0x0100_0081 => Self::MediaStop,
            0x0100_0082 => Self::MediaPrevious,
            0x0100_0083 => Self::MediaNext,
            0x0100_0085 => Self::MediaPause,
            0x0100_0086 => Self::MediaTogglePlayPause,
            0x0100_1103 => Self::AltGr,
            0x0100_1120 => Self::MultiKey,
            _ => return None,
        };
        Some(key)
    }

    pub fn keysym_name(self) -> std::borrow::Cow<'static, str> {
        let name = match self {
            Self::Escape => "Escape",
            Self::Tab => "Tab",
            Self::Backtab => "ISO_Left_Tab",
            Self::Backspace => "BackSpace",
            // Keypad Enter arrives as Enter with the keypad bit set; `KP_Return`
            // is substituted to `KP_Enter` later.
            Self::Return | Self::Enter => "Return",
            Self::Insert => "Insert",
            Self::Delete => "Delete",
            Self::Pause => "Pause",
            Self::Print => "Print",
            Self::SysReq => "Sys_Req",
            Self::Clear => "Clear",
            Self::Home => "Home",
            Self::End => "End",
            Self::Left => "Left",
            Self::Up => "Up",
            Self::Right => "Right",
            Self::Down => "Down",
            Self::PageUp => "Prior",
            Self::PageDown => "Next",
            Self::Shift => "Shift_L",
            Self::Control => "Control_L",
            Self::Meta => "Meta_L",
            Self::Alt => "Alt_L",
            Self::CapsLock => "Caps_Lock",
            Self::NumLock => "Num_Lock",
            Self::ScrollLock => "Scroll_Lock",
            Self::Function(n) => return std::borrow::Cow::Owned(format!("F{}", n)),
            Self::SuperL => "Super_L",
            Self::SuperR => "Super_R",
            Self::Menu => "Menu",
            Self::HyperL => "Hyper_L",
            Self::HyperR => "Hyper_R",
            Self::Help => "Help",
            Self::AltGr => "ISO_Level3_Shift",
            Self::MultiKey => "Multi_key",
            Self::VolumeDown => "XF86AudioLowerVolume",
            Self::VolumeMute => "XF86AudioMute",
            Self::VolumeUp => "XF86AudioRaiseVolume",
            Self::MediaPlay => "XF86AudioPlay",
            Self::MediaStop => "XF86AudioStop",
            Self::MediaPrevious => "XF86AudioPrev",
            Self::MediaNext => "XF86AudioNext",
            Self::MediaPause => "XF86AudioPause",
            Self::MediaTogglePlayPause => "XF86AudioPlay",
        };
        std::borrow::Cow::Borrowed(name)
    }
}

/// Resolve a platform key code to a keysym name.
///
/// Returns `None` when the code has no text representation: unknown special
/// keys, control characters and values that are not Unicode scalar values.
pub fn resolve_code(code: u32) -> Option<String> {
    if (DEAD_KEY_FIRST..=DEAD_KEY_LAST).contains(&code) {
        return DeadKey::from_code(code).map(|k| k.keysym_name().to_string());
    }

    if (0x41..=0x5a).contains(&code) || (0x61..=0x7a).contains(&code) {
        return char::from_u32(code).map(String::from);
    }

    if let Some(key) = NamedKey::from_code(code) {
        return Some(key.keysym_name().into_owned());
    }

    if code >= SPECIAL_KEY_BASE {
        return None;
    }

    char::from_u32(code)
        .filter(|c| !c.is_control())
        .map(String::from)
}
