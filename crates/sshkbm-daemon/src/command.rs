//! Remote command grammar
//!
//! Renders input commands and the lock-key query into shell command strings
//! for one display target, e.g.
//!
//! ```text
//! DISPLAY=:0 xdotool key Ctrl+a
//! DISPLAY=:0 xdotool type 'hello world'
//! DISPLAY=:0 xdotool mousemove_relative --polar 90 200
//! DISPLAY=:0 xdotool click 3
//! DISPLAY=:0 xset q
//! ```

use std::borrow::Cow;
use std::fmt;

use crate::keyboard::KeyCombination;

/// Pointer buttons, numbered as X11 reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Left,
    Middle,
    Right,
    ScrollUp,
    ScrollDown,
}

impl Button {
    pub fn number(self) -> u8 {
        match self {
            Button::Left => 1,
            Button::Middle => 2,
            Button::Right => 3,
            Button::ScrollUp => 4,
            Button::ScrollDown => 5,
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Button::Left => "left click",
            Button::Middle => "middle click",
            Button::Right => "right click",
            Button::ScrollUp => "scroll up",
            Button::ScrollDown => "scroll down",
        };
        write!(f, "{}", name)
    }
}

/// An action to perform on the remote display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Press and release a key combination
    Key(KeyCombination),
    /// Type literal text
    Type(String),
    /// Move the pointer relative to its position, in polar coordinates
    MoveRelative { angle: i32, distance: u32 },
    /// Press and release a pointer button
    Click(Button),
}

impl fmt::Display for InputCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputCommand::Key(combination) => write!(f, "key {}", combination),
            InputCommand::Type(text) => write!(f, "type {:?}", text),
            InputCommand::MoveRelative { angle, distance } => {
                write!(f, "move {} units at {} degrees", distance, angle)
            }
            InputCommand::Click(button) => write!(f, "{}", button),
        }
    }
}

/// Display target and tool names used to render commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRenderer {
    display_env: String,
    display: String,
    tool: String,
    lock_query: String,
}

impl CommandRenderer {
    pub fn new(
        display_env: impl Into<String>,
        display: impl Into<String>,
        tool: impl Into<String>,
        lock_query: impl Into<String>,
    ) -> Self {
        Self {
            display_env: display_env.into(),
            display: display.into(),
            tool: tool.into(),
            lock_query: lock_query.into(),
        }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    /// `NAME=<quoted display>`
    fn prefix(&self) -> String {
        format!("{}={}", self.display_env, quote(&self.display))
    }

    /// Render an input command into a full shell command string
    pub fn render(&self, command: &InputCommand) -> String {
        let prefix = self.prefix();
        let tool = &self.tool;
        match command {
            InputCommand::Key(combination) => {
                format!("{} {} key {}", prefix, tool, quote(&combination.to_string()))
            }
            InputCommand::Type(text) => {
                // xdotool types a newline as Return only when given a carriage return
                let quoted = quote(text).replace('\n', "\r");
                format!("{} {} type {}", prefix, tool, quoted)
            }
            InputCommand::MoveRelative { angle, distance } => format!(
                "{} {} mousemove_relative --polar {} {}",
                prefix, tool, angle, distance
            ),
            InputCommand::Click(button) => {
                format!("{} {} click {}", prefix, tool, button.number())
            }
        }
    }

    /// Render the lock-key state query
    pub fn render_lock_query(&self) -> String {
        format!("{} {}", self.prefix(), self.lock_query)
    }
}

/// Quote a string as a single POSIX shell word.
pub fn quote(s: &str) -> Cow<'_, str> {
    if s.is_empty() {
        return Cow::Borrowed("''");
    }

    let safe = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        return Cow::Borrowed(s);
    }

    Cow::Owned(format!("'{}'", s.replace('\'', "'\"'\"'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::{encode, EncoderConfig, LiveModifiers, RawKey, StickyModifiers};

    fn renderer() -> CommandRenderer {
        CommandRenderer::new("DISPLAY", ":0", "xdotool", "xset q")
    }

    fn combo(code: u32, live: LiveModifiers) -> KeyCombination {
        encode(
            &RawKey::Code(code),
            live,
            StickyModifiers::default(),
            &EncoderConfig::default(),
        )
        .combination()
        .unwrap()
    }

    #[test]
    fn test_quote_safe_strings_unchanged() {
        assert_eq!(quote(":0"), ":0");
        assert_eq!(quote("Ctrl+Shift+a"), "Ctrl+Shift+a");
        assert_eq!(quote("/usr/bin/xdotool"), "/usr/bin/xdotool");
    }

    #[test]
    fn test_quote_empty() {
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn test_quote_special_characters() {
        assert_eq!(quote("hello world"), "'hello world'");
        assert_eq!(quote("$HOME"), "'$HOME'");
        assert_eq!(quote("a;b"), "'a;b'");
        assert_eq!(quote("é"), "'é'");
    }

    #[test]
    fn test_quote_embedded_single_quote() {
        assert_eq!(quote("it's"), "'it'\"'\"'s'");
    }

    #[test]
    fn test_render_key() {
        let live = LiveModifiers {
            ctrl: true,
            ..Default::default()
        };
        let cmd = renderer().render(&InputCommand::Key(combo(0x41, live)));
        assert_eq!(cmd, "DISPLAY=:0 xdotool key Ctrl+a");
    }

    #[test]
    fn test_render_type_quotes_and_converts_newlines() {
        let cmd = renderer().render(&InputCommand::Type("hi there\nbye".into()));
        assert_eq!(cmd, "DISPLAY=:0 xdotool type 'hi there\rbye'");
    }

    #[test]
    fn test_render_type_safe_text() {
        let cmd = renderer().render(&InputCommand::Type("hello".into()));
        assert_eq!(cmd, "DISPLAY=:0 xdotool type hello");
    }

    #[test]
    fn test_render_move() {
        let cmd = renderer().render(&InputCommand::MoveRelative {
            angle: 270,
            distance: 200,
        });
        assert_eq!(cmd, "DISPLAY=:0 xdotool mousemove_relative --polar 270 200");
    }

    #[test]
    fn test_render_clicks() {
        let r = renderer();
        assert_eq!(
            r.render(&InputCommand::Click(Button::Left)),
            "DISPLAY=:0 xdotool click 1"
        );
        assert_eq!(
            r.render(&InputCommand::Click(Button::ScrollDown)),
            "DISPLAY=:0 xdotool click 5"
        );
    }

    #[test]
    fn test_render_lock_query() {
        assert_eq!(renderer().render_lock_query(), "DISPLAY=:0 xset q");
    }

    #[test]
    fn test_custom_display_target() {
        let r = CommandRenderer::new("WAYLAND_DISPLAY", "my display", "/opt/xdotool", "xset q");
        assert_eq!(
            r.render(&InputCommand::Click(Button::Middle)),
            "WAYLAND_DISPLAY='my display' /opt/xdotool click 2"
        );
    }

    #[test]
    fn test_button_numbers() {
        assert_eq!(Button::Left.number(), 1);
        assert_eq!(Button::Middle.number(), 2);
        assert_eq!(Button::Right.number(), 3);
        assert_eq!(Button::ScrollUp.number(), 4);
        assert_eq!(Button::ScrollDown.number(), 5);
    }
}
