//! Symbol substitution table
//!
//! xdotool resolves key names through `XStringToKeysym`, which does not
//! accept punctuation characters. `+` is also the combination separator, so
//! it must never appear as a bare token.

/// Keysym name for a punctuation character or keypad alias, if it has one.
pub fn substitute(name: &str) -> Option<&'static str> {
    let keysym = match name {
        " " => "space",
        "!" => "exclam",
        "\"" => "quotedbl",
        "#" => "numbersign",
        "$" => "dollar",
        "%" => "percent",
        "&" => "ampersand",
        "'" => "apostrophe",
        "(" => "parenleft",
        ")" => "parenright",
        "*" => "asterisk",
        "+" => "plus",
        "," => "comma",
        "-" => "minus",
        "." => "period",
        "/" => "slash",
        ":" => "colon",
        ";" => "semicolon",
        "<" => "less",
        "=" => "equal",
        ">" => "greater",
        "?" => "question",
        "@" => "at",
        "[" => "bracketleft",
        "\\" => "backslash",
        "]" => "bracketright",
        "^" => "asciicircum",
        "_" => "underscore",
        "`" => "grave",
        "{" => "braceleft",
        "|" => "bar",
        "}" => "braceright",
        "~" => "asciitilde",
        "£" => "sterling",
        "§" => "section",
        "°" => "degree",
        "€" => "EuroSign",

        "KP_+" => "KP_Add",
        "KP_-" => "KP_Subtract",
        "KP_*" => "KP_Multiply",
        "KP_/" => "KP_Divide",
        "KP_." => "KP_Decimal",
        "KP_," => "KP_Separator",
        "KP_=" => "KP_Equal",
        "KP_ " => "KP_Space",
        "KP_Return" => "KP_Enter",
        "KP_Prior" => "KP_Page_Up",
        "KP_Next" => "KP_Page_Down",
        _ => return None,
    };
    Some(keysym)
}
