//! KDL configuration parser

use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, SourceLocation};
use crate::model::*;

/// Extract source location from a KDL node's name span
fn get_node_location(node: &kdl::KdlNode, source: &str) -> SourceLocation {
    let span = node.name().span();
    let offset = span.offset();
    let len = span.len();

    let (line, column) = offset_to_line_col(source, offset);

    SourceLocation::new(line, column, offset, len)
}

/// Convert byte offset to line and column (1-indexed)
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl reports spans with its own miette version
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => parse_global(node, content, &mut config.global)?,
            "connection" => parse_connection(node, content, &mut config.connection)?,
            "display" => parse_display(node, content, &mut config.display)?,
            "keyboard" => parse_keyboard(node, content, &mut config.keyboard)?,
            "mouse" => parse_mouse(node, content, &mut config.mouse)?,
            "lock-keys" => parse_lock_keys(node, content, &mut config.lock_keys)?,
            "dispatch" => parse_dispatch(node, content, &mut config.dispatch)?,
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    validate(&config)?;

    Ok(config)
}

/// Iterate the children of a section node, if any
fn children(node: &kdl::KdlNode) -> impl Iterator<Item = &kdl::KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes().iter())
}

fn invalid(node: &kdl::KdlNode, source: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        node: node.name().value().to_string(),
        message: message.into(),
        location: get_node_location(node, source),
    }
}

fn first_value<'a>(
    node: &'a kdl::KdlNode,
    source: &str,
) -> Result<&'a kdl::KdlValue, ConfigError> {
    node.entries()
        .first()
        .map(|entry| entry.value())
        .ok_or_else(|| invalid(node, source, "expected a value"))
}

fn string_value(node: &kdl::KdlNode, source: &str) -> Result<String, ConfigError> {
    first_value(node, source)?
        .as_string()
        .map(str::to_string)
        .ok_or_else(|| invalid(node, source, "expected a string"))
}

fn int_value(node: &kdl::KdlNode, source: &str) -> Result<i64, ConfigError> {
    first_value(node, source)?
        .as_i64()
        .ok_or_else(|| invalid(node, source, "expected an integer"))
}

fn unsigned_value<T: TryFrom<i64>>(node: &kdl::KdlNode, source: &str) -> Result<T, ConfigError> {
    let value = int_value(node, source)?;
    T::try_from(value).map_err(|_| invalid(node, source, format!("{} is out of range", value)))
}

fn float_value(node: &kdl::KdlNode, source: &str) -> Result<f64, ConfigError> {
    let value = first_value(node, source)?;
    value
        .as_f64()
        .or_else(|| value.as_i64().map(|v| v as f64))
        .ok_or_else(|| invalid(node, source, "expected a number"))
}

fn bool_value(node: &kdl::KdlNode, source: &str) -> Result<bool, ConfigError> {
    first_value(node, source)?
        .as_bool()
        .ok_or_else(|| invalid(node, source, "expected true or false"))
}

fn parse_global(
    node: &kdl::KdlNode,
    source: &str,
    global: &mut GlobalConfig,
) -> Result<(), ConfigError> {
    for child in children(node) {
        match child.name().value() {
            "log-level" => {
                let val = string_value(child, source)?;
                global.log_level = val
                    .parse()
                    .map_err(|message| ConfigError::Invalid { message })?;
            }
            name => {
                tracing::warn!("Unknown global config option: {}", name);
            }
        }
    }
    Ok(())
}

fn parse_connection(
    node: &kdl::KdlNode,
    source: &str,
    connection: &mut ConnectionConfig,
) -> Result<(), ConfigError> {
    for child in children(node) {
        match child.name().value() {
            "host" => connection.host = Some(string_value(child, source)?),
            "port" => connection.port = Some(unsigned_value(child, source)?),
            "user" => connection.user = Some(string_value(child, source)?),
            "connect-timeout" => connection.connect_timeout = unsigned_value(child, source)?,
            "connect-retries" => connection.connect_retries = unsigned_value(child, source)?,
            "multiplex" => connection.multiplex = bool_value(child, source)?,
            "control-path" => {
                let val = string_value(child, source)?;
                connection.control_path = shellexpand::tilde(&val).into_owned().into();
            }
            "password" => {
                return Err(invalid(
                    child,
                    source,
                    "passwords are not stored; use an SSH agent or key file",
                ));
            }
            name => {
                tracing::warn!("Unknown connection config option: {}", name);
            }
        }
    }
    Ok(())
}

fn parse_display(
    node: &kdl::KdlNode,
    source: &str,
    display: &mut DisplayConfig,
) -> Result<(), ConfigError> {
    for child in children(node) {
        match child.name().value() {
            "name" => display.name = string_value(child, source)?,
            "env" => display.env = string_value(child, source)?,
            "tool" => display.tool = string_value(child, source)?,
            name => {
                tracing::warn!("Unknown display config option: {}", name);
            }
        }
    }
    Ok(())
}

fn parse_keyboard(
    node: &kdl::KdlNode,
    source: &str,
    keyboard: &mut KeyboardConfig,
) -> Result<(), ConfigError> {
    for child in children(node) {
        match child.name().value() {
            "ignore-modifiers" => keyboard.ignore_modifiers = bool_value(child, source)?,
            "sticky" => {
                for entry in child.entries() {
                    let name = entry
                        .value()
                        .as_string()
                        .ok_or_else(|| invalid(child, source, "expected modifier names"))?;
                    let modifier: StickyModifier = name
                        .parse()
                        .map_err(|name| ConfigError::UnknownModifier { name })?;
                    if !keyboard.sticky.contains(&modifier) {
                        keyboard.sticky.push(modifier);
                    }
                }
            }
            name => {
                tracing::warn!("Unknown keyboard config option: {}", name);
            }
        }
    }
    Ok(())
}

fn parse_mouse(
    node: &kdl::KdlNode,
    source: &str,
    mouse: &mut MouseConfig,
) -> Result<(), ConfigError> {
    for child in children(node) {
        match child.name().value() {
            "middle-radius" => mouse.middle_radius = float_value(child, source)?,
            "click-radius" => mouse.click_radius = float_value(child, source)?,
            "move-radius" => mouse.move_radius = float_value(child, source)?,
            "click-angle" => mouse.click_angle = float_value(child, source)?,
            "max-move" => mouse.max_move = unsigned_value(child, source)?,
            name => {
                tracing::warn!("Unknown mouse config option: {}", name);
            }
        }
    }
    Ok(())
}

fn parse_lock_keys(
    node: &kdl::KdlNode,
    source: &str,
    lock_keys: &mut LockKeysConfig,
) -> Result<(), ConfigError> {
    for child in children(node) {
        match child.name().value() {
            "enabled" => lock_keys.enabled = bool_value(child, source)?,
            "interval-ms" => {
                lock_keys.interval = Duration::from_millis(unsigned_value(child, source)?)
            }
            "query" => lock_keys.query = string_value(child, source)?,
            "failure-threshold" => lock_keys.failure_threshold = unsigned_value(child, source)?,
            name => {
                tracing::warn!("Unknown lock-keys config option: {}", name);
            }
        }
    }
    Ok(())
}

fn parse_dispatch(
    node: &kdl::KdlNode,
    source: &str,
    dispatch: &mut DispatchConfig,
) -> Result<(), ConfigError> {
    for child in children(node) {
        match child.name().value() {
            "queue-capacity" => dispatch.queue_capacity = unsigned_value(child, source)?,
            name => {
                tracing::warn!("Unknown dispatch config option: {}", name);
            }
        }
    }
    Ok(())
}

/// Cross-field checks that individual node parsers cannot make
fn validate(config: &Config) -> Result<(), ConfigError> {
    let mouse = &config.mouse;
    let radii = [mouse.middle_radius, mouse.click_radius, mouse.move_radius];

    if radii.iter().any(|r| !r.is_finite() || *r <= 0.0 || *r > 1.0) {
        return Err(ConfigError::Invalid {
            message: format!(
                "mouse radii must lie in (0, 1], got {:?}",
                radii
            ),
        });
    }
    if !(mouse.middle_radius < mouse.click_radius && mouse.click_radius < mouse.move_radius) {
        return Err(ConfigError::Invalid {
            message: format!(
                "mouse radii must be strictly increasing (middle < click < move), got {:?}",
                radii
            ),
        });
    }
    if !(mouse.click_angle > 0.0 && mouse.click_angle <= 90.0) {
        return Err(ConfigError::Invalid {
            message: format!("click-angle must lie in (0, 90], got {}", mouse.click_angle),
        });
    }
    if config.lock_keys.interval.is_zero() {
        return Err(ConfigError::Invalid {
            message: "lock-keys interval-ms must be greater than zero".to_string(),
        });
    }
    if config.lock_keys.failure_threshold == 0 {
        return Err(ConfigError::Invalid {
            message: "lock-keys failure-threshold must be at least 1".to_string(),
        });
    }
    if config.dispatch.queue_capacity == 0 {
        return Err(ConfigError::Invalid {
            message: "dispatch queue-capacity must be at least 1".to_string(),
        });
    }
    if config.connection.port == Some(0) {
        return Err(ConfigError::Invalid {
            message: "connection port must be between 1 and 65535".to_string(),
        });
    }
    if config.display.tool.trim().is_empty() {
        return Err(ConfigError::Invalid {
            message: "display tool must not be empty".to_string(),
        });
    }
    if config.display.env.trim().is_empty() {
        return Err(ConfigError::Invalid {
            message: "display env must not be empty".to_string(),
        });
    }

    Ok(())
}
