//! Pointer gesture classification
//!
//! The control surface is a circle split into concentric bands. Positions are
//! normalized so the surface spans `[-1, 1]` on both axes with `+y` pointing
//! up, then the band containing the position decides the gesture:
//!
//! - innermost band: middle click
//! - click/scroll band: left/right click near the horizontal axis, scroll
//!   up/down near the vertical axis
//! - outer band: relative pointer move, further out moves further
//!
//! Each band covers `(inner radius, radius]`, so a position exactly on a
//! boundary belongs to the inner band. Anything outside the outermost band is
//! ignored.

use std::fmt;

use sshkbm_config::MouseConfig;
use thiserror::Error;

use crate::command::{Button, InputCommand};

#[derive(Debug, Error, PartialEq)]
pub enum ZoneError {
    #[error("at least one gesture zone is required")]
    Empty,

    #[error("zone {index} has radius {radius}; radii must be positive and finite")]
    InvalidRadius { index: usize, radius: f64 },

    #[error("zone {index} has radius {radius}, not larger than the previous radius {previous}")]
    NotIncreasing {
        index: usize,
        radius: f64,
        previous: f64,
    },

    #[error("zone {index} has click angle {angle}; expected a value in (0, 90]")]
    InvalidAngle { index: usize, angle: f64 },
}

/// What a band does with positions that fall inside it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneRule {
    /// Always click the same button
    Click(Button),
    /// Click within `click_half_angle` degrees of the horizontal axis,
    /// scroll elsewhere
    ClickScroll { click_half_angle: f64 },
    /// Relative move, scaled from 0 at the inner edge to `max_distance` at
    /// the outer edge
    Move { max_distance: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureZone {
    /// Outer radius as a fraction of the surface half-width
    pub radius: f64,
    pub rule: ZoneRule,
}

/// Ordered list of concentric bands, innermost first
#[derive(Debug, Clone, PartialEq)]
pub struct GestureZones {
    bands: Vec<GestureZone>,
}

impl GestureZones {
    pub fn new(bands: Vec<GestureZone>) -> Result<Self, ZoneError> {
        if bands.is_empty() {
            return Err(ZoneError::Empty);
        }

        let mut previous = 0.0;
        for (index, band) in bands.iter().enumerate() {
            if !band.radius.is_finite() || band.radius <= 0.0 {
                return Err(ZoneError::InvalidRadius {
                    index,
                    radius: band.radius,
                });
            }
            if band.radius <= previous {
                return Err(ZoneError::NotIncreasing {
                    index,
                    radius: band.radius,
                    previous,
                });
            }
            if let ZoneRule::ClickScroll { click_half_angle } = band.rule {
                if !(click_half_angle > 0.0 && click_half_angle <= 90.0) {
                    return Err(ZoneError::InvalidAngle {
                        index,
                        angle: click_half_angle,
                    });
                }
            }
            previous = band.radius;
        }

        Ok(Self { bands })
    }

    /// Band containing radius `r`, with the radius of its inner edge
    fn find(&self, r: f64) -> Option<(f64, &GestureZone)> {
        let mut inner = 0.0;
        for band in &self.bands {
            if r <= band.radius {
                return Some((inner, band));
            }
            inner = band.radius;
        }
        None
    }
}

impl Default for GestureZones {
    fn default() -> Self {
        Self {
            bands: vec![
                GestureZone {
                    radius: 0.21,
                    rule: ZoneRule::Click(Button::Middle),
                },
                GestureZone {
                    radius: 0.51,
                    rule: ZoneRule::ClickScroll {
                        click_half_angle: 60.0,
                    },
                },
                GestureZone {
                    radius: 0.98,
                    rule: ZoneRule::Move { max_distance: 400 },
                },
            ],
        }
    }
}

impl TryFrom<&MouseConfig> for GestureZones {
    type Error = ZoneError;

    fn try_from(config: &MouseConfig) -> Result<Self, Self::Error> {
        Self::new(vec![
            GestureZone {
                radius: config.middle_radius,
                rule: ZoneRule::Click(Button::Middle),
            },
            GestureZone {
                radius: config.click_radius,
                rule: ZoneRule::ClickScroll {
                    click_half_angle: config.click_angle,
                },
            },
            GestureZone {
                radius: config.move_radius,
                rule: ZoneRule::Move {
                    max_distance: config.max_move,
                },
            },
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    NoOp,
    Click(Button),
    /// Polar move: `angle` in degrees clockwise from up, `distance` in pixels
    Move { angle: i32, distance: u32 },
}

impl Gesture {
    /// Command to send for this gesture, `None` for [`Gesture::NoOp`]
    pub fn command(&self) -> Option<InputCommand> {
        match *self {
            Gesture::NoOp => None,
            Gesture::Click(button) => Some(InputCommand::Click(button)),
            Gesture::Move { angle, distance } => {
                Some(InputCommand::MoveRelative { angle, distance })
            }
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gesture::NoOp => write!(f, "no-op"),
            Gesture::Click(button) => write!(f, "{}", button),
            Gesture::Move { angle, distance } => {
                write!(f, "move {} at {} degrees", distance, angle)
            }
        }
    }
}

/// Classify a pointer position on a `width` x `height` surface.
pub fn classify(px: f64, py: f64, width: f64, height: f64, zones: &GestureZones) -> Gesture {
    if !(width.is_finite() && height.is_finite()) || width == 0.0 || height == 0.0 {
        return Gesture::NoOp;
    }

    let x = 2.0 * px / width - 1.0;
    let y = -2.0 * py / height + 1.0;
    let r = (x * x + y * y).sqrt();
    if !r.is_finite() {
        return Gesture::NoOp;
    }

    let theta = if x != 0.0 {
        (y / x).atan().to_degrees()
    } else if y < 0.0 {
        -90.0
    } else {
        90.0
    };

    let Some((inner, band)) = zones.find(r) else {
        return Gesture::NoOp;
    };

    match band.rule {
        ZoneRule::Click(button) => Gesture::Click(button),
        ZoneRule::ClickScroll { click_half_angle } => {
            let button = if theta.abs() < click_half_angle {
                if x >= 0.0 {
                    Button::Right
                } else {
                    Button::Left
                }
            } else if y >= 0.0 {
                Button::ScrollUp
            } else {
                Button::ScrollDown
            };
            Gesture::Click(button)
        }
        ZoneRule::Move { max_distance } => {
            let fraction = (r - inner) / (band.radius - inner);
            let distance = (fraction * max_distance as f64).round_ties_even() as u32;
            let half_turn = if x > 0.0 { 0 } else { 180 };
            let angle = (90.0 - theta).round_ties_even() as i32 + half_turn;
            Gesture::Move { angle, distance }
        }
    }
}
