//! Highlighting colors and palette generation
//!
//! A palette is either a gradient expanded into N discrete colors by linear
//! per-channel interpolation, or a single mono color.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 24-bit RGB color, serialized as `[r, g, b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from arbitrary integers, clamping each channel to [0, 255]
    pub fn clamped(r: i64, g: i64, b: i64) -> Self {
        let clamp = |v: i64| v.clamp(0, 255) as u8;
        Self::new(clamp(r), clamp(g), clamp(b))
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(value: [u8; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(value: Rgb) -> Self {
        [value.r, value.g, value.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Expand a two-color gradient into discrete colors.
///
/// The first color is `from` and the last is `to`. In between there are
/// `n - 2` interpolated colors, or 2 when `n < 2`. Steps use integer
/// division per channel, so the last interpolated color may stop short of `to`.
pub fn generate_colors(from: Rgb, to: Rgb, n: usize) -> Vec<Rgb> {
    let inner = if n >= 2 { n - 2 } else { 2 };
    let divisor = inner as i64 + 1;

    let step = |a: u8, b: u8| (b as i64 - a as i64) / divisor;
    let (step_r, step_g, step_b) = (step(from.r, to.r), step(from.g, to.g), step(from.b, to.b));

    let mut colors = Vec::with_capacity(inner + 2);
    colors.push(from);

    for i in 1..=inner as i64 {
        colors.push(Rgb::clamped(
            from.r as i64 + step_r * i,
            from.g as i64 + step_g * i,
            from.b as i64 + step_b * i,
        ));
    }

    colors.push(to);
    colors
}

/// Resolved set of colors used for palette-assigned highlighting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    /// Palette derived from a gradient
    pub fn from_gradient(from: Rgb, to: Rgb, n: usize) -> Self {
        Self {
            colors: generate_colors(from, to, n),
        }
    }

    /// Single-color palette, used when the mono-color override is active
    pub fn mono(color: Rgb) -> Self {
        Self {
            colors: vec![color],
        }
    }

    /// Palette from an explicit color list (may be empty)
    pub fn from_colors(colors: Vec<Rgb>) -> Self {
        Self { colors }
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Rgb> {
        self.colors.get(index).copied()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_gradient(Rgb::new(255, 255, 0), Rgb::new(0, 255, 255), 3)
    }
}
