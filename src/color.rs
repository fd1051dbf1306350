//! RGBA colour and the usual per-pixel transforms
//!
//! Components are `f64` in `[0, 1]`. Brightness changes go through HSB so hue
//! and saturation are preserved.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Scale applied by [`Color::brighter`] (inverse) and [`Color::darker`]
pub const BRIGHTNESS_FACTOR: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid colour {0:?}: expected #rrggbb or #rrggbbaa")]
pub struct ParseColorError(String);

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: clamp01(r),
            g: clamp01(g),
            b: clamp01(b),
            a: clamp01(a),
        }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    /// Hue in degrees, saturation and brightness in `[0, 1]`
    pub fn to_hsb(&self) -> (f64, f64, f64) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let delta = max - min;

        let saturation = if max > 0.0 { delta / max } else { 0.0 };
        let hue = if delta == 0.0 {
            0.0
        } else if max == self.r {
            60.0 * ((self.g - self.b) / delta).rem_euclid(6.0)
        } else if max == self.g {
            60.0 * ((self.b - self.r) / delta + 2.0)
        } else {
            60.0 * ((self.r - self.g) / delta + 4.0)
        };
        (hue, saturation, max)
    }

    pub fn from_hsb(hue: f64, saturation: f64, brightness: f64, alpha: f64) -> Self {
        let hue = hue.rem_euclid(360.0);
        let c = brightness * saturation;
        let x = c * (1.0 - ((hue / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = brightness - c;

        let (r, g, b) = match (hue / 60.0) as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        Self::rgba(r + m, g + m, b + m, alpha)
    }

    /// Scale HSB brightness by `factor`, keeping hue, saturation and alpha
    pub fn derive_brightness(&self, factor: f64) -> Self {
        let (hue, saturation, mut brightness) = self.to_hsb();
        // black has no brightness to scale, so nudge it off zero
        if brightness == 0.0 && factor > 1.0 {
            brightness = 0.05;
        }
        Self::from_hsb(hue, saturation, clamp01(brightness * factor), self.a)
    }

    pub fn brighter(&self) -> Self {
        self.derive_brightness(1.0 / BRIGHTNESS_FACTOR)
    }

    pub fn darker(&self) -> Self {
        self.derive_brightness(BRIGHTNESS_FACTOR)
    }

    /// Luma-weighted gray with the same alpha
    pub fn grayscale(&self) -> Self {
        let gray = 0.21 * self.r + 0.71 * self.g + 0.07 * self.b;
        Self::rgba(gray, gray, gray, self.a)
    }

    pub fn invert(&self) -> Self {
        Self::rgba(1.0 - self.r, 1.0 - self.g, 1.0 - self.b, self.a)
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f64| (clamp01(v) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

/// Transform scaling brightness by `factor`
pub fn brighten(factor: f64) -> impl Fn(&Color) -> Color + Send + Sync + Copy {
    move |c| c.derive_brightness(factor)
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('#');
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(ParseColorError(s.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| ParseColorError(s.to_string()))
        };
        let (r, g, b) = (channel(0)?, channel(2)?, channel(4)?);
        let a = if digits.len() == 8 { channel(6)? } else { 255 };

        Ok(Self::rgba(
            r as f64 / 255.0,
            g as f64 / 255.0,
            b as f64 / 255.0,
            a as f64 / 255.0,
        ))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
