use std::ops::RangeInclusive;

use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accepted range for [`GalaxyParams::count`].
pub const COUNT_RANGE: RangeInclusive<u32> = 100..=1_000_000;
/// Accepted range for [`GalaxyParams::point_size`], in world units.
pub const POINT_SIZE_RANGE: RangeInclusive<f32> = 0.0001..=0.1;
/// Accepted range for [`GalaxyParams::radius`].
pub const RADIUS_RANGE: RangeInclusive<f32> = 0.1..=20.0;
/// Accepted range for [`GalaxyParams::branch_count`].
pub const BRANCH_COUNT_RANGE: RangeInclusive<u32> = 0..=10;
/// Accepted range for [`GalaxyParams::spin`].
pub const SPIN_RANGE: RangeInclusive<f32> = -5.0..=5.0;
/// Accepted range for [`GalaxyParams::randomness`].
pub const RANDOMNESS_RANGE: RangeInclusive<f32> = 0.0..=2.0;

/// Full set of galaxy generation parameters.
///
/// A snapshot of this struct is the sole input to point-cloud generation:
/// the panel edits a draft copy and hands the whole value over on commit,
/// so nothing downstream ever observes a half-edited configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalaxyParams {
    /// Number of points in the cloud.
    pub count: u32,
    /// World-space size of a rendered point.
    pub point_size: f32,
    /// Maximum distance of a point from the galaxy center.
    pub radius: f32,
    /// Number of spiral arms. The generator treats 0 as 1.
    pub branch_count: u32,
    /// Angular twist per unit of radial distance, signed.
    pub spin: f32,
    /// Jitter strength; per-axis offsets scale with both this and the
    /// point's own radius.
    pub randomness: f32,
    /// Color at the galaxy center.
    #[serde(with = "hex_color")]
    pub inside_color: Vec3,
    /// Color at the outer rim.
    #[serde(with = "hex_color")]
    pub outside_color: Vec3,
}

impl Default for GalaxyParams {
    fn default() -> Self {
        Self {
            count: 100_000,
            point_size: 0.0113,
            radius: 4.0,
            branch_count: 6,
            spin: 1.0,
            randomness: 0.2,
            inside_color: rgb8(0xff, 0x60, 0x30),
            outside_color: rgb8(0x1b, 0x39, 0x84),
        }
    }
}

impl GalaxyParams {
    /// Parses a parameter snapshot from JSON. Missing fields keep their
    /// default values; present fields must pass [`GalaxyParams::validate`].
    pub fn from_json(text: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(text).context("invalid parameter JSON")?;
        params.validate()?;
        Ok(params)
    }

    /// Checks every field against the documented control ranges.
    pub fn validate(&self) -> Result<(), ParamError> {
        check_u32("count", self.count, COUNT_RANGE)?;
        check_f32("point_size", self.point_size, POINT_SIZE_RANGE)?;
        check_f32("radius", self.radius, RADIUS_RANGE)?;
        check_u32("branch_count", self.branch_count, BRANCH_COUNT_RANGE)?;
        check_f32("spin", self.spin, SPIN_RANGE)?;
        check_f32("randomness", self.randomness, RANDOMNESS_RANGE)?;
        check_color("inside_color", self.inside_color)?;
        check_color("outside_color", self.outside_color)?;
        Ok(())
    }
}

/// Violation of a documented parameter range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("{field} must be in {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
    #[error("invalid color {text:?}, expected \"#rrggbb\"")]
    InvalidColor { text: String },
}

fn check_u32(field: &'static str, value: u32, range: RangeInclusive<u32>) -> Result<(), ParamError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ParamError::OutOfRange {
            field,
            min: *range.start() as f32,
            max: *range.end() as f32,
            value: value as f32,
        })
    }
}

fn check_f32(field: &'static str, value: f32, range: RangeInclusive<f32>) -> Result<(), ParamError> {
    // NaN fails the containment check, so it is rejected here too.
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ParamError::OutOfRange {
            field,
            min: *range.start(),
            max: *range.end(),
            value,
        })
    }
}

fn check_color(field: &'static str, color: Vec3) -> Result<(), ParamError> {
    for component in [color.x, color.y, color.z] {
        check_f32(field, component, 0.0..=1.0)?;
    }
    Ok(())
}

/// Builds a color from 8-bit channel values.
pub fn rgb8(r: u8, g: u8, b: u8) -> Vec3 {
    Vec3::new(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
    )
}

/// Parses a `#rrggbb` color (the leading `#` is optional).
pub fn parse_hex_color(text: &str) -> Result<Vec3, ParamError> {
    let digits = text.strip_prefix('#').unwrap_or(text);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParamError::InvalidColor {
            text: text.to_string(),
        });
    }
    let packed = u32::from_str_radix(digits, 16).map_err(|_| ParamError::InvalidColor {
        text: text.to_string(),
    })?;
    Ok(rgb8(
        ((packed >> 16) & 0xff) as u8,
        ((packed >> 8) & 0xff) as u8,
        (packed & 0xff) as u8,
    ))
}

/// Formats a color in the `#rrggbb` form accepted by [`parse_hex_color`].
pub fn format_hex_color(color: Vec3) -> String {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        channel(color.x),
        channel(color.y),
        channel(color.z)
    )
}

mod hex_color {
    use glam::Vec3;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(color: &Vec3, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_hex_color(*color))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec3, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        super::parse_hex_color(&text).map_err(D::Error::custom)
    }
}
