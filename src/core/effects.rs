//! Per-box visual effect parameters.

use serde::{Deserialize, Serialize};

/// Effect parameters attached to one timeline box. Values mirror the editing
/// controls: opacity is a percentage, hue is degrees of rotation, saturation
/// and brightness are signed percentages, blur is a pixel radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSettings {
    /// 0..=100, 100 leaves pixels untouched.
    pub opacity: f32,
    /// Degrees, -180..=180, 0 leaves hue untouched.
    pub hue: f32,
    /// -100..=100, 0 leaves saturation untouched.
    pub saturation: f32,
    /// -100..=100, 0 leaves brightness untouched.
    pub brightness: f32,
    /// Gaussian radius in pixels, 0 skips the convolution pass.
    pub blur: f32,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            opacity: 100.0,
            hue: 0.0,
            saturation: 0.0,
            brightness: 0.0,
            blur: 0.0,
        }
    }
}

impl EffectSettings {
    /// True when every parameter is at its neutral value.
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_neutral() {
        assert!(EffectSettings::default().is_neutral());
    }

    #[test]
    fn test_modified_is_not_neutral() {
        let fx = EffectSettings {
            opacity: 50.0,
            ..Default::default()
        };
        assert!(!fx.is_neutral());

        let fx = EffectSettings {
            blur: 2.0,
            ..Default::default()
        };
        assert!(!fx.is_neutral());
    }
}
