//! # Column Compositor
//!
//! Reduces a vertical column of blocks to one map pixel.
//!
//! Colors are blended front to back: starting from the topmost block with full
//! transmittance, each block adds `transmittance * alpha * color * modifier` and
//! scales the transmittance by `1 - alpha`. The walk stops at the first fully
//! opaque block.
//!
//! The pixel is then shaded by the slope to its west and north neighbors and by
//! the light level above the stopping block. The stopping height is packed into
//! the alpha byte of the result so that later pixels can read it back as their
//! neighbor height. Neighbor heights of 0 and 255 are the clear values and are
//! ignored.

/// Color reported for air. Treated as fully transparent whatever its alpha byte says.
pub const AIR_COLOR: u32 = 0xFF7C_007C;

/// Exponent of the brightening curve for upward slopes.
pub const BRIGHTEN_EXP: f64 = 0.35;
/// Exponent of the darkening curve for downward slopes.
pub const DARKEN_EXP: f64 = 0.35;
/// Amplitude of the brightening curve.
pub const BRIGHTEN_AMP: f64 = 0.7;
/// Amplitude of the darkening curve.
pub const DARKEN_AMP: f64 = 1.4;

/// Maximum block light level.
pub const MAX_LIGHT: u8 = 15;

/// How height differences between neighboring pixels are turned into shading.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HeightShading {
    /// Asymmetric power curve: small slopes stand out, upward slopes brighten
    /// less than downward slopes darken.
    #[default]
    Contour,
    /// Bounded `atan` curve with a gentler falloff.
    Realistic,
}

impl HeightShading {
    /// Picks the curve from the `realistic_shading` configuration flag.
    pub fn from_flag(realistic: bool) -> Self {
        if realistic {
            HeightShading::Realistic
        } else {
            HeightShading::Contour
        }
    }
}

/// One block of a column as the compositor sees it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColumnLayer {
    /// Packed ARGB block color.
    pub color: u32,
    /// Packed RGB biome modifier, multiplied into the block color.
    pub modifier: u32,
}

impl ColumnLayer {
    /// Creates a layer from a block color and a biome modifier.
    pub fn new(color: u32, modifier: u32) -> Self {
        ColumnLayer { color, modifier }
    }

    /// Alpha of the block color, with air forced to 0.
    pub fn alpha(&self) -> u8 {
        block_alpha(self.color)
    }
}

/// Alpha of a packed block color, with air forced to 0.
pub fn block_alpha(color: u32) -> u8 {
    if color == AIR_COLOR {
        0
    } else {
        (color >> 24) as u8
    }
}

fn channel(color: u32, shift: u32) -> f64 {
    ((color >> shift) & 0xff) as f64 / 255.0
}

/// The blended color of a column before shading.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Composite {
    /// Accumulated red, green and blue, each in `[0, 1]`.
    pub rgb: [f64; 3],
    /// Light that would still pass below the last blended block.
    pub transmittance: f64,
    /// Index of the first fully opaque layer, counted from the top.
    pub opaque_at: Option<usize>,
}

/// Blends `layers`, given top to bottom, until the first opaque block.
pub fn composite<I>(layers: I) -> Composite
where
    I: IntoIterator<Item = ColumnLayer>,
{
    let mut a = 1.0;
    let mut rgb = [0.0; 3];
    let mut opaque_at = None;

    for (index, layer) in layers.into_iter().enumerate() {
        let alpha = layer.alpha();
        if alpha > 0 {
            let c1_a = alpha as f64 / 255.0;
            for (value, shift) in rgb.iter_mut().zip([16, 8, 0]) {
                *value += a * c1_a * channel(layer.color, shift) * channel(layer.modifier, shift);
            }
            a *= 1.0 - c1_a;
        }
        if alpha == u8::MAX {
            opaque_at = Some(index);
            break;
        }
    }

    Composite {
        rgb,
        transmittance: a,
        opaque_at,
    }
}

/// Shading factor in roughly `[-1.4, 0.7]` from the slope to the west and north neighbors.
pub fn height_shading(height: i32, height_w: i32, height_n: i32, mode: HeightShading) -> f64 {
    let mut samples = 0;
    let mut height_diff = 0;

    for neighbor in [height_w, height_n] {
        if neighbor > 0 && neighbor < 255 {
            height_diff += height - neighbor;
            samples += 1;
        }
    }

    let factor = if samples > 0 {
        height_diff as f64 / samples as f64
    } else {
        0.0
    };

    match mode {
        HeightShading::Realistic => factor.atan() * 0.3,
        HeightShading::Contour if factor >= 0.0 => {
            (factor / 255.0).powf(BRIGHTEN_EXP) * BRIGHTEN_AMP
        }
        HeightShading::Contour => -(-factor / 255.0).powf(DARKEN_EXP) * DARKEN_AMP,
    }
}

/// Applies height and light shading to `composite` and packs the pixel.
///
/// The result is `height` in the alpha byte and the shaded color in the low 24 bits.
pub fn shade_pixel(
    composite: &Composite,
    height: i32,
    height_w: i32,
    height_n: i32,
    light: u8,
    mode: HeightShading,
) -> u32 {
    let light_shading = light.min(MAX_LIGHT) as f64 / MAX_LIGHT as f64;
    let shading = (height_shading(height, height_w, height_n, mode) + 1.0) * light_shading;

    let [r, g, b] = composite
        .rgb
        .map(|value| ((value * shading).clamp(0.0, 1.0) * 255.0) as u32 & 0xff);
    (((height & 0xff) as u32) << 24) | (r << 16) | (g << 8) | b
}

/// Height stored in the alpha byte of a rendered pixel.
pub fn pixel_height(pixel: u32) -> i32 {
    (pixel >> 24) as i32
}
