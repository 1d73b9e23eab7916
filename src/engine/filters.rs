//! Toggleable CPU video filters.
//!
//! Filters are named the way players spell them on the command line:
//! - `format:gamma=linear`: decode sRGB transfer to linear light
//! - `gblur:sigma=N`: gaussian blur
//!
//! `FilterChain::toggle` adds a filter if absent, removes it if present.

use image::RgbaImage;
use std::borrow::Cow;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filter {
    LinearGamma,
    Blur { sigma: f32 },
}

impl Filter {
    /// Blur used by the `B` key
    pub const DEFAULT_BLUR: Filter = Filter::Blur { sigma: 32.0 };

    fn same_kind(&self, other: &Filter) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::LinearGamma => write!(f, "format:gamma=linear"),
            Filter::Blur { sigma } => write!(f, "gblur:sigma={}", sigma),
        }
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "format:gamma=linear" {
            return Ok(Filter::LinearGamma);
        }
        if let Some(sigma) = s.strip_prefix("gblur:sigma=") {
            let sigma: f32 = sigma.parse().map_err(|_| format!("bad sigma in '{}'", s))?;
            if sigma.is_finite() && sigma > 0.0 {
                return Ok(Filter::Blur { sigma });
            }
            return Err(format!("sigma must be positive in '{}'", s));
        }
        Err(format!("unknown filter '{}'", s))
    }
}

/// Ordered set of active filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    active: Vec<Filter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the filter is now active.
    pub fn toggle(&mut self, filter: Filter) -> bool {
        if let Some(pos) = self.active.iter().position(|f| f.same_kind(&filter)) {
            self.active.remove(pos);
            false
        } else {
            self.active.push(filter);
            true
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.active
    }

    /// Run all active filters in toggle order.
    pub fn apply<'a>(&self, image: &'a RgbaImage) -> Cow<'a, RgbaImage> {
        let mut out = Cow::Borrowed(image);
        for filter in &self.active {
            out = Cow::Owned(match filter {
                Filter::LinearGamma => linearize(&out),
                Filter::Blur { sigma } => image::imageops::fast_blur(&*out, *sigma),
            });
        }
        out
    }
}

fn srgb_to_linear_lut() -> &'static [u8; 256] {
    static LUT: OnceLock<[u8; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            let c = i as f32 / 255.0;
            let l = if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
            *v = (l * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        lut
    })
}

fn linearize(image: &RgbaImage) -> RgbaImage {
    let lut = srgb_to_linear_lut();
    let mut out = image.clone();
    for px in out.pixels_mut() {
        px.0[0] = lut[px.0[0] as usize];
        px.0[1] = lut[px.0[1] as usize];
        px.0[2] = lut[px.0[2] as usize];
    }
    out
}
