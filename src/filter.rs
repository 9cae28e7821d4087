use image::{DynamicImage, Rgba};
use serde::{Deserialize, Serialize};

/// Stored as its `value()` string, read back through `from_value`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Filter {
    #[default]
    None,
    Chrome,
    Sepia,
}

/// (filter, stored value, display name)
const FILTERS: [(Filter, &str, &str); 3] = [
    (Filter::None, "none", "Original"),
    (Filter::Chrome, "chrome", "Chrome"),
    (Filter::Sepia, "sepia", "Sepia"),
];

// Sepia color matrix coefficients
const SR: [f32; 3] = [0.393, 0.769, 0.189];
const SG: [f32; 3] = [0.349, 0.686, 0.168];
const SB: [f32; 3] = [0.272, 0.534, 0.131];

impl Filter {
    pub const ALL: [Filter; 3] = [Filter::None, Filter::Chrome, Filter::Sepia];

    fn entry(self) -> (Filter, &'static str, &'static str) {
        FILTERS[self as usize]
    }

    pub fn value(self) -> &'static str {
        self.entry().1
    }

    pub fn label(self) -> &'static str {
        self.entry().2
    }

    pub fn from_value(value: &str) -> Option<Self> {
        FILTERS
            .iter()
            .find(|(_, v, _)| *v == value)
            .map(|(filter, _, _)| *filter)
    }

    pub fn apply(self, image: &DynamicImage) -> DynamicImage {
        match self {
            Filter::None => image.clone(),
            Filter::Chrome => DynamicImage::ImageRgba8(image.grayscale().to_rgba8()),
            Filter::Sepia => sepia(image),
        }
    }
}

impl From<Filter> for &'static str {
    fn from(filter: Filter) -> Self {
        filter.value()
    }
}

impl TryFrom<String> for Filter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Filter::from_value(&value).ok_or_else(|| format!("unknown filter {value:?}"))
    }
}

fn sepia(image: &DynamicImage) -> DynamicImage {
    let mut rgba = image.to_rgba8();
    for Rgba([r, g, b, _]) in rgba.pixels_mut() {
        let (fr, fg, fb) = (*r as f32, *g as f32, *b as f32);
        *r = (SR[0] * fr + SR[1] * fg + SR[2] * fb).min(255.0) as u8;
        *g = (SG[0] * fr + SG[1] * fg + SG[2] * fb).min(255.0) as u8;
        *b = (SB[0] * fr + SB[1] * fg + SB[2] * fb).min(255.0) as u8;
    }
    DynamicImage::ImageRgba8(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn solid(color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba(color)))
    }

    #[test]
    fn table_lines_up_with_the_enum() {
        for filter in Filter::ALL {
            assert_eq!(Filter::from_value(filter.value()), Some(filter));
        }
        assert_eq!(Filter::from_value("blur"), None);
        assert_eq!(Filter::Chrome.label(), "Chrome");
    }

    #[test]
    fn serializes_as_the_stored_value() {
        assert_eq!(serde_json::to_string(&Filter::Sepia).unwrap(), "\"sepia\"");
        let parsed: Filter = serde_json::from_str("\"chrome\"").unwrap();
        assert_eq!(parsed, Filter::Chrome);
        assert!(serde_json::from_str::<Filter>("\"blur\"").is_err());
    }

    #[test]
    fn none_leaves_pixels_alone() {
        let image = solid([10, 200, 30, 255]);
        assert_eq!(Filter::None.apply(&image), image);
    }

    #[test]
    fn chrome_drops_color() {
        let out = Filter::Chrome.apply(&solid([200, 40, 90, 255])).to_rgba8();
        let Rgba([r, g, b, a]) = *out.get_pixel(0, 0);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, 255);
    }

    #[test]
    fn sepia_warms_white_and_keeps_alpha() {
        let out = Filter::Sepia.apply(&solid([100, 100, 100, 128])).to_rgba8();
        let Rgba([r, g, b, a]) = *out.get_pixel(1, 1);
        assert!(r > g && g > b, "{r} {g} {b}");
        assert_eq!(a, 128);
    }
}
