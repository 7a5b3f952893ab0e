use crate::chat_api::Reply;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use std::fmt;
use std::sync::Arc;

pub const MAX_IMAGE_WIDTH: f32 = 600.0;
// Display pixels never exceed this on either side.
const MAX_PIXEL_SIDE: u32 = 2048;

const DATA_URI_MARKER: &str = "base64,";

const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Clone, Debug, PartialEq)]
pub enum RenderedItem {
    Text(String),
    Image(ImageItem),
}

/// `bytes` are the payload exactly as decoded from base64. `pixels` is a
/// display copy, downscaled to at most [`MAX_IMAGE_WIDTH`] wide.
#[derive(Clone)]
pub struct ImageItem {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    pixels: Arc<RgbaImage>,
}

impl ImageItem {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// On-screen size, capped at [`MAX_IMAGE_WIDTH`] with the aspect ratio kept.
    pub fn display_size(&self) -> [f32; 2] {
        let width = self.width() as f32;
        let height = self.height() as f32;
        if width <= MAX_IMAGE_WIDTH {
            return [width, height];
        }

        let scale = MAX_IMAGE_WIDTH / width;
        [MAX_IMAGE_WIDTH, (height * scale).round()]
    }
}

impl PartialEq for ImageItem {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl fmt::Debug for ImageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageItem")
            .field("len", &self.bytes.len())
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

pub fn render_reply(reply: &Reply) -> Vec<RenderedItem> {
    [reply.result.as_deref(), reply.base64.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(render_field)
        .collect()
}

pub fn render_field(raw: &str) -> Option<RenderedItem> {
    if raw.trim().is_empty() {
        return None;
    }

    let item = decode_base64(&base64_payload(raw))
        .and_then(decode_image)
        .map(RenderedItem::Image)
        .unwrap_or_else(|| RenderedItem::Text(raw.to_string()));

    Some(item)
}

pub fn strip_data_uri(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.split_once(DATA_URI_MARKER) {
        Some((_, payload)) => payload.trim(),
        None => trimmed,
    }
}

// Line-wrapped payloads (MIME style) decode as if unwrapped.
fn base64_payload(raw: &str) -> String {
    strip_data_uri(raw)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect()
}

fn decode_base64(payload: &str) -> Option<Vec<u8>> {
    match BASE64_LENIENT.decode(payload) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::debug!(error = %err, "field is not base64, showing as text");
            None
        }
    }
}

fn decode_image(bytes: Vec<u8>) -> Option<ImageItem> {
    match image::load_from_memory(&bytes) {
        Ok(decoded) => Some(ImageItem {
            width: decoded.width(),
            height: decoded.height(),
            pixels: Arc::new(display_pixels(decoded)),
            bytes,
        }),
        Err(err) => {
            tracing::debug!(error = %err, "decoded bytes are not an image, showing as text");
            None
        }
    }
}

fn display_pixels(decoded: DynamicImage) -> RgbaImage {
    let max_width = MAX_IMAGE_WIDTH as u32;
    if decoded.width() <= max_width && decoded.height() <= MAX_PIXEL_SIDE {
        return decoded.to_rgba8();
    }

    decoded
        .resize(max_width.min(decoded.width()), MAX_PIXEL_SIDE, FilterType::Triangle)
        .to_rgba8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([25, 195, 125, 255]));
        let mut out = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn reply(result: Option<&str>, base64: Option<&str>) -> Reply {
        Reply {
            result: result.map(str::to_string),
            base64: base64.map(str::to_string),
        }
    }

    fn expect_image(item: &RenderedItem) -> &ImageItem {
        match item {
            RenderedItem::Image(image) => image,
            other => panic!("expected an image, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_result_stays_text() {
        let items = render_reply(&reply(Some("hello world"), None));
        assert_eq!(items, vec![RenderedItem::Text("hello world".to_string())]);
    }

    #[test]
    fn base64_that_is_not_an_image_shows_raw_string() {
        // "dGVzdA==" is valid base64 for "test".
        let items = render_reply(&reply(None, Some("  dGVzdA==\n")));
        assert_eq!(items, vec![RenderedItem::Text("  dGVzdA==\n".to_string())]);
    }

    #[test]
    fn png_round_trips_through_base64_field() {
        let png = png_bytes(4, 3);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

        let items = render_reply(&reply(None, Some(&encoded)));

        assert_eq!(items.len(), 1);
        let image = expect_image(&items[0]);
        assert_eq!(image.bytes(), png.as_slice());
        assert_eq!((image.width(), image.height()), (4, 3));
    }

    #[test]
    fn data_uri_prefix_is_stripped() {
        let png = png_bytes(2, 2);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
        let field = format!("data:image/png;base64,{encoded}");

        let items = render_reply(&reply(None, Some(&field)));

        assert_eq!(expect_image(&items[0]).bytes(), png.as_slice());
    }

    #[test]
    fn unpadded_base64_is_accepted() {
        let png = png_bytes(3, 1);
        let encoded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(&png);

        let item = render_field(&encoded).unwrap();

        assert_eq!(expect_image(&item).bytes(), png.as_slice());
    }

    #[test]
    fn image_in_result_field_is_rendered_as_image() {
        let png = png_bytes(1, 1);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

        let items = render_reply(&reply(Some(&encoded), Some("chart unavailable")));

        assert_eq!(items.len(), 2);
        expect_image(&items[0]);
        assert_eq!(items[1], RenderedItem::Text("chart unavailable".to_string()));
    }

    #[test]
    fn empty_fields_produce_nothing() {
        assert!(render_reply(&reply(None, None)).is_empty());
        assert!(render_reply(&reply(Some(""), Some("   "))).is_empty());
    }

    #[test]
    fn wide_image_is_scaled_for_display_only() {
        let png = png_bytes(1200, 300);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

        let item = render_field(&encoded).unwrap();
        let image = expect_image(&item);

        assert_eq!(image.display_size(), [600.0, 150.0]);
        assert_eq!((image.width(), image.height()), (1200, 300));
        assert_eq!(image.pixels().dimensions(), (600, 150));
        assert_eq!(image.bytes(), png.as_slice());
    }

    #[test]
    fn very_wide_chart_keeps_display_pixels_small() {
        let png = png_bytes(5000, 50);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

        let item = render_field(&encoded).unwrap();
        let image = expect_image(&item);

        assert_eq!(image.width(), 5000);
        assert_eq!(image.display_size(), [600.0, 6.0]);
        assert_eq!(image.pixels().width(), 600);
        assert_eq!(image.bytes(), png.as_slice());
    }

    #[test]
    fn very_tall_image_is_capped_for_display() {
        let png = png_bytes(40, 3000);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

        let item = render_field(&encoded).unwrap();
        let image = expect_image(&item);

        assert_eq!((image.width(), image.height()), (40, 3000));
        assert!(image.pixels().height() <= MAX_PIXEL_SIDE);
        assert!(image.pixels().width() <= 40);
        assert_eq!(image.bytes(), png.as_slice());
    }

    #[test]
    fn line_wrapped_base64_is_decoded() {
        let png = png_bytes(30, 20);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
        let wrapped = encoded
            .as_bytes()
            .chunks(76)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        assert!(wrapped.contains('\n'));

        let item = render_field(&format!("data:image/png;base64,\n{wrapped}\n")).unwrap();

        assert_eq!(expect_image(&item).bytes(), png.as_slice());
    }

    #[test]
    fn wrapped_text_that_is_not_an_image_keeps_original_layout() {
        let raw = "Prediction:\n  5 days";

        assert_eq!(render_field(raw), Some(RenderedItem::Text(raw.to_string())));
    }

    #[test]
    fn narrow_image_keeps_its_size() {
        let png = png_bytes(600, 40);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

        let item = render_field(&encoded).unwrap();

        assert_eq!(expect_image(&item).display_size(), [600.0, 40.0]);
    }

    #[test]
    fn strip_data_uri_only_cuts_at_first_marker() {
        assert_eq!(strip_data_uri(" abc "), "abc");
        assert_eq!(strip_data_uri("data:x;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_uri("base64,base64,AA"), "base64,AA");
    }
}
