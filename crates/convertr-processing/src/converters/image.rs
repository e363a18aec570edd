//! Raster image conversion with the `image` crate

use async_trait::async_trait;
use bytes::Bytes;
use convertr_core::models::{ConversionOptions, FormatCategory, FormatTag, ImageOptions};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgb, RgbImage, Rgba};
use std::io::Cursor;

use super::pdf::PdfBuilder;
use crate::error::ConversionError;
use crate::traits::{ConversionInput, Converter};

const ICO_MAX_DIMENSION: u32 = 256;

pub struct ImageConverter;

impl ImageConverter {
    pub fn new() -> Self {
        Self
    }

    fn can_encode(target: &FormatTag) -> bool {
        matches!(
            target.extension().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tiff" | "gif" | "ico" | "pdf"
        )
    }

    pub fn decode(data: &[u8]) -> Result<DynamicImage, ConversionError> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| ConversionError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| ConversionError::Decode(e.to_string()))
    }

    /// Downscale to fit within the bounds, keeping the aspect ratio. Never upscales.
    fn fit(img: DynamicImage, max_width: Option<u32>, max_height: Option<u32>) -> DynamicImage {
        let (width, height) = img.dimensions();
        let max_width = max_width.unwrap_or(width).max(1);
        let max_height = max_height.unwrap_or(height).max(1);
        if width <= max_width && height <= max_height {
            return img;
        }
        img.resize(max_width, max_height, FilterType::Lanczos3)
    }

    /// Composite onto a white background for targets without alpha
    fn flatten(img: &DynamicImage) -> RgbImage {
        let rgba = img.to_rgba8();
        RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let alpha = a as u16;
            let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
            Rgb([blend(r), blend(g), blend(b)])
        })
    }

    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ConversionError> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
            .encode_image(&Self::flatten(img))
            .map_err(|e| ConversionError::Encode(e.to_string()))?;
        Ok(buf)
    }

    fn write(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ConversionError> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .map_err(|e| ConversionError::Encode(e.to_string()))?;
        Ok(buf)
    }

    pub fn encode(
        img: &DynamicImage,
        target: &FormatTag,
        options: &ImageOptions,
    ) -> Result<Vec<u8>, ConversionError> {
        match target.extension().as_str() {
            "jpg" | "jpeg" => Self::encode_jpeg(img, options.quality),
            "bmp" => Self::write(&DynamicImage::ImageRgb8(Self::flatten(img)), ImageFormat::Bmp),
            "ico" => {
                let icon = Self::fit(img.clone(), Some(ICO_MAX_DIMENSION), Some(ICO_MAX_DIMENSION));
                Self::write(&DynamicImage::ImageRgba8(icon.to_rgba8()), ImageFormat::Ico)
            }
            "pdf" => {
                let (width, height) = img.dimensions();
                let jpeg = Self::encode_jpeg(img, options.quality)?;
                Ok(single_image_pdf(&jpeg, width, height))
            }
            ext => {
                let format = ImageFormat::from_extension(ext)
                    .ok_or_else(|| ConversionError::Encode(format!("unknown image format {ext}")))?;
                Self::write(&DynamicImage::ImageRgba8(img.to_rgba8()), format)
            }
        }
    }

    pub fn convert_blocking(
        data: &[u8],
        target: &FormatTag,
        options: &ImageOptions,
    ) -> Result<Vec<u8>, ConversionError> {
        let img = Self::decode(data)?;
        let img = Self::fit(img, options.max_width, options.max_height);
        Self::encode(&img, target, options)
    }
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Converter for ImageConverter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn handles(&self, source: &FormatTag, target: &FormatTag) -> bool {
        source.category() == FormatCategory::Image
            && source.extension() != "svg"
            && Self::can_encode(target)
    }

    async fn convert(&self, input: ConversionInput) -> Result<Bytes, ConversionError> {
        let ConversionInput {
            data,
            target,
            options,
            ..
        } = input;
        let options = match options {
            ConversionOptions::Image(options) => options,
            _ => ImageOptions::default(),
        };

        let output = tokio::task::spawn_blocking(move || {
            Self::convert_blocking(&data, &target, &options)
        })
        .await??;

        Ok(Bytes::from(output))
    }
}

/// Single-page PDF embedding a JPEG at one point per pixel
fn single_image_pdf(jpeg: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    let pages_id = pdf.reserve();
    let image_id = pdf.add_stream(
        &format!(
            "/Type /XObject /Subtype /Image /Width {width} /Height {height} \
             /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode"
        ),
        jpeg,
    );
    let content = format!("q\n{width} 0 0 {height} 0 0 cm\n/Im0 Do\nQ\n");
    let content_id = pdf.add_stream("", content.as_bytes());
    let page_id = pdf.add(format!(
        "<< /Type /Page /Parent {pages_id} 0 R /MediaBox [0 0 {width} {height}] \
         /Resources << /XObject << /Im0 {image_id} 0 R >> >> /Contents {content_id} 0 R >>"
    ));
    pdf.finish(pages_id, &[page_id])
}
