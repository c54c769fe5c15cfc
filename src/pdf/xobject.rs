//! Image XObjects for signature stamps and QR marks.
//!
//! Images are represented as XObjects (ISO 32000-1 Section 8.9).
//!
//! # Supported Formats
//!
//! - **JPEG**: pass-through embedding with the DCTDecode filter
//! - **PNG**: decoded, then stored Flate-compressed; alpha becomes an `/SMask`

use std::io::Write;

use lopdf::{Dictionary, Object, Stream};

use crate::error::{Error, Result};

/// Image format for PDF embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG image (DCTDecode filter)
    Jpeg,
    /// Decoded pixels (FlateDecode filter)
    Flate,
}

/// Color space for image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Grayscale (1 component per pixel)
    DeviceGray,
    /// RGB color (3 components per pixel)
    DeviceRGB,
    /// CMYK color (4 components per pixel)
    DeviceCMYK,
}

impl ColorSpace {
    /// Get the number of color components.
    pub fn components(&self) -> u8 {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRGB => 3,
            ColorSpace::DeviceCMYK => 4,
        }
    }

    /// Get the PDF name for this color space.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }
}

/// Image data ready for embedding.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Color space
    pub color_space: ColorSpace,
    /// Stream encoding
    pub format: ImageFormat,
    /// Encoded stream data
    pub data: Vec<u8>,
    /// Flate-compressed alpha channel
    pub soft_mask: Option<Vec<u8>>,
}

impl ImageData {
    /// Load a JPEG image. The bytes are embedded as-is.
    pub fn from_jpeg(data: Vec<u8>) -> Result<Self> {
        let (width, height, color_space) = parse_jpeg_header(&data)?;
        Ok(Self {
            width,
            height,
            color_space,
            format: ImageFormat::Jpeg,
            data,
            soft_mask: None,
        })
    }

    /// Load a PNG image.
    pub fn from_png(data: &[u8]) -> Result<Self> {
        use image::GenericImageView;

        let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| Error::Image(format!("PNG decode failed: {}", e)))?;
        let (width, height) = img.dimensions();

        let (color_space, pixels, alpha) = match img.color() {
            image::ColorType::L8 | image::ColorType::L16 => {
                (ColorSpace::DeviceGray, img.to_luma8().into_raw(), None)
            },
            image::ColorType::La8 | image::ColorType::La16 => {
                let la = img.to_luma_alpha8();
                let mut gray = Vec::with_capacity((width * height) as usize);
                let mut alpha = Vec::with_capacity((width * height) as usize);
                for pixel in la.pixels() {
                    gray.push(pixel.0[0]);
                    alpha.push(pixel.0[1]);
                }
                (ColorSpace::DeviceGray, gray, Some(alpha))
            },
            image::ColorType::Rgba8 | image::ColorType::Rgba16 => {
                let rgba = img.to_rgba8();
                let mut rgb = Vec::with_capacity((width * height * 3) as usize);
                let mut alpha = Vec::with_capacity((width * height) as usize);
                for pixel in rgba.pixels() {
                    rgb.extend_from_slice(&pixel.0[..3]);
                    alpha.push(pixel.0[3]);
                }
                (ColorSpace::DeviceRGB, rgb, Some(alpha))
            },
            _ => (ColorSpace::DeviceRGB, img.to_rgb8().into_raw(), None),
        };

        // Fully opaque alpha carries no information.
        let alpha = alpha.filter(|a| a.iter().any(|v| *v != 255));

        Ok(Self {
            width,
            height,
            color_space,
            format: ImageFormat::Flate,
            data: compress(&pixels)?,
            soft_mask: alpha.map(|a| compress(&a)).transpose()?,
        })
    }

    /// Load an image, detecting the format from its magic bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.starts_with(&[0xFF, 0xD8]) {
            return Self::from_jpeg(data.to_vec());
        }
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Self::from_png(data);
        }
        Err(Error::Image("unsupported image format, expected PNG or JPEG".to_string()))
    }

    /// Build the Image XObject stream. The soft mask, if any, is returned
    /// separately and must be added first and linked with [`link_soft_mask`].
    ///
    /// [`link_soft_mask`]: ImageData::link_soft_mask
    pub fn to_streams(&self) -> (Stream, Option<Stream>) {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", Object::Integer(self.width as i64));
        dict.set("Height", Object::Integer(self.height as i64));
        dict.set("ColorSpace", Object::Name(self.color_space.pdf_name().as_bytes().to_vec()));
        dict.set("BitsPerComponent", Object::Integer(8));
        let filter: &[u8] = match self.format {
            ImageFormat::Jpeg => b"DCTDecode",
            ImageFormat::Flate => b"FlateDecode",
        };
        dict.set("Filter", Object::Name(filter.to_vec()));

        let mask = self.soft_mask.as_ref().map(|mask| {
            let mut mask_dict = Dictionary::new();
            mask_dict.set("Type", Object::Name(b"XObject".to_vec()));
            mask_dict.set("Subtype", Object::Name(b"Image".to_vec()));
            mask_dict.set("Width", Object::Integer(self.width as i64));
            mask_dict.set("Height", Object::Integer(self.height as i64));
            mask_dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
            mask_dict.set("BitsPerComponent", Object::Integer(8));
            mask_dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
            Stream::new(mask_dict, mask.clone())
        });

        (Stream::new(dict, self.data.clone()), mask)
    }

    /// Point the image stream at an already-added soft mask object.
    pub fn link_soft_mask(stream: &mut Stream, mask_id: lopdf::ObjectId) {
        stream.dict.set("SMask", Object::Reference(mask_id));
    }

    /// Get the aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Calculate dimensions to fit within a bounding box while maintaining aspect ratio.
    pub fn fit_to_box(&self, max_width: f32, max_height: f32) -> (f32, f32) {
        let aspect = self.aspect_ratio();
        if aspect > max_width / max_height {
            (max_width, max_width / aspect)
        } else {
            (max_height * aspect, max_height)
        }
    }
}

/// Parse JPEG header to extract dimensions and color space.
fn parse_jpeg_header(data: &[u8]) -> Result<(u32, u32, ColorSpace)> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(Error::Image("not a valid JPEG".to_string()));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        pos += 2;

        if marker == 0xFF || marker == 0x00 {
            continue;
        }

        // SOF0..SOF15 without DHT (C4), JPG (C8) and DAC (CC)
        if matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            if pos + 8 > data.len() {
                return Err(Error::Image("truncated JPEG header".to_string()));
            }
            let height = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as u32;
            let width = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let color_space = match data[pos + 7] {
                1 => ColorSpace::DeviceGray,
                4 => ColorSpace::DeviceCMYK,
                _ => ColorSpace::DeviceRGB,
            };
            return Ok((width, height, color_space));
        }

        if pos + 2 > data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += length;
    }

    Err(Error::Image("could not find JPEG dimensions".to_string()))
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Image placement in page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    /// Left edge
    pub x: f32,
    /// Bottom edge
    pub y: f32,
    /// Display width
    pub width: f32,
    /// Display height
    pub height: f32,
    /// Clockwise rotation about the box center, in degrees
    pub rotation: f32,
}

impl ImagePlacement {
    /// Create an unrotated placement.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
        }
    }

    /// Set the clockwise rotation in degrees.
    pub fn rotated(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    /// Center of the box.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Matrix for the `cm` operator mapping the unit square onto the box.
    ///
    /// Returns `(a, b, c, d, e, f)` where:
    /// ```text
    /// [ a  b  0 ]
    /// [ c  d  0 ]
    /// [ e  f  1 ]
    /// ```
    pub fn transform_matrix(&self) -> (f32, f32, f32, f32, f32, f32) {
        let (cos, sin) = rotation_terms(self.rotation);
        let a = self.width * cos;
        let b = self.width * sin;
        let c = -self.height * sin;
        let d = self.height * cos;
        let (cx, cy) = self.center();
        (a, b, c, d, cx - (a + c) / 2.0, cy - (b + d) / 2.0)
    }

    /// Matrix for the `cm` operator mapping box-local coordinates
    /// (origin at the bottom-left corner, unit = point) onto the page.
    pub fn local_matrix(&self) -> (f32, f32, f32, f32, f32, f32) {
        let (cos, sin) = rotation_terms(self.rotation);
        let (cx, cy) = self.center();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        (cos, sin, -sin, cos, cx - (cos * hw - sin * hh), cy - (sin * hw + cos * hh))
    }
}

/// Clockwise on the page is a negative angle in PDF user space.
fn rotation_terms(degrees: f32) -> (f32, f32) {
    let radians = (-degrees).to_radians();
    (radians.cos(), radians.sin())
}
