//! QR code rendering for validation marks.
//!
//! The mark encodes the public validation URL of a document and is rendered
//! as an 8-bit grayscale PNG, so it embeds as a single image without a mask.
//!
//! ## Example
//!
//! ```ignore
//! use pdf_seal::pdf::{QrCodeOptions, QrRenderer};
//!
//! let png = QrRenderer::render_png(
//!     "https://seal.example.com/validate/3f1c...",
//!     &QrCodeOptions::default().size(256),
//! )?;
//! ```

use qrcode::{EcLevel, QrCode};

use crate::error::{Error, Result};

/// QR code error correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrErrorCorrection {
    /// Low (~7% correction capability)
    Low,
    /// Medium (~15% correction capability)
    #[default]
    Medium,
    /// Quartile (~25% correction capability)
    Quartile,
    /// High (~30% correction capability)
    High,
}

impl QrErrorCorrection {
    fn level(self) -> EcLevel {
        match self {
            QrErrorCorrection::Low => EcLevel::L,
            QrErrorCorrection::Medium => EcLevel::M,
            QrErrorCorrection::Quartile => EcLevel::Q,
            QrErrorCorrection::High => EcLevel::H,
        }
    }
}

/// Options for QR code rendering.
#[derive(Debug, Clone)]
pub struct QrCodeOptions {
    /// Size of the QR code in pixels (width = height)
    pub size: u32,
    /// Error correction level
    pub error_correction: QrErrorCorrection,
    /// Quiet zone (border) in modules
    pub quiet_zone: u32,
}

impl Default for QrCodeOptions {
    fn default() -> Self {
        Self {
            size: 300,
            error_correction: QrErrorCorrection::Medium,
            quiet_zone: 4,
        }
    }
}

impl QrCodeOptions {
    /// Create new QR code options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the size in pixels.
    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Set the error correction level.
    pub fn error_correction(mut self, level: QrErrorCorrection) -> Self {
        self.error_correction = level;
        self
    }

    /// Set the quiet zone (border) in modules.
    pub fn quiet_zone(mut self, modules: u32) -> Self {
        self.quiet_zone = modules;
        self
    }
}

/// Renders QR codes as PNG images.
pub struct QrRenderer;

impl QrRenderer {
    /// Render `data` as a grayscale PNG.
    ///
    /// Each module is an integer number of pixels; the image is at least
    /// `options.size` pixels wide when the code fits, never scaled with
    /// interpolation.
    pub fn render_png(data: &str, options: &QrCodeOptions) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Err(Error::Barcode("QR payload is empty".to_string()));
        }
        let code = QrCode::with_error_correction_level(data, options.error_correction.level())
            .map_err(|e| Error::Barcode(format!("QR code encoding error: {}", e)))?;

        let qr_width = code.width();
        let module_count = qr_width + options.quiet_zone as usize * 2;
        let module_size = (options.size as usize).div_ceil(module_count).max(1);
        let side = (module_count * module_size) as u32;

        let mut img = image::GrayImage::from_pixel(side, side, image::Luma([255]));
        let quiet_px = options.quiet_zone as usize * module_size;
        for (y, row) in code.to_colors().chunks(qr_width).enumerate() {
            for (x, module) in row.iter().enumerate() {
                if *module != qrcode::Color::Dark {
                    continue;
                }
                let start_x = quiet_px + x * module_size;
                let start_y = quiet_px + y * module_size;
                for py in start_y..start_y + module_size {
                    for px in start_x..start_x + module_size {
                        img.put_pixel(px as u32, py as u32, image::Luma([0]));
                    }
                }
            }
        }

        let mut buf = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| Error::Barcode(format!("PNG encoding error: {}", e)))?;
        Ok(buf)
    }
}
