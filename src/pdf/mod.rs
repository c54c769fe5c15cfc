//! PDF object model helpers for visual seals.
//!
//! - [`SealEditor`]: load, overlay images and text, set Info entries, save
//! - [`ImageData`]: PNG/JPEG to Image XObject conversion
//! - [`QrRenderer`]: validation-link QR codes as PNG

mod editor;
mod qr;
mod xobject;

pub use editor::{count_images, PageBox, SealEditor};
pub use qr::{QrCodeOptions, QrErrorCorrection, QrRenderer};
pub use xobject::{ColorSpace, ImageData, ImageFormat, ImagePlacement};

/// Info dictionary key carrying the validation URL of a sealed document.
pub const VALIDATION_URL_INFO_KEY: &str = "SealValidationUrl";

/// Byte marker left by a visual seal, searched for by the verifier.
pub const VISUAL_SEAL_MARKER: &str = "/SealValidationUrl";

/// Count image XObjects in serialized PDF bytes.
pub fn count_images_in(bytes: &[u8]) -> crate::error::Result<usize> {
    Ok(SealEditor::load(bytes)?.count_images())
}
