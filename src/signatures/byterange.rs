//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset of the `<` opening the `/Contents` value
//! - `offset2` = byte offset just past the closing `>`
//! - `length2` = remaining bytes to end of file
//!
//! Signing happens in two passes. The document is first serialized with a
//! wide ByteRange placeholder and a zero-filled `/Contents`; both are then
//! patched in place so no other byte moves.

use crate::error::{Error, Result};

/// Value written into `/ByteRange` before offsets are known. Each slot is
/// ten digits wide so real offsets always fit.
pub const BYTE_RANGE_PLACEHOLDER: [i64; 4] = [0, 9_999_999_999, 9_999_999_999, 9_999_999_999];

/// Calculator for PDF signature byte ranges.
#[derive(Debug)]
pub struct ByteRangeCalculator {
    /// Size of the placeholder for the signature value (hex digits + 2 for angle brackets)
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Create a calculator for a signature of up to `estimated_signature_size`
    /// DER bytes. The placeholder is `(size * 2) + 2` bytes: hex plus `<` and `>`.
    pub fn new(estimated_signature_size: usize) -> Self {
        Self {
            placeholder_size: estimated_signature_size * 2 + 2,
        }
    }

    /// Create a ByteRange calculator with a specific placeholder size.
    pub fn with_placeholder_size(placeholder_size: usize) -> Self {
        Self { placeholder_size }
    }

    /// Get the placeholder size (for the /Contents value).
    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// Number of raw bytes the `/Contents` string can hold.
    pub fn capacity(&self) -> usize {
        (self.placeholder_size - 2) / 2
    }

    /// Generate the zero-filled `/Contents` placeholder, `<000...0>`.
    pub fn generate_placeholder(&self) -> String {
        format!("<{}>", "0".repeat(self.placeholder_size - 2))
    }

    /// Calculate the ByteRange array given the position of the /Contents value.
    ///
    /// `contents_offset` is the offset of the opening `<`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// Format a ByteRange array as a PDF array string.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Locate the zero-filled `/Contents` placeholder in a serialized file.
    ///
    /// Returns the offset of its opening `<`.
    pub fn find_placeholder(&self, pdf_data: &[u8]) -> Result<usize> {
        let needle = self.generate_placeholder();
        find_last(pdf_data, needle.as_bytes()).ok_or_else(|| {
            Error::InvalidPdf("signature /Contents placeholder not found".to_string())
        })
    }

    /// Overwrite the ByteRange placeholder with `byte_range`, padding with spaces.
    pub fn write_byte_range(pdf_data: &mut [u8], byte_range: &[i64; 4]) -> Result<()> {
        let placeholder = Self::format_byte_range(&BYTE_RANGE_PLACEHOLDER);
        let start = find_last(pdf_data, placeholder.as_bytes())
            .ok_or_else(|| Error::InvalidPdf("/ByteRange placeholder not found".to_string()))?;

        let actual = Self::format_byte_range(byte_range);
        if actual.len() > placeholder.len() {
            return Err(Error::InvalidPdf(
                "ByteRange value does not fit its placeholder".to_string(),
            ));
        }

        let slot = &mut pdf_data[start..start + placeholder.len()];
        slot.fill(b' ');
        slot[..actual.len()].copy_from_slice(actual.as_bytes());
        Ok(())
    }

    /// Extract the bytes to be signed from a PDF file.
    ///
    /// This returns the concatenation of the two ranges specified by ByteRange.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        if byte_range.iter().any(|v| *v < 0) {
            return Err(Error::InvalidPdf("ByteRange holds a negative value".to_string()));
        }
        let offset1 = byte_range[0] as usize;
        let length1 = byte_range[1] as usize;
        let offset2 = byte_range[2] as usize;
        let length2 = byte_range[3] as usize;

        if offset1 + length1 > pdf_data.len() {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range exceeds file size: {} + {} > {}",
                offset1,
                length1,
                pdf_data.len()
            )));
        }
        if offset2 + length2 > pdf_data.len() {
            return Err(Error::InvalidPdf(format!(
                "ByteRange second range exceeds file size: {} + {} > {}",
                offset2,
                length2,
                pdf_data.len()
            )));
        }

        let mut signed_bytes = Vec::with_capacity(length1 + length2);
        signed_bytes.extend_from_slice(&pdf_data[offset1..offset1 + length1]);
        signed_bytes.extend_from_slice(&pdf_data[offset2..offset2 + length2]);

        Ok(signed_bytes)
    }

    /// Check that a ByteRange covers the entire document except the signature gap.
    pub fn validate_byte_range(byte_range: &[i64; 4], file_size: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = *byte_range;

        if offset1 != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", offset1)));
        }

        let expected_end = file_size as i64;
        let actual_end = offset2 + length2;
        if actual_end != expected_end {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                expected_end, actual_end
            )));
        }

        if length1 > offset2 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }

        Ok(())
    }

    /// Replace the placeholder in the PDF with the actual signature.
    ///
    /// `signature_hex` is zero-padded to the placeholder width.
    pub fn insert_signature(
        &self,
        pdf_data: &mut [u8],
        contents_offset: usize,
        signature_hex: &str,
    ) -> Result<()> {
        let sig_len = signature_hex.len() + 2;
        if sig_len > self.placeholder_size {
            return Err(Error::InvalidPdf(format!(
                "Signature ({} bytes) exceeds placeholder size ({} bytes)",
                sig_len, self.placeholder_size
            )));
        }

        if contents_offset + self.placeholder_size > pdf_data.len() {
            return Err(Error::InvalidPdf(
                "Signature insertion would exceed file bounds".to_string(),
            ));
        }

        let slot = &mut pdf_data[contents_offset..contents_offset + self.placeholder_size];
        slot.fill(b'0');
        slot[0] = b'<';
        slot[1..1 + signature_hex.len()].copy_from_slice(signature_hex.as_bytes());
        slot[self.placeholder_size - 1] = b'>';

        Ok(())
    }
}

impl Default for ByteRangeCalculator {
    fn default() -> Self {
        Self::new(8192)
    }
}

fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_size() {
        let calc = ByteRangeCalculator::new(1024);
        // 1024 bytes * 2 (hex) + 2 (brackets) = 2050
        assert_eq!(calc.placeholder_size(), 2050);
        assert_eq!(calc.capacity(), 1024);
    }

    #[test]
    fn test_generate_placeholder() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let placeholder = calc.generate_placeholder();
        assert_eq!(placeholder, "<00000000>");
    }

    #[test]
    fn test_calculate_byte_range() {
        let calc = ByteRangeCalculator::with_placeholder_size(100);
        let byte_range = calc.calculate_byte_range(1000, 400);
        assert_eq!(byte_range, [0, 400, 500, 500]);
    }

    #[test]
    fn test_find_placeholder_and_patch() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let mut pdf = format!(
            "<</Type/Sig/ByteRange{}/Contents<00000000>>>tail",
            ByteRangeCalculator::format_byte_range(&BYTE_RANGE_PLACEHOLDER)
        )
        .into_bytes();
        let original_len = pdf.len();

        let offset = calc.find_placeholder(&pdf).unwrap();
        assert_eq!(pdf[offset], b'<');
        let range = calc.calculate_byte_range(pdf.len(), offset);
        ByteRangeCalculator::write_byte_range(&mut pdf, &range).unwrap();
        calc.insert_signature(&mut pdf, offset, "ABCD").unwrap();

        assert_eq!(pdf.len(), original_len);
        let text = String::from_utf8(pdf.clone()).unwrap();
        assert!(text.contains(&ByteRangeCalculator::format_byte_range(&range)));
        assert!(text.contains("<ABCD0000>"));
        assert!(ByteRangeCalculator::validate_byte_range(&range, pdf.len()).is_ok());

        let signed = ByteRangeCalculator::extract_signed_bytes(&pdf, &range).unwrap();
        assert_eq!(signed.len(), pdf.len() - 10);
    }

    #[test]
    fn test_extract_signed_bytes() {
        let pdf_data = b"AAABBBCCC";
        let signed = ByteRangeCalculator::extract_signed_bytes(pdf_data, &[0, 3, 6, 3]).unwrap();
        assert_eq!(signed, b"AAACCC");
        assert!(ByteRangeCalculator::extract_signed_bytes(pdf_data, &[0, 3, 6, 9]).is_err());
        assert!(ByteRangeCalculator::extract_signed_bytes(pdf_data, &[0, -1, 6, 3]).is_err());
    }

    #[test]
    fn test_validate_byte_range() {
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 100, 150, 50], 200).is_ok());
        assert!(ByteRangeCalculator::validate_byte_range(&[10, 100, 150, 50], 200).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 100, 150, 100], 200).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 160, 150, 50], 200).is_err());
    }

    #[test]
    fn test_insert_signature_too_large() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let mut pdf_data = b"XX<00000000>YY".to_vec();
        let result = calc.insert_signature(&mut pdf_data, 2, "AABBCCDDEE");
        assert!(result.is_err());
    }
}
