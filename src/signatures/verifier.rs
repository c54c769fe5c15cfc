//! PDF signature verification.
//!
//! Works on raw bytes without building an object graph. A file counts as
//! PKI-signed only when enough distinct signature markers co-occur, so a
//! stray `/ByteRange` inside some content stream does not flip the result.
//! Every signature dictionary with a well-formed ByteRange and DER contents
//! is also checked cryptographically. Chain trust is not evaluated: the
//! engine issues self-signed certificates.

use lazy_static::lazy_static;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use regex::bytes::Regex;
use sha2::{Digest, Sha256};

use super::byterange::ByteRangeCalculator;
use super::types::{SignatureClassification, SignatureInfo, SignatureSubFilter, VerificationResult};
use crate::certificates::x509::{asn1_to_utc, common_name, format_name};
use crate::pdf::VISUAL_SEAL_MARKER;

/// Distinct marker kinds required before a file counts as PKI-signed.
pub const PKI_MARKER_THRESHOLD: usize = 3;

lazy_static! {
    static ref TYPE_SIG: Regex = Regex::new(r"/Type\s*/Sig\b").unwrap();
    static ref SUB_FILTER: Regex = Regex::new(concat!(
        r"/SubFilter\s*/(adbe\.pkcs7\.detached|adbe\.pkcs7\.sha1|adbe\.x509\.rsa_sha1",
        r"|ETSI\.CAdES\.detached|ETSI\.RFC3161)"
    ))
    .unwrap();
    static ref BYTE_RANGE: Regex =
        Regex::new(r"/ByteRange\s*\[\s*(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s*\]").unwrap();
    static ref CONTENTS_HEX: Regex = Regex::new(r"/Contents\s*<([0-9A-Fa-f\s]+)>").unwrap();
    static ref NAME: Regex = Regex::new(r"/Name\s*\(((?:\\.|[^\\)])*)\)").unwrap();
    static ref REASON: Regex = Regex::new(r"/Reason\s*\(((?:\\.|[^\\)])*)\)").unwrap();
    static ref LOCATION: Regex = Regex::new(r"/Location\s*\(((?:\\.|[^\\)])*)\)").unwrap();
    static ref CONTACT: Regex = Regex::new(r"/ContactInfo\s*\(((?:\\.|[^\\)])*)\)").unwrap();
    static ref SIGN_DATE: Regex = Regex::new(r"/M\s*\(((?:\\.|[^\\)])*)\)").unwrap();
    static ref OBJ_START: Regex = Regex::new(r"\d+\s+\d+\s+obj\b").unwrap();
}

/// Verifier for PDF digital signatures.
#[derive(Debug, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Create a new signature verifier.
    pub fn new() -> Self {
        Self
    }

    /// Count the distinct PKI marker kinds present in `pdf_data`.
    pub fn marker_kinds(pdf_data: &[u8]) -> usize {
        [
            TYPE_SIG.is_match(pdf_data),
            SUB_FILTER.is_match(pdf_data),
            BYTE_RANGE.is_match(pdf_data),
            CONTENTS_HEX.is_match(pdf_data),
        ]
        .iter()
        .filter(|hit| **hit)
        .count()
    }

    /// Whether the visual seal watermark is present.
    pub fn has_visual_seal(pdf_data: &[u8]) -> bool {
        let marker = VISUAL_SEAL_MARKER.as_bytes();
        pdf_data.windows(marker.len()).any(|w| w == marker)
    }

    /// Inspect `pdf_data` and compare its SHA-256 with `expected_hash`.
    pub fn verify(&self, pdf_data: &[u8], expected_hash: Option<&str>) -> VerificationResult {
        let computed_hash = hex::encode(Sha256::digest(pdf_data));
        let hash_match = expected_hash.map(|e| e.trim().eq_ignore_ascii_case(&computed_hash));

        let has_pki_signature = Self::marker_kinds(pdf_data) >= PKI_MARKER_THRESHOLD;
        let has_visual_seal = Self::has_visual_seal(pdf_data);

        let mut messages = Vec::new();
        let signatures = if has_pki_signature {
            self.extract_signatures(pdf_data, &mut messages)
        } else {
            Vec::new()
        };

        if hash_match == Some(false) {
            messages.push("document hash does not match the recorded hash".to_string());
        }

        VerificationResult {
            has_pki_signature,
            signature_count: signatures.len(),
            classification: SignatureClassification::from_flags(has_visual_seal, has_pki_signature),
            signatures,
            has_visual_seal,
            computed_hash,
            expected_hash: expected_hash.map(|e| e.trim().to_ascii_lowercase()),
            hash_match,
            messages,
        }
    }

    fn extract_signatures(
        &self,
        pdf_data: &[u8],
        messages: &mut Vec<String>,
    ) -> Vec<SignatureInfo> {
        let mut out = Vec::new();
        for caps in BYTE_RANGE.captures_iter(pdf_data) {
            let Some(whole) = caps.get(0) else { continue };
            let window = dictionary_window(pdf_data, whole.start());
            if !TYPE_SIG.is_match(window) && !SUB_FILTER.is_match(window) {
                continue;
            }

            let parsed: Vec<i64> = (1..=4)
                .filter_map(|i| caps.get(i))
                .filter_map(|m| std::str::from_utf8(m.as_bytes()).ok())
                .filter_map(|s| s.parse::<i64>().ok())
                .collect();

            let mut info = self.extract_signature_info(window);
            info.byte_range = parsed.clone();

            if let Ok(range) = <[i64; 4]>::try_from(parsed.as_slice()) {
                info.covers_whole_document =
                    ByteRangeCalculator::validate_byte_range(&range, pdf_data.len()).is_ok();
                if let Some(der) = contents_der(window) {
                    self.check_pkcs7(pdf_data, &range, &der, &mut info, messages);
                }
            }
            if !info.covers_whole_document {
                messages.push("signature does not cover the whole document".to_string());
            }
            out.push(info);
        }
        out
    }

    /// Best-effort metadata from the fields around a signature dictionary.
    pub fn extract_signature_info(&self, window: &[u8]) -> SignatureInfo {
        let field = |re: &Regex| {
            re.captures(window)
                .and_then(|c| c.get(1))
                .map(|m| unescape_literal(m.as_bytes()))
        };
        SignatureInfo {
            signer_name: field(&NAME),
            signing_time: field(&SIGN_DATE),
            reason: field(&REASON),
            location: field(&LOCATION),
            contact_info: field(&CONTACT),
            sub_filter: SUB_FILTER
                .captures(window)
                .and_then(|c| c.get(1))
                .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
                .and_then(SignatureSubFilter::from_pdf_name),
            ..SignatureInfo::default()
        }
    }

    fn check_pkcs7(
        &self,
        pdf_data: &[u8],
        range: &[i64; 4],
        der: &[u8],
        info: &mut SignatureInfo,
        messages: &mut Vec<String>,
    ) {
        let outcome = (|| -> crate::Result<bool> {
            let signed = ByteRangeCalculator::extract_signed_bytes(pdf_data, range)?;
            let pkcs7 = Pkcs7::from_der(der)?;
            let empty = Stack::<X509>::new()?;

            if let Ok(signers) = pkcs7.signers(&empty, Pkcs7Flags::empty()) {
                if let Some(cert) = signers.iter().next() {
                    info.certificate_cn = common_name(cert.subject_name());
                    info.certificate_issuer = Some(format_name(cert.issuer_name()));
                    info.valid_from = asn1_to_utc(cert.not_before()).ok().map(|t| t.to_rfc3339());
                    info.valid_to = asn1_to_utc(cert.not_after()).ok().map(|t| t.to_rfc3339());
                }
            }

            let store = X509StoreBuilder::new()?.build();
            let flags = Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY | Pkcs7Flags::NOVERIFY;
            Ok(pkcs7.verify(&empty, &store, Some(&signed), None, flags).is_ok())
        })();

        match outcome {
            Ok(valid) => {
                if !valid {
                    messages.push("signature does not match the signed byte range".to_string());
                }
                info.integrity_valid = Some(valid);
            },
            Err(e) => {
                log::debug!("PKCS#7 contents could not be checked: {}", e);
                messages.push("signature contents could not be parsed".to_string());
                info.integrity_valid = Some(false);
            },
        }
    }
}

/// Bytes of the indirect object that contains `at`.
fn dictionary_window(pdf_data: &[u8], at: usize) -> &[u8] {
    let head = &pdf_data[..at];
    let start = OBJ_START
        .find_iter(head)
        .last()
        .map(|m| m.start())
        .unwrap_or_else(|| at.saturating_sub(2048));
    let tail = &pdf_data[at..];
    let end = tail
        .windows(6)
        .position(|w| w == b"endobj")
        .map(|p| at + p)
        .unwrap_or_else(|| (at + 32 * 1024).min(pdf_data.len()));
    &pdf_data[start..end]
}

/// Decode the `/Contents` hex string and trim the zero padding to the DER length.
fn contents_der(window: &[u8]) -> Option<Vec<u8>> {
    let hex_digits: Vec<u8> = CONTENTS_HEX
        .captures(window)?
        .get(1)?
        .as_bytes()
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let raw = hex::decode(hex_digits).ok()?;
    let len = der_length(&raw)?;
    raw.get(..len).map(|s| s.to_vec())
}

/// Total length of the DER element at the start of `bytes`.
fn der_length(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < 2 || bytes[0] != 0x30 {
        return None;
    }
    let first = bytes[1] as usize;
    if first < 0x80 {
        return Some(2 + first);
    }
    let count = first & 0x7f;
    if count == 0 || count > 4 || bytes.len() < 2 + count {
        return None;
    }
    let body = bytes[2..2 + count]
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize);
    let total = 2 + count + body;
    (total <= bytes.len()).then_some(total)
}

fn unescape_literal(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(other) => out.push(other),
            None => {},
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
