//! PDF signing implementation.
//!
//! Embeds a PKCS#7 detached signature into a signature dictionary. The
//! document gains a hidden signature widget on its first page and an
//! AcroForm with `/SigFlags 3`; everything else is left untouched.

use chrono::Utc;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::X509;

use super::byterange::{ByteRangeCalculator, BYTE_RANGE_PLACEHOLDER};
use super::types::{SignOptions, SigningCredentials};
use crate::error::{Error, Result};

/// PDF signer that creates digital signatures.
pub struct PdfSigner {
    credentials: SigningCredentials,
    options: SignOptions,
    byte_range_calc: ByteRangeCalculator,
}

impl PdfSigner {
    /// Create a new PDF signer with the given credentials and options.
    pub fn new(credentials: SigningCredentials, options: SignOptions) -> Self {
        let byte_range_calc = ByteRangeCalculator::new(options.estimated_size);
        Self {
            credentials,
            options,
            byte_range_calc,
        }
    }

    /// Get the placeholder size for the signature.
    pub fn placeholder_size(&self) -> usize {
        self.byte_range_calc.placeholder_size()
    }

    /// Build the signature dictionary with `/ByteRange` and `/Contents` placeholders.
    pub fn build_signature_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"Sig".to_vec()));
        dict.set("Filter", Object::Name(b"Adobe.PPKLite".to_vec()));
        dict.set(
            "SubFilter",
            Object::Name(self.options.sub_filter.as_pdf_name().as_bytes().to_vec()),
        );
        dict.set(
            "ByteRange",
            Object::Array(BYTE_RANGE_PLACEHOLDER.iter().map(|v| Object::Integer(*v)).collect()),
        );
        dict.set(
            "Contents",
            Object::String(vec![0u8; self.byte_range_calc.capacity()], StringFormat::Hexadecimal),
        );

        let optional = [
            ("Name", &self.options.name),
            ("Reason", &self.options.reason),
            ("Location", &self.options.location),
            ("ContactInfo", &self.options.contact_info),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                dict.set(key, Object::string_literal(pdf_text(value)));
            }
        }

        dict.set("M", Object::string_literal(format_pdf_date()));
        dict
    }

    /// Create the PKCS#7 detached signature over `signed_bytes`.
    pub fn sign(&self, signed_bytes: &[u8]) -> Result<Vec<u8>> {
        let cert = self.credentials.x509()?;
        let pkey = self.credentials.pkey()?;
        let mut extra = Stack::<X509>::new()?;
        for cert in self.credentials.chain_x509()? {
            extra.push(cert)?;
        }

        let flags = Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY | Pkcs7Flags::NOSMIMECAP;
        let pkcs7 = Pkcs7::sign(&cert, &pkey, &extra, signed_bytes, flags)?;
        Ok(pkcs7.to_der()?)
    }

    /// Sign a serialized PDF and return the signed file.
    ///
    /// The output is a full rewrite of the input with the signature
    /// dictionary added, then patched in place.
    pub fn sign_pdf(&self, pdf_bytes: &[u8]) -> Result<Vec<u8>> {
        let mut doc = Document::load_mem(pdf_bytes)?;
        let sig_id = doc.add_object(Object::Dictionary(self.build_signature_dictionary()));
        let widget_id = add_signature_widget(&mut doc, sig_id)?;
        register_in_acroform(&mut doc, widget_id)?;

        let mut prepared = Vec::with_capacity(pdf_bytes.len() + self.placeholder_size() + 1024);
        doc.save_to(&mut prepared)?;

        let contents_offset = self.byte_range_calc.find_placeholder(&prepared)?;
        let byte_range = self
            .byte_range_calc
            .calculate_byte_range(prepared.len(), contents_offset);
        ByteRangeCalculator::write_byte_range(&mut prepared, &byte_range)?;

        let signed_bytes = ByteRangeCalculator::extract_signed_bytes(&prepared, &byte_range)?;
        let signature = self.sign(&signed_bytes)?;
        if signature.len() > self.byte_range_calc.capacity() {
            return Err(Error::Crypto(format!(
                "signature of {} bytes exceeds the reserved {}",
                signature.len(),
                self.byte_range_calc.capacity()
            )));
        }

        self.byte_range_calc
            .insert_signature(&mut prepared, contents_offset, &hex::encode_upper(&signature))?;
        log::debug!(
            "embedded {} byte PKCS#7 signature, ByteRange {}",
            signature.len(),
            ByteRangeCalculator::format_byte_range(&byte_range)
        );
        Ok(prepared)
    }

    /// Get the signing options.
    pub fn options(&self) -> &SignOptions {
        &self.options
    }

    /// Get the signing credentials (certificate info only).
    pub fn credentials(&self) -> &SigningCredentials {
        &self.credentials
    }
}

fn add_signature_widget(doc: &mut Document, sig_id: ObjectId) -> Result<ObjectId> {
    let first_page = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| Error::InvalidPdf("document has no pages".to_string()))?;

    let mut widget = Dictionary::new();
    widget.set("Type", Object::Name(b"Annot".to_vec()));
    widget.set("Subtype", Object::Name(b"Widget".to_vec()));
    widget.set("FT", Object::Name(b"Sig".to_vec()));
    widget.set("T", Object::string_literal(format!("Signature{}", sig_id.0)));
    widget.set("V", Object::Reference(sig_id));
    widget.set("Rect", Object::Array(vec![Object::Integer(0); 4]));
    // Hidden | Print
    widget.set("F", Object::Integer(132));
    widget.set("P", Object::Reference(first_page));
    let widget_id = doc.add_object(Object::Dictionary(widget));

    let current = doc.get_object(first_page)?.as_dict()?.get(b"Annots").ok().cloned();
    let mut annots = match current {
        Some(Object::Array(items)) => items,
        Some(Object::Reference(id)) => doc.get_object(id)?.as_array()?.clone(),
        _ => Vec::new(),
    };
    annots.push(Object::Reference(widget_id));
    doc.get_object_mut(first_page)?
        .as_dict_mut()?
        .set("Annots", Object::Array(annots));

    Ok(widget_id)
}

fn register_in_acroform(doc: &mut Document, field_id: ObjectId) -> Result<()> {
    let existing = doc.catalog()?.get(b"AcroForm").ok().cloned();
    let acroform_id = match existing {
        Some(Object::Reference(id)) => id,
        Some(Object::Dictionary(inline)) => doc.add_object(Object::Dictionary(inline)),
        _ => {
            let mut acroform = Dictionary::new();
            acroform.set("Fields", Object::Array(Vec::new()));
            doc.add_object(Object::Dictionary(acroform))
        },
    };
    doc.catalog_mut()?.set("AcroForm", Object::Reference(acroform_id));

    let acroform = doc.get_object_mut(acroform_id)?.as_dict_mut()?;
    let mut fields = match acroform.get(b"Fields") {
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    fields.push(Object::Reference(field_id));
    acroform.set("Fields", Object::Array(fields));
    // SignaturesExist | AppendOnly
    acroform.set("SigFlags", Object::Integer(3));
    Ok(())
}

/// PDF text strings here are literal byte strings; non-ASCII falls back to `?`.
fn pdf_text(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii() { c } else { '?' }).collect()
}

/// Format the current UTC time as a PDF date string.
fn format_pdf_date() -> String {
    Utc::now().format("D:%Y%m%d%H%M%S+00'00'").to_string()
}
