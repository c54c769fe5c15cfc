//! Self-signed X.509 generation and PKCS#12 packaging.

use chrono::{DateTime, Months, TimeZone, Utc};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509NameRef, X509};

use crate::error::{Error, Result};
use crate::model::{KeyStrength, SubjectAttributes};

/// Random serial size in bits.
const SERIAL_BITS: i32 = 128;

/// Freshly generated key pair and certificate.
pub struct GeneratedCertificate {
    /// Signed certificate
    pub certificate: X509,
    /// RSA private key
    pub key: PKey<Private>,
    /// Lowercase hex serial
    pub serial_hex: String,
    /// SHA-256 fingerprint of the DER certificate, lowercase hex
    pub fingerprint: String,
    /// Issuer DN, equal to the subject DN
    pub issuer: String,
    /// notBefore
    pub not_before: DateTime<Utc>,
    /// notAfter
    pub not_after: DateTime<Utc>,
}

impl std::fmt::Debug for GeneratedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedCertificate")
            .field("serial_hex", &self.serial_hex)
            .field("issuer", &self.issuer)
            .field("not_after", &self.not_after)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn build_subject_name(subject: &SubjectAttributes) -> Result<X509Name> {
    let mut name = X509NameBuilder::new()?;
    if let Some(country) = &subject.country {
        name.append_entry_by_nid(Nid::COUNTRYNAME, &country.to_ascii_uppercase())?;
    }
    let optional = [
        (Nid::STATEORPROVINCENAME, &subject.state),
        (Nid::LOCALITYNAME, &subject.locality),
        (Nid::STREETADDRESS, &subject.street),
        (Nid::ORGANIZATIONNAME, &subject.organization),
        (Nid::ORGANIZATIONALUNITNAME, &subject.organizational_unit),
    ];
    for (nid, value) in optional {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            name.append_entry_by_nid(nid, value.trim())?;
        }
    }
    name.append_entry_by_nid(Nid::COMMONNAME, subject.common_name.trim())?;
    // Tax registration goes into the serialNumber attribute
    if let Some(tax_id) = subject.tax_id.as_deref().filter(|v| !v.trim().is_empty()) {
        name.append_entry_by_nid(Nid::SERIALNUMBER, tax_id.trim())?;
    }
    if let Some(email) = subject.email.as_deref().filter(|v| !v.trim().is_empty()) {
        name.append_entry_by_nid(Nid::PKCS9_EMAILADDRESS, email.trim())?;
    }
    Ok(name.build())
}

/// Render a distinguished name as `CN=..., O=...`, most specific first.
pub fn format_name(name: &X509NameRef) -> String {
    let mut parts: Vec<String> = name
        .entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = entry
                .data()
                .as_utf8()
                .map(|s| s.to_string())
                .unwrap_or_default();
            format!("{}={}", key, value)
        })
        .collect();
    parts.reverse();
    parts.join(", ")
}

/// Common name of a distinguished name.
pub fn common_name(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
}

/// Parse an `Asn1Time` into UTC.
pub fn asn1_to_utc(time: &openssl::asn1::Asn1TimeRef) -> Result<DateTime<Utc>> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| Error::Crypto("certificate time out of range".to_string()))
}

/// Generate an RSA key pair and a self-signed certificate valid for
/// `validity_years` from `now`.
///
/// CPU bound; 4096-bit keys take seconds. Run on a blocking pool.
pub fn generate_self_signed(
    subject: &SubjectAttributes,
    strength: KeyStrength,
    validity_years: u32,
    now: DateTime<Utc>,
) -> Result<GeneratedCertificate> {
    let rsa = Rsa::generate(strength.bits())?;
    let key = PKey::from_rsa(rsa)?;

    let not_before = Utc
        .timestamp_opt(now.timestamp(), 0)
        .single()
        .ok_or_else(|| Error::Crypto("invalid issuance time".to_string()))?;
    let not_after = not_before
        .checked_add_months(Months::new(12 * validity_years))
        .ok_or_else(|| Error::Validation("validity period out of range".to_string()))?;

    let mut serial = BigNum::new()?;
    serial.rand(SERIAL_BITS, MsbOption::MAYBE_ZERO, false)?;
    let serial_hex = serial.to_hex_str()?.to_lowercase();

    let name = build_subject_name(subject)?;

    let mut builder = X509Builder::new()?;
    builder.set_version(2)?;
    let serial_number = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial_number)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&key)?;
    let valid_from = Asn1Time::from_unix(not_before.timestamp() as _)?;
    let valid_until = Asn1Time::from_unix(not_after.timestamp() as _)?;
    builder.set_not_before(&valid_from)?;
    builder.set_not_after(&valid_until)?;

    builder.append_extension(BasicConstraints::new().critical().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .non_repudiation()
            .key_encipherment()
            .build()?,
    )?;
    builder.append_extension(ExtendedKeyUsage::new().client_auth().email_protection().build()?)?;
    let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
    builder.append_extension(ski)?;

    builder.sign(&key, MessageDigest::sha256())?;
    let certificate = builder.build();

    let digest = certificate.digest(MessageDigest::sha256())?;
    let fingerprint = hex::encode(&*digest);
    let issuer = format_name(certificate.issuer_name());

    Ok(GeneratedCertificate {
        certificate,
        key,
        serial_hex,
        fingerprint,
        issuer,
        not_before,
        not_after,
    })
}

/// Bundle key and certificate into a passphrase-protected PKCS#12 container.
pub fn package_pkcs12(
    generated: &GeneratedCertificate,
    friendly_name: &str,
    passphrase: &str,
) -> Result<Vec<u8>> {
    let pkcs12 = Pkcs12::builder()
        .name(friendly_name)
        .pkey(&generated.key)
        .cert(&generated.certificate)
        .build2(passphrase)?;
    Ok(pkcs12.to_der()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SubjectAttributes {
        SubjectAttributes {
            common_name: "Ana Souza".to_string(),
            organization: Some("Acme Ltda".to_string()),
            tax_id: Some("123.456.789-09".to_string()),
            email: Some("ana@example.com".to_string()),
            country: Some("br".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_self_signed_fields() {
        let now = Utc::now();
        let generated = generate_self_signed(&subject(), KeyStrength::Rsa2048, 2, now).unwrap();
        let cert = &generated.certificate;

        assert_eq!(common_name(cert.subject_name()).as_deref(), Some("Ana Souza"));
        assert_eq!(format_name(cert.subject_name()), format_name(cert.issuer_name()));
        assert!(generated.issuer.contains("CN=Ana Souza"));
        assert!(generated.issuer.contains("C=BR"));
        assert!(generated.issuer.contains("serialNumber=123.456.789-09"));
        assert!(generated.serial_hex.len() >= 16);
        assert_eq!(generated.fingerprint.len(), 64);

        let span = generated.not_after - generated.not_before;
        assert!(span.num_days() >= 730 && span.num_days() <= 731);

        // Self-signed: verifies under its own key
        let public = cert.public_key().unwrap();
        assert!(cert.verify(&public).unwrap());
        assert_eq!(public.bits(), 2048);
    }

    #[test]
    fn test_asn1_roundtrip() {
        let now = Utc::now();
        let generated = generate_self_signed(&subject(), KeyStrength::Rsa2048, 1, now).unwrap();
        let parsed = asn1_to_utc(generated.certificate.not_after()).unwrap();
        assert_eq!(parsed, generated.not_after);
    }

    #[test]
    fn test_pkcs12_requires_passphrase() {
        let generated =
            generate_self_signed(&subject(), KeyStrength::Rsa2048, 1, Utc::now()).unwrap();
        let der = package_pkcs12(&generated, "Ana Souza", "correct horse").unwrap();

        let parsed = Pkcs12::from_der(&der).unwrap().parse2("correct horse").unwrap();
        assert!(parsed.pkey.is_some());
        assert!(parsed.cert.is_some());
        assert!(Pkcs12::from_der(&der).unwrap().parse2("wrong").is_err());
    }
}
