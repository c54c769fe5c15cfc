// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]
#![cfg_attr(test, allow(unused_variables))]

//! # PDF Seal
//!
//! Certificate issuance, PDF signing and public validation.
//!
//! ## Core Features
//!
//! ### Certificates
//! - **Self-signed X.509**: RSA 2048/4096, subject attributes including tax id and email
//! - **PKCS#12 containers**: encrypted at rest under a per-container key, which is itself
//!   sealed with the master key together with the container passphrase
//! - **Rotation**: exactly one active certificate per owner, revocation without deletion
//!
//! ### Signing
//! - **Visual seal**: signer image or text stamp at normalized placements, with rotation
//! - **QR validation mark**: QR code plus caption linking to the public validation page
//! - **PKI signature**: optional PKCS#7 detached (`adbe.pkcs7.detached`) embedding;
//!   failures degrade to a visual-only signature with a warning
//! - **Batches**: up to 20 documents, all-or-nothing pre-flight, settle-all execution
//!
//! ### Validation
//! - **Verifier**: byte-scan classification (none, visual, PKI, both) plus cryptographic
//!   integrity check of each embedded signature
//! - **Public gateway**: access-code gate, per-IP rate limits, sanitized documents
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use pdf_seal::config::SealConfig;
//! use pdf_seal::api::{router, AppState};
//! use pdf_seal::store::{MemoryDatabase, MemoryObjectStorage};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SealConfig::from_env()?;
//! let state = AppState::with_database(
//!     config,
//!     Arc::new(MemoryObjectStorage::default()),
//!     Arc::new(MemoryDatabase::new()),
//! );
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router(state)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Passphrase and container encryption
pub mod encryption;

// Domain records
pub mod model;

// Object storage and repositories
pub mod store;

// X.509 generation, issuance, vault
pub mod certificates;

// PDF overlay editing, images, QR codes
pub mod pdf;

// PKCS#7 embedding and verification
pub mod signatures;

// Signing pipeline, batches, document lifecycle
pub mod signing;

// Public validation and rate limiting
pub mod validation;

// HTTP surface
pub mod api;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
