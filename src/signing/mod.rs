//! Document signing.
//!
//! ```text
//! original PDF
//!     ↓
//! [SealEditor] placements (image or text stamp) + QR validation mark
//!     ↓
//! canonical hash (SHA-256 of the visually sealed bytes)
//!     ↓
//! [PdfSigner] optional PKCS#7 embedding, best-effort
//!     ↓
//! upload + draft→signed update + signing event
//! ```
//!
//! [`BatchSigningCoordinator`] fans the pipeline out over up to
//! [`MAX_BATCH_SIZE`] documents and settles every task before returning.

mod batch;
mod lifecycle;
mod pipeline;

pub use batch::{
    BatchItemError, BatchItemResult, BatchResult, BatchSignerInput, BatchSigningCoordinator,
    MAX_BATCH_SIZE, MAX_PREFLIGHT_IDS,
};
pub use lifecycle::{DocumentLifecycle, MAX_UPLOAD_BYTES};
pub use pipeline::{sha256_hex, PdfSigningPipeline};
