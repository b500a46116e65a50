//! Slipscan core: declarative extraction of transaction and product data
//! from web markup.
//!
//! This crate is pure and synchronous. It knows nothing about HTTP or
//! browsers; the `slipscan-runtime` crate acquires markup and feeds it here.
//!
//! ```no_run
//! use slipscan::{extract, ExtractionContext, PatternLibrary};
//!
//! let library = PatternLibrary::builtin().expect("built-in profiles compile");
//! let url = url::Url::parse("https://cs.bankofabyssinia.com/slip/?trx=FT25185N7TLH").unwrap();
//! let profile = library.resolve(&url);
//! let record = extract("<p>ETB 6,950.00</p>", &profile, &ExtractionContext::default());
//! assert_eq!(record.get(slipscan::Field::Amount), Some("6950.00"));
//! ```

pub mod error;
pub mod export;
pub mod extractor;
pub mod identifier;
pub mod normalize;
pub mod profiles;
pub mod rules;
pub mod tables;
pub mod types;

pub use error::{AcquisitionError, ErrorKind, InvalidUrl, ProfileError};
pub use extractor::{extract, extract_all, Extraction, ExtractionContext};
pub use identifier::transaction_identifier;
pub use normalize::{normalize, normalize_at, normalize_extraction};
pub use profiles::{PatternLibrary, SiteProfile};
pub use types::{
    AcquisitionRequest, EnvelopeError, ExtractionEnvelope, ExtractionRecord, Field, Method,
    Strategy,
};
