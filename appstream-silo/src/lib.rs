//! # Vanilla AppStream Silo
//!
//! Compiles an AppStream-style `components` document (optionally gzip
//! compressed) into an immutable, queryable [`Silo`] and answers the
//! lookups the metadata plugin needs.
//!
//! ## Example
//!
//! ```no_run
//! use vanilla_appstream_silo::{BundleQuery, CompileFlags, TransformRule};
//! use tokio_util::sync::CancellationToken;
//! use std::path::Path;
//!
//! let rules = [
//!     TransformRule::OriginTag { origin: "vanilla_meta".to_string() },
//!     TransformRule::Tokenize,
//! ];
//! let silo = vanilla_appstream_silo::compile(
//!     Path::new("metadata.xml.gz"),
//!     &["C".to_string()],
//!     &rules,
//!     CompileFlags { ignore_invalid: true },
//!     &CancellationToken::new(),
//! )?;
//!
//! for entry in vanilla_appstream_silo::search(&silo, &["editor".to_string()]) {
//!     println!("{}", entry.id);
//! }
//! let found = vanilla_appstream_silo::find_bundle_for(&silo, &BundleQuery::package("gimp"));
//! println!("{:?}", found.map(|m| m.bundle.container.clone()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod compiler;
mod error;
mod locale;
mod model;
mod query;
mod rules;
mod storage;

pub use compiler::compile;
pub use compiler::compile_bytes;
pub use compiler::document_digest;
pub use error::CompileError;
pub use error::SiloError;
pub use locale::UNTRANSLATED;
pub use locale::expand_locales;
pub use model::Bundle;
pub use model::IndexEntry;
pub use model::SILO_FORMAT_VERSION;
pub use model::Silo;
pub use model::SiloHeader;
pub use query::BundleMatch;
pub use query::BundleQuery;
pub use query::entries_by_id;
pub use query::find_alternates_of;
pub use query::find_bundle_for;
pub use query::search;
pub use rules::CompileFlags;
pub use rules::Field;
pub use rules::TransformRule;
pub use rules::normalize_keyword;
pub use storage::SiloLoad;
pub use storage::load_silo;
pub use storage::save_silo;
