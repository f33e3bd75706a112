//! wikicorpus: plain-text corpora from MediaWiki XML dumps
//!
//! - Streaming, block-wise page extraction with bounded memory
//! - Namespace and redirect filtering
//! - WikiText to plaintext conversion
//! - Per-page files or a single form-feed separated stream as output

pub mod config;
pub mod import;
pub mod output;
pub mod util;

pub use config::Config;
pub use import::{Page, WikiTextConverter, WikimediaExtractor};
