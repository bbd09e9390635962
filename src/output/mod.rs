//! Local file and cloud outputs
//!
//! Raw and transformed writers hand off between pipeline stages through
//! files on disk; the cloud uploader pushes any local file to S3.

pub mod cloud;
pub mod files;

pub use cloud::upload;
pub use files::{read_csv, write_raw, write_transformed};
