//! Tarball retrieval and extraction.
//!
//! Tarballs are fetched into a staging file inside the install root while
//! their SHA-1 is computed, then unpacked into `<install root>/<name>`.

mod archive;
mod fetcher;

pub use archive::{remove_stale_archives, ArchiveExtractor, STAGING_PREFIX};
pub use fetcher::{archive_basename, create_staging_file, ArchiveFetcher, HttpFetcher};
