//! Event journal backends.

pub mod file;

pub use file::FileJournal;
