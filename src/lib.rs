//! MP3 filename curation library - shared modules for the CLI.

pub mod config;
pub mod discovery;
pub mod error;
pub mod grammar;
pub mod library;
pub mod metadata;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod review;
pub mod safety;
pub mod tags;

pub use config::{Config, Ruleset};
pub use discovery::ArtistDiscoveryCollector;
pub use error::{FileError, FormatError, FormatErrorReason};
pub use grammar::FilenameGrammar;
pub use metadata::MetadataSynthesizer;
pub use models::{BatchReport, CanonicalFilename, TrackMetadata};
pub use normalize::FilenameNormalizer;
