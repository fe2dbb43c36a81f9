//! datetidy - sort files into Year/Month folders
//!
//! This library walks a source directory, works out a month bucket for every
//! file from its modification time (or embedded capture time), and moves it
//! into the destination tree. Files whose content is already there are
//! removed from the source; name collisions with different content get a
//! numeric suffix. Every step can run as a dry run.

pub mod cli;
pub mod config;
pub mod content;
pub mod file_organizer;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod placement;
pub mod walker;

pub use cli::{Disposition, Options, RunReport, run, run_with_extractor};
pub use config::{CompiledFilters, Config, ConfigError};
pub use file_organizer::{FileOrganizer, OrganizeError};
pub use metadata::{ExifSession, MetadataExtractor, MetadataValue};
pub use placement::{PlacementDecision, PlacementPolicy};
pub use walker::{FileEntry, TreeWalker, WalkEvent};
