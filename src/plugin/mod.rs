//! Plugin archives.
//!
//! An archive is a directory holding a `plugin.toml` manifest and the
//! programs its commands run. Opening an archive creates its [`LoadContext`]:
//! the archive root, its declared environment and a cancellation token.
//! Cogs declared by the manifest are instantiated inside that context, and
//! their handlers cross a process boundary (see [`PROTOCOL`]), so nothing an
//! archive runs shares the host's address space. Closing the archive cancels
//! the token, kills in-flight children and makes every handler it produced
//! fail.

mod archive;
mod bridge;
mod manifest;

pub use archive::{ArchiveCog, LoadContext, PluginArchive};
pub use bridge::PROTOCOL;
pub use manifest::{
    ArchiveSection, CogManifest, CommandManifest, MANIFEST_FILE, Manifest, Mode, ParamManifest,
};
