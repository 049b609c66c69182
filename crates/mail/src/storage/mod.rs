//! Export storage
//!
//! The export stage writes through the [`ExportStore`] trait so the output
//! location can be swapped between the filesystem and memory.

mod file;
mod memory;
mod traits;

pub use file::{FileExportStore, sanitize_filename};
pub use memory::InMemoryExportStore;
pub use traits::ExportStore;
