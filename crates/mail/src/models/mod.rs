//! Domain models for mail entities

mod cursor;
mod message;
mod thread;

pub use cursor::{Cursor, Page};
pub use message::{AttachmentRef, EmailAddress, MessageId, MessageMetadata};
pub use thread::ThreadId;
