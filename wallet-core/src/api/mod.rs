//! Message protocol between the extension and the background process.

pub mod types;

pub use types::{Envelope, Origin, RevealedPhrase, Request, Response};
