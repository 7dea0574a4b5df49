//! Types shared by every Courier crate: the data model exchanged with the
//! backend, the realtime envelope, constants, and the error taxonomy.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod types;

pub use error::{CourierError, Result};
pub use models::{Attachment, Message, MessageKind, NewMessage, User};
pub use protocol::Envelope;
pub use types::{ConnectionState, MessageId, UserId};
