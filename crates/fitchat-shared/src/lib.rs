//! # fitchat-shared
//!
//! Domain types shared by the FitApp chat store and client: messages and
//! their card payloads, user sessions, notification records, preferences,
//! and the clock abstraction used to make time-dependent logic testable.

pub mod clock;
pub mod constants;
pub mod error;
pub mod message;
pub mod notification;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SharedError;
pub use message::{sort_chronologically, CardData, Message, MessageDraft, MessageType};
pub use notification::{NotificationKind, NotificationRecord, Preferences};
pub use types::{ConversationId, PlatformProfile, Session, UserIdentity};
