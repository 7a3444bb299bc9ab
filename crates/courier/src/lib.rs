//! Veridian courier: outbound mail.
//!
//! - [`Message`] — a queued mail record (recipient, subject, body,
//!   status). The queue itself lives behind the store's courier
//!   persister; this crate owns the message shape and delivery.
//! - [`verification_message`] — the mail sent when a verifiable
//!   address is introduced or changed.
//! - [`SmtpMailer`] — async SMTP delivery via `lettre`.

pub mod message;
pub mod smtp;

pub use message::{verification_message, Message, MessageStatus};
pub use smtp::{CourierError, SmtpMailer};
