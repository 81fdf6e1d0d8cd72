//! Mailshot composes an email with optional file attachments and submits it
//! over an authenticated, encrypted SMTP session.
//!
//! The defaults target Gmail's submission endpoint (`smtp.gmail.com:587`):
//! the client connects in plaintext, upgrades the connection with `STARTTLS`,
//! authenticates with the sender address and its secret, declares the envelope
//! and transmits the message as a `multipart/mixed` MIME document.
//!
//! ## Sending a message
//!
//! ```rust,no_run
//! use mailshot::{Message, SmtpTransport, Transport};
//!
//! # fn main() -> Result<(), mailshot::Error> {
//! let mut email = Message::new("Quarterly report", "The figures are attached.")
//!     .from("alice@gmail.com")
//!     .display_name("Alice")
//!     .credential("app-password");
//! email.add_recipients(["bob@example.com", "carol@example.com"]);
//! email.attach("reports/q3.pdf")?;
//!
//! let mailer = SmtpTransport::new();
//! mailer.send(&email)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! * **native-tls** (default): TLS upgrade through the `native-tls` crate
//! * **hostname** (default): use the local host name in `EHLO`
//! * **tracing**: log the SMTP exchange with `tracing`
//! * **serde**: load [`SmtpInfo`](transport::smtp::SmtpInfo) from configuration

#![doc(html_root_url = "https://docs.rs/crate/mailshot/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]
#![deny(
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications,
    missing_docs,
    rust_2018_idioms
)]

pub mod address;
mod base64;
pub mod error;
pub mod message;
pub mod transport;

pub use crate::{
    address::Envelope,
    error::Error,
    message::Message,
    transport::{smtp::SmtpTransport, stub::StubTransport, Transport},
};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
