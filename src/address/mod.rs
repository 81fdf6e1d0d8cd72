//! Envelope addresses
//!
//! Addresses are carried as given by the caller, no syntax validation is
//! performed; the relay server is the authority on what it accepts.

mod envelope;

pub use self::envelope::Envelope;
