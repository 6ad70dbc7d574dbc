//! Services that talk to the network.
//!
//! The probe connects to a mailbox and counts unread mail; the classifier
//! turns its failures into messages for the user; Google sign-in runs the
//! `OAuth2` flow and checks what was granted.

pub mod classify;
pub mod google;
pub mod probe;

pub use classify::{Failure, FailureKind, classify};
pub use google::{GoogleAccount, GoogleSignIn, has_imap_access};
pub use probe::{Credentials, ProbeError, ProbeReport, probe, probe_details};
