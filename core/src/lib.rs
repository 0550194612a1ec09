//! Core amendment types and session primitives.
//!
//! This crate defines the data model for parliamentary-procedure
//! amendments submitted by email:
//!
//! - [`Amendment`]: a validated proposal to add, amend or strike text at a
//!   [`ClausePath`]. Built only through [`AmendmentDraft::build`] or
//!   [`AmendmentRecord::into_amendment`], both of which validate.
//! - [`AmendmentType`]: closed set `ADD` / `AMEND` / `STRIKE`.
//! - [`Resolution`]: the parent document, a three-level clause tree.
//! - [`AmendmentSession`]: ordered amendments with a display cursor and a
//!   JSON file format.
//! - [`EmailSource`]: pull-based capability that feeds a session.
//!
//! Validation ([`validate_amendment`]) enforces the amendment invariants:
//! ADD/AMEND carry text, STRIKE carries none, submitter and clause are
//! non-blank.
//!
//! # Example
//!
//! ```
//! use amendment_core::*;
//!
//! let amendment = AmendmentDraft::new("France", "4", AmendmentType::Add)
//!     .with_path(ClausePath::parse_dotted("4.a"))
//!     .with_text("promote renewable energy")
//!     .build()
//!     .unwrap();
//!
//! let mut session = AmendmentSession::new("Day 1", "GA2");
//! session.add_amendment(amendment);
//! let raw = session.to_json_string().unwrap();
//! let loaded = AmendmentSession::from_json_str(&raw).unwrap();
//! assert_eq!(loaded.amendments(), session.amendments());
//! ```

mod ingest;
mod record;
mod resolution;
mod session;
mod types;
mod validate;

pub use ingest::{EmailSource, QueuedSource};
pub use record::{AmendmentRecord, REQUIRED_FIELDS, RecordError};
pub use resolution::{
    Clause, NodeAddress, Resolution, SubSubclause, Subclause, clause_number, letter_index,
    roman_index, to_letter, to_roman,
};
pub use session::{AmendmentSession, SESSION_SCHEMA_VERSION, SessionError, SessionHeader};
pub use types::*;
pub use validate::{ValidationError, validate_amendment};
