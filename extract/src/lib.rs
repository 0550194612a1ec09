//! Amendment extraction and resolution matching.
//!
//! The pipeline for a single email:
//!
//! 1. [`TextNormalizer`] flattens MIME parts, converts HTML and bounds the
//!    body length.
//! 2. An [`ExtractionStrategy`] produces a candidate: [`RuleBasedStrategy`]
//!    applies label patterns through [`FieldExtractor`]; [`AiStrategy`] asks
//!    an external completion program for a JSON object.
//! 3. The candidate is validated by `amendment_core`; the outcome is an
//!    [`Extraction`] (amendment or [`ExtractionMiss`]) or a validation error.
//!
//! [`AmendmentFactory`] wires these together. [`ResolutionMatcher`] links
//! amendments to resolutions by topic, inferring from neighboring
//! amendments when an amendment's own topic is missing.
//!
//! Components log through an injected [`EventSink`] rather than a global
//! logger.

pub mod ai;
pub mod config;
pub mod error;
pub mod events;
pub mod factory;
pub mod fields;
pub mod html;
pub mod matcher;
pub mod normalize;
pub mod similarity;
pub mod source;
pub mod strategy;

pub use ai::{AiStrategy, CommandClient, CompletionClient, DEFAULT_SYSTEM_PROMPT};
pub use config::ExtractConfig;
pub use error::{ConfigError, ExtractionMiss, NormalizeError, ProviderError, StrategyError};
pub use events::{EventLog, EventSink, LogRecord, MemorySink, Severity, TracingSink, tracing_sink};
pub use factory::AmendmentFactory;
pub use fields::{ExtractedFields, Field, FieldExtractor};
pub use matcher::{ResolutionMatcher, TopicMatch};
pub use normalize::TextNormalizer;
pub use source::DirectorySource;
pub use strategy::{Extraction, ExtractionStrategy, RuleBasedStrategy};
