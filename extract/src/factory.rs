//! Extraction orchestration: normalize, pick a strategy, validate.

use std::sync::Arc;

use amendment_core::{Amendment, Email, ValidationError};
use rayon::prelude::*;

use crate::ai::{AiStrategy, CommandClient};
use crate::config::ExtractConfig;
use crate::error::{ConfigError, StrategyError};
use crate::events::{EventLog, EventSink};
use crate::normalize::TextNormalizer;
use crate::strategy::{Extraction, ExtractionStrategy, RuleBasedStrategy};

pub const COMPONENT: &str = "factory";

/// Turns emails into amendments.
///
/// The AI strategy is used when one is configured and the caller prefers
/// it; a provider failure falls back to the rule-based strategy. Both paths
/// end in the same validator.
///
/// # Examples
///
/// ```
/// use amendment_core::Email;
/// use amendment_extract::events::tracing_sink;
/// use amendment_extract::factory::AmendmentFactory;
/// use amendment_extract::normalize::TextNormalizer;
///
/// let factory = AmendmentFactory::new(TextNormalizer::default(), tracing_sink());
/// let email = Email::new(
///     "france@mun.org",
///     "Amendment",
///     "Submitter: France\nClause: 4.a\nAmendment Type: ADD\nNew Text: promote renewable energy\n",
/// );
/// let amendment = factory.extract(&email, false).unwrap().into_amendment().unwrap();
/// assert_eq!(amendment.clause_path().to_string(), "4.a");
/// ```
#[derive(Clone)]
pub struct AmendmentFactory {
    normalizer: TextNormalizer,
    rule_based: RuleBasedStrategy,
    ai: Option<Arc<dyn ExtractionStrategy>>,
    log: EventLog,
}

impl std::fmt::Debug for AmendmentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmendmentFactory")
            .field("normalizer", &self.normalizer)
            .field("ai", &self.ai.as_ref().map(|ai| ai.name()))
            .finish_non_exhaustive()
    }
}

impl AmendmentFactory {
    pub fn new(normalizer: TextNormalizer, sink: Arc<dyn EventSink>) -> Self {
        Self {
            normalizer,
            rule_based: RuleBasedStrategy::new(Arc::clone(&sink)),
            ai: None,
            log: EventLog::new(sink, COMPONENT),
        }
    }

    /// Builds a factory from configuration, wiring a [`CommandClient`] when
    /// an `ai` section is present.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the configured system prompt file cannot be
    /// read.
    pub fn from_config(config: &ExtractConfig, sink: Arc<dyn EventSink>) -> Result<Self, ConfigError> {
        let normalizer = TextNormalizer::from_config(&config.normalizer, Arc::clone(&sink));
        let mut factory = Self::new(normalizer, Arc::clone(&sink));
        if let Some(ai) = &config.ai {
            let client = Arc::new(CommandClient::from_config(ai));
            let mut strategy = AiStrategy::new(client, sink);
            if let Some(prompt) = config.system_prompt()? {
                strategy = strategy.with_system_prompt(prompt);
            }
            factory = factory.with_ai_strategy(Arc::new(strategy));
        }
        Ok(factory)
    }

    pub fn with_ai_strategy(mut self, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        self.ai = Some(strategy);
        self
    }

    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// Extracts one amendment.
    ///
    /// # Errors
    ///
    /// The [`ValidationError`] of a complete but invalid candidate. Emails
    /// that simply do not describe an amendment are [`Extraction::Miss`].
    pub fn extract(&self, email: &Email, prefer_ai: bool) -> Result<Extraction, ValidationError> {
        let normalized = Email {
            from: email.from.clone(),
            subject: email.subject.clone(),
            body: self.normalizer.normalize_text(&email.body),
        };

        if prefer_ai {
            match &self.ai {
                Some(ai) => match ai.extract(&normalized) {
                    Ok(extraction) => return Ok(extraction),
                    Err(StrategyError::Invalid(err)) => {
                        self.log
                            .warn(format!("{} candidate rejected: {err}", ai.name()));
                        return Err(err);
                    }
                    Err(StrategyError::Provider(err)) => {
                        self.log.warn(format!(
                            "{} extraction unavailable ({err}); using rule-based extraction",
                            ai.name()
                        ));
                    }
                },
                None => self
                    .log
                    .debug("no AI strategy configured; using rule-based extraction"),
            }
        }

        let extraction = self.rule_based.run(&normalized);
        match &extraction {
            Ok(Extraction::Amendment(amendment)) => self.log.info(format!(
                "extracted amendment {} from {:?}",
                amendment.id(),
                email.from
            )),
            Ok(Extraction::Miss(miss)) => self
                .log
                .info(format!("no amendment in message from {:?}: {miss}", email.from)),
            Err(err) => self.log.warn(format!(
                "candidate from {:?} rejected: {err}",
                email.from
            )),
        }
        extraction
    }

    /// Like [`extract`](Self::extract), collapsing misses and rejections
    /// into `None`.
    pub fn extract_amendment(&self, email: &Email, prefer_ai: bool) -> Option<Amendment> {
        self.extract(email, prefer_ai).ok()?.into_amendment()
    }

    /// Extracts many emails on a pool of `jobs` threads (0 = one per CPU),
    /// returning outcomes in input order.
    pub fn extract_batch(
        &self,
        emails: &[Email],
        prefer_ai: bool,
        jobs: usize,
    ) -> Vec<Result<Extraction, ValidationError>> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if jobs > 0 {
            builder = builder.num_threads(jobs);
        }
        match builder.build() {
            Ok(pool) => pool.install(|| {
                emails
                    .par_iter()
                    .map(|email| self.extract(email, prefer_ai))
                    .collect()
            }),
            Err(err) => {
                self.log
                    .warn(format!("thread pool unavailable ({err}); extracting sequentially"));
                emails
                    .iter()
                    .map(|email| self.extract(email, prefer_ai))
                    .collect()
            }
        }
    }
}
