//! Resolution inference from neighboring amendments.
//!
//! Amendments are debated in clusters, so an amendment with a missing or
//! unreliable topic most likely belongs to the same resolution as the
//! amendments submitted around it.

use std::sync::Arc;

use amendment_core::{Amendment, Resolution, ResolutionLink};

use crate::config::{DEFAULT_SIMILARITY_THRESHOLD, MatchingConfig};
use crate::events::{EventLog, EventSink};
use crate::similarity::topic_similarity;

pub const COMPONENT: &str = "matcher";

/// Score reported for an exact topic match.
pub const EXACT_MATCH_SCORE: f64 = 100.0;

/// A resolution chosen for a topic, with its similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopicMatch<'a> {
    pub resolution: &'a Resolution,
    pub score: f64,
    pub exact: bool,
}

/// Indices of the two amendments used as context for `target`.
///
/// The previous and next amendments are used where both exist. The first
/// amendment uses the next two and the last uses the previous two, with
/// the nearer one second. Sequences shorter than three, and out-of-range
/// targets, have no neighbors.
pub fn neighbor_indices(len: usize, target: usize) -> Option<(usize, usize)> {
    if len < 3 || target >= len {
        return None;
    }
    Some(match target {
        0 => (1, 2),
        t if t == len - 1 => (t - 2, t - 1),
        t => (t - 1, t + 1),
    })
}

fn declared_topic(amendment: &Amendment) -> &str {
    amendment.resolution_topic().map(str::trim).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct ResolutionMatcher {
    threshold: f64,
    log: EventLog,
}

impl ResolutionMatcher {
    pub fn new(threshold: f64, sink: Arc<dyn EventSink>) -> Self {
        Self {
            threshold,
            log: EventLog::new(sink, COMPONENT),
        }
    }

    pub fn from_config(config: &MatchingConfig, sink: Arc<dyn EventSink>) -> Self {
        Self::new(config.similarity_threshold, sink)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Finds the resolution for `topic`.
    ///
    /// An exact (trimmed) topic match wins outright. Otherwise the
    /// highest-scoring resolution at or above the threshold is returned;
    /// on equal scores the earlier resolution is kept. Blank topics never
    /// match.
    pub fn best_match<'a>(&self, topic: &str, resolutions: &'a [Resolution]) -> Option<TopicMatch<'a>> {
        let topic = topic.trim();
        if topic.is_empty() {
            return None;
        }

        if let Some(resolution) = resolutions.iter().find(|r| r.topic.trim() == topic) {
            self.log
                .debug(format!("exact topic match for {topic:?}"));
            return Some(TopicMatch {
                resolution,
                score: EXACT_MATCH_SCORE,
                exact: true,
            });
        }

        let mut best: Option<TopicMatch<'a>> = None;
        for resolution in resolutions {
            let score = topic_similarity(&resolution.topic, topic);
            self.log.debug(format!(
                "topic {:?} vs {topic:?} scores {score:.1}",
                resolution.topic
            ));
            if score >= self.threshold && best.is_none_or(|b| score > b.score) {
                best = Some(TopicMatch {
                    resolution,
                    score,
                    exact: false,
                });
            }
        }
        if best.is_none() {
            self.log.debug(format!(
                "no resolution reaches {:.1} for {topic:?}",
                self.threshold
            ));
        }
        best
    }

    /// Infers the resolution of `amendments[target]` from its neighbors.
    ///
    /// When both neighbors declare the same topic that topic is matched
    /// directly. When they differ each is matched on its own and the
    /// strictly higher score wins, with ties going to the second neighbor;
    /// a neighbor with no match scores 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use amendment_core::*;
    /// use amendment_extract::events::tracing_sink;
    /// use amendment_extract::matcher::ResolutionMatcher;
    ///
    /// let amendment = |topic: &str| {
    ///     AmendmentDraft::new("Chile", "1", AmendmentType::Strike)
    ///         .with_resolution(topic, "Chile")
    ///         .build()
    ///         .unwrap()
    /// };
    /// let amendments = vec![
    ///     amendment("On Climate Finance"),
    ///     amendment(""),
    ///     amendment("On Climate Finance"),
    /// ];
    /// let resolutions = vec![
    ///     Resolution::new("On Ocean Plastics", "Norway"),
    ///     Resolution::new("On Climate Finance", "Brazil"),
    /// ];
    /// let matcher = ResolutionMatcher::new(25.0, tracing_sink());
    /// let found = matcher.infer_resolution(&amendments, 1, &resolutions).unwrap();
    /// assert_eq!(found.main_submitter, "Brazil");
    /// ```
    pub fn infer_resolution<'a>(
        &self,
        amendments: &[Amendment],
        target: usize,
        resolutions: &'a [Resolution],
    ) -> Option<&'a Resolution> {
        let Some((first, second)) = neighbor_indices(amendments.len(), target) else {
            self.log.info(format!(
                "amendment {target} of {} has too few neighbors to infer a resolution",
                amendments.len()
            ));
            return None;
        };
        let first_topic = declared_topic(&amendments[first]);
        let second_topic = declared_topic(&amendments[second]);

        if first_topic == second_topic {
            let found = self.best_match(first_topic, resolutions);
            if let Some(found) = &found {
                self.log.info(format!(
                    "neighbors agree on {first_topic:?}; matched {:?} ({:.1})",
                    found.resolution.topic, found.score
                ));
            }
            return found.map(|m| m.resolution);
        }

        let first_match = self.best_match(first_topic, resolutions);
        let second_match = self.best_match(second_topic, resolutions);
        let first_score = first_match.map_or(0.0, |m| m.score);
        let second_score = second_match.map_or(0.0, |m| m.score);
        self.log.info(format!(
            "neighbors disagree: {first_topic:?} scores {first_score:.1}, {second_topic:?} scores {second_score:.1}"
        ));

        let chosen = if first_score > second_score {
            first_match
        } else {
            second_match.or(first_match)
        };
        chosen.map(|m| m.resolution)
    }

    /// Links every unlinked amendment to a resolution.
    ///
    /// An exact match on the amendment's own topic is used first, otherwise
    /// the resolution is inferred from its neighbors. Linked amendments get
    /// their clause node resolved when it exists. Returns the number of
    /// amendments linked.
    pub fn backfill(&self, amendments: &mut [Amendment], resolutions: &[Resolution]) -> usize {
        let view: &[Amendment] = amendments;
        let decisions: Vec<Option<&Resolution>> = (0..view.len())
            .map(|index| {
                let amendment = &view[index];
                if amendment.address_resolution().is_some() {
                    return None;
                }
                let own = declared_topic(amendment);
                resolutions
                    .iter()
                    .find(|r| !own.is_empty() && r.topic.trim() == own)
                    .or_else(|| self.infer_resolution(view, index, resolutions))
            })
            .collect();

        let mut linked = 0;
        for (amendment, decision) in amendments.iter_mut().zip(decisions) {
            let Some(resolution) = decision else {
                continue;
            };
            amendment.link_resolution(Some(ResolutionLink::from(resolution)));
            let node = amendment.resolve_node(resolution);
            self.log.info(format!(
                "linked amendment {} to {:?}{}",
                amendment.id(),
                resolution.topic,
                if node.is_some() { "" } else { " (clause not found)" }
            ));
            linked += 1;
        }
        linked
    }
}

impl Default for ResolutionMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD, crate::events::tracing_sink())
    }
}
