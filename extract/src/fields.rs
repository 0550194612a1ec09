//! Rule-based field extraction.
//!
//! Every field has an ordered list of label patterns. Patterns are tried in
//! order against the whole body (case-insensitive); the first match wins
//! and its capture group, trimmed, is the field value. A table cell
//! separator between label and value is skipped.
//!
//! Labels at the start of a line (after optional bullet or quote
//! characters) are tried first. Labels written mid-sentence come last;
//! they must not follow a word character or `-` (so `Sub-clause:` is never
//! read as `Clause:`), and their value ends at the first sentence break.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use amendment_core::{AmendmentDraft, AmendmentType, ClausePath};
use regex::Regex;

use crate::error::ExtractionMiss;
use crate::events::{EventLog, EventSink};

pub const COMPONENT: &str = "field_extractor";

/// A labeled value the extractor looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    SubmitterDelegate,
    AmendmentType,
    ResolutionMainSubmitter,
    ResolutionTopic,
    Clause,
    SubClause,
    SubSubClause,
    Text,
    Reason,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Self::SubmitterDelegate,
        Self::AmendmentType,
        Self::ResolutionMainSubmitter,
        Self::ResolutionTopic,
        Self::Clause,
        Self::SubClause,
        Self::SubSubClause,
        Self::Text,
        Self::Reason,
    ];

    /// Name of the matching amendment JSON field.
    pub fn name(self) -> &'static str {
        match self {
            Self::SubmitterDelegate => "submitter_delegate",
            Self::AmendmentType => "amendment_type",
            Self::ResolutionMainSubmitter => "resolution_main_submitter",
            Self::ResolutionTopic => "resolution_topic",
            Self::Clause => "clause",
            Self::SubClause => "sub_clause",
            Self::SubSubClause => "sub_sub_clause",
            Self::Text => "text",
            Self::Reason => "reason",
        }
    }

    /// Label patterns in priority order.
    fn patterns(self) -> &'static [&'static str] {
        match self {
            Self::SubmitterDelegate => &[
                r"(?im)^[^\w\n]*Submitter[ \t]*:[ \t|]*(\S.*)$",
                r"(?im)^[^\w\n]*Delegate[ \t]*:[ \t|]*(\S.*)$",
                r"(?im)(?:^|[^\w-])Submitter[ \t]*:[ \t|]*(\S[^\n]*?)[ \t]*(?:[.;](?:[ \t]|$)|$)",
                r"(?im)(?:^|[^\w-])Delegate[ \t]*:[ \t|]*(\S[^\n]*?)[ \t]*(?:[.;](?:[ \t]|$)|$)",
            ],
            Self::AmendmentType => &[
                r"(?im)^[^\w\n]*Amendment[ \t]+Type[ \t]*:[ \t|]*(ADD|AMEND|STRIKE)\b",
                r"(?im)^[^\w\n]*Action[ \t]*:[ \t|]*(ADD|AMEND|STRIKE)\b",
                r"(?im)^[^\w\n]*Amendment[ \t]*:[ \t|]*(ADD|AMEND|STRIKE)\b",
                r"(?im)(?:^|[^\w-])Amendment[ \t]+Type[ \t]*:[ \t|]*(ADD|AMEND|STRIKE)\b",
                r"(?im)(?:^|[^\w-])Action[ \t]*:[ \t|]*(ADD|AMEND|STRIKE)\b",
                r"(?im)(?:^|[^\w-])Amendment[ \t]*:[ \t|]*(ADD|AMEND|STRIKE)\b",
            ],
            Self::ResolutionMainSubmitter => &[
                r"(?im)^[^\w\n]*Resolution[ \t]*:[ \t]*On\b.+?,[ \t]*by[ \t]+(\S.*)$",
                r"(?im)^[^\w\n]*Main[ \t]+Submitter[ \t]*:[ \t|]*(\S.*)$",
            ],
            Self::ResolutionTopic => &[
                r"(?im)^[^\w\n]*Resolution[ \t]*:[ \t|]*(On\b.+?),[ \t]*by\b",
                r"(?im)^[^\w\n]*Resolution[ \t]+Topic[ \t]*:[ \t|]*(\S.*)$",
                r"(?im)^[^\w\n]*Resolution[ \t]*:[ \t|]*(On\b.*)$",
            ],
            Self::Clause => &[
                r"(?im)^[^\w\n]*Clause[ \t]*[: ][ \t|]*([\w.]*\w)",
                r"(?im)^[^\w\n]*Location[ \t]*:[ \t]*Clause[ \t]*:?[ \t|]*([\w.]*\w)",
                r"(?im)^[^\w\n]*Target[ \t]*:[ \t]*Clause[ \t]*:?[ \t|]*([\w.]*\w)",
                r"(?im)(?:^|[^\w-])Clause[ \t]*:[ \t|]*([\w.]*\w)",
            ],
            Self::SubClause => &[r"(?im)^[^\w\n]*Sub[- ]?clause[ \t]*[: ][ \t|]*\(?([0-9a-z]+)\)?"],
            Self::SubSubClause => {
                &[r"(?im)^[^\w\n]*Sub[- ]?sub[- ]?clause[ \t]*[: ][ \t|]*\(?([0-9a-z]+)\)?"]
            }
            Self::Text => &[
                r"(?im)^[^\w\n]*New[ \t]+Text[ \t]*:[ \t|]*(\S.*)$",
                r"(?im)^[^\w\n]*Revised[ \t]+Wording[ \t]*:[ \t|]*(\S.*)$",
                r"(?im)^[^\w\n]*We[ \t]+propose[ \t]*:[ \t|]*(\S.*)$",
                r"(?im)(?:^|[^\w-])New[ \t]+Text[ \t]*:[ \t|]*(\S[^\n]*?)[ \t]*(?:[.;](?:[ \t]|$)|$)",
                r"(?im)(?:^|[^\w-])Revised[ \t]+Wording[ \t]*:[ \t|]*(\S[^\n]*?)[ \t]*(?:[.;](?:[ \t]|$)|$)",
                r"(?im)(?:^|[^\w-])We[ \t]+propose[ \t]*:[ \t|]*(\S[^\n]*?)[ \t]*(?:[.;](?:[ \t]|$)|$)",
            ],
            Self::Reason => &[
                r"(?im)^[^\w\n]*Reason[ \t]*:[ \t|]*(\S.*)$",
                r"(?im)^[^\w\n]*Justification[ \t]*:[ \t|]*(\S.*)$",
                r"(?im)(?:^|[^\w-])Reason[ \t]*:[ \t|]*(\S[^\n]*?)[ \t]*(?:[.;](?:[ \t]|$)|$)",
                r"(?im)(?:^|[^\w-])Justification[ \t]*:[ \t|]*(\S[^\n]*?)[ \t]*(?:[.;](?:[ \t]|$)|$)",
            ],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// SAFETY: These regexes are compile-time constants and are validated by tests.
static FIELD_RULES: LazyLock<Vec<(Field, Vec<Regex>)>> = LazyLock::new(|| {
    Field::ALL
        .into_iter()
        .map(|field| {
            let patterns = field
                .patterns()
                .iter()
                .map(|pattern| Regex::new(pattern).expect("static regex must compile"))
                .collect();
            (field, patterns)
        })
        .collect()
});

fn rules_for(field: Field) -> &'static [Regex] {
    FIELD_RULES
        .iter()
        .find(|(candidate, _)| *candidate == field)
        .map(|(_, patterns)| patterns.as_slice())
        .unwrap_or_default()
}

/// Field name to extracted value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    values: BTreeMap<Field, String>,
}

impl ExtractedFields {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn insert(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.values.iter().map(|(field, value)| (*field, value.as_str()))
    }
}

/// Label-pattern extractor over normalized bodies.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    log: EventLog,
}

impl FieldExtractor {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            log: EventLog::new(sink, COMPONENT),
        }
    }

    /// First matching value for `field`, trimmed. Blank captures count as
    /// no match.
    pub fn find(&self, field: Field, body: &str) -> Option<String> {
        rules_for(field).iter().find_map(|re| {
            re.captures(body)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|value| !value.is_empty())
        })
    }

    /// Runs every rule over `body`.
    ///
    /// `text` is only looked up when the amendment type (ADD when absent)
    /// carries text.
    pub fn extract(&self, body: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::default();
        for field in Field::ALL {
            if field == Field::Text && !extracted_type(&fields).requires_text() {
                continue;
            }
            if let Some(value) = self.find(field, body) {
                self.log.debug(format!("{field} = {value:?}"));
                fields.insert(field, value);
            }
        }
        fields
    }

    /// Extracts `body` into an unvalidated amendment draft.
    ///
    /// A dotted clause (`4.a.ii`) fills sub-clause and sub-sub-clause unless
    /// those were labeled separately. The main submitter falls back to the
    /// delegate, the topic to an empty string.
    ///
    /// # Errors
    ///
    /// [`ExtractionMiss::MissingField`] when no delegate or clause label is
    /// present.
    ///
    /// # Examples
    ///
    /// ```
    /// use amendment_core::AmendmentType;
    /// use amendment_extract::events::tracing_sink;
    /// use amendment_extract::fields::FieldExtractor;
    ///
    /// let extractor = FieldExtractor::new(tracing_sink());
    /// let draft = extractor
    ///     .draft("Submitter: France\nClause: 4.a.ii\nNew Text: promote renewable energy\n")
    ///     .unwrap();
    /// assert_eq!(draft.clause, "4");
    /// assert_eq!(draft.sub_clause.as_deref(), Some("a"));
    /// assert_eq!(draft.sub_sub_clause.as_deref(), Some("ii"));
    /// assert_eq!(draft.amendment_type, AmendmentType::Add);
    /// ```
    pub fn draft(&self, body: &str) -> Result<AmendmentDraft, ExtractionMiss> {
        let fields = self.extract(body);

        let Some(delegate) = fields.get(Field::SubmitterDelegate) else {
            self.log.info("no submitter or delegate label found");
            return Err(ExtractionMiss::MissingField(Field::SubmitterDelegate.name()));
        };
        let Some(raw_clause) = fields.get(Field::Clause) else {
            self.log.info("no clause label found");
            return Err(ExtractionMiss::MissingField(Field::Clause.name()));
        };

        let dotted = ClausePath::parse_dotted(raw_clause);
        let path = ClausePath {
            clause: dotted.clause,
            sub_clause: fields.get(Field::SubClause).map(str::to_string).or(dotted.sub_clause),
            sub_sub_clause: fields
                .get(Field::SubSubClause)
                .map(str::to_string)
                .or(dotted.sub_sub_clause),
        };
        if path.clause.is_empty() {
            return Err(ExtractionMiss::MissingField(Field::Clause.name()));
        }

        let main_submitter = fields.get(Field::ResolutionMainSubmitter).unwrap_or(delegate);
        let topic = fields.get(Field::ResolutionTopic).unwrap_or_default();

        let mut draft = AmendmentDraft::new(delegate, String::new(), extracted_type(&fields))
            .with_path(path)
            .with_resolution(topic, main_submitter)
            .with_context(body);
        draft.text = fields.get(Field::Text).map(str::to_string);
        draft.reason = fields.get(Field::Reason).map(str::to_string);
        Ok(draft)
    }
}

fn extracted_type(fields: &ExtractedFields) -> AmendmentType {
    fields
        .get(Field::AmendmentType)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(Arc::new(MemorySink::new()))
    }

    #[test]
    fn test_all_rules_compile() {
        for field in Field::ALL {
            assert_eq!(rules_for(field).len(), field.patterns().len());
        }
    }

    #[test]
    fn test_label_synonyms_in_priority_order() {
        let ex = extractor();
        assert_eq!(
            ex.find(Field::SubmitterDelegate, "Delegate: Chile\nSubmitter: Peru"),
            Some("Peru".to_string())
        );
        assert_eq!(
            ex.find(Field::SubmitterDelegate, "- delegate:   Kenya  "),
            Some("Kenya".to_string())
        );
        assert_eq!(
            ex.find(Field::Text, "We propose: more funding\nRevised Wording: less"),
            Some("less".to_string())
        );
        assert_eq!(
            ex.find(Field::Reason, "Justification: clarity"),
            Some("clarity".to_string())
        );
        assert_eq!(
            ex.find(Field::SubmitterDelegate, "Delegate: | Chile"),
            Some("Chile".to_string())
        );
    }

    #[test]
    fn test_amendment_type_only_accepts_literals() {
        let ex = extractor();
        assert_eq!(
            ex.find(Field::AmendmentType, "Action: strike"),
            Some("strike".to_string())
        );
        assert_eq!(ex.find(Field::AmendmentType, "Amendment Type: REPLACE"), None);
        assert_eq!(ex.find(Field::AmendmentType, "Amendment: ADDITION"), None);
    }

    #[test]
    fn test_clause_labels() {
        let ex = extractor();
        assert_eq!(ex.find(Field::Clause, "Clause: 4.a.ii."), Some("4.a.ii".into()));
        assert_eq!(ex.find(Field::Clause, "Location: Clause 7"), Some("7".into()));
        assert_eq!(ex.find(Field::Clause, "Target: Clause 3.b"), Some("3.b".into()));
        assert_eq!(ex.find(Field::Clause, "Sub-clause: b"), None);
        assert_eq!(ex.find(Field::SubClause, "Sub-clause: (c)"), Some("c".into()));
        assert_eq!(ex.find(Field::SubSubClause, "Sub-sub-clause: iv"), Some("iv".into()));
    }

    #[test]
    fn test_resolution_line() {
        let ex = extractor();
        let body = "Resolution: On Climate Finance, by Brazil";
        assert_eq!(
            ex.find(Field::ResolutionTopic, body),
            Some("On Climate Finance".into())
        );
        assert_eq!(
            ex.find(Field::ResolutionMainSubmitter, body),
            Some("Brazil".into())
        );
        assert_eq!(
            ex.find(Field::ResolutionTopic, "Resolution: On Water Security"),
            Some("On Water Security".into())
        );
    }

    #[test]
    fn test_draft_end_to_end() {
        let body = "Submitter: France\nClause: 4.a\nAmendment Type: ADD\nNew Text: promote renewable energy\n";
        let draft = extractor().draft(body).unwrap();
        assert_eq!(draft.submitter_delegate, "France");
        assert_eq!(draft.clause, "4");
        assert_eq!(draft.sub_clause.as_deref(), Some("a"));
        assert_eq!(draft.sub_sub_clause, None);
        assert_eq!(draft.amendment_type, AmendmentType::Add);
        assert_eq!(draft.text.as_deref(), Some("promote renewable energy"));
        assert_eq!(draft.resolution_main_submitter.as_deref(), Some("France"));
        assert_eq!(draft.resolution_topic.as_deref(), Some(""));
        assert_eq!(draft.context, body);
    }

    #[test]
    fn test_independent_sub_clause_wins_over_dotted_path() {
        let body = "Delegate: Japan\nClause: 2.c.i\nSub-clause: d\nAction: AMEND\nNew Text: x";
        let draft = extractor().draft(body).unwrap();
        assert_eq!(draft.sub_clause.as_deref(), Some("d"));
        assert_eq!(draft.sub_sub_clause.as_deref(), Some("i"));
    }

    #[test]
    fn test_strike_never_extracts_text() {
        let body = "Submitter: Peru\nClause: 5\nAction: STRIKE\nNew Text: ignored";
        let draft = extractor().draft(body).unwrap();
        assert_eq!(draft.amendment_type, AmendmentType::Strike);
        assert_eq!(draft.text, None);
    }

    #[test]
    fn test_missing_required_fields() {
        let ex = extractor();
        assert_eq!(
            ex.draft("Clause: 4\nNew Text: x").unwrap_err(),
            ExtractionMiss::MissingField("submitter_delegate")
        );
        assert_eq!(
            ex.draft("Submitter: France\nNew Text: x").unwrap_err(),
            ExtractionMiss::MissingField("clause")
        );
    }

    #[test]
    fn test_mid_sentence_labels_are_found() {
        let body = "Dear chair, Submitter: France. Our target is Clause: 4.a and Action: STRIKE";
        let draft = extractor().draft(body).unwrap();
        assert_eq!(draft.submitter_delegate, "France");
        assert_eq!(draft.clause, "4");
        assert_eq!(draft.sub_clause.as_deref(), Some("a"));
        assert_eq!(draft.amendment_type, AmendmentType::Strike);
        assert_eq!(draft.text, None);
    }

    #[test]
    fn test_line_start_labels_win_over_mid_sentence_ones() {
        let ex = extractor();
        let body = "As the Submitter: Chile noted earlier.\nSubmitter: Peru";
        assert_eq!(ex.find(Field::SubmitterDelegate, body), Some("Peru".into()));
        assert_eq!(
            ex.find(Field::Reason, "Thanks. Reason: avoids duplication; see annex"),
            Some("avoids duplication".into())
        );
    }

    #[test]
    fn test_mid_sentence_sub_clause_is_not_a_clause() {
        let ex = extractor();
        assert_eq!(ex.find(Field::Clause, "Please amend Sub-clause: c only"), None);
        assert_eq!(ex.find(Field::Clause, "Please amend Subclause: c only"), None);
        assert_eq!(
            ex.draft("Hello, Delegate: Peru. Please see Sub-clause: c").unwrap_err(),
            ExtractionMiss::MissingField("clause")
        );
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let ex = extractor();
        let body = "Submitter: Chile\nClause: 1.b\nReason: clarity\nNew Text: y";
        let first = ex.extract(body);
        for _ in 0..5 {
            assert_eq!(ex.extract(body), first);
        }
        assert_eq!(first.len(), 4);
    }
}
