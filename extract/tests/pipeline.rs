use std::path::PathBuf;
use std::sync::Arc;

use amendment_core::{
    AmendmentSession, AmendmentType, Clause, Email, EmailSource, Resolution, Subclause,
};
use amendment_extract::{
    AmendmentFactory, DirectorySource, Extraction, ExtractionMiss, MemorySink, ResolutionMatcher,
    Severity, TextNormalizer,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn resolutions() -> Vec<Resolution> {
    vec![
        Resolution::new("On Ocean Plastics", "Norway").with_clause(Clause::new(1, "Urges")),
        Resolution::new("On Climate Finance", "Brazil")
            .with_clause(
                Clause::new(4, "Encourages").with_subclause(Subclause::new(1, "green bonds")),
            )
            .with_clause(Clause::new(6, "Calls upon"))
            .with_clause(Clause::new(7, "Invites")),
    ]
}

fn pull_fixtures(sink: &Arc<MemorySink>) -> Vec<Email> {
    let normalizer = TextNormalizer::new(1000, sink.clone());
    let mut source = DirectorySource::new(fixtures_dir(), normalizer, sink.clone());
    source.pull()
}

#[test]
fn test_inbox_fixtures_extract_in_file_order() {
    let sink = Arc::new(MemorySink::new());
    let emails = pull_fixtures(&sink);
    assert_eq!(emails.len(), 5);

    let factory = AmendmentFactory::new(TextNormalizer::new(1000, sink.clone()), sink.clone());
    let outcomes: Vec<Extraction> = emails
        .iter()
        .map(|email| factory.extract(email, false).unwrap())
        .collect();

    let france = outcomes[0].amendment().unwrap();
    assert_eq!(france.submitter_delegate(), "France");
    assert_eq!(france.resolution_topic(), Some("On Climate Finance"));
    assert_eq!(france.resolution_main_submitter(), Some("Brazil"));
    assert_eq!(france.clause_path().to_string(), "4.a");
    assert_eq!(france.amendment_type(), AmendmentType::Add);

    let chile = outcomes[1].amendment().unwrap();
    assert_eq!(emails[1].subject, "Enmienda cláusula 2");
    assert_eq!(chile.submitter_delegate(), "Chile");
    assert_eq!(chile.clause_path().to_string(), "2.b");
    assert_eq!(chile.amendment_type(), AmendmentType::Strike);
    assert_eq!(chile.text(), None);
    assert_eq!(chile.reason(), Some("duplicates clause 5 (see draft)"));
    assert!(!chile.context().contains("Impostor"));

    assert_eq!(
        outcomes[2],
        Extraction::Miss(ExtractionMiss::MissingField("submitter_delegate"))
    );

    let kenya = outcomes[3].amendment().unwrap();
    assert_eq!(kenya.submitter_delegate(), "Kenya");
    assert_eq!(kenya.amendment_type(), AmendmentType::Amend);
    assert_eq!(
        kenya.text(),
        Some("calls upon member states to share early-warning data")
    );
    assert_eq!(kenya.resolution_main_submitter(), Some("Kenya"));

    let japan = outcomes[4].amendment().unwrap();
    assert_eq!(japan.clause_path().to_string(), "7.c");
    assert_eq!(japan.text(), Some("replace \"encourages\" with \"urges\""));
}

#[test]
fn test_session_ingest_backfill_and_round_trip() {
    let sink = Arc::new(MemorySink::new());
    let normalizer = TextNormalizer::new(1000, sink.clone());
    let factory = AmendmentFactory::new(normalizer.clone(), sink.clone());

    let mut session = AmendmentSession::new("Day 2", "ECOFIN");
    session.bind_source(Box::new(DirectorySource::new(
        fixtures_dir(),
        normalizer,
        sink.clone(),
    )));
    let added = session.pull_from_email(|email| factory.extract_amendment(email, false));
    assert_eq!(added, 4);
    assert_eq!(session.pull_from_email(|email| factory.extract_amendment(email, false)), 0);

    let matcher = ResolutionMatcher::new(25.0, sink.clone());
    let resolutions = resolutions();
    let linked = matcher.backfill(session.amendments_mut(), &resolutions);
    // The last amendment's neighbors declare no topic and its own topic
    // is only a fuzzy match, so it stays unlinked.
    assert_eq!(linked, 3);

    let amendments = session.amendments();
    for amendment in &amendments[..3] {
        assert_eq!(
            amendment.address_resolution().unwrap().topic,
            "On Climate Finance"
        );
    }
    assert!(amendments[0].address_node().is_some());
    assert!(amendments[1].address_node().is_none());
    assert!(amendments[3].address_resolution().is_none());
    assert!(!sink.matching("matcher", Severity::Info).is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions/day2.json");
    session.save(&path).unwrap();
    let loaded = AmendmentSession::load(&path).unwrap();
    assert_eq!(loaded.amendments(), session.amendments());
    assert_eq!(loaded.committee, "ECOFIN");
}

#[test]
fn test_rule_based_extraction_is_deterministic() {
    let sink = Arc::new(MemorySink::new());
    let emails = pull_fixtures(&sink);
    let factory = AmendmentFactory::new(TextNormalizer::new(1000, sink.clone()), sink);

    let strip_identity = |outcome: Extraction| {
        outcome
            .into_amendment()
            .map(|a| {
                let mut draft = a.into_draft();
                draft.id = None;
                draft.created_at = None;
                draft
            })
    };
    for email in &emails {
        let first = strip_identity(factory.extract(email, false).unwrap());
        let second = strip_identity(factory.extract(email, false).unwrap());
        assert_eq!(first, second);
    }
}

#[test]
fn test_batch_matches_sequential_extraction() {
    let sink = Arc::new(MemorySink::new());
    let emails = pull_fixtures(&sink);
    let factory = AmendmentFactory::new(TextNormalizer::new(1000, sink.clone()), sink);

    let batch = factory.extract_batch(&emails, false, 3);
    assert_eq!(batch.len(), emails.len());
    for (email, outcome) in emails.iter().zip(&batch) {
        let sequential = factory.extract(email, false).unwrap();
        let parallel = outcome.as_ref().unwrap();
        assert_eq!(sequential.is_miss(), parallel.is_miss());
        if let (Some(a), Some(b)) = (sequential.amendment(), parallel.amendment()) {
            assert_eq!(a.submitter_delegate(), b.submitter_delegate());
            assert_eq!(a.clause_path(), b.clause_path());
        }
    }
}

#[test]
fn test_fuzzy_topic_match_and_threshold() {
    let sink = Arc::new(MemorySink::new());
    let matcher = ResolutionMatcher::new(25.0, sink);
    let resolutions = resolutions();

    let found = matcher
        .best_match("On Climate Finance Reform", &resolutions)
        .unwrap();
    assert_eq!(found.resolution.topic, "On Climate Finance");
    assert!(found.score >= 25.0);

    assert!(matcher.best_match("Zzyzx Qwerty", &resolutions).is_none());
}
