//! End-to-end behaviour of the engine: weighting, artifact freshness and
//! single-flight regeneration.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use fiche_core::hooks::CorpusHooks;
use fiche_core::models::{Artifact, ArtifactId, ArtifactState, Document, DocumentGroup, SectionKind};
use fiche_core::select::Budget;
use fiche_core::stopwords::StopwordRegistry;
use fiche_core::summary::SummaryGenerator;
use fiche_core::vectorize::Tokenizer;
use fiche_core::{Engine, Error, IngestRequest};

#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

impl CorpusHooks for RecordingHooks {
    fn on_document_added(&self, document: &Document) {
        self.events.lock().unwrap().push(format!("added {}", document.id));
    }

    fn on_document_removed(&self, document_id: &str) {
        self.events.lock().unwrap().push(format!("removed {}", document_id));
    }

    fn on_artifact_regenerated(&self, artifact: &Artifact) {
        self.events
            .lock()
            .unwrap()
            .push(format!("regenerated {} v{}", artifact.id(), artifact.version()));
    }

    fn on_artifact_state_changed(&self, id: &ArtifactId, state: ArtifactState) {
        self.events.lock().unwrap().push(format!("state {} {}", id, state));
    }
}

fn bilingual_engine(hooks: Arc<RecordingHooks>) -> Engine {
    Engine::builder(StopwordRegistry::builtin().resolve(&["fr", "en"]))
        .hooks(hooks)
        .build()
}

#[test]
fn bilingual_corpus_weights_both_languages_alike() {
    let engine = bilingual_engine(Arc::default());
    engine
        .ingest(IngestRequest::new("fr", "Le chat mange la souris.").with_language("fr"))
        .unwrap();
    engine
        .ingest(IngestRequest::new("en", "The cat eats the mouse.").with_language("en"))
        .unwrap();

    let idf = engine.idf("chat");
    assert!(idf > 0.0);
    for term in ["mange", "souris", "cat", "eats", "mouse"] {
        assert!((engine.idf(term) - idf).abs() < 1e-12, "idf of {}", term);
    }
    for stop in ["le", "la", "the"] {
        assert_eq!(engine.doc_freq(stop), 0, "{} should be filtered", stop);
    }
    assert_eq!(engine.weight("fr", "chat").unwrap(), engine.weight("en", "cat").unwrap());
}

#[test]
fn reingested_document_summary_goes_dirty_then_version_two() {
    let hooks = Arc::new(RecordingHooks::default());
    let engine = bilingual_engine(Arc::clone(&hooks));
    engine
        .ingest(IngestRequest::new("x", "Plate tectonics shapes continents."))
        .unwrap();

    let v1 = engine.summary("x").unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(engine.summary_status("x"), Some(ArtifactState::Fresh));

    engine
        .ingest(IngestRequest::new("x", "Erosion wears mountains down over ages."))
        .unwrap();
    assert_eq!(engine.summary_status("x"), Some(ArtifactState::Dirty));

    let v2 = engine.summary("x").unwrap();
    assert_eq!(v2.version, 2);
    assert!(v2.text.contains("Erosion"));
    assert_eq!(engine.summary_status("x"), Some(ArtifactState::Fresh));

    assert_eq!(
        hooks.events(),
        vec![
            "added x",
            "regenerated summary:x v1",
            "state summary:x dirty",
            "added x",
            "regenerated summary:x v2",
        ]
    );
}

#[test]
fn card_with_two_spans_keeps_four_sections() {
    let engine = bilingual_engine(Arc::default());
    engine
        .ingest(IngestRequest::new("a", "Magma rises through the crust."))
        .unwrap();
    engine
        .ingest(IngestRequest::new("b", "Lava cools into basalt."))
        .unwrap();
    engine
        .create_group(DocumentGroup::documents("volcanoes", vec!["a".into(), "b".into()]))
        .unwrap();

    let card = engine.card("volcanoes").unwrap();
    assert_eq!(card.sections.len(), 4);
    assert_eq!(card.populated_sections(), 2);
    assert!(card.section(SectionKind::Examples).is_empty());
    assert!(card.section(SectionKind::OpenQuestions).is_empty());

    let md = card.to_markdown();
    for kind in SectionKind::ALL {
        assert!(md.contains(kind.title()), "missing {}", kind.title());
    }
}

#[test]
fn whole_corpus_card_tracks_every_mutation() {
    let engine = bilingual_engine(Arc::default());
    engine.ingest(IngestRequest::new("a", "Magma rises.")).unwrap();
    engine.create_group(DocumentGroup::all("everything")).unwrap();
    assert_eq!(engine.card("everything").unwrap().sources.len(), 1);

    engine.ingest(IngestRequest::new("b", "Lava cools.")).unwrap();
    assert_eq!(engine.card_status("everything"), Some(ArtifactState::Dirty));
    let card = engine.card("everything").unwrap();
    assert_eq!(card.version, 2);
    assert_eq!(card.sources.len(), 2);

    engine.remove("a").unwrap();
    let card = engine.card("everything").unwrap();
    assert_eq!(card.version, 3);
    assert_eq!(card.sources.ids().collect::<Vec<_>>(), vec!["b"]);
}

#[test]
fn concurrent_requests_share_one_regeneration() {
    let hooks = Arc::new(RecordingHooks::default());
    let slow = Tokenizer::with_stemmer(|t: &str| {
        thread::sleep(Duration::from_millis(2));
        t.to_string()
    });
    let engine = Engine::builder(StopwordRegistry::builtin().resolve(&["en"]))
        .tokenizer(slow)
        .summaries(SummaryGenerator {
            compression_ratio: 0.5,
            min_chars: 0,
            max_sentences: 3,
        })
        .hooks(hooks.clone())
        .build();
    engine
        .ingest(IngestRequest::new(
            "geo",
            "Rivers carve valleys. Glaciers scour fjords. Wind shapes dunes. \
             Waves erode cliffs. Rain weathers granite.",
        ))
        .unwrap();

    let versions: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| engine.summary("geo").unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().version)
            .collect()
    });

    assert!(versions.iter().all(|v| *v == 1));
    assert_eq!(hooks.count("regenerated"), 1);
}

#[test]
fn listing_reports_every_artifact() {
    let engine = bilingual_engine(Arc::default());
    engine.ingest(IngestRequest::new("a", "Magma rises.")).unwrap();
    engine.ingest(IngestRequest::new("b", "Lava cools.")).unwrap();
    engine.summary("a").unwrap();
    engine.create_group(DocumentGroup::all("all")).unwrap();
    engine.card("all").unwrap();
    engine.remove("b").unwrap();

    let listing = engine.artifact_listing();
    let ids: Vec<String> = listing.iter().map(|m| m.id.to_string()).collect();
    assert_eq!(ids, vec!["summary:a", "card:all"]);
    assert_eq!(listing[0].state, ArtifactState::Fresh);
    assert_eq!(listing[1].state, ArtifactState::Dirty);
    assert_eq!(listing[1].version, Some(1));
}

#[test]
fn select_across_documents_breaks_ties_by_requested_order() {
    let engine = bilingual_engine(Arc::default());
    engine.ingest(IngestRequest::new("a", "Gold rush. Silver ore.")).unwrap();
    engine.ingest(IngestRequest::new("b", "Gold rush. Silver ore.")).unwrap();

    let spans = engine.select(&["b", "a"], Budget::Chars(1000)).unwrap();
    let order: Vec<(&str, usize)> = spans
        .iter()
        .map(|s| (s.span.document_id.as_str(), s.span.position))
        .collect();
    assert_eq!(order, vec![("b", 0), ("b", 1), ("a", 0), ("a", 1)]);
    assert!(spans.iter().all(|s| s.score > 0.0 && !s.truncated));

    // "Silver ore." would overflow after "Gold rush.", which ends selection.
    let spans = engine.select(&["a", "b"], Budget::Chars(15)).unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].span.document_id, "a");
    assert_eq!(spans[0].span.text, "Gold rush.");
}

#[test]
fn select_unknown_document_is_not_found() {
    let engine = bilingual_engine(Arc::default());
    engine.ingest(IngestRequest::new("a", "Gold rush.")).unwrap();

    let err = engine.select(&["a", "ghost"], Budget::Chars(100)).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.to_string(), "document not found: ghost");
}
