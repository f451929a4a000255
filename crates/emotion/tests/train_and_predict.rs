use std::sync::Arc;

use chordconf::TrainingConfig;
use emotion::{
    read_csv, DatasetBuilder, DatasetRecord, Error, PipelineConfig, PredictionService, TopicParams,
    TrainingJob, Variant,
};
use harmony::{AnalysisParams, ProgressionAnalyzer};
use midi_analysis::{progression_to_midi, ProgressionOptions};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn corpus() -> Vec<DatasetRecord> {
    let happy_tail = ["2-5", "4-27B", "3-11B"];
    let sad_tail = ["2-3", "4-27A", "3-10"];
    let mut records = Vec::new();
    for i in 0..20 {
        let happy: Vec<String> = ["3-11B", "4-20", "3-11B", happy_tail[i % 3]]
            .iter()
            .map(|t| t.to_string())
            .collect();
        records.push(DatasetRecord::new(&happy, "major", "happy").with_tonic("C"));

        let sad: Vec<String> = ["3-11A", "4-26", "3-11A", sad_tail[i % 3]]
            .iter()
            .map(|t| t.to_string())
            .collect();
        records.push(DatasetRecord::new(&sad, "minor", "sad").with_tonic("A"));
    }
    records
}

fn small(variant: Variant) -> PipelineConfig {
    let mut config = PipelineConfig::for_variant(variant, &TrainingConfig::default());
    config.forest.n_trees = 20;
    if let Some(topics) = config.topics.as_mut() {
        *topics = TopicParams {
            n_topics: 2,
            max_iter: 15,
            ..*topics
        };
    }
    config
}

#[test]
fn train_save_load_predict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ngrams.bin");
    let job = TrainingJob::new(small(Variant::Ngrams), &path);

    let outcome = job.run(&corpus(), &CancellationToken::new()).unwrap();
    assert_eq!(outcome.train_samples + outcome.test_samples, 40);
    assert!(outcome.evaluation.accuracy > 0.9);
    assert!(path.exists());

    let service = PredictionService::lazy(&path).unwrap();
    assert!(!service.is_loaded());

    let prediction = service
        .predict("3-11B,4-20,3-11B,2-5", "major", Some("C"))
        .unwrap();
    assert!(service.is_loaded());
    assert_eq!(prediction.label, "happy");
    let labels: Vec<&str> = prediction.probabilities.keys().map(String::as_str).collect();
    assert_eq!(labels, vec!["happy", "sad"]);
    let total: f64 = prediction.probabilities.values().sum();
    assert!((total - 1.0).abs() < 1e-9);

    let sad = service.predict("3-11A,4-26,3-11A,3-10", "minor", Some("A"));
    assert_eq!(sad.unwrap().label, "sad");
}

#[test]
fn keyed_corpus_makes_the_tonic_mandatory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ngrams.bin");
    TrainingJob::new(small(Variant::Ngrams), &path)
        .run(&corpus(), &CancellationToken::new())
        .unwrap();

    let service = PredictionService::open(&path).unwrap();
    assert!(service.artifact().unwrap().input.include_tonic);
    assert!(matches!(
        service.predict("3-11B,4-20,3-11B,2-5", "major", None),
        Err(Error::MissingTonic)
    ));
}

#[test]
fn unkeyed_corpus_ignores_the_tonic() {
    let records: Vec<DatasetRecord> = corpus()
        .into_iter()
        .map(|r| DatasetRecord { tonic: None, ..r })
        .collect();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("topics.bin");
    TrainingJob::new(small(Variant::NgramsTopics), &path)
        .run(&records, &CancellationToken::new())
        .unwrap();

    let service = PredictionService::open(&path).unwrap();
    assert!(!service.artifact().unwrap().input.include_tonic);
    let bare = service.predict("3-11A,4-26,3-11A,3-10", "minor", None).unwrap();
    let keyed = service.predict("3-11A,4-26,3-11A,3-10", "minor", Some("A")).unwrap();
    assert_eq!(bare, keyed);
}

#[test]
fn full_variant_refuses_an_unkeyed_corpus() {
    let records: Vec<DatasetRecord> = corpus()
        .into_iter()
        .map(|r| DatasetRecord { tonic: None, ..r })
        .collect();
    let dir = tempfile::tempdir().unwrap();
    let job = TrainingJob::new(small(Variant::Full), dir.path().join("full.bin"));

    assert!(matches!(
        job.run(&records, &CancellationToken::new()),
        Err(Error::Dataset(_))
    ));
}

#[test]
fn concurrent_predictions_share_one_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ngrams.bin");
    TrainingJob::new(small(Variant::Ngrams), &path)
        .run(&corpus(), &CancellationToken::new())
        .unwrap();

    let service = PredictionService::lazy(&path).unwrap();
    let start = std::sync::Barrier::new(6);
    let labels: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                scope.spawn(|| {
                    start.wait();
                    service
                        .predict("3-11B,4-20,3-11B,2-5", "major", Some("C"))
                        .unwrap()
                        .label
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(service.is_loaded());
    assert_eq!(labels, vec!["happy".to_string(); 6]);
    assert!(std::ptr::eq(service.artifact().unwrap(), service.artifact().unwrap()));
}

#[test]
fn empty_sequence_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ngrams.bin");
    TrainingJob::new(small(Variant::Ngrams), &path)
        .run(&corpus(), &CancellationToken::new())
        .unwrap();

    let service = PredictionService::open(&path).unwrap();
    assert!(matches!(service.predict(" , ", "major", None), Err(Error::EmptySequence)));
    assert!(matches!(service.predict("", "minor", Some("A")), Err(Error::EmptySequence)));
}

#[test]
fn topic_variant_stores_its_input_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("full.bin");
    TrainingJob::new(small(Variant::Full), &path)
        .run(&corpus(), &CancellationToken::new())
        .unwrap();

    let service = PredictionService::open(&path).unwrap();
    let artifact = service.artifact().unwrap();
    assert_eq!(artifact.variant, "full");
    assert!(artifact.input.include_tonic);
    assert!(artifact.topics.is_some());

    let prediction = service.predict("3-11A,4-26,3-11A,2-3", "minor", Some("A")).unwrap();
    assert_eq!(prediction.label, "sad");
}

#[test]
fn service_plugs_into_the_analyzer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ngrams.bin");
    TrainingJob::new(small(Variant::Ngrams), &path)
        .run(&corpus(), &CancellationToken::new())
        .unwrap();

    let service = Arc::new(PredictionService::open(&path).unwrap());
    let analyzer = ProgressionAnalyzer::default().with_classifier(service);
    let report = analyzer
        .analyze_progression("C - F - C - G", &ProgressionOptions::default())
        .unwrap();

    let emotion = report.result.emotion.unwrap();
    assert!(["Happy", "Sad"].contains(&emotion.content.as_str()));
    assert_eq!(emotion.probabilities.len(), 2);
    assert!(!emotion.description.is_empty());
}

#[test]
fn dataset_from_midi_folder() {
    let midi_dir = tempfile::tempdir().unwrap();
    let options = ProgressionOptions::default();
    let files = [
        ("XMIDI_happy_pop_001.mid", "C - G - Am - F"),
        ("XMIDI_sad_rock_002.midi", "Am - Dm - E - Am"),
        ("XMIDI_angry_metal_003.mid", "E - F - E - F"),
    ];
    for (name, progression) in files {
        let bytes = progression_to_midi(progression, &options).unwrap();
        std::fs::write(midi_dir.path().join(name), bytes).unwrap();
    }
    std::fs::write(midi_dir.path().join("XMIDI_warm_pop_004.mid"), b"not midi").unwrap();
    std::fs::write(midi_dir.path().join("random.mid"), b"whatever").unwrap();

    let builder = DatasetBuilder::new(AnalysisParams::default(), ["happy", "sad", "warm"]);
    let out = tempfile::tempdir().unwrap();
    let csv_path = out.path().join("raw.csv");
    let outcome = builder.build_to_csv(midi_dir.path(), &csv_path).unwrap();

    let emotions: Vec<&str> = outcome.records.iter().map(|r| r.emotion.as_str()).collect();
    assert_eq!(emotions, vec!["happy", "sad"]);
    assert_eq!(outcome.records[0].forte_sequence, "3-11B,3-11A,3-11B");
    assert_eq!(outcome.records[0].mode, "major");
    assert_eq!(outcome.records[0].tonic.as_deref(), Some("C"));

    let failed: Vec<&str> = outcome.errors.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(failed, vec!["XMIDI_warm_pop_004.mid", "random.mid"]);

    let reloaded = read_csv(&csv_path).unwrap();
    assert_eq!(reloaded, outcome.records);

    let analyzer = ProgressionAnalyzer::default();
    let direct = analyzer
        .analyze_midi(&std::fs::read(midi_dir.path().join("XMIDI_happy_pop_001.mid")).unwrap())
        .unwrap();
    assert_eq!(direct.forte_sequence.join(","), outcome.records[0].forte_sequence);
}
