//! Artifact persistence and inference determinism

use aircast::data::{MemorySource, SyntheticGenerator};
use aircast::inference::{classify, AqiCategory, InferenceEngine};
use aircast::io::{ArtifactBundle, ArtifactRef, ArtifactStore};
use aircast::train::{PipelineSettings, TrainConfig, TrainingPipeline};
use aircast::Error;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::sync::Arc;
use std::thread;

fn train(store: &ArtifactStore, run_id: &str, seed: u64) -> ArtifactBundle {
    let settings = PipelineSettings {
        training: TrainConfig {
            hidden_size: 8,
            num_layers: 1,
            epochs: 3,
            seed,
            ..TrainConfig::default()
        },
        run_id: Some(run_id.into()),
        ..PipelineSettings::default()
    };
    let source = MemorySource::new(SyntheticGenerator::new(seed).generate(160));
    TrainingPipeline::new(settings)
        .expect("valid settings")
        .run(&source, store, None)
        .expect("training succeeds")
        .bundle
}

#[test]
fn test_same_bundle_loaded_twice_predicts_identically() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    train(&store, "run-1", 1);
    let rows = SyntheticGenerator::new(99).generate(30);

    let a = InferenceEngine::new(store.load(&ArtifactRef::Latest).unwrap()).unwrap();
    let b = InferenceEngine::new(store.load(&ArtifactRef::Run("run-1".into())).unwrap()).unwrap();
    let fa = a.predict_single(&rows).unwrap();
    let fb = b.predict_single(&rows).unwrap();
    assert_eq!(fa.value.to_bits(), fb.value.to_bits());
    assert_eq!(fa.confidence, fb.confidence);
}

#[test]
fn test_new_version_leaves_previous_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let first = train(&store, "run-1", 1);
    let weights_path = dir.path().join("runs").join("run-1").join("weights.json");
    let before = fs::read(&weights_path).unwrap();

    train(&store, "run-2", 2);
    assert_eq!(fs::read(&weights_path).unwrap(), before);
    assert_eq!(store.load(&ArtifactRef::Run("run-1".into())).unwrap(), first);
    assert_eq!(store.load(&ArtifactRef::Latest).unwrap().run_id(), "run-2");
    assert_eq!(store.list().unwrap(), vec!["run-1", "run-2"]);
}

#[test]
fn test_tampered_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    train(&store, "run-1", 1);
    let path = dir.path().join("runs").join("run-1").join("scaler_x.json");
    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replacen('1', "2", 1)).unwrap();
    assert!(matches!(store.load(&ArtifactRef::Latest), Err(Error::CorruptArtifact(_))));
}

#[test]
fn test_architecture_mismatch_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let mut bundle = train(&store, "run-1", 1);
    bundle.metadata.num_layers = 2;
    assert!(matches!(InferenceEngine::new(bundle), Err(Error::Configuration(_))));
}

#[test]
fn test_six_step_forecast_with_decaying_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    train(&store, "run-1", 1);
    let engine = InferenceEngine::new(store.load(&ArtifactRef::Latest).unwrap()).unwrap();
    let rows = SyntheticGenerator::new(7).generate(25);

    let steps = engine
        .predict_multi_step_with(&rows, 6, &mut StdRng::seed_from_u64(5))
        .unwrap();
    assert_eq!(steps.len(), 6);
    for pair in steps.windows(2) {
        assert!(pair[1].confidence <= pair[0].confidence);
        assert!(pair[1].predicted_time > pair[0].predicted_time);
    }
    let category = classify(steps[0].forecast_value).category;
    assert_eq!(category, AqiCategory::from_value(steps[0].forecast_value));
}

#[test]
fn test_engine_shared_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    train(&store, "run-1", 1);
    let engine = Arc::new(InferenceEngine::new(store.load(&ArtifactRef::Latest).unwrap()).unwrap());
    let rows = Arc::new(SyntheticGenerator::new(8).generate(20));
    let expected = engine.predict_single(&rows).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let rows = Arc::clone(&rows);
            thread::spawn(move || engine.predict_single(&rows).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
