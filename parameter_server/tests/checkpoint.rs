use machine_learning::{Init, NameFilter, Tensor, VariableSpec};
use ndarray::IxDyn;
use parameter_server::{
    Checkpoint, CheckpointStore, StoreErr, VariableStore, checkpoint::latest_checkpoint,
};
use tempfile::TempDir;

fn model_vars() -> Vec<VariableSpec> {
    vec![
        VariableSpec::new("backbone/weights", &[4, 3], Init::Kaiming),
        VariableSpec::new("backbone/biases", &[3], Init::Const { value: 0.1 }),
        VariableSpec::new("logits/weights", &[3, 2], Init::XavierUniform),
        VariableSpec::new("logits/biases", &[2], Init::Zeros),
    ]
}

fn store_with(seed: u64, specs: &[VariableSpec]) -> VariableStore {
    let mut store = VariableStore::new(seed);
    for spec in specs {
        store.get_or_create(spec).unwrap();
    }
    store
}

#[test]
fn round_trip_restores_values_and_step() {
    let dir = TempDir::new().unwrap();
    let mut checkpoints = CheckpointStore::open(dir.path(), 3).unwrap();

    let saved = store_with(1, &model_vars());
    let path = checkpoints.save(&saved, 42).unwrap();

    let mut fresh = store_with(2, &model_vars());
    assert_ne!(fresh.snapshot(), saved.snapshot());

    let step = Checkpoint::read(&path).unwrap().restore(&mut fresh).unwrap();

    assert_eq!(step, 42);
    assert_eq!(fresh.snapshot(), saved.snapshot());

    // restoring twice changes nothing
    Checkpoint::read(&path).unwrap().restore(&mut fresh).unwrap();
    assert_eq!(fresh.snapshot(), saved.snapshot());
}

#[test]
fn retention_keeps_the_most_recent() {
    const KEEP: usize = 3;

    let dir = TempDir::new().unwrap();
    let mut checkpoints = CheckpointStore::open(dir.path(), KEEP).unwrap();
    let store = store_with(1, &model_vars());

    for step in 1..=KEEP as u64 + 4 {
        checkpoints.save(&store, step * 10).unwrap();
    }

    let steps: Vec<u64> = checkpoints.retained().iter().map(|e| e.step).collect();
    assert_eq!(steps, [50, 60, 70]);

    let on_disk = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".safetensors"))
        .count();
    assert_eq!(on_disk, KEEP);

    assert_eq!(
        checkpoints.latest().unwrap(),
        dir.path().join("model.ckpt-70.safetensors")
    );
}

#[test]
fn retention_survives_reopening() {
    let dir = TempDir::new().unwrap();
    let store = store_with(1, &model_vars());

    CheckpointStore::open(dir.path(), 2)
        .unwrap()
        .save(&store, 1)
        .unwrap();

    let mut reopened = CheckpointStore::open(dir.path(), 2).unwrap();
    reopened.save(&store, 2).unwrap();
    reopened.save(&store, 3).unwrap();

    assert!(!dir.path().join("model.ckpt-1.safetensors").exists());
    assert_eq!(
        latest_checkpoint(dir.path()).unwrap().unwrap(),
        dir.path().join("model.ckpt-3.safetensors")
    );
}

#[test]
fn latest_checkpoint_without_a_manifest_scans_the_directory() {
    let dir = TempDir::new().unwrap();
    let store = store_with(1, &model_vars());

    let mut checkpoints = CheckpointStore::open(dir.path(), 5).unwrap();
    checkpoints.save(&store, 9).unwrap();
    checkpoints.save(&store, 100).unwrap();
    std::fs::remove_file(dir.path().join("checkpoint.json")).unwrap();

    assert_eq!(
        latest_checkpoint(dir.path()).unwrap().unwrap(),
        dir.path().join("model.ckpt-100.safetensors")
    );
    assert!(latest_checkpoint(&dir.path().join("missing")).unwrap().is_none());
}

#[test]
fn zero_retention_is_rejected() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        CheckpointStore::open(dir.path(), 0),
        Err(StoreErr::ZeroRetention)
    ));
}

#[test]
fn transfer_learning_keeps_skipped_variables_at_initialization() {
    let dir = TempDir::new().unwrap();
    let mut checkpoints = CheckpointStore::open(dir.path(), 1).unwrap();
    let pretrained = store_with(1, &model_vars());
    let path = checkpoints.save(&pretrained, 500).unwrap();

    let mut target = store_with(2, &model_vars());
    let initial = target.snapshot();

    let skip = NameFilter::parse("logits,global_step");
    let report = Checkpoint::read(&path)
        .unwrap()
        .restore_filtered(&mut target, &skip)
        .unwrap();

    assert_eq!(report.step, None);
    assert_eq!(report.skipped, ["logits/weights", "logits/biases"]);
    assert_eq!(report.restored, ["backbone/weights", "backbone/biases"]);

    for name in ["logits/weights", "logits/biases"] {
        assert_eq!(target.get(name), initial.get(name));
    }
    for name in ["backbone/weights", "backbone/biases"] {
        assert_eq!(target.get(name), pretrained.get(name));
    }
}

#[test]
fn transfer_learning_tolerates_missing_and_excluded_mismatches() {
    let dir = TempDir::new().unwrap();
    let mut checkpoints = CheckpointStore::open(dir.path(), 1).unwrap();
    let pretrained = store_with(1, &model_vars());
    let path = checkpoints.save(&pretrained, 7).unwrap();

    let mut specs = model_vars();
    specs[2] = VariableSpec::new("logits/weights", &[3, 10], Init::XavierUniform);
    specs[3] = VariableSpec::new("logits/biases", &[10], Init::Zeros);
    specs.push(VariableSpec::new("head/extra", &[5], Init::Zeros));
    let mut target = store_with(2, &specs);

    let report = Checkpoint::read(&path)
        .unwrap()
        .restore_filtered(&mut target, &NameFilter::parse("logits"))
        .unwrap();

    assert_eq!(report.step, Some(7));
    assert_eq!(report.missing, ["head/extra"]);
    assert_eq!(target.get("logits/weights").unwrap().shape(), &[3, 10]);
}

#[test]
fn mismatched_shape_outside_the_exclusions_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut checkpoints = CheckpointStore::open(dir.path(), 1).unwrap();
    let path = checkpoints.save(&store_with(1, &model_vars()), 7).unwrap();

    let mut specs = model_vars();
    specs[3] = VariableSpec::new("logits/biases", &[10], Init::Zeros);
    let mut target = store_with(2, &specs);

    let checkpoint = Checkpoint::read(&path).unwrap();
    assert!(matches!(
        checkpoint.restore_filtered(&mut target, &NameFilter::parse("backbone")),
        Err(StoreErr::RestoreMismatch { name, .. }) if name == "logits/biases"
    ));
}

#[test]
fn full_restore_requires_every_variable() {
    let dir = TempDir::new().unwrap();
    let mut checkpoints = CheckpointStore::open(dir.path(), 1).unwrap();
    let path = checkpoints.save(&store_with(1, &model_vars()), 3).unwrap();

    let mut specs = model_vars();
    specs.push(VariableSpec::new("extra", &[1], Init::Zeros));
    let mut target = store_with(2, &specs);

    assert!(matches!(
        Checkpoint::read(&path).unwrap().restore(&mut target),
        Err(StoreErr::NotInCheckpoint { name, .. }) if name == "extra"
    ));

    let extra = Tensor::from_elem(IxDyn(&[1]), 0.);
    assert_eq!(target.get("extra"), Some(&extra));
}
