use std::io::Write;

use lincls::train::{SpaceBuilder, TrainConfig, Trainer, TrainingSpace};
use lincls::{
    FeatureModel, FeatureVector, LinearModel, Solver, SparseModel, SparseVector, StringModel,
};

const CORPUS: &[&str] = &[
    "NOUN w:dog p:the s:og",
    "NOUN w:cat p:the s:at",
    "NOUN w:dogs p:the s:gs",
    "VERB w:runs p:dog s:ns",
    "VERB w:eats p:cat s:ts",
    "VERB w:run p:dogs s:un",
    "ADJ w:big p:a s:ig",
    "ADJ w:small p:a s:ll",
    "ADJ w:red p:a s:ed",
];

fn build(lines: &[&str]) -> (StringModel, TrainingSpace) {
    let mut builder = SpaceBuilder::new();
    for line in lines {
        builder.add_line(line, false).unwrap();
    }
    builder.build().unwrap()
}

fn assert_fits(model: &StringModel, lines: &[&str]) {
    for line in lines {
        let (label, features) = line.split_once(' ').unwrap();
        let x = FeatureVector::parse(features, false).unwrap();
        let best = model.predict_best_features(&x).unwrap();
        assert_eq!(best.label, label, "{}", line);
    }
}

#[test]
fn test_sparse_model_scoring() {
    let mut model = SparseModel::new();
    for label in ["A", "B", "C"] {
        model.add_label(label);
    }
    model.add_features(&[1, 2, 3, 4]);
    model.init_weights();
    let rows = [1.0, 0.1, 0.01, 0.001, 0.0001];
    for (label, scale) in [(0, 1.0), (1, 3.0), (2, 2.0)] {
        let values: Vec<f64> = rows.iter().map(|w| w * scale).collect();
        model.set_label_weights(label, &values).unwrap();
    }

    let x = SparseVector::from_parts(vec![1, 3], None);
    let scores = model.scores(&x);
    assert!((scores[0] - 1.101).abs() < 1e-9);
    assert!((scores[1] - 3.303).abs() < 1e-9);
    assert!((scores[2] - 2.202).abs() < 1e-9);
    assert_eq!(model.predict_best(&x).unwrap().label, "B");
}

#[test]
fn test_train_save_load_predict() {
    for solver in Solver::ALL {
        let config = TrainConfig {
            solver: solver.name().to_string(),
            cost: 1.0,
            alpha: 0.1,
            iterations: 20,
            seed: Some(11),
            ..Default::default()
        };
        let (mut model, space) = build(CORPUS);
        assert_eq!(model.num_labels(), 3);
        config.fit(&space, &mut model).unwrap();
        assert_eq!(model.solver(), solver);
        assert_fits(&model, CORPUS);

        let temp_file = tempfile::NamedTempFile::new().unwrap();
        model.save_to_path(temp_file.path()).unwrap();
        let loaded = StringModel::load_from_path(temp_file.path()).unwrap();
        assert_eq!(loaded.solver(), solver);
        assert_eq!(loaded.num_features(), model.num_features());
        assert_fits(&loaded, CORPUS);

        let mut first = Vec::new();
        model.save(&mut first).unwrap();
        let mut second = Vec::new();
        loaded.save(&mut second).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_binary_model_persists_one_column() {
    let lines = &CORPUS[..6];
    let (mut model, space) = build(lines);
    assert!(model.is_binary());
    Trainer::dual()
        .with_cost(1.0)
        .unwrap()
        .with_bias(1.0)
        .unwrap()
        .train(&space, &mut model)
        .unwrap();
    assert_fits(&model, lines);

    let x = FeatureVector::parse("w:dog p:the", false).unwrap();
    let scores = model.scores(&model.to_sparse_vector(&x));
    assert_eq!(scores[0], -scores[1]);

    let mut buf = Vec::new();
    model.save(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    let count: usize = lines[lines.len() - 2].parse().unwrap();
    assert_eq!(count, model.num_features());
}

#[test]
fn test_logistic_predictions_are_probabilities() {
    let config = TrainConfig {
        solver: "dual-lr".to_string(),
        cost: 1.0,
        ..Default::default()
    };
    let (mut model, space) = build(CORPUS);
    config.fit(&space, &mut model).unwrap();

    let x = FeatureVector::parse("w:dog p:the s:og", false).unwrap();
    let list = model.predict_all_features(&x);
    let sum: f64 = list.iter().map(|p| p.score).sum();
    assert!((sum - 1.0).abs() < 1e-9);
    assert_eq!(list[0].label, "NOUN");

    let (best, second) = model.predict_two_features(&x).unwrap();
    assert_eq!(best, list[0]);
    assert_eq!(second, list[1]);
}

#[test]
fn test_scan_files_with_cutoffs() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for (i, chunk) in CORPUS.chunks(4).enumerate() {
        let path = dir.path().join(format!("shard{}.txt", i));
        let mut file = std::fs::File::create(&path).unwrap();
        for line in chunk {
            writeln!(file, "{}", line).unwrap();
        }
        writeln!(file).unwrap();
        paths.push(path);
    }

    let config = TrainConfig {
        threads: 2,
        feature_cutoff: 1,
        ..Default::default()
    };
    let (model, space) = config.build_space(&paths, false).unwrap();
    assert_eq!(space.len(), CORPUS.len());
    assert_eq!(model.label_id("NOUN"), Some(0));
    assert_eq!(model.label_id("VERB"), Some(1));
    assert_eq!(model.label_id("ADJ"), Some(2));
    // only p:the and p:a occur more than once
    assert_eq!(model.num_features(), 3);
    assert_eq!(model.features().get("p", "the"), Some(1));
    assert_eq!(model.features().get("p", "a"), Some(2));

    let missing = dir.path().join("missing.txt");
    let mut paths = paths.clone();
    paths.push(missing);
    assert!(config.build_space(&paths, false).is_err());
}
