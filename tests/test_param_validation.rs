use lincls::train::{AdaGradParams, DualParams, TrainConfig, Trainer};
use lincls::{Error, OnlineModel, SparseModel};

#[test]
fn test_cost_validation() {
    let mut params = DualParams::default();

    // cost must be positive
    let result = params.set_cost(0.0);
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "cost must be positive");
    assert!(params.set_cost(-1.0).is_err());

    // cost > 0.0 should be allowed
    assert!(params.set_cost(1e-3).is_ok());
    assert_eq!(params.cost(), 1e-3);
}

#[test]
fn test_eps_validation() {
    let mut params = DualParams::default();

    let result = params.set_eps(0.0);
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "eps must be positive");

    assert!(params.set_eps(1e-5).is_ok());
}

#[test]
fn test_bias_validation() {
    let mut params = DualParams::default();

    // bias = 0.0 disables the intercept and should be allowed
    assert!(params.set_bias(0.0).is_ok());
    assert!(params.set_bias(1.0).is_ok());

    let result = params.set_bias(-0.5);
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "bias must be non-negative");
    assert_eq!(params.bias(), 1.0);
}

#[test]
fn test_negative_cost_ratio_validation() {
    let mut params = DualParams::default();
    assert_eq!(params.negative_cost_ratio(), 1.0);

    let result = params.set_negative_cost_ratio(0.0);
    assert_eq!(
        result.unwrap_err().to_string(),
        "negative_cost_ratio must be positive"
    );
    assert!(params.set_negative_cost_ratio(0.5).is_ok());
}

#[test]
fn test_adagrad_validation() {
    let mut params = AdaGradParams::default();

    let result = params.set_alpha(0.0);
    assert_eq!(result.unwrap_err().to_string(), "alpha must be positive");
    assert!(params.set_alpha(0.05).is_ok());

    // rho = 0.0 should be allowed
    assert!(params.set_rho(0.0).is_ok());
    let result = params.set_rho(-0.1);
    assert_eq!(result.unwrap_err().to_string(), "rho must be non-negative");

    let result = params.set_iterations(0);
    assert_eq!(
        result.unwrap_err().to_string(),
        "iterations must be at least 1"
    );
    assert!(params.set_iterations(1).is_ok());
}

#[test]
fn test_builder_validation() {
    assert!(Trainer::dual().with_cost(-1.0).is_err());
    assert!(Trainer::dual().with_eps(0.0).is_err());
    assert!(Trainer::adagrad().with_rho(-1.0).is_err());
    assert!(Trainer::adagrad().with_iterations(0).is_err());

    let trainer = Trainer::dual().with_cost(2.0).unwrap().with_seed(3);
    assert_eq!(trainer.params().cost(), 2.0);
    assert_eq!(trainer.params().shuffle_seed(), Some(3));
}

#[test]
fn test_error_kinds() {
    let err = Trainer::dual().with_cost(0.0).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));

    let err = OnlineModel::new(-1.0, 0.1).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));

    let config = TrainConfig {
        solver: "crf".to_string(),
        ..Default::default()
    };
    let mut model = SparseModel::new();
    model.add_label("A");
    let err = config
        .fit(&Default::default(), &mut model)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}
