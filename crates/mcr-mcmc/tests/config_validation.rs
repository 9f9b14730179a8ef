use std::fs;

use mcr_core::McrError;
use mcr_mcmc::RunConfig;

fn base() -> RunConfig {
    RunConfig {
        params: vec!["mu".to_string(), "beta".to_string()],
        ..RunConfig::default()
    }
}

fn code_of(config: &RunConfig) -> String {
    config.validate().unwrap_err().info().code.clone()
}

#[test]
fn yaml_defaults_fill_missing_fields() {
    let config = RunConfig::from_yaml_str("params: [mu]\nextra: true\n").unwrap();
    assert_eq!(config.n_chain, 3);
    assert_eq!(config.n_adapt, 1000);
    assert_eq!(config.n_burn, 1000);
    assert_eq!(config.n_draw, 1000);
    assert_eq!(config.n_thin, 1);
    assert_eq!(config.rhat_max, 1.1);
    assert!(config.report && config.save_object && !config.save_data);
    assert_eq!(config.n_max(), 1000 + 2 * 1000);
    assert_eq!(config.params_extra(), ["mu".to_string()]);
    assert_eq!(config.params_report(), ["mu".to_string()]);
    config.validate().unwrap();
}

#[test]
fn load_reads_file_and_reports_path_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("run.yaml");
    fs::write(&good, "params: [mu]\nn_chain: 4\nseed_policy:\n  master_seed: 9\n").unwrap();
    let config = RunConfig::load(&good).unwrap();
    assert_eq!(config.n_chain, 4);
    assert_eq!(config.seed_policy.master_seed, 9);

    let bad = dir.path().join("bad.yaml");
    fs::write(&bad, "n_chain: [\n").unwrap();
    let err = RunConfig::load(&bad).unwrap_err();
    assert!(matches!(err, McrError::Serde(_)));
    assert_eq!(err.info().code, "config-parse");
    assert!(err.info().context.contains_key("path"));

    let err = RunConfig::load(&dir.path().join("missing.yaml")).unwrap_err();
    assert_eq!(err.info().code, "config-read");
}

#[test]
fn structural_limits_are_enforced() {
    let mut config = base();
    config.n_chain = 0;
    assert_eq!(code_of(&config), "chain-count");

    let mut config = base();
    config.n_thin = 0;
    assert_eq!(code_of(&config), "thinning");

    let mut config = base();
    config.n_draw = 0;
    assert_eq!(code_of(&config), "draw-length");

    let mut config = base();
    config.rhat_max = f64::NAN;
    assert_eq!(code_of(&config), "rhat-max");

    let mut config = base();
    config.params.clear();
    let err = config.validate().unwrap_err();
    assert_eq!(err.info().code, "params-empty");
    assert!(err.info().hint.is_some());
}

#[test]
fn parameter_subsets_must_be_tracked() {
    let mut config = base();
    config.params_extra = Some(vec!["tau".to_string()]);
    let err = config.validate().unwrap_err();
    assert!(matches!(err, McrError::Config(_)));
    assert_eq!(err.info().code, "params-subset");
    assert_eq!(err.info().context.get("param").map(String::as_str), Some("tau"));

    let mut config = base();
    config.params_report = Some(Vec::new());
    assert_eq!(code_of(&config), "params-subset-empty");

    let mut config = base();
    config.params_report = Some(vec!["beta".to_string()]);
    config.validate().unwrap();
}

#[test]
fn budget_must_cover_the_burn_in_when_extending() {
    let mut config = base();
    config.extra = true;
    config.n_max = Some(900);
    assert_eq!(code_of(&config), "budget-too-small");
    config.n_max = Some(1_000);
    config.validate().unwrap();
    config.extra = false;
    config.validate().unwrap();
}
