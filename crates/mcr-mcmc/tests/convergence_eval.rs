use mcr_core::{Chain, McrError, RngHandle};
use mcr_mcmc::convergence::{evaluate, potential_scale_reduction, ConvergenceDiagnostic};
use mcr_mcmc::{merge, GelmanRubin, MergedChainSet};

fn normal_chain(seed: u64, offset: f64, len: usize) -> Vec<f64> {
    let mut rng = RngHandle::from_seed(seed);
    (0..len).map(|_| offset + rng.standard_normal()).collect()
}

fn merged(columns: &[&str], chains: Vec<Vec<Vec<f64>>>) -> MergedChainSet {
    let n_chain = chains.len();
    let chains = chains
        .into_iter()
        .map(|cols| {
            let len = cols[0].len();
            let rows: Vec<Vec<f64>> = (0..len)
                .map(|row| cols.iter().map(|col| col[row]).collect())
                .collect();
            Chain::new(columns.iter().map(|c| c.to_string()).collect(), rows, 1, 1).unwrap()
        })
        .collect();
    merge(chains, n_chain).unwrap()
}

#[test]
fn well_mixed_chains_have_psrf_near_one() {
    let chains: Vec<Vec<f64>> = (0..4).map(|seed| normal_chain(seed, 0.0, 2_000)).collect();
    let segments: Vec<&[f64]> = chains.iter().map(Vec::as_slice).collect();
    let rhat = potential_scale_reduction(&segments).unwrap();
    assert!((rhat - 1.0).abs() < 0.02, "rhat {rhat}");
}

#[test]
fn separated_chains_have_large_psrf() {
    let a = normal_chain(1, 0.0, 500);
    let b = normal_chain(2, 5.0, 500);
    let rhat = potential_scale_reduction(&[a.as_slice(), b.as_slice()]).unwrap();
    assert!(rhat > 2.0, "rhat {rhat}");
}

#[test]
fn psrf_is_undefined_without_variance_or_chains() {
    let constant = vec![1.0; 10];
    assert!(potential_scale_reduction(&[constant.as_slice(), constant.as_slice()]).is_none());
    let single = normal_chain(3, 0.0, 10);
    assert!(potential_scale_reduction(&[single.as_slice()]).is_none());
    assert!(potential_scale_reduction(&[]).is_none());
    let short = vec![1.0];
    assert!(potential_scale_reduction(&[short.as_slice(), short.as_slice()]).is_none());
}

#[test]
fn split_variant_detects_drift_within_one_chain() {
    let mut drifting = normal_chain(4, 0.0, 200);
    drifting.extend(normal_chain(5, 6.0, 200));
    let set = merged(&["mu"], vec![vec![drifting]]);
    let split = GelmanRubin { split: true };
    assert_eq!(split.name(), "split-psrf");
    assert!(split.diagnose(&set, "mu").unwrap() > 2.0);
    let plain = GelmanRubin { split: false };
    assert_eq!(plain.name(), "psrf");
    assert!(plain.diagnose(&set, "mu").is_none());
}

#[test]
fn evaluate_expands_vector_parameters_and_takes_the_max() {
    let set = merged(
        &["beta[1]", "beta[2]", "sigma"],
        (0..3)
            .map(|seed| {
                vec![
                    normal_chain(seed, 0.0, 400),
                    normal_chain(seed + 10, seed as f64 * 4.0, 400),
                    normal_chain(seed + 20, 0.0, 400),
                ]
            })
            .collect(),
    );
    let state = evaluate(&set, &["beta".to_string()], 1.1, &GelmanRubin::default()).unwrap();
    let keys: Vec<&str> = state.diagnostics.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["beta[1]", "beta[2]"]);
    let second = state.diagnostics["beta[2]"].unwrap();
    assert_eq!(state.max_diagnostic, second);
    assert!(!state.converged);
}

#[test]
fn undefined_columns_are_excluded_from_the_decision() {
    let set = merged(
        &["mu", "fixed"],
        (0..2)
            .map(|seed| vec![normal_chain(seed, 0.0, 400), vec![3.0; 400]])
            .collect(),
    );
    let params = vec!["mu".to_string(), "fixed".to_string()];
    let state = evaluate(&set, &params, 1.1, &GelmanRubin::default()).unwrap();
    assert_eq!(state.diagnostics["fixed"], None);
    assert!(state.converged);
}

#[test]
fn all_undefined_diagnostics_fail_evaluation() {
    let set = merged(&["fixed"], vec![vec![vec![3.0; 50]], vec![vec![3.0; 50]]]);
    let err = evaluate(&set, &["fixed".to_string()], 1.1, &GelmanRubin::default()).unwrap_err();
    assert!(matches!(err, McrError::Evaluation(_)));
    assert_eq!(err.info().code, "diagnostic-undefined");
    assert!(err.info().hint.is_some());
}

#[test]
fn unknown_parameters_are_rejected() {
    let set = merged(&["mu"], vec![vec![normal_chain(1, 0.0, 20)]]);
    let err = evaluate(&set, &["tau".to_string()], 1.1, &GelmanRubin::default()).unwrap_err();
    assert_eq!(err.info().code, "unknown-parameter");
}

#[test]
fn merge_rejects_wrong_count_and_mismatched_variables() {
    let a = Chain::new(vec!["mu".into()], vec![vec![1.0]], 1, 1).unwrap();
    let b = Chain::new(vec!["tau".into()], vec![vec![1.0]], 1, 1).unwrap();
    let err = merge(vec![a.clone()], 2).unwrap_err();
    assert_eq!(err.info().code, "merge-count");
    let err = merge(vec![a, b], 2).unwrap_err();
    assert_eq!(err.info().code, "merge-variables");
}
