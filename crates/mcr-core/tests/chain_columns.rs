use mcr_core::chain::column_matches;
use mcr_core::Chain;

fn sample_chain() -> Chain {
    Chain::new(
        vec!["alpha".into(), "beta[1]".into(), "beta[2]".into(), "betamax".into()],
        vec![vec![0.0, 1.0, 2.0, 3.0], vec![0.5, 1.5, 2.5, 3.5]],
        11,
        2,
    )
    .unwrap()
}

#[test]
fn vector_parameters_select_all_elements() {
    let chain = sample_chain();
    assert_eq!(chain.parameter_columns("beta"), vec!["beta[1]", "beta[2]"]);
    assert_eq!(chain.parameter_columns("alpha"), vec!["alpha"]);
    assert!(chain.parameter_columns("gamma").is_empty());
    assert!(!column_matches("betamax", "beta"));
}

#[test]
fn columns_and_iteration_bounds() {
    let chain = sample_chain();
    assert_eq!(chain.column("beta[2]"), Some(vec![2.0, 2.5]));
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.start(), 11);
    assert_eq!(chain.end(), 13);
}

#[test]
fn ragged_rows_are_rejected() {
    let err = Chain::new(vec!["a".into()], vec![vec![1.0, 2.0]], 1, 1).unwrap_err();
    assert_eq!(err.info().code, "chain-width");
    assert!(Chain::new(vec!["a".into()], vec![], 1, 0).is_err());
}
