use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("cannot generalize an empty set of trees")]
    EmptyInput,

    /// A generalization collapsed to the top tree and constrains nothing.
    #[error("generalization degenerated to the top tree")]
    Degenerate,

    #[error("{measure} evaluated to NaN (tp={tp}, fp={fp}, tn={tn}, fn={fn_})")]
    ScoringAnomaly {
        measure: &'static str,
        tp: u64,
        fp: u64,
        tn: u64,
        fn_: u64,
    },
}
