/// Failure modes of a single provider HTTP call.
///
/// Push paths fold these into `DispatchOutcome::Failed`; status paths fold
/// them into `StatusProbe::Unavailable`.
#[derive(Debug, thiserror::Error)]
pub enum ProviderCallError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    Http(reqwest::StatusCode),

    #[error("unparseable provider response: {0}")]
    UnparseableResponse(String),

    #[error("provider rejected the request: {0}")]
    Rejected(String),
}
