use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Input contract violations.
///
/// Anomalies that come up while simplifying (stale queue entries, singular quadrics, non-manifold collapses)
/// are not errors; they are handled with fallbacks and reported through `log`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("index buffer length {len} is not a multiple of 3")]
    IndexCountNotTriangles { len: usize },
    #[error("vertex index {index} at {at} is out of range for {count} vertices")]
    VertexIndexOutOfRange { at: usize, index: u32, count: usize },
    #[error("texture coordinate index {index} at {at} is out of range for {count} texture coordinates")]
    TexIndexOutOfRange { at: usize, index: u32, count: usize },
    #[error("texture coordinate index buffer has {len} entries, expected {expected}")]
    TexIndexCountMismatch { len: usize, expected: usize },
    #[error("{count} half-edges have an asymmetric twin")]
    InvalidTwins { count: usize },
    #[error("cluster density must be at least 1")]
    ZeroClusterDensity,
}
