/// Errors produced by buffer view accessors.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// A typed accessor's (offset, len) would leave the view.
    #[error("{context}: requested area out of bounds (offset {offset}, len {len}, view size {size})")]
    OutOfRange {
        context: &'static str,
        offset: usize,
        len: usize,
        size: usize,
    },

    /// The view contents violate an encoding rule, e.g. a C string
    /// with no terminating NUL inside the view.
    #[error("malformed buffer contents: {0}")]
    Malformed(String),

    /// A copy destination is smaller than the source view.
    #[error("destination too small ({required} bytes required, {available} available)")]
    DestinationTooSmall { required: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, BufferError>;
