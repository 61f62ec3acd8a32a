use thiserror::Error;

/// Invalid invocation, detected before the input file is touched.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("min_ttl ({min}) cannot be greater than max_ttl ({max})")]
    InvertedTtlRange { min: u8, max: u8 },

    #[error("delimiter needs to be a single ASCII character, got `{0}`")]
    Delimiter(String),
}
