use thiserror::Error;

/// Why an output slot yielded nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("output is empty")]
    Empty,

    #[error("no strategy recovered a {shape} from the output")]
    NoMatch { shape: &'static str },
}
