use std::cell::Cell;
use std::rc::Rc;

use thiserror::Error;

/// One collector request: a single serialized record as the POST body.
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    pub url: &'a str,
    pub headers: &'a [(String, String)],
    pub body: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request cancelled")]
    Cancelled,
    #[error("http status {0}")]
    Status(u16),
    #[error("{0}")]
    Other(String),
}

/// Cooperative cancellation flag shared between the tracker and an
/// in-flight delivery; flipped on page unload.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Bounded-wait delivery primitive.
///
/// `post` blocks until the collector acknowledges, fails, or the token is
/// cancelled. The acknowledgment body is returned verbatim; the caller
/// decides what counts as success.
pub trait Transport {
    fn post(
        &self,
        request: &TransportRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<String, TransportError>;
}
