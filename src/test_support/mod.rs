//! Test utilities and mock fact sources for pkgmeta unit tests.

pub mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};

pub use fixtures::*;

use crate::core::PackagePath;
use crate::sources::{FactSource, LookupError, RawFact};
use crate::util::cancel::CancelToken;

/// Wraps another fact source to observe or disturb fetching.
pub struct InstrumentedSource<'a> {
    inner: &'a dyn FactSource,
    counter: Option<&'a AtomicUsize>,
    cancel_on: Option<(PackagePath, CancelToken)>,
}

impl<'a> InstrumentedSource<'a> {
    pub fn new(inner: &'a dyn FactSource) -> Self {
        InstrumentedSource {
            inner,
            counter: None,
            cancel_on: None,
        }
    }

    /// Count every fetch into `counter`.
    pub fn counting(mut self, counter: &'a AtomicUsize) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Cancel `token` while fetching `path`.
    pub fn cancel_on(mut self, path: PackagePath, token: CancelToken) -> Self {
        self.cancel_on = Some((path, token));
        self
    }
}

impl FactSource for InstrumentedSource<'_> {
    fn name(&self) -> &str {
        "instrumented"
    }

    fn fetch(&self, path: &PackagePath, cancel: &CancelToken) -> Result<RawFact, LookupError> {
        if let Some(counter) = self.counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == path {
                token.cancel();
            }
        }
        self.inner.fetch(path, cancel)
    }
}
