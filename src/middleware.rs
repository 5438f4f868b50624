use crate::core::Core;
use crate::error::Result;
use crate::field::Field;
use crate::level::Level;
use crate::record::Entry;
use std::sync::Arc;

/// Decides whether an entry, together with its call fields, reaches the
/// wrapped core.
pub type FilterFn = Arc<dyn Fn(&Entry, &[Field]) -> bool + Send + Sync>;

/// Core middleware that consults a filter before every write and otherwise
/// delegates to the next core in the chain.
pub struct FilteringCore {
    next: Box<dyn Core>,
    filter: FilterFn,
}

impl FilteringCore {
    pub fn new<C, F>(next: C, filter: F) -> Self
    where
        C: Core + 'static,
        F: Fn(&Entry, &[Field]) -> bool + Send + Sync + 'static,
    {
        FilteringCore {
            next: Box::new(next),
            filter: Arc::new(filter),
        }
    }
}

impl Core for FilteringCore {
    fn enabled(&self, level: Level) -> bool {
        self.next.enabled(level)
    }

    fn check(&self, entry: &Entry) -> bool {
        self.next.check(entry)
    }

    fn with(&self, fields: &[Field]) -> Box<dyn Core> {
        Box::new(FilteringCore {
            next: self.next.with(fields),
            filter: Arc::clone(&self.filter),
        })
    }

    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<()> {
        if !(self.filter)(entry, fields) {
            return Ok(());
        }
        self.next.write(entry, fields)
    }

    fn sync(&self) -> Result<()> {
        self.next.sync()
    }
}
