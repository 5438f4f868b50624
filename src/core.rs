use crate::error::Result;
use crate::field::Field;
use crate::level::Level;
use crate::record::Entry;

/// Pluggable backend contract between a structured logging front end and a
/// destination.
///
/// The front end first asks [`Core::check`] whether the entry is of interest,
/// then calls [`Core::write`] with the per-call fields. Context fields are
/// attached once through [`Core::with`], which returns an independent core
/// and never alters `self`.
pub trait Core: Send + Sync {
    /// Whether entries of `level` are enabled at all.
    fn enabled(&self, level: Level) -> bool;

    /// Whether this core wants to see `entry`. Defaults to [`Core::enabled`].
    fn check(&self, entry: &Entry) -> bool {
        self.enabled(entry.level)
    }

    /// Derive a child core with `fields` attached after the existing ones.
    fn with(&self, fields: &[Field]) -> Box<dyn Core>;

    /// Deliver `entry` together with its call fields.
    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<()>;

    /// Flush anything buffered.
    fn sync(&self) -> Result<()>;
}

impl<C: Core + ?Sized> Core for Box<C> {
    fn enabled(&self, level: Level) -> bool {
        (**self).enabled(level)
    }

    fn check(&self, entry: &Entry) -> bool {
        (**self).check(entry)
    }

    fn with(&self, fields: &[Field]) -> Box<dyn Core> {
        (**self).with(fields)
    }

    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<()> {
        (**self).write(entry, fields)
    }

    fn sync(&self) -> Result<()> {
        (**self).sync()
    }
}
