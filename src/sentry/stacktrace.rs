//! Exception and stack trace resolution.
//!
//! Stack capture lives behind [`FrameSource`]; everything else here (root
//! cause lookup, frame skipping and filtering) is plain data manipulation.

use crate::field::{type_name_from_debug, ErrorSnapshot, ErrorValue};
use backtrace::Backtrace;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    pub in_app: bool,
}

impl Frame {
    pub fn new(function: impl Into<String>) -> Self {
        let function = function.into();
        Frame {
            module: module_of(&function),
            in_app: !is_runtime(&function),
            function: Some(function),
            ..Default::default()
        }
    }

    pub fn at(mut self, filename: impl Into<String>, lineno: u32) -> Self {
        self.filename = Some(filename.into());
        self.lineno = Some(lineno);
        self
    }
}

/// Frames ordered oldest call first, most recent call last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stacktrace {
    pub frames: Vec<Frame>,
}

/// Exception interface of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExceptionRecord {
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub ty: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
}

/// Stack introspection capability. Both methods return frames with the most
/// recent call first, the order in which a stack is walked.
pub trait FrameSource: Send + Sync {
    fn current_frames(&self) -> Vec<Frame>;

    /// Frames recorded by `error` itself, when its type keeps any.
    fn error_frames(&self, error: &(dyn StdError + 'static)) -> Option<Vec<Frame>>;
}

/// [`FrameSource`] backed by the `backtrace` crate. Errors expose frames when
/// they recorded a stack, see [`recorded_backtrace`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceFrames;

impl FrameSource for BacktraceFrames {
    fn current_frames(&self) -> Vec<Frame> {
        frames_of(&Backtrace::new())
    }

    fn error_frames(&self, error: &(dyn StdError + 'static)) -> Option<Vec<Frame>> {
        let mut backtrace = recorded_backtrace(error)?.clone();
        backtrace.resolve();
        Some(frames_of(&backtrace))
    }
}

/// The stack recorded by `error` itself: a [`TracedError`], or a snapshot
/// taken of one.
pub fn recorded_backtrace<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a Backtrace> {
    if let Some(traced) = error.downcast_ref::<TracedError>() {
        return Some(&traced.backtrace);
    }
    error.downcast_ref::<ErrorSnapshot>()?.backtrace.as_ref()
}

fn frames_of(backtrace: &Backtrace) -> Vec<Frame> {
    backtrace
        .frames()
        .iter()
        .flat_map(|frame| frame.symbols())
        .filter_map(|symbol| {
            let name = symbol.name()?;
            let mut frame = Frame::new(format!("{:#}", name));
            frame.filename = symbol.filename().map(|p| p.display().to_string());
            frame.lineno = symbol.lineno();
            Some(frame)
        })
        .collect()
}

/// Which frames are dropped from synthesized stack traces.
///
/// A frame is dropped when its function belongs to one of the front end
/// namespaces, or to the adapter's own namespace outside of its test modules.
#[derive(Debug, Clone)]
pub struct FramePolicy {
    pub frontend_prefixes: Vec<String>,
    pub internal_prefix: String,
}

impl Default for FramePolicy {
    fn default() -> Self {
        FramePolicy {
            frontend_prefixes: vec![
                "tracing::".to_string(),
                "tracing_core::".to_string(),
                "tracing_subscriber::".to_string(),
                "backtrace::".to_string(),
                "std::backtrace".to_string(),
            ],
            internal_prefix: format!("{}::", env!("CARGO_CRATE_NAME")),
        }
    }
}

impl FramePolicy {
    pub fn keep(&self, frame: &Frame) -> bool {
        let Some(function) = frame.function.as_deref() else {
            return true;
        };
        let function = function.trim_start_matches('<');
        if self
            .frontend_prefixes
            .iter()
            .any(|prefix| function.starts_with(prefix.as_str()))
        {
            return false;
        }
        if function.starts_with(self.internal_prefix.as_str()) {
            let module = frame.module.as_deref().unwrap_or(function);
            return module.split("::").any(|segment| segment == "tests");
        }
        true
    }

    pub fn filter(&self, frames: Vec<Frame>) -> Vec<Frame> {
        frames.into_iter().filter(|frame| self.keep(frame)).collect()
    }
}

/// Build the exception for an entry.
///
/// With a carried error, type and message come from the root of its
/// `source()` chain while the frames come from the outermost error when it
/// recorded any. Without one, the exception carries `message` and the frames
/// of the current call site. Synthesized stacks drop their `skip` most recent
/// frames. All stacks go through `policy`.
pub fn resolve(
    error: Option<&ErrorValue>,
    message: &str,
    skip: usize,
    source: &dyn FrameSource,
    policy: &FramePolicy,
) -> ExceptionRecord {
    let synthesize = || source.current_frames().into_iter().skip(skip).collect::<Vec<_>>();

    let (ty, module, value, frames) = match error {
        Some(carried) => {
            let outer: &(dyn StdError + 'static) = carried.get();
            let root = root_cause(outer);
            let full_name = if std::ptr::addr_eq(root, outer) {
                carried.type_name().to_string()
            } else if let Some(snapshot) = root.downcast_ref::<ErrorSnapshot>() {
                snapshot.type_name.clone()
            } else {
                type_name_from_debug(root)
            };
            let (module, ty) = split_type_name(&full_name);
            let frames = source.error_frames(outer).unwrap_or_else(synthesize);
            (ty, module, root.to_string(), frames)
        }
        None => (String::new(), None, message.to_string(), synthesize()),
    };

    let mut frames = policy.filter(frames);
    frames.reverse();

    ExceptionRecord {
        ty,
        value,
        module,
        stacktrace: (!frames.is_empty()).then_some(Stacktrace { frames }),
    }
}

/// Innermost error of a `source()` chain.
pub fn root_cause<'a>(error: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = error;
    while let Some(next) = current.source() {
        current = next;
    }
    current
}

/// `a::b::Type<c::D>` -> (`Some("a::b")`, `"Type<c::D>"`)
fn split_type_name(full: &str) -> (Option<String>, String) {
    let path_end = full.find('<').unwrap_or(full.len());
    match full[..path_end].rfind("::") {
        Some(idx) => (Some(full[..idx].to_string()), full[idx + 2..].to_string()),
        None => (None, full.to_string()),
    }
}

fn module_of(function: &str) -> Option<String> {
    let path = match function.strip_prefix('<') {
        Some(rest) => rest.split([' ', '>']).next().unwrap_or(rest),
        None => function,
    };
    let (module, _) = split_type_name(path);
    module
}

fn is_runtime(function: &str) -> bool {
    let function = function.trim_start_matches('<');
    ["std::", "core::", "alloc::"]
        .iter()
        .any(|prefix| function.starts_with(prefix))
}

/// An error wrapper that records the stack at the point where it was created.
///
/// The recorded frames are what the sentry adapter reports when this is the
/// outermost error of a carried chain.
pub struct TracedError {
    context: Option<String>,
    source: Box<dyn StdError + Send + Sync + 'static>,
    backtrace: Backtrace,
}

impl TracedError {
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        TracedError {
            context: None,
            source: source.into(),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    /// Wrap `source` with a context message, the way `"doing x: <cause>"`
    /// chains are usually built.
    pub fn wrap<E>(source: E, context: impl Into<String>) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        TracedError {
            context: Some(context.into()),
            source: source.into(),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    /// Stack at the point of creation, unresolved until frames are needed.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for TracedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{}: {}", context, self.source),
            None => fmt::Display::fmt(&self.source, f),
        }
    }
}

impl fmt::Debug for TracedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedError")
            .field("context", &self.context)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl StdError for TracedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}
