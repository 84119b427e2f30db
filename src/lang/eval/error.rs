use std::fmt;

use crate::lang::ast::{ChildOutOfRange, InputPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum EvalErrorKind {
    #[display(fmt = "unsupported operation")]
    UnsupportedOperation,
    #[display(fmt = "invalid usage")]
    InvalidUsage,
    #[display(fmt = "array reference error")]
    ArrayReference,
    #[display(fmt = "table reference error")]
    TableReference,
    #[display(fmt = "abstract construction")]
    AbstractConstruction,
    #[display(fmt = "duplicate definition")]
    DuplicateDefinition,
    #[display(fmt = "uninitialized object")]
    UninitializedObject,
    #[display(fmt = "unknown definition")]
    UnknownDefinition,
    #[display(fmt = "recursion limit")]
    RecursionLimit,
    #[display(fmt = "internal error")]
    Internal,
}

/// Represents a construction frame recorded in an error
#[derive(Debug, Clone)]
pub struct EvalFrame {
    pub definition: String,
    pub line: u32,
}

impl fmt::Display for EvalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", &self.definition, self.line)
    }
}

/// Represents an error that occurred during evaluation or while maintaining
/// the definition table. Additionally may display the construction stack at
/// the moment the error was raised.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub(crate) kind: EvalErrorKind,
    pub(crate) message: String,
    pub(crate) position: Option<InputPosition>,
    pub(crate) frames: Vec<EvalFrame>,
}

impl EvalError {
    pub(crate) fn new<S: Into<String>>(kind: EvalErrorKind, message: S) -> Self {
        EvalError { kind, message: message.into(), position: None, frames: Vec::new() }
    }

    pub(crate) fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::new(EvalErrorKind::UnsupportedOperation, message)
    }

    pub(crate) fn usage<S: Into<String>>(message: S) -> Self {
        Self::new(EvalErrorKind::InvalidUsage, message)
    }

    pub(crate) fn with_position(mut self, position: InputPosition) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }

    pub(crate) fn with_frames(mut self, frames: Vec<EvalFrame>) -> Self {
        if self.frames.is_empty() {
            self.frames = frames;
        }
        self
    }

    pub fn kind(&self) -> EvalErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn position(&self) -> Option<InputPosition> {
        self.position
    }

    pub fn frames(&self) -> &[EvalFrame] {
        &self.frames
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "{} at {}: {}", self.kind, position, self.message)?,
            None => write!(f, "{}: {}", self.kind, self.message)?,
        }

        if !self.frames.is_empty() {
            writeln!(f)?;
            writeln!(f, " +-  Construction stack:")?;
            for frame in self.frames.iter().rev() {
                writeln!(f, " | {}", frame)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for EvalError {}

impl From<ChildOutOfRange> for EvalError {
    fn from(err: ChildOutOfRange) -> Self {
        EvalError::new(EvalErrorKind::Internal, format!("malformed tree: {}", err))
    }
}

/// Recoverable control transfer. Not a defect: it travels outwards until a
/// handler bound to its target claims it, or becomes the terminal outcome of
/// the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirection {
    Continue { target: String },
    Redirect { target: String },
    Exit { status: Option<i32> },
}

impl Redirection {
    pub fn target(&self) -> Option<&str> {
        match self {
            Redirection::Continue { target } | Redirection::Redirect { target } => Some(target),
            Redirection::Exit { .. } => None,
        }
    }
}

impl fmt::Display for Redirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Redirection::Continue { target } => write!(f, "continue to '{}'", target),
            Redirection::Redirect { target } => write!(f, "redirect to '{}'", target),
            Redirection::Exit { status: Some(status) } => write!(f, "exit with status {}", status),
            Redirection::Exit { status: None } => write!(f, "exit"),
        }
    }
}

/// Anything that aborts the normal evaluation of a construction.
#[derive(Debug, Clone, derive_more::From)]
pub enum Unwind {
    Signal(Redirection),
    Error(EvalError),
}

impl Unwind {
    pub(crate) fn map_error<F: FnOnce(EvalError) -> EvalError>(self, f: F) -> Unwind {
        match self {
            Unwind::Error(error) => Unwind::Error(f(error)),
            signal => signal,
        }
    }
}

pub type EvalResult = Result<super::value::Value, Unwind>;
