use std::fmt;
use std::path::{Path, PathBuf};

/// What went wrong, independent of where it happened. Callers branch on the
/// kind: `Transport` may be worth retrying by an outer policy, the rest are
/// not.
#[derive(Debug)]
pub enum ErrorKind {
    /// A declared local path could not be opened or read.
    FileAccess { path: PathBuf, detail: String },
    /// The request never produced an HTTP status: connection failure,
    /// timeout, or a response body that could not be decoded.
    Transport(String),
    /// The service answered with a non-success status. The body is kept
    /// verbatim for diagnostics.
    RemoteService { status: u16, body: String },
    /// Metadata construction failed. Valid inputs never produce this.
    Encoding(String),
    /// Configuration or host-side failure.
    Msg(String),
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    context: Vec<String>,
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: Vec::new(),
        }
    }

    pub fn msg<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Msg(msg.into()))
    }

    pub fn file_access(path: &Path, detail: impl fmt::Display) -> Self {
        Self::new(ErrorKind::FileAccess {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        })
    }

    pub fn transport(detail: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Transport(detail.to_string()))
    }

    pub fn remote_service(status: u16, body: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteService {
            status,
            body: body.into(),
        })
    }

    pub fn encoding(detail: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Encoding(detail.to_string()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Prepend caller context (which pin, which operation) to the displayed
    /// message. The kind, and with it the status/body payload, is untouched.
    pub fn context(mut self, ctx: impl Into<String>) -> Self {
        self.context.insert(0, ctx.into());
        self
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            ErrorKind::RemoteService { status, .. } => Some(status),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::FileAccess { path, detail } => {
                write!(f, "cannot read {}: {}", path.display(), detail)
            }
            ErrorKind::Transport(detail) => write!(f, "transport error: {detail}"),
            ErrorKind::RemoteService { status, body } => {
                write!(f, "status: {status}, body: {body}")
            }
            ErrorKind::Encoding(detail) => write!(f, "encoding error: {detail}"),
            ErrorKind::Msg(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ctx in &self.context {
            write!(f, "{ctx}: ")?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
