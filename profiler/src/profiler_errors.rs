use std::{error::Error, fmt, io};

#[derive(Debug)]
pub enum ProfilerError {
    WrongArguments(ErrWrongArguments),
    SinkUnavailable { path: String, source: io::Error },
    TraceFormat { line: usize, description: String },
    Io(io::Error),
}

#[derive(Debug)]
pub struct ErrWrongArguments {
    pub description: String,
}

impl ErrWrongArguments {
    // Accept any type that can be converted into a String
    pub fn new<D>(description: D) -> ErrWrongArguments
    where
        D: Into<String>,
    {
        ErrWrongArguments { description: description.into() }
    }
}

impl fmt::Display for ProfilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfilerError::WrongArguments(e) => write!(f, "{e}"),
            ProfilerError::SinkUnavailable { path, source } => {
                write!(f, "Failed to open report output {path}: {source}")
            }
            ProfilerError::TraceFormat { line, description } => {
                write!(f, "Invalid trace event at line {line}: {description}")
            }
            ProfilerError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl Error for ProfilerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProfilerError::WrongArguments(e) => Some(e),
            ProfilerError::SinkUnavailable { source, .. } => Some(source),
            ProfilerError::TraceFormat { .. } => None,
            ProfilerError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for ProfilerError {
    fn from(e: io::Error) -> Self {
        ProfilerError::Io(e)
    }
}

impl From<ErrWrongArguments> for ProfilerError {
    fn from(e: ErrWrongArguments) -> Self {
        ProfilerError::WrongArguments(e)
    }
}

impl fmt::Display for ErrWrongArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.description)
    }
}

impl Error for ErrWrongArguments {}
