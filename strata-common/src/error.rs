// Copyright 2026 strata Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    backtrace::{Backtrace, BacktraceStatus},
    fmt::{Debug, Display},
    sync::Arc,
};

/// ErrorKind is all kinds of Error of strata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid argument given by the caller.
    InvalidArgument,
    /// Index or position out of range.
    OutOfRange,
    /// I/O error raised by a storage backend.
    Io,
    /// Serialization or deserialization error raised by a storage backend.
    Serde,
    /// External error.
    External,
}

impl ErrorKind {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        self.into()
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

impl From<ErrorKind> for &'static str {
    fn from(v: ErrorKind) -> &'static str {
        match v {
            ErrorKind::InvalidArgument => "Invalid argument",
            ErrorKind::OutOfRange => "Out of range",
            ErrorKind::Io => "I/O error",
            ErrorKind::Serde => "Serde error",
            ErrorKind::External => "External error",
        }
    }
}

/// Error is the error struct returned by all strata functions.
///
/// `Display` prints a single line:
///
/// ```shell
/// Out of range, context: { index: 3, tiers: 2 } => tier index out of range
/// ```
///
/// `Debug` prints the same line, followed by the source chain and the backtrace if one was captured.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,

    context: Vec<(&'static str, String)>,

    source: Option<Arc<anyhow::Error>>,
    backtrace: Option<Arc<Backtrace>>,
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{self}")?;
        if let Some(source) = &self.source {
            for (depth, cause) in source.chain().enumerate().skip(1) {
                writeln!(f, "  caused by ({depth}): {cause}")?;
            }
        }
        if let Some(backtrace) = self.backtrace.as_ref().filter(|b| b.status() == BacktraceStatus::Captured) {
            writeln!(f, "backtrace:\n{backtrace}")?;
        }
        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.context.is_empty() {
            let context = self.context.iter().map(|(k, v)| format!("{k}: {v}")).collect::<Vec<_>>();
            write!(f, ", context: {{ {} }}", context.join(", "))?;
        }
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref().as_ref())
    }
}

impl Error {
    /// Create a new error.
    ///
    /// A source error can be attached with [`Error::with_source`].
    ///
    /// ```rust
    /// # use strata_common::error::{Error, ErrorKind};
    /// let io_error = std::io::Error::other("disk is on fire");
    /// Error::new(ErrorKind::Io, "write entry file failed").with_source(io_error);
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: vec![],
            source: None,
            backtrace: Some(Arc::new(Backtrace::capture())),
        }
    }

    /// Attach a key-value pair describing where the error happened.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Attach the source error. Setting the source twice panics in debug builds.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(Arc::new(source.into()));
        self
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Downcast the source error to a concrete error type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
    }
}

/// Result type for strata.
pub type Result<T> = std::result::Result<T, Error>;

/// Helper methods for Error.
impl Error {
    /// Helper for creating an [`ErrorKind::OutOfRange`] error for a tier index.
    pub fn tier_out_of_range(index: usize, tiers: usize) -> Self {
        Error::new(ErrorKind::OutOfRange, "tier index out of range")
            .with_context("index", index)
            .with_context("tiers", tiers)
    }

    /// Helper for creating an [`ErrorKind::InvalidArgument`] error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, message)
    }

    /// Helper for creating an [`ErrorKind::Io`] error from [`std::io::Error`].
    pub fn io_error(source: std::io::Error) -> Self {
        Error::new(ErrorKind::Io, "storage I/O error").with_source(source)
    }

    /// Helper for creating an error from [`bincode::Error`].
    pub fn bincode_error(source: bincode::Error) -> Self {
        match *source {
            bincode::ErrorKind::Io(e) => Self::io_error(e),
            kind => Error::new(ErrorKind::Serde, "coding error").with_source(Box::new(kind)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::io_error(e)
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Self::bincode_error(e)
    }
}
