//! Utilities for collecting diagnostics.
//!
//! Graph edits report expected failures as values rather than errors:
//! each problem becomes a [`Diagnostic`] collected into an [`IssueSet`],
//! and callers decide what to do by inspecting the set.

#![warn(missing_docs)]


use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

/// A diagnostic issue that should be reported to users.
pub trait Diagnostic: Debug + Display {
    /// Returns an optional help message that should indicate
    /// what users need to do to resolve an issue.
    fn help(&self) -> Option<Box<dyn Display>> {
        None
    }

    /// Returns the severity of this issue.
    ///
    /// The default implementation returns [`Severity::default`].
    fn severity(&self) -> Severity {
        Default::default()
    }

    /// Logs this issue through `tracing` at the level matching its severity.
    fn emit(&self) {
        let help = self.help().map(|help| help.to_string());
        match self.severity() {
            Severity::Info => tracing::info!(issue = ?self, help = ?help, "{}", self),
            Severity::Warning => tracing::warn!(issue = ?self, help = ?help, "{}", self),
            Severity::Error => tracing::error!(issue = ?self, help = ?help, "{}", self),
        }
    }
}

/// An enumeration of possible severity levels, ordered from least to most severe.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub enum Severity {
    /// An informational message.
    Info,
    /// A warning.
    #[default]
    Warning,
    /// An error. Often, but not always, fatal.
    Error,
}

impl Severity {
    /// Returns log level corresponding to this severity.
    #[inline]
    pub const fn as_tracing_level(&self) -> tracing::Level {
        match *self {
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    /// Returns `true` if the severity is [`Severity::Error`].
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(*self, Self::Error)
    }

    #[inline]
    const fn index(&self) -> usize {
        match *self {
            Self::Info => 0,
            Self::Warning => 1,
            Self::Error => 2,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A collection of issues, in the order they were reported.
#[derive(Debug, Clone)]
pub struct IssueSet<T> {
    issues: Vec<T>,
    /// Issue counts indexed by [`Severity::index`].
    counts: [usize; 3],
}

impl<T> IssueSet<T> {
    /// Creates a new, empty issue set.
    #[inline]
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            counts: [0; 3],
        }
    }

    /// Returns an iterator over all issues in the set.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.issues.iter()
    }

    /// The number of issues in this issue set.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if this issue set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl<T: Diagnostic> IssueSet<T> {
    /// Adds the given issue to the issue set.
    #[inline]
    pub fn add(&mut self, issue: T) {
        self.counts[issue.severity().index()] += 1;
        self.issues.push(issue);
    }

    /// Logs the given issue, then adds it to the issue set.
    pub fn add_and_emit(&mut self, issue: T) {
        issue.emit();
        self.add(issue);
    }

    /// Moves every issue of `other` into this set.
    pub fn merge(&mut self, other: IssueSet<T>) {
        for issue in other {
            self.add(issue);
        }
    }

    /// Returns `true` if this issue set contains an error.
    ///
    /// Errors are determined by [`Diagnostic`]s with a
    /// [severity](Diagnostic::severity) of [`Severity::Error`].
    pub fn has_error(&self) -> bool {
        self.num_errors() > 0
    }

    /// The number of errors in this issue set.
    #[inline]
    pub fn num_errors(&self) -> usize {
        self.counts[Severity::Error.index()]
    }

    /// Returns `true` if this issue set contains a warning.
    pub fn has_warning(&self) -> bool {
        self.num_warnings() > 0
    }

    /// The number of warnings in this issue set.
    #[inline]
    pub fn num_warnings(&self) -> usize {
        self.counts[Severity::Warning.index()]
    }

    /// The most severe level present, if any issue was reported.
    pub fn worst(&self) -> Option<Severity> {
        [Severity::Error, Severity::Warning, Severity::Info]
            .into_iter()
            .find(|s| self.counts[s.index()] > 0)
    }

    /// Iterates over the issues with the given severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &T> {
        self.issues
            .iter()
            .filter(move |issue| issue.severity() == severity)
    }
}

impl<T> IntoIterator for IssueSet<T> {
    type Item = T;
    type IntoIter = <std::vec::Vec<T> as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<T: Diagnostic> Extend<T> for IssueSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for issue in iter {
            self.add(issue);
        }
    }
}

impl<T: Diagnostic> FromIterator<T> for IssueSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Diagnostic> Display for IssueSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in self.issues.iter() {
            writeln!(f, "{}: {}", issue.severity(), issue)?;
        }
        Ok(())
    }
}
