//! Shared vocabulary for everything that inspects an object instead of mutating it:
//! the inventory validators ([`inventory`]) and the on-disk object validator
//! ([`object`]). Both report deviations as [`Issue`]s rather than raising, per the
//! control-flow-exceptions-vs-tolerant-validation split the commit path does not
//! follow.

pub mod inventory;
pub mod object;

use std::fmt;

use strum_macros::Display as EnumDisplay;

/// How serious a reported deviation is. `Info` never fails a caller's "is this
/// object valid" check; `Warning` doesn't either, but is surfaced; `Error` does.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// The catalogue of codes the object validator can emit, taken from the OCFL
/// validation code registry. Not every code in the registry is implemented; the
/// ones below are the ones this validator's checks actually raise.
#[derive(Debug, Copy, Clone, Eq, PartialEq, EnumDisplay)]
pub enum IssueCode {
    E003,
    E007,
    E025,
    E033,
    E034,
    E037,
    E041,
    E049,
    E058,
    E060,
    E061,
    E063,
    E064,
    E066,
    E067,
    E069,
    E092,
    W001,
    W009,
    W013,
}

/// A single validator finding.
#[derive(Debug, Clone)]
pub struct Issue {
    pub severity: Severity,
    pub code: IssueCode,
    /// The version the issue pertains to, or `None` for an object-wide issue.
    pub version_num: Option<String>,
    pub message: String,
}

impl Issue {
    pub fn new(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            version_num: None,
            message: message.into(),
        }
    }

    pub fn for_version(
        severity: Severity,
        code: IssueCode,
        version_num: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code,
            version_num: Some(version_num.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_num {
            Some(version) => write!(f, "[{}] {} ({}): {}", self.code, version, self.severity, self.message),
            None => write!(f, "[{}] ({}): {}", self.code, self.severity, self.message),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "Error"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Info => write!(f, "Info"),
        }
    }
}

/// Aggregates every issue raised while validating one object. Never short-circuits:
/// a check appends whatever it finds and validation continues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResults {
    pub object_id: Option<String>,
    issues: Vec<Issue>,
}

impl ValidationResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(object_id: impl Into<String>) -> Self {
        Self {
            object_id: Some(object_id.into()),
            issues: Vec::new(),
        }
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn error(&mut self, code: IssueCode, message: impl Into<String>) {
        self.push(Issue::new(Severity::Error, code, message));
    }

    pub fn warn(&mut self, code: IssueCode, message: impl Into<String>) {
        self.push(Issue::new(Severity::Warning, code, message));
    }

    pub fn info(&mut self, code: IssueCode, message: impl Into<String>) {
        self.push(Issue::new(Severity::Info, code, message));
    }

    pub fn error_version(
        &mut self,
        version_num: impl Into<String>,
        code: IssueCode,
        message: impl Into<String>,
    ) {
        self.push(Issue::for_version(Severity::Error, code, version_num, message));
    }

    pub fn warn_version(
        &mut self,
        version_num: impl Into<String>,
        code: IssueCode,
        message: impl Into<String>,
    ) {
        self.push(Issue::for_version(Severity::Warning, code, version_num, message));
    }

    pub fn append(&mut self, other: ValidationResults) {
        self.issues.extend(other.issues);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn infos(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Info)
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }
}
