//! Common definitions shared across every phase of the pipeline.

// Use sorted sets and maps so that linker placement order (and therefore
// the final image) is deterministic and reproducible.
pub use std::collections::{BTreeMap as Map, BTreeSet as Set};

use std::fmt;

/// Interned identifiers. Comparison and hashing are pointer-equality on the
/// interned string, matching the source's `Ident::Unique` table.
pub type Id = internment::Intern<String>;

/// Build an [`Id`] from anything string-like.
pub fn id(s: impl Into<String>) -> Id {
    internment::Intern::new(s.into())
}

/// Source origin carried by every IR instruction and diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub file: Id,
    pub line: u32,
}

impl Location {
    pub fn new(file: Id, line: u32) -> Self {
        Location { file, line }
    }

    /// A placeholder location for synthetic instructions introduced by the
    /// optimizer or code generator (no direct source origin).
    pub fn synthetic() -> Self {
        Location {
            file: id("<generated>"),
            line: 0,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// The category of a diagnostic, per spec section 7.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagKind {
    FileNotFound,
    RuntimeCode,
    ExecutionFailed,
    Parse,
    Lex,
    Semantic,
    Link,
}

/// A single diagnostic message.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub location: Location,
    pub kind: DiagKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}: {}", self.location, self.kind, self.message)
    }
}

/// The process-wide diagnostic sink (spec section 5): a monotonic counter
/// plus a list. Any component may append; the driver consults the error
/// count between phases to decide whether to continue.
#[derive(Default, Debug)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, location: Location, kind: DiagKind, message: impl Into<String>) {
        tracing::warn!(%location, ?kind, "diagnostic");
        self.error_count += 1;
        self.messages.push(Diagnostic {
            location,
            kind,
            message: message.into(),
        });
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }
}

/// The shared compilation context threaded through every phase: the
/// identifier interner is modeled implicitly by [`Id`] (a process-wide
/// table via `internment`), so the context only needs to carry the
/// diagnostic sink.
#[derive(Default, Debug)]
pub struct CompileContext {
    pub diags: Diagnostics,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// An index into the linker's object arena. Kept as a plain index (rather
/// than a pointer/reference) so that IR operands, native-code relocations
/// and linker references can all name an object without owning it — see
/// design notes on cyclic reference graphs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

