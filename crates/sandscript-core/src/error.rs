//! Error types for every stratum of script processing.
//!
//! ## Layout
//!
//! ```text
//! SandscriptError (top-level wrapper)
//! ├── WhitelistError   - catalog construction (fatal, host startup)
//! ├── CompilationError - per-script semantic analysis and decoration
//! └── ScriptException  - normalized execution failure seen by the host
//! ```
//!
//! [`ScriptFault`] is the internal execution taxonomy. It never crosses the
//! sandbox boundary of a decorated script: the sandboxing pass converts every
//! fault into a [`ScriptException`].

use std::fmt;

use thiserror::Error;

use crate::Span;

// ============================================================================
// Catalog Errors
// ============================================================================

/// A catalog construction failure, tagged with the whitelist it came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("whitelist [{origin}]: {kind}")]
pub struct WhitelistError {
    /// Source identity of the offending whitelist (file path, module name, ...).
    pub origin: String,
    /// What went wrong.
    pub kind: WhitelistErrorKind,
}

impl WhitelistError {
    pub fn new(origin: impl Into<String>, kind: WhitelistErrorKind) -> Self {
        Self {
            origin: origin.into(),
            kind,
        }
    }
}

/// Categories of catalog construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WhitelistErrorKind {
    /// A host or script name does not follow the dotted identifier syntax.
    #[error("invalid type name '{0}'")]
    InvalidName(String),

    /// A host type tried to claim a built-in name.
    #[error("type name '{0}' is reserved")]
    ReservedName(String),

    /// Two host types want the same script name.
    #[error("script name '{name}' is already used by host type '{existing}', cannot assign it to '{host}'")]
    DuplicateScriptName {
        name: String,
        existing: String,
        host: String,
    },

    /// A descriptor references a type that was never registered.
    #[error("unknown type '{name}' referenced by {context}")]
    UnknownType { name: String, context: String },

    /// A member was registered twice with different signatures.
    #[error("{kind} '{owner}.{key}' registered again with an incompatible signature")]
    IncompatibleMember {
        owner: String,
        key: String,
        kind: &'static str,
    },

    /// A type marked functional does not have exactly one qualifying method.
    #[error("type '{name}' is marked functional but declares {found} qualifying abstract methods")]
    NotFunctional { name: String, found: usize },

    /// Whitelisted types inherit from each other in a cycle.
    #[error("inheritance cycle through '{0}'")]
    InheritanceCycle(String),

    /// A type extends something it cannot extend.
    #[error("'{name}' cannot extend '{parent}': {reason}")]
    InvalidParent {
        name: String,
        parent: String,
        reason: &'static str,
    },

    /// The descriptor itself could not be read.
    #[error("malformed descriptor: {0}")]
    Malformed(String),
}

// ============================================================================
// Compile-time failures
// ============================================================================

/// Semantic analysis and decoration errors for a single script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    /// A type name does not resolve against the catalog.
    #[error("at {span}: unknown type '{name}'")]
    UnknownType { name: String, span: Span },

    /// No legal conversion between two types.
    #[error("at {span}: cannot cast from [{from}] to [{to}]")]
    NoSuchCast {
        from: String,
        to: String,
        span: Span,
    },

    /// No method with the requested (name, arity).
    #[error(
        "at {span}: unknown {kind} method [{owner}, {name}/{arity}]{}",
        fmt_candidates(candidates)
    )]
    NoSuchMethod {
        owner: String,
        name: String,
        arity: usize,
        kind: &'static str,
        candidates: Vec<String>,
        span: Span,
    },

    /// No constructor with the requested arity.
    #[error(
        "at {span}: unknown constructor [{owner}, <init>/{arity}]{}",
        fmt_candidates(candidates)
    )]
    NoSuchConstructor {
        owner: String,
        arity: usize,
        candidates: Vec<String>,
        span: Span,
    },

    /// No field with the requested name.
    #[error("at {span}: unknown {kind} field [{owner}, {name}]")]
    NoSuchField {
        owner: String,
        name: String,
        kind: &'static str,
        span: Span,
    },

    /// No script-local function with the requested (name, arity).
    #[error("at {span}: unknown function [{name}/{arity}]")]
    UnknownFunction {
        name: String,
        arity: usize,
        span: Span,
    },

    /// An argument cannot be converted to its parameter type.
    #[error("at {span}: argument {index} of [{call}] expects [{expected}] but found [{found}]")]
    ArgumentMismatch {
        call: String,
        index: usize,
        expected: String,
        found: String,
        span: Span,
    },

    /// Target type of a lambda or function reference is not a functional interface.
    #[error("at {span}: cannot convert function reference [{syntax}] to a non-functional interface [{target}]")]
    NotFunctional {
        syntax: String,
        target: String,
        span: Span,
    },

    /// A function reference could not be bound.
    #[error(
        "at {span}: function reference [{syntax}] matching [{target}, {method}/{arity}] not found{}",
        fmt_reason(reason)
    )]
    FunctionReference {
        syntax: String,
        target: String,
        method: String,
        arity: usize,
        reason: Option<String>,
        span: Span,
    },

    /// The IR builder did not produce the script entry function.
    #[error("internal error: entry function '{name}' not found in script class '{class}'")]
    MissingEntryFunction { name: String, class: String },

    /// Any other contract violation between the IR builder and this core.
    #[error("internal error: {message}")]
    Internal { message: String },
}

fn fmt_candidates(candidates: &[String]) -> String {
    if candidates.is_empty() {
        String::new()
    } else {
        format!("; candidates: {}", candidates.join(", "))
    }
}

fn fmt_reason(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

impl CompilationError {
    /// Source location, when the error is attributable to script source.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompilationError::UnknownType { span, .. }
            | CompilationError::NoSuchCast { span, .. }
            | CompilationError::NoSuchMethod { span, .. }
            | CompilationError::NoSuchConstructor { span, .. }
            | CompilationError::NoSuchField { span, .. }
            | CompilationError::UnknownFunction { span, .. }
            | CompilationError::ArgumentMismatch { span, .. }
            | CompilationError::NotFunctional { span, .. }
            | CompilationError::FunctionReference { span, .. } => Some(*span),
            CompilationError::MissingEntryFunction { .. } | CompilationError::Internal { .. } => {
                None
            }
        }
    }

    /// Whether this error signals an IR-builder contract violation rather than
    /// a mistake in the user's script.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CompilationError::MissingEntryFunction { .. } | CompilationError::Internal { .. }
        )
    }
}

// ============================================================================
// Execution Faults
// ============================================================================

/// Catch-clause categories used by the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCategory {
    /// Structured failures carrying diagnostic headers.
    Explainable,
    /// Script-level failures that must not be recovered from inside the script.
    Unrecoverable,
    /// Loop-counter or recursion bounds exceeded.
    ResourceExhausted,
    /// Anything else.
    Any,
}

impl FaultCategory {
    /// Order in which the sandbox emits catch clauses; `Any` must be last.
    pub const SANDBOX_ORDER: [FaultCategory; 4] = [
        FaultCategory::Explainable,
        FaultCategory::Unrecoverable,
        FaultCategory::ResourceExhausted,
        FaultCategory::Any,
    ];

    /// Whether a clause of this category catches `fault`.
    pub fn catches(self, fault: &ScriptFault) -> bool {
        match self {
            FaultCategory::Any => true,
            category => fault.category() == category,
        }
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultCategory::Explainable => "explainable",
            FaultCategory::Unrecoverable => "unrecoverable",
            FaultCategory::ResourceExhausted => "resource exhausted",
            FaultCategory::Any => "any",
        })
    }
}

/// Kinds of ordinary runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFaultKind {
    Arithmetic,
    NullPointer,
    ClassCast,
    IllegalArgument,
    UnsupportedOperation,
}

impl fmt::Display for RuntimeFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuntimeFaultKind::Arithmetic => "arithmetic",
            RuntimeFaultKind::NullPointer => "null pointer",
            RuntimeFaultKind::ClassCast => "class cast",
            RuntimeFaultKind::IllegalArgument => "illegal argument",
            RuntimeFaultKind::UnsupportedOperation => "unsupported operation",
        })
    }
}

/// A failure raised while a script executes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptFault {
    /// Structured failure with diagnostic headers.
    #[error("{message}")]
    Explainable {
        message: String,
        headers: Vec<(String, Vec<String>)>,
    },

    /// A failure the script must not catch and continue from.
    #[error("{message}")]
    Unrecoverable { message: String },

    /// An execution bound was exceeded.
    #[error("{message}")]
    ResourceExhausted { message: String },

    /// Any other runtime failure.
    #[error("{kind}: {message}")]
    Runtime {
        kind: RuntimeFaultKind,
        message: String,
    },
}

impl ScriptFault {
    pub fn unrecoverable(message: impl Into<String>) -> Self {
        ScriptFault::Unrecoverable {
            message: message.into(),
        }
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        ScriptFault::ResourceExhausted {
            message: message.into(),
        }
    }

    pub fn runtime(kind: RuntimeFaultKind, message: impl Into<String>) -> Self {
        ScriptFault::Runtime {
            kind,
            message: message.into(),
        }
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeFaultKind::Arithmetic, message)
    }

    pub fn null_pointer(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeFaultKind::NullPointer, message)
    }

    pub fn class_cast(from: &str, to: &str) -> Self {
        Self::runtime(
            RuntimeFaultKind::ClassCast,
            format!("cannot cast [{from}] to [{to}]"),
        )
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeFaultKind::IllegalArgument, message)
    }

    /// The sandbox category this fault is caught by.
    pub fn category(&self) -> FaultCategory {
        match self {
            ScriptFault::Explainable { .. } => FaultCategory::Explainable,
            ScriptFault::Unrecoverable { .. } => FaultCategory::Unrecoverable,
            ScriptFault::ResourceExhausted { .. } => FaultCategory::ResourceExhausted,
            ScriptFault::Runtime { .. } => FaultCategory::Any,
        }
    }

    /// Diagnostic headers, for explainable faults.
    pub fn headers(&self) -> &[(String, Vec<String>)] {
        match self {
            ScriptFault::Explainable { headers, .. } => headers,
            _ => &[],
        }
    }
}

/// Where in the script a fault was attributed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptPosition {
    /// Offset of the faulting statement.
    pub offset: u32,
    /// Start of the enclosing statement range.
    pub start: u32,
    /// End of the enclosing statement range (exclusive).
    pub end: u32,
}

/// The single host-visible execution failure of a sandboxed script.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("script [{script_name}] failed{}: {message}", fmt_position(position))]
pub struct ScriptException {
    pub script_name: String,
    pub message: String,
    /// Statement range the fault was attributed to.
    pub position: Option<ScriptPosition>,
    /// Source text of the faulting statement range.
    pub snippet: Option<String>,
    /// Diagnostic headers carried over from explainable faults.
    pub headers: Vec<(String, Vec<String>)>,
    #[source]
    pub cause: ScriptFault,
}

fn fmt_position(position: &Option<ScriptPosition>) -> String {
    position
        .as_ref()
        .map(|p| format!(" at offset {}", p.offset))
        .unwrap_or_default()
}

// ============================================================================
// Unified Error
// ============================================================================

/// Unified error type across all strata.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SandscriptError {
    #[error(transparent)]
    Whitelist(#[from] WhitelistError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error(transparent)]
    Script(#[from] ScriptException),
}

impl SandscriptError {
    pub fn is_whitelist(&self) -> bool {
        matches!(self, SandscriptError::Whitelist(_))
    }

    pub fn is_compilation(&self) -> bool {
        matches!(self, SandscriptError::Compilation(_))
    }

    pub fn is_script(&self) -> bool {
        matches!(self, SandscriptError::Script(_))
    }
}
