//! Runtime error taxonomy and result types.
//!
//! User-level exceptions ([`SimpleException`]) and internal invariant
//! violations ([`InternalError`]) travel through the same [`RunError`]
//! carrier but never convert into each other: an internal error (unknown
//! opcode, slot signature mismatch) is not catchable as, and cannot be
//! mistaken for, a user-level exception.

use std::fmt::{self, Display};

use strum::{Display as StrumDisplay, EnumString, IntoStaticStr};

use crate::value::Value;

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Exception types raised by the runtime core.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and
/// `Into<&'static str>` implementations. The string representation matches
/// the variant name exactly (e.g. `ValueError` -> "ValueError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum ExcType {
    /// Primary exception class - matches any exception in subclass checks.
    Exception,

    // --- ArithmeticError hierarchy ---
    /// Intermediate class for arithmetic errors.
    ArithmeticError,
    /// Subclass of ArithmeticError.
    OverflowError,
    /// Subclass of ArithmeticError.
    ZeroDivisionError,

    // --- LookupError hierarchy ---
    /// Intermediate class for lookup errors.
    LookupError,
    /// Subclass of LookupError.
    IndexError,
    /// Subclass of LookupError. Carries the missing key as payload.
    KeyError,

    // --- RuntimeError hierarchy ---
    /// Intermediate class for runtime errors.
    RuntimeError,
    /// Subclass of RuntimeError, raised by the frame-depth guard.
    RecursionError,

    // --- NameError hierarchy ---
    NameError,
    /// Subclass of NameError - for accessing a local variable before assignment.
    UnboundLocalError,

    // --- Standalone exception types ---
    AttributeError,
    MemoryError,
    StopIteration,
    TypeError,
    ValueError,
}

impl ExcType {
    /// Checks if this exception type is a subclass of another exception type.
    ///
    /// Implements the hierarchy needed for propagation decisions:
    /// - `Exception` is the base class for all variants here
    /// - `LookupError` is the base for `KeyError` and `IndexError`
    /// - `ArithmeticError` is the base for `ZeroDivisionError` and `OverflowError`
    /// - `RuntimeError` is the base for `RecursionError`
    /// - `NameError` is the base for `UnboundLocalError`
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        if self == handler_type {
            return true;
        }
        match handler_type {
            Self::Exception => true,
            Self::LookupError => matches!(self, Self::KeyError | Self::IndexError),
            Self::ArithmeticError => matches!(self, Self::ZeroDivisionError | Self::OverflowError),
            Self::RuntimeError => matches!(self, Self::RecursionError),
            Self::NameError => matches!(self, Self::UnboundLocalError),
            _ => false,
        }
    }

    /// Creates a TypeError with the given message.
    pub(crate) fn type_error(msg: impl Into<String>) -> RunError {
        SimpleException::new_msg(Self::TypeError, msg.into()).into()
    }

    /// Creates a ValueError with the given message.
    pub(crate) fn value_error(msg: impl Into<String>) -> RunError {
        SimpleException::new_msg(Self::ValueError, msg.into()).into()
    }

    /// Creates an IndexError with the given message.
    pub(crate) fn index_error(msg: impl Into<String>) -> RunError {
        SimpleException::new_msg(Self::IndexError, msg.into()).into()
    }

    /// Creates an OverflowError with the given message.
    pub(crate) fn overflow_error(msg: impl Into<String>) -> RunError {
        SimpleException::new_msg(Self::OverflowError, msg.into()).into()
    }

    /// Creates a ZeroDivisionError with the given message.
    pub(crate) fn zero_division(msg: impl Into<String>) -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, msg.into()).into()
    }

    /// Creates a KeyError carrying the missing key as payload.
    ///
    /// The message is the repr of the key; the payload preserves the key
    /// value itself for callers that want it.
    pub(crate) fn key_error(key_repr: String, key: Value) -> RunError {
        RunError::Exc(SimpleException {
            exc_type: Self::KeyError,
            message: Some(key_repr),
            payload: Some(key),
        })
    }

    /// Creates a NameError for an unbound identifier.
    pub(crate) fn name_error(name: &str) -> RunError {
        SimpleException::new_msg(Self::NameError, format!("name '{name}' is not defined")).into()
    }

    /// Creates an UnboundLocalError for a fast local read before assignment.
    pub(crate) fn unbound_local(name: &str) -> RunError {
        SimpleException::new_msg(
            Self::UnboundLocalError,
            format!("local variable '{name}' referenced before assignment"),
        )
        .into()
    }

    /// Creates an AttributeError for a missing attribute.
    pub(crate) fn no_attribute(type_name: &str, attr: &str) -> RunError {
        SimpleException::new_msg(
            Self::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
        .into()
    }

    /// Creates a TypeError for a binary operator with unsupported operands.
    pub(crate) fn binary_type_error(symbol: &str, left_type: &str, right_type: &str) -> RunError {
        Self::type_error(format!(
            "unsupported operand type(s) for {symbol}: '{left_type}' and '{right_type}'"
        ))
    }

    /// Creates a TypeError for a unary operator with an unsupported operand.
    pub(crate) fn unary_type_error(op: &str, type_name: &str) -> RunError {
        Self::type_error(format!("bad operand type for {op}: '{type_name}'"))
    }

    /// Creates a TypeError for an unsupported rich comparison.
    pub(crate) fn comparison_type_error(symbol: &str, left_type: &str, right_type: &str) -> RunError {
        Self::type_error(format!(
            "'{symbol}' not supported between instances of '{left_type}' and '{right_type}'"
        ))
    }

    /// Creates a TypeError for calling a non-callable value.
    pub(crate) fn not_callable(type_name: &str) -> RunError {
        Self::type_error(format!("'{type_name}' object is not callable"))
    }

    /// Creates a RecursionError for the frame-depth guard.
    pub(crate) fn recursion_error() -> RunError {
        SimpleException::new_msg(Self::RecursionError, "maximum recursion depth exceeded").into()
    }

    /// Creates a StopIteration signal for iterator exhaustion.
    pub(crate) fn stop_iteration() -> RunError {
        RunError::Exc(SimpleException {
            exc_type: Self::StopIteration,
            message: None,
            payload: None,
        })
    }
}

/// A user-level exception: type, formatted message, optional payload.
///
/// The payload carries a value for the select kinds that attach one
/// (`KeyError` keeps the missing key).
#[derive(Debug, Clone)]
pub struct SimpleException {
    pub exc_type: ExcType,
    pub message: Option<String>,
    pub payload: Option<Value>,
}

impl SimpleException {
    /// Creates an exception with a message and no payload.
    pub(crate) fn new_msg(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            message: Some(message.into()),
            payload: None,
        }
    }
}

impl Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.exc_type, msg),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

/// A runtime invariant violation.
///
/// Raised for conditions that indicate a bug in the runtime or its embedder
/// (unrecognized opcode, slot signature mismatch, malformed operand), never
/// for errors in the emulated program. Deliberately not constructible from,
/// or convertible to, [`SimpleException`].
#[derive(Debug, Clone)]
pub struct InternalError {
    pub message: String,
}

impl Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal error: {}", self.message)
    }
}

/// Carrier for both error channels.
#[derive(Debug, Clone)]
pub enum RunError {
    /// A user-level exception propagating through the emulated call chain.
    Exc(SimpleException),
    /// A runtime invariant violation; aborts evaluation unconditionally.
    Internal(InternalError),
}

impl RunError {
    /// Creates an internal error.
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal(InternalError {
            message: message.into(),
        })
    }

    /// Returns the user-level exception type, or `None` for internal errors.
    #[must_use]
    pub fn exc_type(&self) -> Option<ExcType> {
        match self {
            Self::Exc(exc) => Some(exc.exc_type),
            Self::Internal(_) => None,
        }
    }

    /// Returns true if this is a user-level exception of the given type
    /// (exact, not subclass).
    #[must_use]
    pub fn is_exc(&self, exc_type: ExcType) -> bool {
        self.exc_type() == Some(exc_type)
    }
}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Exc(exc)
    }
}

impl Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exc(exc) => exc.fmt(f),
            Self::Internal(err) => err.fmt(f),
        }
    }
}
