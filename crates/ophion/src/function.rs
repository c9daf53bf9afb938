//! Function objects.
//!
//! A function pairs a code object with the global namespace captured at
//! definition time, plus optional defaults, keyword defaults, and closure.
//! Defaults and the closure are immutable in place: the runtime setters
//! replace them wholesale after validating shape, mirroring explicit
//! attribute assignment in the emulated language.

use std::sync::Arc;

use crate::{
    code::CodeObject,
    heap::HeapId,
    intern::StringId,
    namespace::NamespaceId,
    value::Value,
};

/// A function defined over a code object.
#[derive(Debug, Clone)]
pub(crate) struct Function {
    pub code: Arc<CodeObject>,
    /// The global namespace the function was defined in.
    pub globals: NamespaceId,
    /// Default values for trailing positional parameters, right-aligned.
    pub defaults: Option<Vec<Value>>,
    /// Defaults for keyword-only parameters.
    pub kwdefaults: Option<Vec<(StringId, Value)>>,
    /// Cells for free variables, in `code.freevars` order.
    pub closure: Option<Vec<HeapId>>,
    pub qualname: StringId,
}

impl Function {
    pub fn new(code: Arc<CodeObject>, globals: NamespaceId) -> Self {
        let qualname = code.qualname;
        Self {
            code,
            globals,
            defaults: None,
            kwdefaults: None,
            closure: None,
            qualname,
        }
    }
}
