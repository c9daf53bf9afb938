//! Call-site argument carrier.
//!
//! Most calls have a handful of positional arguments, so the positional
//! vector is a `SmallVec` that stays inline for the common case. Keyword
//! arguments keep their interned names paired with values.

use smallvec::SmallVec;

use crate::{exception::{ExcType, RunResult}, intern::StringId, value::Value};

/// Arguments for a call: positional values plus keyword pairs.
#[derive(Debug, Default, Clone)]
pub struct CallArgs {
    pub pos: SmallVec<[Value; 4]>,
    pub kw: Vec<(StringId, Value)>,
}

impl CallArgs {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn positional(args: &[Value]) -> Self {
        Self {
            pos: SmallVec::from_slice(args),
            kw: Vec::new(),
        }
    }

    /// Prepends a receiver, for bound-method and method-pair calls.
    pub(crate) fn prepend(&mut self, receiver: Value) {
        self.pos.insert(0, receiver);
    }

    /// Checks that exactly one positional argument was passed, returning it.
    pub(crate) fn get_one(&self, name: &str) -> RunResult<Value> {
        if self.pos.len() == 1 && self.kw.is_empty() {
            Ok(self.pos[0])
        } else {
            Err(ExcType::type_error(format!(
                "{name}() takes exactly one argument ({} given)",
                self.pos.len() + self.kw.len()
            )))
        }
    }
}
