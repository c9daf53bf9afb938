//! Code objects: immutable descriptions of compiled function bodies.
//!
//! A code object is produced externally (here, by [`CodeBuilder`]
//! (crate::builder::CodeBuilder) or deserialization) and consumed by the
//! call binder and the evaluator. The flag bits are a fixed wire contract;
//! the trait accessors below are the only way the rest of the runtime reads
//! them.

use crate::{
    exception::{ExcType, RunResult},
    intern::StringId,
};

/// Trait flags, bit-exact for any producer/consumer pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CodeFlags(pub u32);

impl CodeFlags {
    /// Uses fast local-array access rather than a name mapping.
    pub const OPTIMIZED: Self = Self(0x0001);
    /// A new local namespace per call.
    pub const NEWLOCALS: Self = Self(0x0002);
    pub const VARARGS: Self = Self(0x0004);
    pub const VARKEYWORDS: Self = Self(0x0008);
    pub const NESTED: Self = Self(0x0010);
    pub const GENERATOR: Self = Self(0x0020);
    /// No free or cell variables (optimization hint).
    pub const NOFREE: Self = Self(0x0040);
    // Declared for format compatibility; no execution semantics in this
    // core.
    pub const COROUTINE: Self = Self(0x0080);
    pub const ITERABLE_COROUTINE: Self = Self(0x0100);
    pub const ASYNC_GENERATOR: Self = Self(0x0200);

    #[inline]
    #[must_use]
    pub fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 != 0
    }

    #[inline]
    #[must_use]
    pub fn union(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }
}

/// A constant-pool entry. Self-contained so code objects serialize without
/// a live runtime; the evaluator materializes entries into values on load.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Const {
    None,
    Bool(bool),
    Int(i64),
    BigInt(num_bigint::BigInt),
    Float(f64),
    Str(String),
    Tuple(Vec<Const>),
    Code(Box<CodeObject>),
}

/// Sentinel in the cell-to-parameter map for cells that are not parameters.
pub const CELL_NOT_AN_ARG: i32 = -1;

/// An immutable compiled-function description.
///
/// Invariant: `varnames.len() == nlocals`. The cell-to-parameter map is
/// precomputed at construction so frame setup can move captured parameter
/// values into their cells without name scans.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CodeObject {
    /// Number of positional parameters (not counting `*args`).
    pub argcount: u32,
    /// Number of positional-only parameters.
    pub posonlyargcount: u32,
    /// Number of keyword-only parameters.
    pub kwonlyargcount: u32,
    /// Number of local variables, including parameters.
    pub nlocals: u32,
    pub flags: CodeFlags,
    /// Operand-stack depth the instruction stream needs.
    pub stacksize: u32,
    /// Constant pool.
    pub consts: Vec<Const>,
    /// Global and attribute names referenced by the code.
    pub names: Vec<StringId>,
    /// Parameter and plain local names; length equals `nlocals`.
    pub varnames: Vec<StringId>,
    /// Names captured from an enclosing scope, supplied by the closure.
    pub freevars: Vec<StringId>,
    /// Names defined here and captured by nested scopes.
    pub cellvars: Vec<StringId>,
    /// Maps each cell index to its parameter index, or `CELL_NOT_AN_ARG`.
    cell2arg: Option<Vec<i32>>,
    /// The instruction stream: `opcode << 8 | immediate` words.
    pub words: Vec<u16>,
    /// Originating source file.
    pub filename: String,
    /// Function name for frames and error messages.
    pub qualname: StringId,
    /// First source line.
    pub firstlineno: u32,
}

impl CodeObject {
    /// Full constructor; checks the name-table invariant and precomputes
    /// the cell-to-parameter map.
    #[expect(clippy::too_many_arguments, reason = "mirrors the external code-object format")]
    pub fn new(
        argcount: u32,
        posonlyargcount: u32,
        kwonlyargcount: u32,
        nlocals: u32,
        flags: CodeFlags,
        stacksize: u32,
        consts: Vec<Const>,
        names: Vec<StringId>,
        varnames: Vec<StringId>,
        freevars: Vec<StringId>,
        cellvars: Vec<StringId>,
        words: Vec<u16>,
        filename: String,
        qualname: StringId,
        firstlineno: u32,
    ) -> RunResult<Self> {
        if varnames.len() != nlocals as usize {
            return Err(ExcType::value_error("code: varnames is too small"));
        }
        let mut code = Self {
            argcount,
            posonlyargcount,
            kwonlyargcount,
            nlocals,
            flags,
            stacksize,
            consts,
            names,
            varnames,
            freevars,
            cellvars,
            cell2arg: None,
            words,
            filename,
            qualname,
            firstlineno,
        };
        code.cell2arg = code.calc_cell2arg();
        Ok(code)
    }

    /// Builds the cell-to-parameter map, or `None` when no cell is a
    /// parameter.
    fn calc_cell2arg(&self) -> Option<Vec<i32>> {
        if self.cellvars.is_empty() {
            return None;
        }
        let nargs = (self.argcount
            + self.kwonlyargcount
            + u32::from(self.has_varargs())
            + u32::from(self.has_varkeywords())) as usize;
        let mut map: Option<Vec<i32>> = None;
        for (i, &cell_name) in self.cellvars.iter().enumerate() {
            for (j, &arg_name) in self.varnames.iter().take(nargs).enumerate() {
                if cell_name == arg_name {
                    let entry = map.get_or_insert_with(|| vec![CELL_NOT_AN_ARG; self.cellvars.len()]);
                    entry[i] = i32::try_from(j).expect("parameter index fits i32");
                    break;
                }
            }
        }
        map
    }

    /// The parameter index backing cell `i`, if any.
    #[must_use]
    pub(crate) fn cell_parameter(&self, i: usize) -> Option<usize> {
        let index = *self.cell2arg.as_ref()?.get(i)?;
        if index == CELL_NOT_AN_ARG {
            None
        } else {
            Some(usize::try_from(index).expect("non-sentinel cell index is non-negative"))
        }
    }

    #[inline]
    #[must_use]
    pub fn has_varargs(&self) -> bool {
        self.flags.contains(CodeFlags::VARARGS)
    }

    #[inline]
    #[must_use]
    pub fn has_varkeywords(&self) -> bool {
        self.flags.contains(CodeFlags::VARKEYWORDS)
    }

    #[inline]
    #[must_use]
    pub fn is_optimized(&self) -> bool {
        self.flags.contains(CodeFlags::OPTIMIZED)
    }

    /// Total number of cells a frame for this code carries: own cells plus
    /// closure free variables.
    #[must_use]
    pub(crate) fn ncells(&self) -> usize {
        self.cellvars.len() + self.freevars.len()
    }

    /// Serializes to the compact binary wire form.
    pub fn to_bytes(&self) -> RunResult<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| crate::exception::RunError::internal(format!("code serialization failed: {e}")))
    }

    /// Deserializes from the compact binary wire form.
    pub fn from_bytes(bytes: &[u8]) -> RunResult<Self> {
        postcard::from_bytes(bytes)
            .map_err(|e| crate::exception::RunError::internal(format!("code deserialization failed: {e}")))
    }
}
