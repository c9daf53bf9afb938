//! The closed opcode enumeration.
//!
//! Instructions are fixed-width words: opcode in the high byte, an 8-bit
//! immediate in the low byte. `ExtendedArg` widens the immediate of the
//! following instruction. The enum is the complete instruction set: the
//! evaluator decodes with `from_repr` and treats a miss as an internal
//! error, never as user-visible behavior.

use strum::{Display, FromRepr};

/// One opcode. The discriminant is the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Nop,
    PopTop,
    DupTop,

    LoadConst,

    LoadFast,
    StoreFast,
    DeleteFast,
    LoadName,
    StoreName,
    LoadGlobal,
    StoreGlobal,
    LoadDeref,
    StoreDeref,
    LoadClosure,

    UnaryNegative,
    UnaryPositive,
    UnaryInvert,
    UnaryNot,

    BinaryAdd,
    BinarySubtract,
    BinaryMultiply,
    BinaryTrueDivide,
    BinaryFloorDivide,
    BinaryModulo,
    BinaryAnd,
    BinaryOr,
    BinaryXor,

    BinarySubscr,
    StoreSubscr,
    DeleteSubscr,

    CompareOp,

    BuildTuple,
    BuildList,
    BuildMap,

    LoadAttr,
    StoreAttr,
    DeleteAttr,

    UnpackSequence,
    UnpackEx,

    JumpForward,
    JumpAbsolute,
    PopJumpIfFalse,
    PopJumpIfTrue,
    JumpIfFalseOrPop,
    JumpIfTrueOrPop,

    GetIter,
    ForIter,

    LoadMethod,
    CallMethod,
    CallFunction,
    CallFunctionKw,
    CallFunctionEx,
    MakeFunction,

    ReturnValue,
    ExtendedArg,
}

impl Opcode {
    /// Packs this opcode with an 8-bit immediate into an instruction word.
    #[inline]
    #[must_use]
    pub fn word(self, arg: u8) -> u16 {
        (u16::from(self as u8) << 8) | u16::from(arg)
    }
}
