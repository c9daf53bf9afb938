#![doc = include_str!("../../../README.md")]

// first so the arena types are available everywhere
mod heap;

mod args;
mod attr;
mod binder;
mod builder;
mod builtins;
mod code;
mod dispatch;
mod exception;
mod frame;
mod function;
mod intern;
mod namespace;
mod opcode;
mod resource;
mod runtime;
mod tracer;
pub mod types;
mod value;
mod vm;

pub use crate::{
    args::CallArgs,
    builder::{CodeBuilder, Label},
    builtins::BuiltinFunction,
    code::{CELL_NOT_AN_ARG, CodeFlags, CodeObject, Const},
    dispatch::Comparison,
    exception::{ExcType, InternalError, RunError, RunResult, SimpleException},
    heap::HeapId,
    intern::StringId,
    namespace::NamespaceId,
    opcode::Opcode,
    resource::{DEFAULT_MAX_HEAP_ENTRIES, DEFAULT_MAX_RECURSION_DEPTH, ResourceLimits},
    runtime::Runtime,
    tracer::{EvalTracer, NoopTracer, RecordingTracer, TraceEvent},
    types::{
        DeleterFn, GetterFn, SetterFn, SlotKind, SlotShape, SlotValue, TypeId, TypeSpec,
        slot::{BinaryFn, ContainsFn, LenFn, PredicateFn, UnaryFn},
    },
    value::Value,
};
