//! The bytecode evaluator.
//!
//! An iterative loop over an explicit frame stack: call instructions push
//! frames, returns pop them, and host recursion is never used for emulated
//! calls. The loop decodes fixed-width instruction words (opcode in the
//! high byte, 8-bit immediate in the low byte); `ExtendedArg` left-shifts
//! and accumulates into a pending wide operand consumed by the next
//! instruction that takes one.
//!
//! User-level exceptions from delegated components propagate out of the
//! loop unmodified - there is no in-bytecode handler search here. An
//! unrecognized opcode or structurally invalid operand is an internal
//! error, never catchable as a user-level exception.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    args::CallArgs,
    attr, binder,
    code::{CodeObject, Const},
    dispatch::{self, Comparison},
    exception::{ExcType, RunError, RunResult},
    frame::Frame,
    heap::HeapData,
    intern::StringId,
    namespace::NamespaceId,
    opcode::Opcode,
    runtime::{CallTarget, Runtime},
    tracer::EvalTracer,
    types::{dict::hash_key, seq::seq_elements, slot::{SlotKind, SlotValue}},
    value::Value,
};

/// Evaluates a module-level code object against a global namespace.
pub(crate) fn eval_code(
    rt: &mut Runtime,
    code: Arc<CodeObject>,
    globals: NamespaceId,
    tracer: &mut dyn EvalTracer,
) -> RunResult<Value> {
    let frame = Frame::new(code, globals);
    run_frame(rt, frame, tracer)
}

/// Runs a prepared frame to completion.
pub(crate) fn run_frame(rt: &mut Runtime, frame: Frame, tracer: &mut dyn EvalTracer) -> RunResult<Value> {
    let mut vm = Vm {
        rt,
        frames: vec![frame],
        tracer,
    };
    vm.run()
}

struct Vm<'rt, 'tr> {
    rt: &'rt mut Runtime,
    frames: Vec<Frame>,
    tracer: &'tr mut dyn EvalTracer,
}

impl Vm<'_, '_> {
    fn run(&mut self) -> RunResult<Value> {
        // Pending wide operand. Every instruction that consumes an operand
        // resets it.
        let mut oparg: u32 = 0;

        loop {
            let frame = self.frames.last_mut().expect("frame stack is never empty while running");

            if frame.ip >= frame.code.words.len() {
                // Fell off the end: the pending return value stands.
                let value = frame.return_value;
                if let Some(result) = self.return_value(value) {
                    return Ok(result);
                }
                continue;
            }

            let ip = frame.ip;
            let word = frame.code.words[ip];
            frame.ip += 1;

            let Some(opcode) = Opcode::from_repr((word >> 8) as u8) else {
                return Err(RunError::internal(format!(
                    "unrecognized opcode {} at word {ip}",
                    word >> 8
                )));
            };
            self.tracer.on_instruction(self.frames.len(), ip, opcode);

            let arg8 = u32::from(word & 0xFF);
            if opcode == Opcode::ExtendedArg {
                oparg = (oparg | arg8) << 8;
                continue;
            }
            let arg = oparg | arg8;
            oparg = 0;
            let argi = arg as usize;

            match opcode {
                Opcode::Nop | Opcode::ExtendedArg => {}

                Opcode::PopTop => {
                    self.frames.last_mut().expect("frame").pop();
                }

                Opcode::DupTop => {
                    let frame = self.frames.last_mut().expect("frame");
                    let v = frame.top();
                    frame.push(v);
                }

                Opcode::LoadConst => {
                    let constant = {
                        let frame = self.frames.last().expect("frame");
                        frame
                            .code
                            .consts
                            .get(argi)
                            .cloned()
                            .ok_or_else(|| RunError::internal(format!("constant index {argi} out of range")))?
                    };
                    let v = self.materialize_const(&constant)?;
                    self.frames.last_mut().expect("frame").push(v);
                }

                Opcode::LoadFast => {
                    let frame = self.frames.last_mut().expect("frame");
                    let v = frame.locals[argi];
                    if v.is_undefined() {
                        let name_id = frame.code.varnames[argi];
                        let name = self.rt.interns.get_str(name_id);
                        return Err(ExcType::unbound_local(name));
                    }
                    frame.push(v);
                }

                Opcode::StoreFast => {
                    let frame = self.frames.last_mut().expect("frame");
                    let v = frame.pop();
                    frame.locals[argi] = v;
                }

                Opcode::DeleteFast => {
                    let frame = self.frames.last_mut().expect("frame");
                    if frame.locals[argi].is_undefined() {
                        let name_id = frame.code.varnames[argi];
                        let name = self.rt.interns.get_str(name_id);
                        return Err(ExcType::unbound_local(name));
                    }
                    frame.locals[argi] = Value::Undefined;
                }

                Opcode::LoadName | Opcode::LoadGlobal => {
                    // Three-tier resolution: the frame's name space (which
                    // is the global namespace at module level), then
                    // globals, then builtins.
                    let (name_id, globals) = {
                        let frame = self.frames.last().expect("frame");
                        (frame.code.names[argi], frame.globals)
                    };
                    let v = self
                        .rt
                        .namespaces
                        .get(globals, name_id)
                        .or_else(|| self.rt.builtins.get(name_id));
                    match v {
                        Some(v) => self.frames.last_mut().expect("frame").push(v),
                        None => {
                            let name = self.rt.interns.get_str(name_id);
                            return Err(ExcType::name_error(name));
                        }
                    }
                }

                Opcode::StoreName | Opcode::StoreGlobal => {
                    let (name_id, globals, v) = {
                        let frame = self.frames.last_mut().expect("frame");
                        (frame.code.names[argi], frame.globals, frame.pop())
                    };
                    self.rt.namespaces.set(globals, name_id, v);
                }

                Opcode::LoadDeref => {
                    let cell_id = self.frames.last().expect("frame").cells[argi];
                    let HeapData::Cell(cell) = self.rt.heap.get(cell_id) else {
                        return Err(RunError::internal("deref of a non-cell entry"));
                    };
                    let v = cell.value;
                    if v.is_undefined() {
                        let name = self.cell_name(argi).to_owned();
                        return Err(ExcType::unbound_local(&name));
                    }
                    self.frames.last_mut().expect("frame").push(v);
                }

                Opcode::StoreDeref => {
                    let v = self.frames.last_mut().expect("frame").pop();
                    let cell_id = self.frames.last().expect("frame").cells[argi];
                    let HeapData::Cell(cell) = self.rt.heap.get_mut(cell_id) else {
                        return Err(RunError::internal("deref of a non-cell entry"));
                    };
                    cell.value = v;
                }

                Opcode::LoadClosure => {
                    let cell_id = self.frames.last().expect("frame").cells[argi];
                    self.frames.last_mut().expect("frame").push(Value::Ref(cell_id));
                }

                Opcode::UnaryNegative => self.unary(SlotKind::Neg)?,
                Opcode::UnaryPositive => self.unary(SlotKind::Pos)?,
                Opcode::UnaryInvert => self.unary(SlotKind::Invert)?,

                Opcode::UnaryNot => {
                    let v = self.frames.last_mut().expect("frame").pop();
                    let truth = self.rt.truthy(v)?;
                    self.frames.last_mut().expect("frame").push(Value::Bool(!truth));
                }

                Opcode::BinaryAdd => self.binary(SlotKind::Add)?,
                Opcode::BinarySubtract => self.binary(SlotKind::Sub)?,
                Opcode::BinaryMultiply => self.binary(SlotKind::Mul)?,
                Opcode::BinaryTrueDivide => self.binary(SlotKind::TrueDiv)?,
                Opcode::BinaryFloorDivide => self.binary(SlotKind::FloorDiv)?,
                Opcode::BinaryModulo => self.binary(SlotKind::Mod)?,
                Opcode::BinaryAnd => self.binary(SlotKind::And)?,
                Opcode::BinaryOr => self.binary(SlotKind::Or)?,
                Opcode::BinaryXor => self.binary(SlotKind::Xor)?,

                Opcode::BinarySubscr => {
                    let frame = self.frames.last_mut().expect("frame");
                    let key = frame.pop();
                    let container = frame.pop();
                    let type_id = self.rt.type_of(container);
                    let v = match self.rt.slot_of(type_id, SlotKind::GetItem) {
                        SlotValue::Binary(f) => f(self.rt, container, key)?,
                        SlotValue::Empty => {
                            let type_name = self.rt.type_name(type_id).to_owned();
                            return Err(ExcType::type_error(format!(
                                "'{type_name}' object is not subscriptable"
                            )));
                        }
                        _ => return Err(RunError::internal("getitem dispatch through a non-binary slot entry")),
                    };
                    self.frames.last_mut().expect("frame").push(v);
                }

                Opcode::StoreSubscr => {
                    let frame = self.frames.last_mut().expect("frame");
                    let key = frame.pop();
                    let container = frame.pop();
                    let value = frame.pop();
                    let type_id = self.rt.type_of(container);
                    match self.rt.slot_of(type_id, SlotKind::SetItem) {
                        SlotValue::SetItem(f) => f(self.rt, container, key, value)?,
                        SlotValue::Empty => {
                            let type_name = self.rt.type_name(type_id).to_owned();
                            return Err(ExcType::type_error(format!(
                                "'{type_name}' object does not support item assignment"
                            )));
                        }
                        _ => return Err(RunError::internal("setitem dispatch through a non-setitem slot entry")),
                    }
                }

                Opcode::DeleteSubscr => {
                    let frame = self.frames.last_mut().expect("frame");
                    let key = frame.pop();
                    let container = frame.pop();
                    let type_id = self.rt.type_of(container);
                    match self.rt.slot_of(type_id, SlotKind::DelItem) {
                        SlotValue::DelItem(f) => f(self.rt, container, key)?,
                        SlotValue::Empty => {
                            let type_name = self.rt.type_name(type_id).to_owned();
                            return Err(ExcType::type_error(format!(
                                "'{type_name}' object does not support item deletion"
                            )));
                        }
                        _ => return Err(RunError::internal("delitem dispatch through a non-delitem slot entry")),
                    }
                }

                Opcode::CompareOp => {
                    let cmp = Comparison::from_repr(
                        u8::try_from(arg).map_err(|_| RunError::internal("comparison operand exceeds u8"))?,
                    )
                    .ok_or_else(|| RunError::internal(format!("invalid comparison operand {arg}")))?;
                    let frame = self.frames.last_mut().expect("frame");
                    let right = frame.pop();
                    let left = frame.pop();
                    let v = dispatch::compare(self.rt, left, right, cmp)?;
                    self.frames.last_mut().expect("frame").push(v);
                }

                Opcode::BuildTuple => {
                    let items = self.pop_many(argi)?;
                    let v = self.rt.alloc_tuple(items)?;
                    self.frames.last_mut().expect("frame").push(v);
                }

                Opcode::BuildList => {
                    let items = self.pop_many(argi)?;
                    let v = self.rt.alloc_list(items)?;
                    self.frames.last_mut().expect("frame").push(v);
                }

                Opcode::BuildMap => {
                    let flat = self.pop_many(argi * 2)?;
                    let dict_value = self.rt.alloc_dict()?;
                    for pair in flat.chunks_exact(2) {
                        let (key, value) = (pair[0], pair[1]);
                        let hash = hash_key(self.rt, key)?;
                        if let Value::Ref(id) = dict_value
                            && let HeapData::Dict(d) = self.rt.heap.get_mut(id)
                        {
                            d.insert(hash, key, value);
                        }
                    }
                    self.frames.last_mut().expect("frame").push(dict_value);
                }

                Opcode::LoadAttr => {
                    let name_id = self.frames.last().expect("frame").code.names[argi];
                    let obj = self.frames.last_mut().expect("frame").pop();
                    let v = attr::get_attr(self.rt, obj, name_id)?;
                    self.frames.last_mut().expect("frame").push(v);
                }

                Opcode::StoreAttr => {
                    let name_id = self.frames.last().expect("frame").code.names[argi];
                    let frame = self.frames.last_mut().expect("frame");
                    let obj = frame.pop();
                    let value = frame.pop();
                    attr::set_attr(self.rt, obj, name_id, value)?;
                }

                Opcode::DeleteAttr => {
                    let name_id = self.frames.last().expect("frame").code.names[argi];
                    let obj = self.frames.last_mut().expect("frame").pop();
                    attr::del_attr(self.rt, obj, name_id)?;
                }

                Opcode::UnpackSequence => {
                    let v = self.frames.last_mut().expect("frame").pop();
                    self.unpack_iterable(v, argi, None)?;
                }

                Opcode::UnpackEx => {
                    let before = argi & 0xFF;
                    let after = argi >> 8;
                    let v = self.frames.last_mut().expect("frame").pop();
                    self.unpack_iterable(v, before, Some(after))?;
                }

                Opcode::JumpForward => {
                    self.frames.last_mut().expect("frame").ip += argi;
                }

                Opcode::JumpAbsolute => {
                    self.frames.last_mut().expect("frame").ip = argi;
                }

                Opcode::PopJumpIfFalse => {
                    let v = self.frames.last_mut().expect("frame").pop();
                    if !self.rt.truthy(v)? {
                        self.frames.last_mut().expect("frame").ip = argi;
                    }
                }

                Opcode::PopJumpIfTrue => {
                    let v = self.frames.last_mut().expect("frame").pop();
                    if self.rt.truthy(v)? {
                        self.frames.last_mut().expect("frame").ip = argi;
                    }
                }

                Opcode::JumpIfFalseOrPop => {
                    let v = self.frames.last_mut().expect("frame").pop();
                    if self.rt.truthy(v)? {
                        // Value consumed; fall through.
                    } else {
                        let frame = self.frames.last_mut().expect("frame");
                        frame.push(v);
                        frame.ip = argi;
                    }
                }

                Opcode::JumpIfTrueOrPop => {
                    let v = self.frames.last_mut().expect("frame").pop();
                    if self.rt.truthy(v)? {
                        let frame = self.frames.last_mut().expect("frame");
                        frame.push(v);
                        frame.ip = argi;
                    }
                }

                Opcode::GetIter => {
                    let v = self.frames.last_mut().expect("frame").pop();
                    let it = dispatch::get_iter(self.rt, v)?;
                    self.frames.last_mut().expect("frame").push(it);
                }

                Opcode::ForIter => {
                    let it = self.frames.last().expect("frame").top();
                    match dispatch::iter_next(self.rt, it)? {
                        Some(v) => self.frames.last_mut().expect("frame").push(v),
                        None => {
                            let frame = self.frames.last_mut().expect("frame");
                            frame.pop();
                            frame.ip += argi;
                        }
                    }
                }

                Opcode::LoadMethod => {
                    let name_id = self.frames.last().expect("frame").code.names[argi];
                    let obj = self.frames.last_mut().expect("frame").pop();
                    let (callable, receiver) = attr::load_method(self.rt, obj, name_id)?;
                    let frame = self.frames.last_mut().expect("frame");
                    match receiver {
                        Some(receiver) => {
                            // Bypassed the binding step.
                            frame.push(callable);
                            frame.push(receiver);
                        }
                        None => {
                            frame.push(Value::Undefined);
                            frame.push(callable);
                        }
                    }
                }

                Opcode::CallMethod => {
                    let mut args = self.pop_many(argi)?;
                    let frame = self.frames.last_mut().expect("frame");
                    let second = frame.pop();
                    let first = frame.pop();
                    if first.is_undefined() {
                        // second is the already-bound callable.
                        self.call_vector(second, args, &[])?;
                    } else {
                        // first is the unbound callable, second the receiver.
                        args.insert(0, second);
                        self.call_vector(first, args, &[])?;
                    }
                }

                Opcode::CallFunction => {
                    let args = self.pop_many(argi)?;
                    let callee = self.frames.last_mut().expect("frame").pop();
                    self.call_vector(callee, args, &[])?;
                }

                Opcode::CallFunctionKw => {
                    let kwnames_value = self.frames.last_mut().expect("frame").pop();
                    let kwnames = self.kwnames_from_tuple(kwnames_value)?;
                    let args = self.pop_many(argi)?;
                    let callee = self.frames.last_mut().expect("frame").pop();
                    if kwnames.len() > args.len() {
                        return Err(RunError::internal("keyword-name tuple longer than argument count"));
                    }
                    self.call_vector(callee, args, &kwnames)?;
                }

                Opcode::CallFunctionEx => {
                    let kwdict = if arg & 1 == 1 {
                        Some(self.frames.last_mut().expect("frame").pop())
                    } else {
                        None
                    };
                    let args_value = self.frames.last_mut().expect("frame").pop();
                    let callee = self.frames.last_mut().expect("frame").pop();

                    let Some(pos) = seq_elements(&self.rt.heap, args_value).map(<[Value]>::to_vec) else {
                        let type_name = self.rt.value_type_name(args_value).to_owned();
                        return Err(ExcType::type_error(format!(
                            "argument unpacking requires a sequence, not '{type_name}'"
                        )));
                    };
                    let mut call_args = CallArgs {
                        pos: SmallVec::from_vec(pos),
                        kw: Vec::new(),
                    };
                    if let Some(kwdict) = kwdict {
                        call_args.kw = self.kw_pairs_from_dict(kwdict)?;
                    }
                    self.call_classic(callee, call_args)?;
                }

                Opcode::MakeFunction => {
                    self.make_function(arg)?;
                }

                Opcode::ReturnValue => {
                    let value = self.frames.last_mut().expect("frame").pop();
                    if let Some(result) = self.return_value(value) {
                        return Ok(result);
                    }
                }
            }
        }
    }

    /// Pops the current frame, delivering `value` to the caller. Returns
    /// `Some` when the outermost frame returned.
    fn return_value(&mut self, value: Value) -> Option<Value> {
        self.tracer.on_frame_pop();
        self.frames.pop();
        match self.frames.last_mut() {
            Some(caller) => {
                caller.push(value);
                None
            }
            None => Some(value),
        }
    }

    /// Pushes a frame, enforcing the recursion-depth guard.
    fn push_frame(&mut self, frame: Frame) -> RunResult<()> {
        if self.frames.len() >= self.rt.limits.max_recursion_depth {
            return Err(ExcType::recursion_error());
        }
        let qualname = self.rt.interns.get_str(frame.code.qualname).to_owned();
        self.tracer.on_frame_push(&qualname);
        self.frames.push(frame);
        Ok(())
    }

    /// Pops the top `n` values, preserving their push order.
    fn pop_many(&mut self, n: usize) -> RunResult<Vec<Value>> {
        let frame = self.frames.last_mut().expect("frame");
        let len = frame.stack.len();
        if n > len {
            return Err(RunError::internal("operand stack underflow"));
        }
        Ok(frame.stack.split_off(len - n))
    }

    fn unary(&mut self, op: SlotKind) -> RunResult<()> {
        let v = self.frames.last_mut().expect("frame").pop();
        let r = dispatch::unary_op(self.rt, v, op)?;
        self.frames.last_mut().expect("frame").push(r);
        Ok(())
    }

    fn binary(&mut self, op: SlotKind) -> RunResult<()> {
        let frame = self.frames.last_mut().expect("frame");
        let right = frame.pop();
        let left = frame.pop();
        let r = dispatch::binary_op(self.rt, left, right, op)?;
        self.frames.last_mut().expect("frame").push(r);
        Ok(())
    }

    /// The name behind cell index `i` in the current frame.
    fn cell_name(&self, i: usize) -> &str {
        let code = &self.frames.last().expect("frame").code;
        let name_id = if i < code.cellvars.len() {
            code.cellvars[i]
        } else {
            code.freevars[i - code.cellvars.len()]
        };
        self.rt.interns.get_str(name_id)
    }

    /// Materializes a constant-pool entry into a value.
    fn materialize_const(&mut self, constant: &Const) -> RunResult<Value> {
        match constant {
            Const::None => Ok(Value::None),
            Const::Bool(b) => Ok(Value::Bool(*b)),
            Const::Int(i) => Ok(Value::Int(*i)),
            Const::BigInt(b) => self.rt.value_from_bigint(b.clone()),
            Const::Float(f) => Ok(Value::Float(*f)),
            Const::Str(s) => Ok(self.rt.str_value(s)),
            Const::Tuple(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.materialize_const(item)?);
                }
                self.rt.alloc_tuple(values)
            }
            Const::Code(code) => {
                let id = self.rt.heap.allocate(HeapData::Code(Arc::new((**code).clone())))?;
                Ok(Value::Ref(id))
            }
        }
    }

    /// Vector-shape call: flat argument array plus trailing keyword names.
    fn call_vector(&mut self, callee: Value, mut args: Vec<Value>, kwnames: &[StringId]) -> RunResult<()> {
        if let Value::Ref(id) = callee {
            match self.rt.heap.get(id) {
                HeapData::Function(f) => {
                    let func = f.clone();
                    let frame = binder::bind_vector(self.rt, &func, &args, kwnames)?;
                    return self.push_frame(frame);
                }
                HeapData::BoundMethod(m) => {
                    let m = *m;
                    args.insert(0, m.receiver);
                    return self.call_vector(m.callable, args, kwnames);
                }
                _ => {}
            }
        }
        // Native callables take the classic argument carrier.
        let split = args.len() - kwnames.len();
        let kw_values = args.split_off(split);
        let call_args = CallArgs {
            pos: SmallVec::from_vec(args),
            kw: kwnames.iter().copied().zip(kw_values).collect(),
        };
        self.call_classic(callee, call_args)
    }

    /// Classic-shape call: argument list plus keyword mapping.
    fn call_classic(&mut self, callee: Value, args: CallArgs) -> RunResult<()> {
        match self.rt.resolve_call(callee, args)? {
            CallTarget::Done(v) => {
                self.frames.last_mut().expect("frame").push(v);
                Ok(())
            }
            CallTarget::Function(func, args) => {
                let frame = binder::bind_classic(self.rt, &func, &args.pos, &args.kw)?;
                self.push_frame(frame)
            }
        }
    }

    /// Extracts interned keyword names from a materialized name tuple.
    fn kwnames_from_tuple(&mut self, v: Value) -> RunResult<Vec<StringId>> {
        let Some(items) = seq_elements(&self.rt.heap, v).map(<[Value]>::to_vec) else {
            return Err(RunError::internal("keyword-name operand is not a tuple"));
        };
        let mut names = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::InternString(id) => names.push(id),
                Value::Ref(id) => match self.rt.heap.get(id) {
                    HeapData::Str(s) => {
                        let text = s.to_string();
                        names.push(self.rt.interns.intern(&text));
                    }
                    _ => return Err(RunError::internal("keyword-name tuple holds a non-string")),
                },
                _ => return Err(RunError::internal("keyword-name tuple holds a non-string")),
            }
        }
        Ok(names)
    }

    /// Converts a keyword dict into interned (name, value) pairs.
    fn kw_pairs_from_dict(&mut self, kwdict: Value) -> RunResult<Vec<(StringId, Value)>> {
        let pairs = match kwdict {
            Value::Ref(id) => match self.rt.heap.get(id) {
                HeapData::Dict(d) => d.pairs(),
                _ => {
                    let type_name = self.rt.value_type_name(kwdict).to_owned();
                    return Err(ExcType::type_error(format!(
                        "argument after ** must be a mapping, not {type_name}"
                    )));
                }
            },
            _ => {
                let type_name = self.rt.value_type_name(kwdict).to_owned();
                return Err(ExcType::type_error(format!(
                    "argument after ** must be a mapping, not {type_name}"
                )));
            }
        };
        let mut kw = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match key {
                Value::InternString(id) => kw.push((id, value)),
                Value::Ref(id) => match self.rt.heap.get(id) {
                    HeapData::Str(s) => {
                        let text = s.to_string();
                        kw.push((self.rt.interns.intern(&text), value));
                    }
                    _ => return Err(ExcType::type_error("keywords must be strings")),
                },
                _ => return Err(ExcType::type_error("keywords must be strings")),
            }
        }
        Ok(kw)
    }

    /// `MakeFunction`: pops a code object and, per the flag bits, a closure
    /// tuple, keyword-defaults dict, and defaults tuple, then pushes the
    /// new function.
    fn make_function(&mut self, flags: u32) -> RunResult<()> {
        let code_value = self.frames.last_mut().expect("frame").pop();
        let code = match code_value {
            Value::Ref(id) => match self.rt.heap.get(id) {
                HeapData::Code(code) => Arc::clone(code),
                _ => return Err(RunError::internal("make-function operand is not a code object")),
            },
            _ => return Err(RunError::internal("make-function operand is not a code object")),
        };

        let closure = if flags & 4 != 0 {
            Some(self.frames.last_mut().expect("frame").pop())
        } else {
            None
        };
        let kwdefaults = if flags & 2 != 0 {
            Some(self.frames.last_mut().expect("frame").pop())
        } else {
            None
        };
        let defaults = if flags & 1 != 0 {
            Some(self.frames.last_mut().expect("frame").pop())
        } else {
            None
        };

        let globals = self.frames.last().expect("frame").globals;
        let function = self.rt.make_function(code, globals)?;

        if let Some(defaults_value) = defaults {
            let Some(items) = seq_elements(&self.rt.heap, defaults_value).map(<[Value]>::to_vec) else {
                return Err(RunError::internal("defaults operand is not a sequence"));
            };
            self.rt.set_function_defaults(function, items)?;
        }
        if let Some(kwdefaults_value) = kwdefaults {
            let pairs = self.kw_pairs_from_dict(kwdefaults_value)?;
            if let Value::Ref(id) = function
                && let HeapData::Function(func) = self.rt.heap.get_mut(id)
            {
                func.kwdefaults = if pairs.is_empty() { None } else { Some(pairs) };
            }
        }
        if let Some(closure_value) = closure {
            let Some(cells) = seq_elements(&self.rt.heap, closure_value).map(<[Value]>::to_vec) else {
                return Err(RunError::internal("closure operand is not a sequence"));
            };
            self.rt.set_function_closure(function, cells)?;
        }

        self.frames.last_mut().expect("frame").push(function);
        Ok(())
    }

    /// Unpacks an iterable onto the stack so targets pop left-to-right.
    ///
    /// `after` is `None` for fixed-arity unpacking and `Some(count)` for
    /// the starred form (a list collects the middle).
    fn unpack_iterable(&mut self, v: Value, before: usize, after: Option<usize>) -> RunResult<()> {
        let it = match dispatch::get_iter(self.rt, v) {
            Ok(it) => it,
            Err(err) if err.is_exc(ExcType::TypeError) => {
                let type_name = self.rt.value_type_name(v).to_owned();
                return Err(ExcType::type_error(format!(
                    "cannot unpack non-iterable {type_name} object"
                )));
            }
            Err(err) => return Err(err),
        };

        let mut collected = Vec::with_capacity(before);
        for count in 0..before {
            match dispatch::iter_next(self.rt, it)? {
                Some(w) => collected.push(w),
                None => {
                    return Err(match after {
                        None => ExcType::value_error(format!(
                            "not enough values to unpack (expected {before}, got {count})"
                        )),
                        Some(a) => ExcType::value_error(format!(
                            "not enough values to unpack (expected at least {}, got {count})",
                            before + a
                        )),
                    });
                }
            }
        }

        match after {
            None => {
                // The iterator must be exhausted now.
                if dispatch::iter_next(self.rt, it)?.is_some() {
                    return Err(ExcType::value_error(format!(
                        "too many values to unpack (expected {before})"
                    )));
                }
            }
            Some(after) => {
                let mut rest = Vec::new();
                while let Some(w) = dispatch::iter_next(self.rt, it)? {
                    rest.push(w);
                }
                if rest.len() < after {
                    return Err(ExcType::value_error(format!(
                        "not enough values to unpack (expected at least {}, got {})",
                        before + after,
                        before + rest.len()
                    )));
                }
                let tail = rest.split_off(rest.len() - after);
                let list = self.rt.alloc_list(rest)?;
                collected.push(list);
                collected.extend(tail);
            }
        }

        let frame = self.frames.last_mut().expect("frame");
        for value in collected.into_iter().rev() {
            frame.push(value);
        }
        Ok(())
    }
}
