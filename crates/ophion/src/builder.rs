//! Builder for emitting instruction streams into code objects.
//!
//! The builder stands in for the out-of-scope front-end: tests, demos and
//! embedders assemble code objects through it. It tracks operand-stack
//! depth as instructions are emitted, patches forward jumps through labels,
//! and assembles the local-name table in frame-layout order (positional
//! parameters, keyword-only parameters, `*args`, `**kwargs`, plain locals).
//!
//! Jumps are emitted as an `ExtendedArg` prefix plus the jump word, giving
//! every jump a fixed two-word encoding with a 16-bit target so patching
//! never has to move code.

use std::sync::Arc;

use crate::{
    code::{CodeFlags, CodeObject, Const},
    exception::{RunError, RunResult},
    opcode::Opcode,
    runtime::Runtime,
};

/// A forward-jump target handle.
#[derive(Debug, Clone, Copy)]
pub struct Label(usize);

/// Incrementally builds one [`CodeObject`].
#[derive(Debug)]
pub struct CodeBuilder {
    name: String,
    filename: String,
    firstlineno: u32,
    flags: CodeFlags,
    pos_params: Vec<String>,
    posonlyargcount: u32,
    kwonly_params: Vec<String>,
    vararg: Option<String>,
    varkeyword: Option<String>,
    locals: Vec<String>,
    freevars: Vec<String>,
    cellvars: Vec<String>,
    names: Vec<String>,
    consts: Vec<Const>,
    words: Vec<u16>,
    labels: Vec<Option<usize>>,
    /// (position of the ExtendedArg word, label, relative?)
    patches: Vec<(usize, usize, bool)>,
    cur_stack: i32,
    max_stack: i32,
}

impl CodeBuilder {
    /// Starts a function body: fast locals, fresh namespace per call.
    #[must_use]
    pub fn function(name: &str) -> Self {
        Self::new(name, CodeFlags::OPTIMIZED.union(CodeFlags::NEWLOCALS))
    }

    /// Starts a module body: names resolve through the namespace tiers.
    #[must_use]
    pub fn module(filename: &str) -> Self {
        let mut builder = Self::new("<module>", CodeFlags::default());
        builder.filename = filename.to_owned();
        builder
    }

    fn new(name: &str, flags: CodeFlags) -> Self {
        Self {
            name: name.to_owned(),
            filename: "<input>".to_owned(),
            firstlineno: 1,
            flags,
            pos_params: Vec::new(),
            posonlyargcount: 0,
            kwonly_params: Vec::new(),
            vararg: None,
            varkeyword: None,
            locals: Vec::new(),
            freevars: Vec::new(),
            cellvars: Vec::new(),
            names: Vec::new(),
            consts: Vec::new(),
            words: Vec::new(),
            labels: Vec::new(),
            patches: Vec::new(),
            cur_stack: 0,
            max_stack: 0,
        }
    }

    /// Declares a positional parameter; returns its local slot.
    pub fn param(&mut self, name: &str) -> u32 {
        self.pos_params.push(name.to_owned());
        u32::try_from(self.pos_params.len() - 1).expect("parameter count fits u32")
    }

    /// Declares a keyword-only parameter.
    pub fn kwonly_param(&mut self, name: &str) {
        self.kwonly_params.push(name.to_owned());
    }

    /// Marks the first `n` positional parameters positional-only.
    pub fn positional_only(&mut self, n: u32) {
        self.posonlyargcount = n;
    }

    /// Declares the `*args` collector.
    pub fn varargs(&mut self, name: &str) {
        self.vararg = Some(name.to_owned());
        self.flags = self.flags.union(CodeFlags::VARARGS);
    }

    /// Declares the `**kwargs` collector.
    pub fn varkeywords(&mut self, name: &str) {
        self.varkeyword = Some(name.to_owned());
        self.flags = self.flags.union(CodeFlags::VARKEYWORDS);
    }

    /// Declares a plain (non-parameter) local variable.
    pub fn local(&mut self, name: &str) {
        self.locals.push(name.to_owned());
    }

    /// Declares a local captured by nested scopes; returns its cell index.
    pub fn cellvar(&mut self, name: &str) -> u32 {
        self.cellvars.push(name.to_owned());
        u32::try_from(self.cellvars.len() - 1).expect("cell count fits u32")
    }

    /// Declares a variable captured from an enclosing scope; returns its
    /// cell index (free cells follow the own cells).
    pub fn freevar(&mut self, name: &str) -> u32 {
        self.freevars.push(name.to_owned());
        u32::try_from(self.cellvars.len() + self.freevars.len() - 1).expect("cell count fits u32")
    }

    /// Resolves a local name to its frame slot.
    ///
    /// Valid only after all parameters and locals are declared.
    #[must_use]
    pub fn local_slot(&self, name: &str) -> Option<u32> {
        self.layout_varnames()
            .iter()
            .position(|n| n == name)
            .map(|i| u32::try_from(i).expect("local slot fits u32"))
    }

    /// Adds a constant; returns its pool index.
    pub fn const_(&mut self, value: Const) -> u32 {
        self.consts.push(value);
        u32::try_from(self.consts.len() - 1).expect("constant pool fits u32")
    }

    /// Adds (or reuses) a name-table entry.
    pub fn name(&mut self, name: &str) -> u32 {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            return u32::try_from(i).expect("name table fits u32");
        }
        self.names.push(name.to_owned());
        u32::try_from(self.names.len() - 1).expect("name table fits u32")
    }

    /// Emits an instruction with no immediate.
    pub fn emit(&mut self, op: Opcode) {
        self.emit_arg(op, 0);
    }

    /// Emits an instruction, widening the immediate with `ExtendedArg`
    /// prefixes as needed.
    pub fn emit_arg(&mut self, op: Opcode, arg: u32) {
        if arg > 0xFF {
            let mut prefixes = Vec::new();
            let mut rest = arg >> 8;
            while rest > 0 {
                prefixes.push((rest & 0xFF) as u8);
                rest >>= 8;
            }
            for &prefix in prefixes.iter().rev() {
                self.words.push(Opcode::ExtendedArg.word(prefix));
            }
        }
        self.words.push(op.word((arg & 0xFF) as u8));
        self.adjust_stack(stack_effect(op, arg));
    }

    /// Emits `LoadConst` for a new constant-pool entry.
    pub fn load_const(&mut self, value: Const) {
        let index = self.const_(value);
        self.emit_arg(Opcode::LoadConst, index);
    }

    /// Creates an unbound jump target.
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Emits a jump to a label, patched at `finish`.
    ///
    /// `JumpForward` and `ForIter` are encoded relative to the following
    /// instruction; all other jump opcodes take absolute word targets.
    pub fn jump(&mut self, op: Opcode, label: Label) {
        let relative = matches!(op, Opcode::JumpForward | Opcode::ForIter);
        // Fixed two-word encoding: ExtendedArg prefix + jump word.
        self.patches.push((self.words.len(), label.0, relative));
        self.words.push(Opcode::ExtendedArg.word(0));
        self.words.push(op.word(0));
        self.adjust_stack(stack_effect(op, 0));
    }

    /// Binds a label to the current position.
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.words.len());
    }

    fn adjust_stack(&mut self, effect: i32) {
        self.cur_stack += effect;
        self.max_stack = self.max_stack.max(self.cur_stack);
    }

    /// The local-name table in frame-layout order.
    fn layout_varnames(&self) -> Vec<String> {
        let mut varnames = self.pos_params.clone();
        varnames.extend(self.kwonly_params.iter().cloned());
        varnames.extend(self.vararg.iter().cloned());
        varnames.extend(self.varkeyword.iter().cloned());
        varnames.extend(self.locals.iter().cloned());
        varnames
    }

    /// Patches jumps, interns the name tables, and produces the code
    /// object.
    pub fn finish(mut self, rt: &mut Runtime) -> RunResult<Arc<CodeObject>> {
        for (pos, label, relative) in &self.patches {
            let Some(target) = self.labels[*label] else {
                return Err(RunError::internal("jump to an unbound label"));
            };
            let encoded = if *relative {
                target
                    .checked_sub(pos + 2)
                    .ok_or_else(|| RunError::internal("relative jump target precedes the jump"))?
            } else {
                target
            };
            let encoded = u16::try_from(encoded).map_err(|_| RunError::internal("jump target exceeds 16 bits"))?;
            self.words[*pos] = Opcode::ExtendedArg.word((encoded >> 8) as u8);
            let jump_word = self.words[pos + 1];
            self.words[pos + 1] = (jump_word & 0xFF00) | (encoded & 0xFF);
        }

        let varnames = self.layout_varnames();
        let mut flags = self.flags;
        if self.cellvars.is_empty() && self.freevars.is_empty() {
            flags = flags.union(CodeFlags::NOFREE);
        }

        let intern_all = |rt: &mut Runtime, names: &[String]| names.iter().map(|n| rt.intern(n)).collect::<Vec<_>>();
        let names = intern_all(rt, &self.names);
        let varname_ids = intern_all(rt, &varnames);
        let freevar_ids = intern_all(rt, &self.freevars);
        let cellvar_ids = intern_all(rt, &self.cellvars);
        let qualname = rt.intern(&self.name);

        let code = CodeObject::new(
            u32::try_from(self.pos_params.len()).expect("parameter count fits u32"),
            self.posonlyargcount,
            u32::try_from(self.kwonly_params.len()).expect("parameter count fits u32"),
            u32::try_from(varnames.len()).expect("local count fits u32"),
            flags,
            u32::try_from(self.max_stack.max(0)).expect("stack depth fits u32"),
            self.consts,
            names,
            varname_ids,
            freevar_ids,
            cellvar_ids,
            self.words,
            self.filename,
            qualname,
            self.firstlineno,
        )?;
        Ok(Arc::new(code))
    }
}

/// Net operand-stack effect of one instruction.
fn stack_effect(op: Opcode, arg: u32) -> i32 {
    let n = i32::try_from(arg).unwrap_or(i32::MAX);
    match op {
        Opcode::Nop | Opcode::ExtendedArg | Opcode::DeleteFast | Opcode::JumpForward | Opcode::JumpAbsolute => 0,
        Opcode::UnaryNegative | Opcode::UnaryPositive | Opcode::UnaryInvert | Opcode::UnaryNot => 0,
        Opcode::LoadAttr | Opcode::GetIter => 0,
        Opcode::BinarySubscr => -1,
        Opcode::PopTop
        | Opcode::StoreFast
        | Opcode::StoreName
        | Opcode::StoreGlobal
        | Opcode::StoreDeref
        | Opcode::ReturnValue
        | Opcode::PopJumpIfFalse
        | Opcode::PopJumpIfTrue
        | Opcode::JumpIfFalseOrPop
        | Opcode::JumpIfTrueOrPop
        | Opcode::DeleteAttr => -1,
        Opcode::DupTop
        | Opcode::LoadConst
        | Opcode::LoadFast
        | Opcode::LoadName
        | Opcode::LoadGlobal
        | Opcode::LoadDeref
        | Opcode::LoadClosure
        | Opcode::LoadMethod
        | Opcode::ForIter => 1,
        Opcode::BinaryAdd
        | Opcode::BinarySubtract
        | Opcode::BinaryMultiply
        | Opcode::BinaryTrueDivide
        | Opcode::BinaryFloorDivide
        | Opcode::BinaryModulo
        | Opcode::BinaryAnd
        | Opcode::BinaryOr
        | Opcode::BinaryXor
        | Opcode::CompareOp => -1,
        Opcode::StoreSubscr => -3,
        Opcode::DeleteSubscr | Opcode::StoreAttr => -2,
        Opcode::BuildTuple | Opcode::BuildList => 1 - n,
        Opcode::BuildMap => 1 - 2 * n,
        Opcode::UnpackSequence => n - 1,
        Opcode::UnpackEx => {
            let before = n & 0xFF;
            let after = n >> 8;
            before + after
        }
        Opcode::CallFunction => -n,
        Opcode::CallMethod | Opcode::CallFunctionKw => -(n + 1),
        Opcode::CallFunctionEx => -(1 + (n & 1)),
        Opcode::MakeFunction => -(n.count_ones() as i32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_targets_patch_to_bound_positions() {
        let mut rt = Runtime::new();
        let mut b = CodeBuilder::function("jumps");
        b.load_const(Const::Bool(true));
        let end = b.new_label();
        b.jump(Opcode::PopJumpIfFalse, end);
        b.load_const(Const::Int(1));
        b.emit(Opcode::ReturnValue);
        b.bind(end);
        b.load_const(Const::Int(2));
        b.emit(Opcode::ReturnValue);
        let code = b.finish(&mut rt).unwrap();
        // Word 1 is the ExtendedArg prefix, word 2 the jump itself; the
        // target is the bound position after the first return.
        let prefix = code.words[1] & 0xFF;
        let low = code.words[2] & 0xFF;
        let target = (prefix << 8) | low;
        assert_eq!(target, 5);
    }

    #[test]
    fn stack_depth_tracks_maximum() {
        let mut rt = Runtime::new();
        let mut b = CodeBuilder::function("depth");
        b.load_const(Const::Int(1));
        b.load_const(Const::Int(2));
        b.load_const(Const::Int(3));
        b.emit_arg(Opcode::BuildTuple, 3);
        b.emit(Opcode::ReturnValue);
        let code = b.finish(&mut rt).unwrap();
        assert_eq!(code.stacksize, 3);
    }
}
