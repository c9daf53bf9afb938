//! Call-argument binding.
//!
//! Maps a call site's arguments onto a fresh frame's local slots according
//! to the code object's declared shape: positional fill, keyword matching,
//! excess collection into `*args`/`**kwargs`, right-aligned defaults,
//! keyword-only defaults, and cell creation through the precomputed
//! cell-to-parameter map. Two call shapes feed this: the classic
//! argument-list + keyword-mapping form and the vector form (flat array
//! with a trailing name sequence naming the tail). Equivalent calls must
//! bind identically regardless of shape.

use crate::{
    exception::{ExcType, RunResult},
    frame::Frame,
    function::Function,
    heap::{Cell, HeapData},
    intern::StringId,
    runtime::Runtime,
    types::dict::{Dict, hash_key},
    value::Value,
};

/// Binds the classic call shape: positional slice plus keyword mapping.
pub(crate) fn bind_classic(
    rt: &mut Runtime,
    func: &Function,
    args: &[Value],
    kwargs: &[(StringId, Value)],
) -> RunResult<Frame> {
    bind(rt, func, args, kwargs)
}

/// Binds the vector call shape: a flat argument array whose trailing
/// `kwnames.len()` entries are keyword values named by `kwnames`.
pub(crate) fn bind_vector(
    rt: &mut Runtime,
    func: &Function,
    stack_args: &[Value],
    kwnames: &[StringId],
) -> RunResult<Frame> {
    let split = stack_args.len() - kwnames.len();
    let (pos, kw_values) = stack_args.split_at(split);
    let kwargs: Vec<(StringId, Value)> = kwnames.iter().copied().zip(kw_values.iter().copied()).collect();
    bind(rt, func, pos, &kwargs)
}

fn bind(rt: &mut Runtime, func: &Function, args: &[Value], kwargs: &[(StringId, Value)]) -> RunResult<Frame> {
    let code = func.code.clone();
    let argcount = code.argcount as usize;
    let kwonlycount = code.kwonlyargcount as usize;
    let mut frame = Frame::new(code.clone(), func.globals);

    // Positional arguments fill slots 0..min(given, declared).
    let nargs = args.len();
    for (slot, &value) in frame.locals.iter_mut().zip(args.iter().take(argcount)) {
        *slot = value;
    }

    // Keyword arguments match any parameter not already filled
    // positionally; the unmatched go to the **kwargs collector or fail.
    // Positional-only parameters never match a keyword.
    let posonly = code.posonlyargcount as usize;
    let mut excess_kwargs = code.has_varkeywords().then(Dict::new);
    for &(name, value) in kwargs {
        let param = code
            .varnames
            .iter()
            .take(argcount + kwonlycount)
            .position(|&p| p == name);
        if let Some(i) = param
            && i < posonly
            && !code.has_varkeywords()
        {
            return Err(type_error_for(
                rt,
                func,
                format!(
                    "got some positional-only arguments passed as keyword arguments: '{}'",
                    rt.interns.get_str(name)
                ),
            ));
        }
        let param = param.filter(|&i| i >= posonly);
        match param {
            Some(i) => {
                if !frame.locals[i].is_undefined() {
                    return Err(type_error_for(
                        rt,
                        func,
                        format!("got multiple values for argument '{}'", rt.interns.get_str(name)),
                    ));
                }
                frame.locals[i] = value;
            }
            None => match &mut excess_kwargs {
                Some(dict) => {
                    let key = Value::InternString(name);
                    let hash = hash_key(rt, key)?;
                    dict.insert(hash, key, value);
                }
                None => {
                    return Err(type_error_for(
                        rt,
                        func,
                        format!("got an unexpected keyword argument '{}'", rt.interns.get_str(name)),
                    ));
                }
            },
        }
    }

    if nargs > argcount {
        if code.has_varargs() {
            // Collect the excess into the *args slot, preserving order.
            let var_index = argcount + kwonlycount;
            let tuple = rt.alloc_tuple(args[argcount..].to_vec())?;
            frame.locals[var_index] = tuple;
        } else {
            // The test must come after keyword processing so keyword-only
            // arguments given can be reported accurately.
            return Err(too_many_positional(rt, func, &frame, nargs));
        }
    } else {
        if code.has_varargs() {
            let var_index = argcount + kwonlycount;
            frame.locals[var_index] = rt.alloc_tuple(Vec::new())?;
        }
        if nargs < argcount {
            apply_defaults(func, &mut frame);
        }
    }

    // Every positional slot must be bound now.
    check_missing(rt, func, &frame, 0, argcount, "positional")?;

    if kwonlycount > 0 {
        apply_kwdefaults(func, &mut frame, argcount, kwonlycount);
        check_missing(rt, func, &frame, argcount, argcount + kwonlycount, "keyword-only")?;
    }

    if let Some(dict) = excess_kwargs {
        let slot = argcount + kwonlycount + usize::from(code.has_varargs());
        let id = rt.heap.allocate(HeapData::Dict(dict))?;
        frame.locals[slot] = Value::Ref(id);
    }

    make_cells(rt, func, &mut frame)?;

    Ok(frame)
}

/// Fills the shortfall of positional parameters from the defaults
/// sequence, right-aligned: the last parameter gets the last default.
fn apply_defaults(func: &Function, frame: &mut Frame) {
    let Some(defaults) = &func.defaults else { return };
    let argcount = func.code.argcount as usize;
    let first_default = argcount - defaults.len().min(argcount);
    for (i, &default) in defaults.iter().enumerate() {
        let slot = first_default + i;
        if frame.locals[slot].is_undefined() {
            frame.locals[slot] = default;
        }
    }
}

/// Fills unbound keyword-only parameters from the keyword-defaults
/// mapping.
fn apply_kwdefaults(func: &Function, frame: &mut Frame, argcount: usize, kwonlycount: usize) {
    let Some(kwdefaults) = &func.kwdefaults else { return };
    for i in argcount..argcount + kwonlycount {
        if frame.locals[i].is_undefined() {
            let name = func.code.varnames[i];
            if let Some(&(_, value)) = kwdefaults.iter().find(|(n, _)| *n == name) {
                frame.locals[i] = value;
            }
        }
    }
}

/// Creates this frame's cells: fresh cells for the code's own cell
/// variables (capturing parameter values through the precomputed map), then
/// the closure's cells for free variables.
fn make_cells(rt: &mut Runtime, func: &Function, frame: &mut Frame) -> RunResult<()> {
    let code = &func.code;
    for i in 0..code.cellvars.len() {
        let initial = match code.cell_parameter(i) {
            Some(param) => {
                // The captured parameter's value moves into its cell.
                std::mem::replace(&mut frame.locals[param], Value::Undefined)
            }
            None => Value::Undefined,
        };
        let id = rt.heap.allocate(HeapData::Cell(Cell { value: initial }))?;
        frame.cells.push(id);
    }
    if !code.freevars.is_empty() {
        let Some(closure) = &func.closure else {
            return Err(crate::exception::RunError::internal(format!(
                "function '{}' has free variables but no closure",
                rt.interns.get_str(func.qualname)
            )));
        };
        frame.cells.extend(closure.iter().copied());
    }
    Ok(())
}

/// Collects still-unbound required parameters in a slot range and raises
/// the exact missing-arguments message.
fn check_missing(rt: &Runtime, func: &Function, frame: &Frame, start: usize, end: usize, kind: &str) -> RunResult<()> {
    let missing: Vec<String> = (start..end)
        .filter(|&i| frame.locals[i].is_undefined())
        .map(|i| format!("'{}'", rt.interns.get_str(func.code.varnames[i])))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    let listed = match missing.len() {
        1 => missing[0].clone(),
        2 => format!("{} and {}", missing[0], missing[1]),
        _ => {
            let (last, rest) = missing.split_last().expect("missing list is non-empty");
            format!("{}, and {last}", rest.join(", "))
        }
    };
    Err(type_error_for(
        rt,
        func,
        format!(
            "missing {} required {kind} argument{}: {listed}",
            missing.len(),
            if missing.len() == 1 { "" } else { "s" }
        ),
    ))
}

/// The exact too-many-positional message, with singular/plural forms and
/// the defaults range matching the declared count.
fn too_many_positional(rt: &Runtime, func: &Function, frame: &Frame, pos_given: usize) -> crate::exception::RunError {
    let code = &func.code;
    let argcount = code.argcount as usize;
    let defcount = func.defaults.as_ref().map_or(0, Vec::len);
    let end = argcount + code.kwonlyargcount as usize;

    // Count keyword-only arguments actually given.
    let kw_given = (argcount..end).filter(|&i| !frame.locals[i].is_undefined()).count();

    let (pos_text, pos_plural) = if defcount == 0 {
        (argcount.to_string(), argcount != 1)
    } else {
        (format!("from {} to {}", argcount - defcount, argcount), true)
    };

    let given_text = if kw_given > 0 {
        format!(
            " positional argument{} (and {} keyword-only argument{})",
            if pos_given == 1 { "" } else { "s" },
            kw_given,
            if kw_given == 1 { "" } else { "s" }
        )
    } else {
        String::new()
    };

    type_error_for(
        rt,
        func,
        format!(
            "takes {pos_text} positional argument{} but {pos_given}{given_text} {} given",
            if pos_plural { "s" } else { "" },
            if pos_given == 1 && kw_given == 0 { "was" } else { "were" }
        ),
    )
}

fn type_error_for(rt: &Runtime, func: &Function, detail: String) -> crate::exception::RunError {
    ExcType::type_error(format!("{}() {detail}", rt.interns.get_str(func.qualname)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{builder::CodeBuilder, opcode::Opcode};

    fn two_param_function(rt: &mut Runtime, defaults: Option<Vec<Value>>) -> Function {
        let mut b = CodeBuilder::function("f");
        b.param("a");
        b.param("b");
        b.emit(Opcode::ReturnValue);
        let code = b.finish(rt).unwrap();
        let globals = rt.new_namespace();
        let mut func = Function::new(code, globals);
        func.defaults = defaults;
        func
    }

    fn assert_int(v: Value, expected: i64) {
        match v {
            Value::Int(i) => assert_eq!(i, expected),
            other => panic!("expected Int({expected}), got {other:?}"),
        }
    }

    #[test]
    fn defaults_fill_right_aligned() {
        let mut rt = Runtime::new();
        let func = two_param_function(&mut rt, Some(vec![Value::Int(3), Value::Int(4)]));
        let frame = bind_classic(&mut rt, &func, &[], &[]).unwrap();
        assert_int(frame.locals[0], 3);
        assert_int(frame.locals[1], 4);
    }

    #[test]
    fn varargs_collects_excess() {
        let mut rt = Runtime::new();
        let mut b = CodeBuilder::function("f");
        b.param("a");
        b.varargs("rest");
        b.emit(Opcode::ReturnValue);
        let code = b.finish(&mut rt).unwrap();
        let globals = rt.new_namespace();
        let func = Function::new(code, globals);

        let args = [Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)];
        let frame = bind_classic(&mut rt, &func, &args, &[]).unwrap();
        assert_int(frame.locals[0], 1);
        let Value::Ref(id) = frame.locals[1] else {
            panic!("expected *args tuple");
        };
        let HeapData::Tuple(items) = rt.heap.get(id) else {
            panic!("expected tuple data");
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn classic_and_vector_shapes_bind_identically() {
        let mut rt = Runtime::new();
        let func = two_param_function(&mut rt, Some(vec![Value::Int(9)]));

        let b_name = rt.intern("b");
        let classic = bind_classic(&mut rt, &func, &[Value::Int(1)], &[(b_name, Value::Int(2))]).unwrap();
        let vector = bind_vector(&mut rt, &func, &[Value::Int(1), Value::Int(2)], &[b_name]).unwrap();

        for (c, v) in classic.locals.iter().zip(vector.locals.iter()) {
            assert!(c.identical(*v), "classic {c:?} != vector {v:?}");
        }
    }

    #[test]
    fn too_many_positional_message_is_exact() {
        let mut rt = Runtime::new();
        let func = two_param_function(&mut rt, None);
        let err = bind_classic(&mut rt, &func, &[Value::Int(1), Value::Int(2), Value::Int(3)], &[]).unwrap_err();
        let crate::exception::RunError::Exc(exc) = err else {
            panic!("expected user-level exception");
        };
        assert_eq!(
            exc.message.as_deref(),
            Some("f() takes 2 positional arguments but 3 were given")
        );
    }

    #[test]
    fn single_parameter_message_is_singular() {
        let mut rt = Runtime::new();
        let mut b = CodeBuilder::function("g");
        b.param("a");
        b.emit(Opcode::ReturnValue);
        let code = b.finish(&mut rt).unwrap();
        let globals = rt.new_namespace();
        let func = Function::new(code, globals);

        let err = bind_classic(&mut rt, &func, &[Value::Int(1), Value::Int(2)], &[]).unwrap_err();
        let crate::exception::RunError::Exc(exc) = err else {
            panic!("expected user-level exception");
        };
        assert_eq!(
            exc.message.as_deref(),
            Some("g() takes 1 positional argument but 2 were given")
        );
    }

    #[test]
    fn captured_parameter_moves_into_its_cell() {
        let mut rt = Runtime::new();
        let mut b = CodeBuilder::function("h");
        b.param("x");
        b.cellvar("x");
        b.emit(Opcode::ReturnValue);
        let code = b.finish(&mut rt).unwrap();
        let globals = rt.new_namespace();
        let func = Function::new(Arc::clone(&code), globals);

        let frame = bind_classic(&mut rt, &func, &[Value::Int(42)], &[]).unwrap();
        assert!(frame.locals[0].is_undefined());
        let HeapData::Cell(cell) = rt.heap.get(frame.cells[0]) else {
            panic!("expected cell");
        };
        assert_int(cell.value, 42);
    }
}
