//! Sequence iterators, backing the iteration protocol.
//!
//! `Iter` on a sequence allocates a [`SeqIter`]; `Next` advances it and
//! signals exhaustion with StopIteration. Starred unpacking and `ForIter`
//! both drive this protocol.

use crate::{
    exception::{ExcType, RunResult},
    heap::HeapData,
    runtime::Runtime,
    types::{
        seq::seq_elements,
        slot::{SlotKind, SlotValue},
    },
    value::Value,
};

/// Iteration state over a sequence value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SeqIter {
    pub seq: Value,
    pub index: usize,
}

/// Allocates a fresh iterator over a tuple or list.
pub(crate) fn new_seq_iter(rt: &mut Runtime, seq: Value) -> RunResult<Value> {
    let id = rt.heap.allocate(HeapData::SeqIter(SeqIter { seq, index: 0 }))?;
    Ok(Value::Ref(id))
}

fn seq_iter_iter(_rt: &mut Runtime, v: Value) -> RunResult<Value> {
    Ok(v)
}

fn seq_iter_next(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let Value::Ref(id) = v else {
        return Err(ExcType::stop_iteration());
    };
    let state = match rt.heap.get(id) {
        HeapData::SeqIter(state) => *state,
        _ => return Err(ExcType::stop_iteration()),
    };
    let item = seq_elements(&rt.heap, state.seq).and_then(|items| items.get(state.index).copied());
    match item {
        Some(item) => {
            if let HeapData::SeqIter(state) = rt.heap.get_mut(id) {
                state.index += 1;
            }
            Ok(item)
        }
        None => Err(ExcType::stop_iteration()),
    }
}

/// The sequence iterator's literal implementation table.
pub(crate) const SEQ_ITER_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Iter, SlotValue::Unary(seq_iter_iter)),
    (SlotKind::Next, SlotValue::Unary(seq_iter_next)),
];
