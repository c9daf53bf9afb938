//! The dict type: insertion-ordered mapping over hashable builtin keys.
//!
//! Keys hash through a canonical [`HashKey`] projection that unifies the
//! numeric tower the way the emulated language requires: `True`, `1`,
//! `1.0` and the big-int one are all the same key.

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    dispatch,
    exception::{ExcType, RunResult},
    heap::HeapData,
    runtime::Runtime,
    types::slot::{SlotKind, SlotValue},
    value::Value,
};

/// Canonical hashable projection of a key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HashKey {
    None,
    Int(i64),
    Big(BigInt),
    /// Non-integral floats, keyed by bit pattern.
    FloatBits(u64),
    Str(Box<str>),
}

/// Projects a value onto its canonical hash key.
///
/// Fails with TypeError for unhashable values (lists, dicts, instances
/// without hashing support).
pub(crate) fn hash_key(rt: &Runtime, v: Value) -> RunResult<HashKey> {
    match v {
        Value::None => Ok(HashKey::None),
        Value::Bool(b) => Ok(HashKey::Int(i64::from(b))),
        Value::Int(i) => Ok(HashKey::Int(i)),
        Value::Float(f) => {
            if f.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&f) {
                Ok(HashKey::Int(f as i64))
            } else {
                Ok(HashKey::FloatBits(f.to_bits()))
            }
        }
        Value::InternString(id) => Ok(HashKey::Str(rt.interns.get_str(id).into())),
        Value::Ref(id) => match rt.heap.get(id) {
            HeapData::BigInt(b) => Ok(b
                .to_i64()
                .map_or_else(|| HashKey::Big(b.clone()), HashKey::Int)),
            HeapData::Str(s) => Ok(HashKey::Str(s.clone())),
            _ => {
                let type_name = rt.value_type_name(v).to_owned();
                Err(ExcType::type_error(format!("unhashable type: '{type_name}'")))
            }
        },
        _ => {
            let type_name = rt.value_type_name(v).to_owned();
            Err(ExcType::type_error(format!("unhashable type: '{type_name}'")))
        }
    }
}

/// Insertion-ordered mapping storage. Each entry keeps the original key
/// value alongside the stored value so iteration and repr see what the
/// program inserted.
#[derive(Debug, Default)]
pub(crate) struct Dict {
    entries: IndexMap<HashKey, (Value, Value), ahash::RandomState>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn lookup(&self, key: &HashKey) -> Option<Value> {
        self.entries.get(key).map(|(_, v)| *v)
    }

    pub fn insert(&mut self, hash: HashKey, key: Value, value: Value) {
        self.entries.insert(hash, (key, value));
    }

    pub fn remove(&mut self, key: &HashKey) -> Option<Value> {
        self.entries.shift_remove(key).map(|(_, v)| v)
    }

    /// Key/value pairs in insertion order.
    pub fn pairs(&self) -> Vec<(Value, Value)> {
        self.entries.values().copied().collect()
    }
}

fn dict_data<'a>(rt: &'a Runtime, v: Value) -> Option<&'a Dict> {
    match v {
        Value::Ref(id) => match rt.heap.get(id) {
            HeapData::Dict(d) => Some(d),
            _ => None,
        },
        _ => None,
    }
}

fn dict_len(rt: &mut Runtime, v: Value) -> RunResult<usize> {
    Ok(dict_data(rt, v).map_or(0, Dict::len))
}

fn dict_bool(rt: &mut Runtime, v: Value) -> RunResult<bool> {
    Ok(dict_data(rt, v).is_some_and(|d| d.len() > 0))
}

fn dict_getitem(rt: &mut Runtime, container: Value, key: Value) -> RunResult<Value> {
    let hash = hash_key(rt, key)?;
    match dict_data(rt, container).and_then(|d| d.lookup(&hash)) {
        Some(v) => Ok(v),
        None => {
            let key_repr = rt.repr_str(key)?;
            Err(ExcType::key_error(key_repr, key))
        }
    }
}

fn dict_setitem(rt: &mut Runtime, container: Value, key: Value, value: Value) -> RunResult<()> {
    let hash = hash_key(rt, key)?;
    if let Value::Ref(id) = container
        && let HeapData::Dict(d) = rt.heap.get_mut(id)
    {
        d.insert(hash, key, value);
    }
    Ok(())
}

fn dict_delitem(rt: &mut Runtime, container: Value, key: Value) -> RunResult<()> {
    let hash = hash_key(rt, key)?;
    let removed = match container {
        Value::Ref(id) => match rt.heap.get_mut(id) {
            HeapData::Dict(d) => d.remove(&hash).is_some(),
            _ => false,
        },
        _ => false,
    };
    if removed {
        Ok(())
    } else {
        let key_repr = rt.repr_str(key)?;
        Err(ExcType::key_error(key_repr, key))
    }
}

fn dict_contains(rt: &mut Runtime, container: Value, item: Value) -> RunResult<bool> {
    let hash = hash_key(rt, item)?;
    Ok(dict_data(rt, container).is_some_and(|d| d.lookup(&hash).is_some()))
}

fn dict_eq(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    let pairs = match (dict_data(rt, left), dict_data(rt, right)) {
        (Some(a), Some(b)) => {
            if a.len() != b.len() {
                return Ok(Value::Bool(false));
            }
            a.pairs()
        }
        _ => return Ok(Value::NotImplemented),
    };
    for (key, value) in pairs {
        let hash = hash_key(rt, key)?;
        let Some(other_value) = dict_data(rt, right).and_then(|d| d.lookup(&hash)) else {
            return Ok(Value::Bool(false));
        };
        if !dispatch::value_eq(rt, value, other_value)? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn dict_ne(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    match dict_eq(rt, left, right)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

fn dict_repr(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let Some(pairs) = dict_data(rt, v).map(Dict::pairs) else {
        return Ok(Value::NotImplemented);
    };
    let mut parts = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        parts.push(format!("{}: {}", rt.repr_str(key)?, rt.repr_str(value)?));
    }
    rt.alloc_str(&format!("{{{}}}", parts.join(", ")))
}

/// The dict type's literal implementation table.
pub(crate) const DICT_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(dict_repr)),
    (SlotKind::Bool, SlotValue::Predicate(dict_bool)),
    (SlotKind::Len, SlotValue::Len(dict_len)),
    (SlotKind::GetItem, SlotValue::Binary(dict_getitem)),
    (SlotKind::SetItem, SlotValue::SetItem(dict_setitem)),
    (SlotKind::DelItem, SlotValue::DelItem(dict_delitem)),
    (SlotKind::Contains, SlotValue::Contains(dict_contains)),
    (SlotKind::Eq, SlotValue::Binary(dict_eq)),
    (SlotKind::Ne, SlotValue::Binary(dict_ne)),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_keys_unify() {
        let rt = Runtime::new();
        let one_int = hash_key(&rt, Value::Int(1)).unwrap();
        let one_bool = hash_key(&rt, Value::Bool(true)).unwrap();
        let one_float = hash_key(&rt, Value::Float(1.0)).unwrap();
        assert_eq!(one_int, one_bool);
        assert_eq!(one_int, one_float);
    }

    #[test]
    fn fractional_floats_do_not_collide_with_ints() {
        let rt = Runtime::new();
        let half = hash_key(&rt, Value::Float(0.5)).unwrap();
        let zero = hash_key(&rt, Value::Int(0)).unwrap();
        assert_ne!(half, zero);
    }
}
