//! Dynamically-typed items and the shared containers nodes write into.
//!
//! Items flowing through a pipeline and the output snapshots nodes return are
//! both [`Value`]s. Container variants hold reference-counted handles, so a
//! list handed to the driver as a target is the very list the caller reads
//! afterwards.

use crate::error::{PipelineError, Result};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A growable sequence shared by reference
#[derive(Clone, Default)]
pub struct SharedList(Arc<RwLock<Vec<Value>>>);

impl SharedList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing vector
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }

    /// Append an item in place
    pub fn push(&self, item: Value) {
        self.0.write().push(item);
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Get a copy of the item at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    /// Copy the current contents out
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    /// Whether both handles refer to the same list
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Copy the contents into a new, unaliased list
    pub fn deep_clone(&self) -> Self {
        Self::from_vec(self.to_vec())
    }
}

impl fmt::Debug for SharedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.read().iter()).finish()
    }
}

/// An ordered set of unique values shared by reference
#[derive(Clone, Default)]
pub struct SharedSet(Arc<RwLock<BTreeSet<Value>>>);

impl SharedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item in place; returns whether it was new
    ///
    /// Inserting the set into itself stores a snapshot copy instead, since
    /// ordering it against its siblings would read the set under its own
    /// write lock. Deeper self-nesting, such as a tuple holding this set, is
    /// not detected and deadlocks.
    pub fn insert(&self, item: Value) -> bool {
        let item = match item {
            Value::Set(set) if set.ptr_eq(self) => Value::Set(self.deep_clone()),
            other => other,
        };
        self.0.write().insert(item)
    }

    /// Copy into a new, unaliased set
    pub fn deep_clone(&self) -> Self {
        Self(Arc::new(RwLock::new(self.0.read().clone())))
    }

    pub fn contains(&self, item: &Value) -> bool {
        self.0.read().contains(item)
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Copy the current contents out, in ascending order
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.read().iter().cloned().collect()
    }

    /// Whether both handles refer to the same set
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.read().iter()).finish()
    }
}

/// An ordered mapping shared by reference
#[derive(Clone, Default)]
pub struct SharedMap(Arc<RwLock<BTreeMap<Value, Value>>>);

impl SharedMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `key`
    pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
        self.0.write().insert(key, value)
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.0.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Copy the keys out, in ascending order
    pub fn keys(&self) -> Vec<Value> {
        self.0.read().keys().cloned().collect()
    }

    /// Copy the entries out, in ascending key order
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Whether both handles refer to the same map
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.read().iter()).finish()
    }
}

/// A dynamically-typed item or output snapshot
#[derive(Clone, Debug)]
pub enum Value {
    /// No value yet (e.g. `First` before any input)
    Null,
    /// The pre-first-item output of `Max`/`Min`; orders below everything
    Sentinel,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Immutable fixed-length sequence, the output shape of fan-out nodes
    Tuple(Vec<Value>),
    List(SharedList),
    Set(SharedSet),
    Map(SharedMap),
}

impl Value {
    /// Build a tuple value
    pub fn tuple<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Build a fresh shared list value
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(SharedList::from_vec(
            items.into_iter().map(Into::into).collect(),
        ))
    }

    /// Short name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Sentinel => "sentinel",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
        }
    }

    /// Truthiness: null, sentinel, false, zero and empty things are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::Sentinel => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Set(s) => !s.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Whether this is a placeholder produced by priming rather than data
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Value::Null | Value::Sentinel)
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(PipelineError::TypeMismatch {
                expected: "number",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            other => Err(PipelineError::TypeMismatch {
                expected: "int",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&SharedList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&SharedSet> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&SharedMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up `key` in this value: positional for tuples, lists and
    /// strings (negative indices count from the end), keyed for maps
    pub fn get(&self, key: &Value) -> Result<Value> {
        match self {
            Value::Tuple(items) => {
                let index = key.as_i64()?;
                resolve_index(index, items.len()).map(|i| items[i].clone())
            }
            Value::List(list) => {
                let index = key.as_i64()?;
                let items = list.0.read();
                let i = resolve_index(index, items.len())?;
                Ok(items[i].clone())
            }
            Value::Str(s) => {
                let index = key.as_i64()?;
                let len = s.chars().count();
                let i = resolve_index(index, len)?;
                Ok(s.chars().nth(i).map(Value::from).unwrap_or(Value::Null))
            }
            Value::Map(map) => map
                .get(key)
                .ok_or_else(|| PipelineError::KeyNotFound(key.to_string())),
            other => Err(PipelineError::TypeMismatch {
                expected: "indexable",
                found: other.type_name(),
            }),
        }
    }

    /// The components of a tuple or list
    pub fn components(&self) -> Result<Vec<Value>> {
        match self {
            Value::Tuple(items) => Ok(items.clone()),
            Value::List(list) => Ok(list.to_vec()),
            other => Err(PipelineError::TypeMismatch {
                expected: "sequence",
                found: other.type_name(),
            }),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Sentinel => 0,
            Value::Null => 1,
            Value::Bool(_) => 2,
            Value::Int(_) | Value::Float(_) => 3,
            Value::Str(_) => 4,
            Value::Tuple(_) => 5,
            Value::List(_) => 6,
            Value::Set(_) => 7,
            Value::Map(_) => 8,
        }
    }
}

/// Resolve a possibly negative index against `len`, counting back from the end
pub(crate) fn resolve_index(index: i64, len: usize) -> Result<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(PipelineError::IndexOutOfRange { index, len });
    }
    Ok(resolved as usize)
}

/// 2^63, the first float above every `i64`
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Zeroes compare equal; NaNs sort to the ends by sign, as `total_cmp` does
fn cmp_floats(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

/// Exact comparison, so `Int(n) == Float(n as f64)` only when no precision is lost
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= I64_BOUND {
        return Ordering::Less;
    }
    if f < -I64_BOUND {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal if f > whole => Ordering::Less,
        Ordering::Equal if f < whole => Ordering::Greater,
        ord => ord,
    }
}

/// The `i64` a float equals exactly, if any
fn whole_float(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f)).then(|| f as i64)
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => cmp_floats(*a, *b),
            (Value::Int(a), Value::Float(b)) => cmp_int_float(*a, *b),
            (Value::Float(a), Value::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Tuple(a), Value::Tuple(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                if a.ptr_eq(b) {
                    Ordering::Equal
                } else {
                    a.0.read().cmp(&*b.0.read())
                }
            }
            (Value::Set(a), Value::Set(b)) => {
                if a.ptr_eq(b) {
                    Ordering::Equal
                } else {
                    a.0.read().cmp(&*b.0.read())
                }
            }
            (Value::Map(a), Value::Map(b)) => {
                if a.ptr_eq(b) {
                    Ordering::Equal
                } else {
                    a.0.read().cmp(&*b.0.read())
                }
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Ints and floats share a rank so that `2` and `2.0` hash alike
        self.rank().hash(state);
        match self {
            Value::Null | Value::Sentinel => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => match whole_float(*f) {
                Some(i) => i.hash(state),
                None => f.to_bits().hash(state),
            },
            Value::Str(s) => s.hash(state),
            Value::Tuple(t) => t.hash(state),
            Value::List(l) => l.0.read().hash(state),
            Value::Set(s) => s.0.read().hash(state),
            Value::Map(m) => m.0.read().hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Sentinel => write!(f, "<sentinel>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Tuple(t) => {
                write!(f, "(")?;
                write_joined(f, t.iter())?;
                write!(f, ")")
            }
            Value::List(l) => {
                write!(f, "[")?;
                write_joined(f, l.0.read().iter())?;
                write!(f, "]")
            }
            Value::Set(s) => {
                write!(f, "{{")?;
                write_joined(f, s.0.read().iter())?;
                write!(f, "}}")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.0.read().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match item {
            Value::Str(s) => write!(f, "{s:?}")?,
            other => write!(f, "{other}")?,
        }
    }
    Ok(())
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Str(c.to_string())
    }
}

impl From<SharedList> for Value {
    fn from(l: SharedList) -> Self {
        Value::List(l)
    }
}

impl From<SharedSet> for Value {
    fn from(s: SharedSet) -> Self {
        Value::Set(s)
    }
}

impl From<SharedMap> for Value {
    fn from(m: SharedMap) -> Self {
        Value::Map(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::Tuple(vec![a.into(), b.into(), c.into()])
    }
}
