// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use strum::FromRepr;

/// A numeric object reference, as written in the dump (`#-1` is `NOTHING`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(transparent)]
pub struct Objid(pub i64);

pub const NOTHING: Objid = Objid(-1);
pub const AMBIGUOUS: Objid = Objid(-2);
pub const FAILED_MATCH: Objid = Objid(-3);
pub const SYSTEM_OBJECT: Objid = Objid(0);

impl Objid {
    pub const fn mk_id(id: i64) -> Self {
        Objid(id)
    }

    pub fn id(&self) -> i64 {
        self.0
    }

    pub fn is_nothing(&self) -> bool {
        *self == NOTHING
    }
}

impl Display for Objid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type tags as they appear on disk ahead of each stored value.
#[repr(i64)]
#[derive(Debug, Eq, PartialEq, Copy, Clone, FromRepr)]
#[allow(non_camel_case_types)]
pub enum VarType {
    TYPE_INT = 0,
    TYPE_OBJ = 1,
    TYPE_STR = 2,
    TYPE_ERR = 3,
    TYPE_LIST = 4,
    TYPE_CLEAR = 5,
    TYPE_NONE = 6,
    TYPE_CATCH = 7,
    TYPE_FINALLY = 8,
    TYPE_FLOAT = 9,
    TYPE_MAP = 10,
    TYPE_ITER = 11,
    TYPE_ANON = 12,
    TYPE_WAIF = 13,
    TYPE_BOOL = 14,
}

/// Error names by code, LambdaMOO's set followed by ToastStunt's additions.
pub const ERROR_NAMES: [&str; 19] = [
    "E_NONE", "E_TYPE", "E_DIV", "E_PERM", "E_PROPNF", "E_VERBNF", "E_VARNF", "E_INVIND",
    "E_RECMOVE", "E_MAXREC", "E_RANGE", "E_ARGS", "E_NACC", "E_INVARG", "E_QUOTA", "E_FLOAT",
    "E_FILE", "E_EXEC", "E_INTRPT",
];

/// A decoded dynamic value.
#[derive(Clone, Debug, Serialize)]
pub enum Value {
    Str(String),
    Obj(Objid),
    /// Anonymous objects are stored by their dump-local number.
    Anon(Objid),
    Int(i64),
    Float(f64),
    Err(i64),
    List(Vec<Value>),
    Map(#[serde(serialize_with = "serialize_pairs")] BTreeMap<Value, Value>),
    /// Property value inherited from the parent.
    Clear,
    None,
    Bool(bool),
}

impl Value {
    pub fn type_code(&self) -> VarType {
        match self {
            Value::Str(_) => VarType::TYPE_STR,
            Value::Obj(_) => VarType::TYPE_OBJ,
            Value::Anon(_) => VarType::TYPE_ANON,
            Value::Int(_) => VarType::TYPE_INT,
            Value::Float(_) => VarType::TYPE_FLOAT,
            Value::Err(_) => VarType::TYPE_ERR,
            Value::List(_) => VarType::TYPE_LIST,
            Value::Map(_) => VarType::TYPE_MAP,
            Value::Clear => VarType::TYPE_CLEAR,
            Value::None => VarType::TYPE_NONE,
            Value::Bool(_) => VarType::TYPE_BOOL,
        }
    }

    pub fn as_object(&self) -> Option<Objid> {
        match self {
            Value::Obj(o) | Value::Anon(o) => Some(*o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Every object id this value names, either directly or as a list of references.
    /// Used for parent and location values, which may be either shape.
    pub fn object_refs(&self) -> Vec<Objid> {
        match self {
            Value::Obj(o) | Value::Anon(o) => vec![*o],
            Value::List(l) => l.iter().filter_map(Value::as_object).collect(),
            _ => vec![],
        }
    }

    /// MOO literal syntax, for display.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Str(s) => format!("{s:?}"),
            Value::Obj(o) => o.to_string(),
            Value::Anon(o) => format!("*anonymous*{o}"),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{f:?}"),
            Value::Err(e) => match usize::try_from(*e).ok().and_then(|i| ERROR_NAMES.get(i)) {
                Some(name) => name.to_string(),
                None => format!("E_{e}"),
            },
            Value::List(l) => {
                let items: Vec<_> = l.iter().map(Value::to_literal).collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Map(m) => {
                let items: Vec<_> = m
                    .iter()
                    .map(|(k, v)| format!("{} -> {}", k.to_literal(), v.to_literal()))
                    .collect();
                format!("[{}]", items.join(", "))
            }
            Value::Clear => "<clear>".to_string(),
            Value::None => "<none>".to_string(),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn type_rank(&self) -> u8 {
        self.type_code() as u8
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_literal())
    }
}

// Floats compare by `total_cmp` so that values can be map keys.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Obj(a), Value::Obj(b)) | (Value::Anon(a), Value::Anon(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) | (Value::Err(a), Value::Err(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.iter().cmp(b.iter()),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Clear, Value::Clear) | (Value::None, Value::None) => Ordering::Equal,
            _ => self.type_rank().cmp(&other.type_rank()),
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

fn serialize_pairs<S: Serializer>(
    map: &BTreeMap<Value, Value>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(map.len()))?;
    for pair in map {
        seq.serialize_element(&pair)?;
    }
    seq.end()
}

pub fn v_int(i: i64) -> Value {
    Value::Int(i)
}

pub fn v_str(s: &str) -> Value {
    Value::Str(s.to_string())
}

pub fn v_obj(o: i64) -> Value {
    Value::Obj(Objid(o))
}

pub fn v_float(f: f64) -> Value {
    Value::Float(f)
}

pub fn v_list(l: &[Value]) -> Value {
    Value::List(l.to_vec())
}

pub fn v_empty_list() -> Value {
    Value::List(vec![])
}

pub fn v_map(pairs: &[(Value, Value)]) -> Value {
    Value::Map(pairs.iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_order_totally() {
        assert_eq!(v_float(f64::NAN), v_float(f64::NAN));
        assert!(v_float(-0.0) < v_float(0.0));
        assert!(v_float(1.0) < v_float(2.5));
    }

    #[test]
    fn different_types_do_not_collide() {
        assert_ne!(v_int(1), v_obj(1));
        assert_ne!(v_int(1), Value::Err(1));
        assert_ne!(v_obj(1), Value::Anon(Objid(1)));
        assert_ne!(Value::Clear, Value::None);
    }

    #[test]
    fn compound_values_as_map_keys() {
        let m = v_map(&[
            (v_list(&[v_int(1)]), v_str("list key")),
            (v_map(&[(v_str("k"), v_int(2))]), v_str("map key")),
            (v_float(1.5), v_str("float key")),
        ]);
        let Value::Map(m) = m else {
            panic!("expected map");
        };
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(&v_list(&[v_int(1)])), Some(&v_str("list key")));
        assert_eq!(
            m.get(&v_map(&[(v_str("k"), v_int(2))])),
            Some(&v_str("map key"))
        );
    }

    #[test]
    fn object_refs_from_either_shape() {
        assert_eq!(v_obj(3).object_refs(), vec![Objid(3)]);
        assert_eq!(
            v_list(&[v_obj(1), v_int(7), v_obj(2)]).object_refs(),
            vec![Objid(1), Objid(2)]
        );
        assert!(v_str("x").object_refs().is_empty());
    }

    #[test]
    fn literals() {
        let v = v_list(&[v_int(1), v_str("a"), v_empty_list(), v_obj(-1)]);
        assert_eq!(v.to_literal(), r#"{1, "a", {}, #-1}"#);
        assert_eq!(Value::Err(3).to_literal(), "E_PERM");
        assert_eq!(Value::Err(99).to_literal(), "E_99");
        assert_eq!(
            v_map(&[(v_str("b"), v_int(2)), (v_str("a"), v_int(1))]).to_literal(),
            r#"["a" -> 1, "b" -> 2]"#
        );
    }
}
