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

//! Decoding of LambdaMOO (format 4) and ToastStunt (format 17+) textual database dumps into
//! an in-memory object graph, and encoding them back out.

pub use cursor::LineCursor;
pub use error::DbReaderError;
pub use load::{load_database, read_database};
pub use read::DatabaseReader;
pub use value::{
    AMBIGUOUS, ERROR_NAMES, FAILED_MATCH, NOTHING, Objid, SYSTEM_OBJECT, Value, VarType,
    v_empty_list, v_float, v_int, v_list, v_map, v_obj, v_str,
};
pub use version::{FormatVersion, Schema, SchemaFeatures};
pub use write::DatabaseWriter;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

mod cursor;
mod error;
pub mod headers;
mod load;
mod read;
mod value;
mod version;
mod write;

const VF_READ: i64 = 1;
const VF_WRITE: i64 = 2;
const VF_EXEC: i64 = 4;
const VF_DEBUG: i64 = 8;
const VF_DOBJSHIFT: i64 = 4;
const VF_IOBJSHIFT: i64 = 6;
const VF_OBJMASK: i64 = 0x3;

const VF_ASPEC_NONE: i64 = 0;
const VF_ASPEC_ANY: i64 = 1;
const VF_ASPEC_THIS: i64 = 2;

const PF_READ: i64 = 1;
const PF_WRITE: i64 = 2;
const PF_CHOWN: i64 = 4;

const PREP_ANY: i64 = -2;
const PREP_NONE: i64 = -1;

/// What mode to use for strings that contain non-ASCII characters.
///
/// LambdaMOO and ToastStunt write ISO-8859-1; dumps that have been through other tooling are
/// often UTF-8. The default is UTF-8.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingMode {
    // windows-1252 / ISO-8859-1
    #[serde(alias = "iso8859-1", alias = "latin1")]
    ISO8859_1,
    #[default]
    #[serde(alias = "utf8", alias = "utf-8")]
    UTF8,
}

impl TryFrom<&str> for EncodingMode {
    type Error = &'static str;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "ISO-8859-1" | "iso-8859-1" | "iso8859-1" | "latin1" => Ok(EncodingMode::ISO8859_1),
            "UTF8" | "UTF-8" | "utf8" | "utf-8" => Ok(EncodingMode::UTF8),
            _ => Err("Invalid encoding mode"),
        }
    }
}

impl FromStr for EncodingMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EncodingMode::try_from(s)
    }
}

/// Knobs for a single decode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    pub encoding: EncodingMode,
    /// How deeply lists and maps may nest before the input is rejected.
    pub max_value_depth: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            encoding: EncodingMode::default(),
            max_value_depth: 512,
        }
    }
}

/// Object flag bits, by bit position.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ObjFlag {
    User = 0,
    Programmer = 1,
    Wizard = 2,
    Read = 4,
    Write = 5,
    Fertile = 7,
}

/// How a verb's direct or indirect object argument is matched.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum ArgSpec {
    None,
    Any,
    This,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum PrepSpec {
    Any,
    None,
    /// Index into the server's preposition table.
    Other(i64),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Verb {
    pub name: String,
    pub owner: Objid,
    pub perms: i64,
    pub prep: i64,
    /// Source lines, attached once the verb-code section names this verb.
    pub code: Option<Vec<String>>,
}

impl Verb {
    /// Permission letters in `rwxd` order.
    pub fn permissions(&self) -> String {
        [(VF_READ, 'r'), (VF_WRITE, 'w'), (VF_EXEC, 'x'), (VF_DEBUG, 'd')]
            .iter()
            .filter(|(bit, _)| self.perms & bit != 0)
            .map(|(_, c)| *c)
            .collect()
    }

    pub fn dobj(&self) -> ArgSpec {
        cv_aspec_flag((self.perms >> VF_DOBJSHIFT) & VF_OBJMASK)
    }

    pub fn iobj(&self) -> ArgSpec {
        cv_aspec_flag((self.perms >> VF_IOBJSHIFT) & VF_OBJMASK)
    }

    pub fn prep_spec(&self) -> PrepSpec {
        match self.prep {
            PREP_ANY => PrepSpec::Any,
            PREP_NONE => PrepSpec::None,
            other => PrepSpec::Other(other),
        }
    }
}

fn cv_aspec_flag(bits: i64) -> ArgSpec {
    match bits {
        VF_ASPEC_ANY => ArgSpec::Any,
        VF_ASPEC_THIS => ArgSpec::This,
        VF_ASPEC_NONE => ArgSpec::None,
        // The fourth encoding is unused by servers; treat it as the most restrictive.
        _ => ArgSpec::None,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Property {
    /// `None` for slots inherited from an ancestor rather than defined here.
    pub name: Option<String>,
    pub value: Value,
    pub owner: Objid,
    pub perms: i64,
}

impl Property {
    /// Permission letters in `rwc` order.
    pub fn permissions(&self) -> String {
        [(PF_READ, 'r'), (PF_WRITE, 'w'), (PF_CHOWN, 'c')]
            .iter()
            .filter(|(bit, _)| self.perms & bit != 0)
            .map(|(_, c)| *c)
            .collect()
    }

    pub fn is_clear(&self) -> bool {
        self.value == Value::Clear
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Object {
    pub id: Objid,
    pub name: String,
    pub flags: i64,
    pub owner: Objid,
    /// A plain object reference in v4 dumps; any value in next-gen dumps.
    pub location: Value,
    /// Next-gen dumps from format 15 on.
    pub last_move: Option<Value>,
    /// A single reference in v4 dumps; a reference or a list of them in next-gen dumps.
    pub parents: Value,
    pub verbs: Vec<Verb>,
    pub properties: Vec<Property>,
}

impl Object {
    pub fn has_flag(&self, flag: ObjFlag) -> bool {
        self.flags & (1 << flag as u8) != 0
    }

    /// Parent ids, with `#-1` (no parent) left out.
    pub fn parent_ids(&self) -> Vec<Objid> {
        self.parents
            .object_refs()
            .into_iter()
            .filter(|o| !o.is_nothing())
            .collect()
    }

    pub fn location_id(&self) -> Option<Objid> {
        self.location.as_object().filter(|o| !o.is_nothing())
    }

    /// Named properties defined on this object, in declaration order.
    pub fn defined_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.name.is_some())
    }
}

/// The innermost frame of a stored task.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Activation {
    pub this: Objid,
    pub player: Objid,
    pub programmer: Objid,
    pub vloc: Objid,
    pub debug: bool,
    pub verb_location: String,
    pub verb_name: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum TaskKind {
    /// Forked, waiting on a start time, with its source and frame.
    Queued,
    /// Suspended mid-execution; only the header and resume value are kept.
    Suspended,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueuedTask {
    pub kind: TaskKind,
    /// 0 for suspended tasks, whose position is only known at the opcode level.
    pub first_lineno: i64,
    pub id: i64,
    pub start_time: i64,
    pub activation: Option<Activation>,
    pub rt_env: IndexMap<String, Value>,
    pub code: Vec<String>,
    /// The value a suspended task resumes with, if it has one.
    pub value: Option<Value>,
}

/// A decoded database dump.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Database {
    pub version: u32,
    pub version_string: String,
    pub format_name: String,
    /// Object slots in the dump, recycled ones included.
    pub total_objects: usize,
    /// Verb code blocks in the dump.
    pub total_verbs: usize,
    pub total_players: usize,
    pub players: Vec<Objid>,
    /// Live objects only; recycled slots have no entry.
    pub objects: BTreeMap<Objid, Object>,
    pub queued_tasks: Vec<QueuedTask>,
}

impl Database {
    pub fn features(&self) -> SchemaFeatures {
        SchemaFeatures::for_version(self.version)
    }

    pub fn object(&self, id: Objid) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn verb_code(&self, id: Objid, verb_index: usize) -> Option<&[String]> {
        self.objects
            .get(&id)?
            .verbs
            .get(verb_index)?
            .code
            .as_deref()
    }

    /// Number of recycled slots: declared slots minus live objects.
    pub fn recycled_count(&self) -> usize {
        self.total_objects.saturating_sub(self.objects.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verb(perms: i64, prep: i64) -> Verb {
        Verb {
            name: "look l*ook".into(),
            owner: Objid(2),
            perms,
            prep,
            code: None,
        }
    }

    #[test]
    fn verb_flags() {
        // rxd, dobj any, iobj this
        let v = verb(1 | 4 | 8 | (1 << 4) | (2 << 6), -1);
        assert_eq!(v.permissions(), "rxd");
        assert_eq!(v.dobj(), ArgSpec::Any);
        assert_eq!(v.iobj(), ArgSpec::This);
        assert_eq!(v.prep_spec(), PrepSpec::None);
        assert_eq!(verb(0, -2).prep_spec(), PrepSpec::Any);
        assert_eq!(verb(0, 5).prep_spec(), PrepSpec::Other(5));
    }

    #[test]
    fn object_flags_and_links() {
        let o = Object {
            id: Objid(3),
            name: "Wizard".into(),
            flags: 0b111,
            owner: Objid(3),
            location: v_obj(2),
            last_move: None,
            parents: v_list(&[v_obj(1), v_obj(-1), v_obj(6)]),
            verbs: vec![],
            properties: vec![],
        };
        assert!(o.has_flag(ObjFlag::User));
        assert!(o.has_flag(ObjFlag::Wizard));
        assert!(!o.has_flag(ObjFlag::Fertile));
        assert_eq!(o.parent_ids(), vec![Objid(1), Objid(6)]);
        assert_eq!(o.location_id(), Some(Objid(2)));
    }

    #[test]
    fn encoding_names() {
        assert_eq!("utf-8".parse(), Ok(EncodingMode::UTF8));
        assert_eq!("latin1".parse(), Ok(EncodingMode::ISO8859_1));
        assert!("ebcdic".parse::<EncodingMode>().is_err());
    }
}
