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

use std::collections::{BTreeMap, VecDeque};
use std::io::BufRead;

use indexmap::IndexMap;
use tracing::{debug, info, trace};

use crate::headers::{self, SuspendedValue};
use crate::{
    Activation, Database, DbReaderError, LineCursor, Object, Objid, Property, QueuedTask,
    ReaderOptions, Schema, SchemaFeatures, TaskKind, Value, VarType, Verb,
};

/// Single-pass decoder over one database dump.
///
/// Construction consumes the version line and fixes the schema; `read_database` then walks the
/// remaining sections in the order that schema dictates.
pub struct DatabaseReader<R: BufRead> {
    cursor: LineCursor<R>,
    options: ReaderOptions,
    pub features: SchemaFeatures,
    pub version_string: String,
    pub format_name: String,
}

impl<R: BufRead> DatabaseReader<R> {
    pub fn new(reader: R, options: ReaderOptions) -> Result<Self, DbReaderError> {
        let mut cursor = LineCursor::new(reader, options.encoding);
        let version_string = cursor.next_line()?;
        info!("version {}", version_string);

        let Some(version_line) = headers::parse_version_line(&version_string) else {
            return cursor.fail(format!("invalid version line: {version_string}"));
        };
        let Some(features) = SchemaFeatures::supported(version_line.version) else {
            return Err(DbReaderError::UnsupportedVersion(
                version_line.version,
                cursor.line_num(),
            ));
        };

        Ok(Self {
            cursor,
            options,
            features,
            version_string,
            format_name: version_line.format_name,
        })
    }

    pub fn line_num(&self) -> usize {
        self.cursor.line_num()
    }
}

impl<R: BufRead> DatabaseReader<R> {
    fn read_string(&mut self) -> Result<String, DbReaderError> {
        self.cursor.next_line()
    }

    fn read_num(&mut self) -> Result<i64, DbReaderError> {
        let buf = self.cursor.next_line()?;
        let Ok(i) = buf.trim().parse() else {
            return self.cursor.fail(format!("invalid number: {buf}"));
        };
        Ok(i)
    }

    /// A non-negative count line.
    fn read_count(&mut self) -> Result<usize, DbReaderError> {
        let buf = self.cursor.next_line()?;
        let Ok(n) = buf.trim().parse() else {
            return self.cursor.fail(format!("invalid count: {buf}"));
        };
        Ok(n)
    }

    fn read_float(&mut self) -> Result<f64, DbReaderError> {
        let buf = self.cursor.next_line()?;
        let Ok(f) = buf.trim().parse() else {
            return self.cursor.fail(format!("invalid float: {buf}"));
        };
        Ok(f)
    }

    /// Empty, `0` and `false` are false; anything else non-empty is true.
    fn read_bool(&mut self) -> Result<bool, DbReaderError> {
        let buf = self.cursor.next_line()?;
        let buf = buf.trim();
        if buf.is_empty() || buf.eq_ignore_ascii_case("false") {
            return Ok(false);
        }
        Ok(buf.parse::<i64>().map(|i| i != 0).unwrap_or(true))
    }

    fn read_objid(&mut self) -> Result<Objid, DbReaderError> {
        let buf = self.cursor.next_line()?;
        let Ok(i) = buf.trim().parse() else {
            return self.cursor.fail(format!("invalid objid: {buf}"));
        };
        Ok(Objid(i))
    }

    fn read_header<T>(
        &mut self,
        parse: fn(&str) -> Option<T>,
        what: &str,
    ) -> Result<T, DbReaderError> {
        let line = self.cursor.next_line()?;
        match parse(&line) {
            Some(header) => Ok(header),
            None => self.cursor.fail(format!("invalid {what}: {line}")),
        }
    }

    /// Lines up to (and consuming) a lone `.`.
    fn read_program(&mut self) -> Result<Vec<String>, DbReaderError> {
        let mut program = vec![];
        loop {
            let line = self.read_string()?;
            if line == "." {
                break;
            }
            program.push(line);
        }
        Ok(program)
    }
}

impl<R: BufRead> DatabaseReader<R> {
    pub fn read_value(&mut self) -> Result<Value, DbReaderError> {
        self.read_value_at(0)
    }

    fn read_value_at(&mut self, depth: usize) -> Result<Value, DbReaderError> {
        let t_num = self.read_num()?;
        self.read_value_of(t_num, depth)
    }

    fn read_value_of(&mut self, t_num: i64, depth: usize) -> Result<Value, DbReaderError> {
        let Some(vtype) = VarType::from_repr(t_num) else {
            return self.cursor.fail(format!("unknown type tag {t_num}"));
        };
        let v = match vtype {
            VarType::TYPE_STR => Value::Str(self.read_string()?),
            VarType::TYPE_OBJ => Value::Obj(self.read_objid()?),
            VarType::TYPE_ANON => Value::Anon(self.read_objid()?),
            VarType::TYPE_INT => Value::Int(self.read_num()?),
            VarType::TYPE_ERR => Value::Err(self.read_num()?),
            VarType::TYPE_FLOAT => Value::Float(self.read_float()?),
            VarType::TYPE_BOOL => Value::Bool(self.read_bool()?),
            VarType::TYPE_CLEAR => Value::Clear,
            VarType::TYPE_NONE => Value::None,
            VarType::TYPE_LIST => {
                self.check_depth(depth)?;
                let l_size = self.read_count()?;
                let mut l = Vec::with_capacity(l_size.min(1024));
                for _ in 0..l_size {
                    l.push(self.read_value_at(depth + 1)?);
                }
                Value::List(l)
            }
            VarType::TYPE_MAP => {
                self.check_depth(depth)?;
                let num_pairs = self.read_count()?;
                let mut m = BTreeMap::new();
                for _ in 0..num_pairs {
                    let key = self.read_value_at(depth + 1)?;
                    let value = self.read_value_at(depth + 1)?;
                    m.insert(key, value);
                }
                Value::Map(m)
            }
            // Valid tags on disk, but never stored as values.
            VarType::TYPE_CATCH
            | VarType::TYPE_FINALLY
            | VarType::TYPE_ITER
            | VarType::TYPE_WAIF => {
                return self.cursor.fail(format!("unknown type tag {t_num}"));
            }
        };
        Ok(v)
    }

    fn check_depth(&self, depth: usize) -> Result<(), DbReaderError> {
        if depth >= self.options.max_value_depth {
            return self.cursor.fail(format!(
                "values nested deeper than {}",
                self.options.max_value_depth
            ));
        }
        Ok(())
    }
}

impl<R: BufRead> DatabaseReader<R> {
    fn read_verbdef(&mut self) -> Result<Verb, DbReaderError> {
        let name = self.read_string()?;
        let owner = self.read_objid()?;
        let perms = self.read_num()?;
        let prep = self.read_num()?;
        Ok(Verb {
            name,
            owner,
            perms,
            prep,
            code: None,
        })
    }

    fn read_verbdefs(&mut self) -> Result<Vec<Verb>, DbReaderError> {
        let num_verbs = self.read_count()?;
        let mut verbdefs = Vec::with_capacity(num_verbs.min(1024));
        for _ in 0..num_verbs {
            verbdefs.push(self.read_verbdef()?);
        }
        Ok(verbdefs)
    }

    /// Declared names first, then one definition per slot. Slots past the declared names are
    /// inherited and stay nameless.
    fn read_properties(&mut self) -> Result<Vec<Property>, DbReaderError> {
        let num_names = self.read_count()?;
        let mut names = VecDeque::with_capacity(num_names.min(1024));
        for _ in 0..num_names {
            names.push_back(self.read_string()?);
        }
        let num_pdefs = self.read_count()?;
        if num_pdefs < num_names {
            return self.cursor.fail(format!(
                "{num_names} property names but only {num_pdefs} definitions"
            ));
        }
        let mut properties = Vec::with_capacity(num_pdefs.min(1024));
        for _ in 0..num_pdefs {
            let name = names.pop_front();
            let value = self.read_value()?;
            let owner = self.read_objid()?;
            let perms = self.read_num()?;
            properties.push(Property {
                name,
                value,
                owner,
                perms,
            });
        }
        Ok(properties)
    }

    /// One object slot. `None` for a recycled slot, which is a single line.
    fn read_object(&mut self) -> Result<Option<Object>, DbReaderError> {
        let header = self.read_header(headers::parse_object_header, "object header")?;
        if header.recycled {
            trace!(id = header.id, "recycled");
            return Ok(None);
        }
        let id = Objid(header.id);
        let name = self.read_string()?;
        let object = match self.features.schema {
            Schema::Legacy => self.read_object_v4(id, name)?,
            Schema::NextGen => self.read_object_ng(id, name)?,
        };
        Ok(Some(object))
    }

    fn read_object_v4(&mut self, id: Objid, name: String) -> Result<Object, DbReaderError> {
        let _ohandles_string = self.read_string()?;
        let flags = self.read_num()?;
        let owner = self.read_objid()?;
        let location = self.read_objid()?;
        // The linked-list hierarchy is recoverable from location and parent.
        let _contents = self.read_objid()?;
        let _next = self.read_objid()?;
        let parent = self.read_objid()?;
        let _child = self.read_objid()?;
        let _sibling = self.read_objid()?;
        let verbs = self.read_verbdefs()?;
        let properties = self.read_properties()?;
        Ok(Object {
            id,
            name,
            flags,
            owner,
            location: Value::Obj(location),
            last_move: None,
            parents: Value::Obj(parent),
            verbs,
            properties,
        })
    }

    fn read_object_ng(&mut self, id: Objid, name: String) -> Result<Object, DbReaderError> {
        let flags = self.read_num()?;
        let owner = self.read_objid()?;
        let location = self.read_value()?;
        let last_move = if self.features.last_move {
            Some(self.read_value()?)
        } else {
            None
        };
        let _contents = self.read_value()?;
        let parents = self.read_value()?;
        let _children = self.read_value()?;
        let verbs = self.read_verbdefs()?;
        let properties = self.read_properties()?;
        Ok(Object {
            id,
            name,
            flags,
            owner,
            location,
            last_move,
            parents,
            verbs,
            properties,
        })
    }

    fn read_objects(&mut self, nobjs: usize) -> Result<BTreeMap<Objid, Object>, DbReaderError> {
        let mut objects = BTreeMap::new();
        for _ in 0..nobjs {
            if let Some(o) = self.read_object()? {
                debug!(id = %o.id, name = %o.name, "object");
                objects.insert(o.id, o);
            }
        }
        Ok(objects)
    }

    /// One `#obj:index` code block, attached to a verb declared earlier.
    fn read_verb_code(
        &mut self,
        objects: &mut BTreeMap<Objid, Object>,
    ) -> Result<(), DbReaderError> {
        let (oid, verbnum) =
            self.read_header(headers::parse_verb_code_header, "verb code header")?;
        let line = self.cursor.line_num();
        let Some(object) = objects.get_mut(&Objid(oid)) else {
            return Err(DbReaderError::ReferenceNotFound(
                format!("object #{oid}"),
                line,
            ));
        };
        let Some(verb) = object.verbs.get_mut(verbnum) else {
            return Err(DbReaderError::ReferenceNotFound(
                format!("verb {verbnum} on object #{oid}"),
                line,
            ));
        };
        verb.code = Some(self.read_program()?);
        Ok(())
    }

    fn read_verbs(
        &mut self,
        nprogs: usize,
        objects: &mut BTreeMap<Objid, Object>,
    ) -> Result<(), DbReaderError> {
        for _ in 0..nprogs {
            self.read_verb_code(objects)?;
        }
        Ok(())
    }

    fn read_players(&mut self) -> Result<Vec<Objid>, DbReaderError> {
        let nusers = self.read_count()?;
        let mut users = Vec::with_capacity(nusers.min(1024));
        for _ in 0..nusers {
            users.push(self.read_objid()?);
        }
        Ok(users)
    }
}

impl<R: BufRead> DatabaseReader<R> {
    fn read_clocks(&mut self) -> Result<(), DbReaderError> {
        let clocks = self.read_header(headers::parse_clock_count, "clock count")?;
        for _ in 0..clocks {
            let _clock = self.read_string()?;
        }
        Ok(())
    }

    fn read_pending_finalizations(&mut self) -> Result<(), DbReaderError> {
        let num_pending = self.read_header(
            headers::parse_pending_finalization_count,
            "pending finalization count",
        )?;
        for _ in 0..num_pending {
            let _pending = self.read_value()?;
        }
        Ok(())
    }

    fn read_rt_env(&mut self) -> Result<IndexMap<String, Value>, DbReaderError> {
        let num_variables = self.read_header(headers::parse_variable_count, "variable count")?;
        let mut rt_env = IndexMap::with_capacity(num_variables.min(1024));
        for _ in 0..num_variables {
            let name = self.read_string()?;
            let value = self.read_value()?;
            rt_env.insert(name, value);
        }
        Ok(rt_env)
    }

    fn read_activation(&mut self) -> Result<Activation, DbReaderError> {
        let _ = self.read_value()?;
        if self.features.activation_this {
            let _this = self.read_value()?;
        }
        if self.features.activation_vloc {
            let _vloc = self.read_value()?;
        }
        if self.features.activation_threading {
            let _threaded = self.read_num()?;
        }
        let header = self.read_header(headers::parse_activation_header, "activation header")?;
        let _argstr = self.read_string()?;
        let _dobjstr = self.read_string()?;
        let _prepstr = self.read_string()?;
        let _iobjstr = self.read_string()?;
        let verb_location = self.read_string()?;
        let verb_name = self.read_string()?;
        Ok(Activation {
            this: Objid(header.this),
            player: Objid(header.player),
            programmer: Objid(header.programmer),
            vloc: Objid(header.vloc),
            debug: header.debug,
            verb_location,
            verb_name,
        })
    }

    fn read_queued_task(&mut self) -> Result<QueuedTask, DbReaderError> {
        let header = self.read_header(headers::parse_task_header, "task header")?;
        let activation = self.read_activation()?;
        let rt_env = self.read_rt_env()?;
        let code = self.read_program()?;
        Ok(QueuedTask {
            kind: TaskKind::Queued,
            first_lineno: header.first_lineno,
            id: header.id,
            start_time: header.start_time,
            activation: Some(activation),
            rt_env,
            code,
            value: None,
        })
    }

    fn read_task_queue(&mut self) -> Result<Vec<QueuedTask>, DbReaderError> {
        let num_tasks = self.read_header(headers::parse_queued_task_count, "queued task count")?;
        info!("# queued tasks: {}", num_tasks);
        let mut tasks = Vec::with_capacity(num_tasks.min(1024));
        for _ in 0..num_tasks {
            tasks.push(self.read_queued_task()?);
        }
        Ok(tasks)
    }

    fn read_suspended_task(&mut self) -> Result<QueuedTask, DbReaderError> {
        let header =
            self.read_header(headers::parse_suspended_task_header, "suspended task header")?;
        let value = match header.value {
            SuspendedValue::Absent => None,
            SuspendedValue::InlineTag(t_num) => Some(self.read_value_of(t_num, 0)?),
            SuspendedValue::Following => Some(self.read_value()?),
        };
        Ok(QueuedTask {
            kind: TaskKind::Suspended,
            first_lineno: 0,
            id: header.id,
            start_time: header.start_time,
            activation: None,
            rt_env: IndexMap::new(),
            code: vec![],
            value,
        })
    }

    fn read_suspended_tasks(&mut self) -> Result<Vec<QueuedTask>, DbReaderError> {
        let count =
            self.read_header(headers::parse_suspended_task_count, "suspended task count")?;
        info!("# suspended tasks: {}", count);
        let mut tasks = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            tasks.push(self.read_suspended_task()?);
        }
        Ok(tasks)
    }

    fn read_interrupted_tasks(&mut self) -> Result<(), DbReaderError> {
        let count = self.read_header(
            headers::parse_interrupted_task_count,
            "interrupted task count",
        )?;
        if count > 0 {
            return Err(DbReaderError::UnsupportedFeature(
                format!("{count} interrupted tasks"),
                self.cursor.line_num(),
            ));
        }
        Ok(())
    }

    fn read_active_connections(&mut self) -> Result<(), DbReaderError> {
        let header = self.read_header(headers::parse_connection_count, "active connections")?;
        for _ in 0..header.count {
            let _connection = self.read_string()?;
        }
        Ok(())
    }
}

impl<R: BufRead> DatabaseReader<R> {
    pub fn read_database(&mut self) -> Result<Database, DbReaderError> {
        let mut db = Database {
            version: self.features.version,
            version_string: self.version_string.clone(),
            format_name: self.format_name.clone(),
            total_objects: 0,
            total_verbs: 0,
            total_players: 0,
            players: vec![],
            objects: BTreeMap::new(),
            queued_tasks: vec![],
        };
        match self.features.schema {
            Schema::Legacy => self.read_legacy_sections(&mut db)?,
            Schema::NextGen => self.read_next_gen_sections(&mut db)?,
        }
        Ok(db)
    }

    fn read_legacy_sections(&mut self, db: &mut Database) -> Result<(), DbReaderError> {
        db.total_objects = self.read_count()?;
        db.total_verbs = self.read_count()?;
        let _dummy = self.read_string()?;
        db.players = self.read_players()?;
        db.total_players = db.players.len();
        info!("# users: {}", db.total_players);
        info!("# objs: {}", db.total_objects);
        info!("# progs: {}", db.total_verbs);

        info!("Parsing objects...");
        db.objects = self.read_objects(db.total_objects)?;

        info!("Reading verbs...");
        self.read_verbs(db.total_verbs, &mut db.objects)?;

        self.read_clocks()?;
        db.queued_tasks = self.read_task_queue()?;
        Ok(())
    }

    fn read_next_gen_sections(&mut self, db: &mut Database) -> Result<(), DbReaderError> {
        db.players = self.read_players()?;
        db.total_players = db.players.len();
        info!("# users: {}", db.total_players);

        self.read_pending_finalizations()?;
        self.read_clocks()?;
        db.queued_tasks = self.read_task_queue()?;
        let suspended = self.read_suspended_tasks()?;
        db.queued_tasks.extend(suspended);
        self.read_interrupted_tasks()?;
        self.read_active_connections()?;

        db.total_objects = self.read_count()?;
        info!("# objs: {}", db.total_objects);
        info!("Parsing objects...");
        db.objects = self.read_objects(db.total_objects)?;

        db.total_verbs = self.read_count()?;
        info!("# progs: {}", db.total_verbs);
        info!("Reading verbs...");
        self.read_verbs(db.total_verbs, &mut db.objects)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{v_empty_list, v_float, v_int, v_list, v_map, v_obj, v_str};
    use std::io::Cursor;

    /// A reader positioned just past the version line of a dump of the given version.
    fn reader_for(version: u32, body: &str) -> DatabaseReader<Cursor<Vec<u8>>> {
        let input = format!("** LambdaMOO Database, Format Version {version} **\n{body}");
        DatabaseReader::new(Cursor::new(input.into_bytes()), ReaderOptions::default())
            .expect("version line")
    }

    fn malformed_line(err: DbReaderError) -> usize {
        match err {
            DbReaderError::MalformedDatabase(_, line) => line,
            other => panic!("expected malformed database, got {other:?}"),
        }
    }

    #[test]
    fn scalars() {
        let mut r = reader_for(4, "42\n-7\n+1.5e0\nnope\n");
        assert_eq!(r.read_num().unwrap(), 42);
        assert_eq!(r.read_objid().unwrap(), Objid(-7));
        assert_eq!(r.read_float().unwrap(), 1.5);
        assert_eq!(malformed_line(r.read_num().unwrap_err()), 5);
    }

    #[test]
    fn booleans() {
        let mut r = reader_for(17, "1\n0\n\ntrue\nfalse\nyes\n");
        let read: Vec<bool> = (0..6).map(|_| r.read_bool().unwrap()).collect();
        assert_eq!(read, vec![true, false, false, true, false, true]);
    }

    #[test]
    fn scalar_values() {
        let mut r = reader_for(17, "2\nhello world\n1\n#5\n");
        assert_eq!(r.read_value().unwrap(), v_str("hello world"));
        // `#5` is not a number line.
        assert!(matches!(
            r.read_value(),
            Err(DbReaderError::MalformedDatabase(..))
        ));

        let mut r = reader_for(17, "1\n5\n12\n3\n0\n-12\n3\n4\n9\n2.25\n5\n6\n14\n1\n");
        assert_eq!(r.read_value().unwrap(), v_obj(5));
        assert_eq!(r.read_value().unwrap(), Value::Anon(Objid(3)));
        assert_eq!(r.read_value().unwrap(), v_int(-12));
        assert_eq!(r.read_value().unwrap(), Value::Err(4));
        assert_eq!(r.read_value().unwrap(), v_float(2.25));
        assert_eq!(r.read_value().unwrap(), Value::Clear);
        assert_eq!(r.read_value().unwrap(), Value::None);
        assert_eq!(r.read_value().unwrap(), Value::Bool(true));
    }

    #[test]
    fn nested_list() {
        let mut r = reader_for(17, "4\n3\n0\n1\n2\na\n4\n0\n");
        assert_eq!(
            r.read_value().unwrap(),
            v_list(&[v_int(1), v_str("a"), v_empty_list()])
        );
    }

    #[test]
    fn map_with_any_keys() {
        // {"b" -> 2, {1} -> "list", "a" -> 1}
        let mut r = reader_for(
            17,
            "10\n3\n2\nb\n0\n2\n4\n1\n0\n1\n2\nlist\n2\na\n0\n1\n",
        );
        let expected = v_map(&[
            (v_str("a"), v_int(1)),
            (v_str("b"), v_int(2)),
            (v_list(&[v_int(1)]), v_str("list")),
        ]);
        assert_eq!(r.read_value().unwrap(), expected);
    }

    #[test]
    fn unknown_type_tags() {
        for tag in ["7", "8", "11", "13", "99", "-1"] {
            let mut r = reader_for(17, &format!("{tag}\n"));
            let err = r.read_value().unwrap_err();
            assert_eq!(malformed_line(err), 2);
        }
        let mut r = reader_for(17, "99\n");
        assert!(
            r.read_value()
                .unwrap_err()
                .to_string()
                .contains("unknown type tag 99")
        );
    }

    #[test]
    fn nesting_guard() {
        let input = "4\n1\n".repeat(4) + "0\n0\n";
        let options = ReaderOptions {
            max_value_depth: 3,
            ..Default::default()
        };
        let body = format!("** LambdaMOO Database, Format Version 17 **\n{input}");
        let mut r = DatabaseReader::new(Cursor::new(body.into_bytes()), options).unwrap();
        assert!(matches!(
            r.read_value(),
            Err(DbReaderError::MalformedDatabase(..))
        ));

        let mut r = reader_for(17, &input);
        assert!(r.read_value().is_ok());
    }

    #[test]
    fn property_names_run_out() {
        // Two names, three definitions.
        let body = "2\ncolor\nsize\n3\n2\nred\n3\n5\n0\n10\n3\n1\n5\n3\n0\n";
        let mut r = reader_for(4, body);
        let props = r.read_properties().unwrap();
        assert_eq!(props.len(), 3);
        assert_eq!(props[0].name.as_deref(), Some("color"));
        assert_eq!(props[0].value, v_str("red"));
        assert_eq!(props[0].perms, 5);
        assert_eq!(props[1].name.as_deref(), Some("size"));
        assert_eq!(props[1].value, v_int(10));
        assert_eq!(props[2].name, None);
        assert_eq!(props[2].value, Value::Clear);
        assert_eq!(props[2].owner, Objid(3));
    }

    #[test]
    fn more_names_than_definitions() {
        let mut r = reader_for(4, "2\na\nb\n1\n6\n3\n0\n");
        assert_eq!(malformed_line(r.read_properties().unwrap_err()), 5);
    }

    #[test]
    fn recycled_slot_is_one_line() {
        let mut r = reader_for(4, "#4 recycled\n#5 recycled\n");
        assert_eq!(r.read_object().unwrap(), None);
        assert_eq!(r.read_object().unwrap(), None);
        assert_eq!(r.line_num(), 3);
    }

    #[test]
    fn object_header_needs_hash() {
        let mut r = reader_for(4, "5\n");
        assert_eq!(malformed_line(r.read_object().unwrap_err()), 2);
    }

    #[test]
    fn legacy_object() {
        let body = "#2\nThe First Room\n\n0\n3\n-1\n3\n-1\n1\n-1\n5\n\
                    1\neval\n3\n88\n-2\n\
                    0\n0\n";
        let mut r = reader_for(4, body);
        let o = r.read_object().unwrap().unwrap();
        assert_eq!(o.id, Objid(2));
        assert_eq!(o.name, "The First Room");
        assert_eq!(o.owner, Objid(3));
        assert_eq!(o.location, v_obj(-1));
        assert_eq!(o.parents, v_obj(1));
        assert_eq!(o.verbs.len(), 1);
        assert_eq!(o.verbs[0].name, "eval");
        assert_eq!(o.verbs[0].perms, 88);
        assert_eq!(o.verbs[0].prep, -2);
        assert_eq!(o.verbs[0].code, None);
        assert!(o.properties.is_empty());
    }

    fn ng_object_body(last_move: bool) -> String {
        let mut body = String::from("#7\nthing\n16\n2\n1\n3\n");
        if last_move {
            body.push_str("4\n2\n0\n100\n1\n5\n");
        }
        // contents, parents, children
        body.push_str("4\n0\n4\n2\n1\n1\n1\n4\n4\n0\n");
        // no verbs, no properties, then a sentinel line
        body.push_str("0\n0\n0\nsentinel\n");
        body
    }

    #[test]
    fn next_gen_object_with_last_move() {
        let mut r = reader_for(17, &ng_object_body(true));
        let o = r.read_object().unwrap().unwrap();
        assert_eq!(o.flags, 16);
        assert_eq!(o.location, v_obj(3));
        assert_eq!(o.last_move, Some(v_list(&[v_int(100), v_obj(5)])));
        assert_eq!(o.parents, v_list(&[v_obj(1), v_obj(4)]));
        assert_eq!(r.read_string().unwrap(), "sentinel");
    }

    #[test]
    fn next_gen_object_without_last_move() {
        let mut r = reader_for(17, &ng_object_body(false));
        r.features = SchemaFeatures::for_version(14);
        let o = r.read_object().unwrap().unwrap();
        assert_eq!(o.last_move, None);
        assert_eq!(o.parents, v_list(&[v_obj(1), v_obj(4)]));
        assert_eq!(r.read_string().unwrap(), "sentinel");
    }

    fn object_with_verbs(id: i64, n: usize) -> Object {
        Object {
            id: Objid(id),
            name: format!("object {id}"),
            flags: 0,
            owner: Objid(id),
            location: v_obj(-1),
            last_move: None,
            parents: v_obj(-1),
            verbs: (0..n)
                .map(|i| Verb {
                    name: format!("verb{i}"),
                    owner: Objid(id),
                    perms: 0,
                    prep: -1,
                    code: None,
                })
                .collect(),
            properties: vec![],
        }
    }

    #[test]
    fn verb_code_attaches_by_index() {
        let mut objects = BTreeMap::new();
        objects.insert(Objid(3), object_with_verbs(3, 2));
        let mut r = reader_for(4, "#3:1\nplayer:tell(\"hi\");\n\nreturn 1;\n.\n");
        r.read_verb_code(&mut objects).unwrap();
        let verbs = &objects[&Objid(3)].verbs;
        assert_eq!(verbs[0].code, None);
        assert_eq!(
            verbs[1].code,
            Some(vec![
                "player:tell(\"hi\");".to_string(),
                String::new(),
                "return 1;".to_string()
            ])
        );
    }

    #[test]
    fn verb_code_bad_references() {
        let mut objects = BTreeMap::new();
        objects.insert(Objid(3), object_with_verbs(3, 2));

        let mut r = reader_for(4, "#9:0\n.\n");
        match r.read_verb_code(&mut objects) {
            Err(DbReaderError::ReferenceNotFound(_, line)) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }

        let mut r = reader_for(4, "#3:2\n.\n");
        assert!(matches!(
            r.read_verb_code(&mut objects),
            Err(DbReaderError::ReferenceNotFound(..))
        ));

        let mut r = reader_for(4, "3:2\n.\n");
        assert_eq!(malformed_line(r.read_verb_code(&mut objects).unwrap_err()), 2);
    }

    const V4_ACTIVATION: &str = "6\n-1 -7 -8 2 -9 2 1 -10 1\nargs\ndobj\nwith\niobj\n#1:eval\neval\n";

    #[test]
    fn legacy_activation() {
        let mut r = reader_for(4, V4_ACTIVATION);
        let a = r.read_activation().unwrap();
        assert_eq!(
            a,
            Activation {
                this: Objid(-1),
                player: Objid(2),
                programmer: Objid(2),
                vloc: Objid(1),
                debug: true,
                verb_location: "#1:eval".into(),
                verb_name: "eval".into(),
            }
        );
    }

    #[test]
    fn next_gen_activation_reads_gated_values() {
        let body = "6\n1\n4\n1\n-1\n0\n-1 2 2 1 0 0\n\n\n\n\nverb\nname\nafter\n";
        let mut r = reader_for(17, body);
        let a = r.read_activation().unwrap();
        assert_eq!(a.this, Objid(-1));
        assert!(!a.debug);
        assert_eq!(a.verb_location, "verb");
        assert_eq!(r.read_string().unwrap(), "after");
    }

    #[test]
    fn rt_env_last_write_wins() {
        let mut r = reader_for(4, "3 variables\nx\n0\n1\ny\n2\nwhy\nx\n0\n2\n");
        let env = r.read_rt_env().unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env["x"], v_int(2));
        assert_eq!(env["y"], v_str("why"));
        assert_eq!(env.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn queued_task() {
        let body = format!("1 queued tasks\n0 3 1700000000 17\n{V4_ACTIVATION}1 variables\nplayer\n1\n2\nreturn 5;\n.\n");
        let mut r = reader_for(4, &body);
        let tasks = r.read_task_queue().unwrap();
        assert_eq!(tasks.len(), 1);
        let t = &tasks[0];
        assert_eq!(t.kind, TaskKind::Queued);
        assert_eq!(t.first_lineno, 3);
        assert_eq!(t.start_time, 1700000000);
        assert_eq!(t.id, 17);
        assert_eq!(t.rt_env["player"], v_obj(2));
        assert_eq!(t.code, vec!["return 5;".to_string()]);
        assert_eq!(t.value, None);
    }

    #[test]
    fn malformed_task_count_stops_there() {
        let mut r = reader_for(4, "abc queued tasks\nmore\n");
        let err = r.read_task_queue().unwrap_err();
        assert_eq!(malformed_line(err), 2);
        assert_eq!(r.line_num(), 2);
    }

    #[test]
    fn suspended_tasks() {
        let body = "3 suspended tasks\n100 1\n200 2 2\nresumed\n300 3 \n0\n9\n";
        let mut r = reader_for(17, body);
        let tasks = r.read_suspended_tasks().unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.kind == TaskKind::Suspended));
        assert!(tasks.iter().all(|t| t.first_lineno == 0));
        assert_eq!(tasks[0].value, None);
        assert_eq!(tasks[1].value, Some(v_str("resumed")));
        assert_eq!(tasks[1].start_time, 200);
        assert_eq!(tasks[2].value, Some(v_int(9)));
        assert_eq!(tasks[2].id, 3);
    }

    #[test]
    fn interrupted_tasks_are_unsupported() {
        let mut r = reader_for(17, "0 interrupted tasks\n");
        r.read_interrupted_tasks().unwrap();

        let mut r = reader_for(17, "2 interrupted tasks\n5 interrupted reading task\n");
        match r.read_interrupted_tasks() {
            Err(DbReaderError::UnsupportedFeature(_, line)) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn connections_are_skipped() {
        let mut r = reader_for(17, "2 active connections with listeners\n5 0\n6 0\nnext\n");
        r.read_active_connections().unwrap();
        assert_eq!(r.read_string().unwrap(), "next");
    }

    #[test]
    fn clocks_and_pending_are_skipped() {
        let mut r = reader_for(17, "1 values pending finalization\n4\n1\n0\n7\n1 clocks\nold\nnext\n");
        r.read_pending_finalizations().unwrap();
        r.read_clocks().unwrap();
        assert_eq!(r.read_string().unwrap(), "next");
    }
}
