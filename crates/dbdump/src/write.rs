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

use std::collections::BTreeMap;
use std::io;

use crate::{
    Activation, Database, EncodingMode, Object, Objid, Property, QueuedTask, SchemaFeatures,
    TaskKind, Value, Verb,
};

/// Writes a `Database` back out in the layout its version calls for.
///
/// Fields the decoder throws away (the v4 linked-list pointers, activation argument strings,
/// clocks, connections) are written as placeholders.
pub struct DatabaseWriter<W: io::Write> {
    writer: W,
    encoding_mode: EncodingMode,
}

impl<W: io::Write> DatabaseWriter<W> {
    pub fn new(writer: W, encoding_mode: EncodingMode) -> Self {
        Self {
            writer,
            encoding_mode,
        }
    }
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

impl<W: io::Write> DatabaseWriter<W> {
    /// A line of free text, in the configured encoding.
    fn write_string(&mut self, s: &str) -> Result<(), io::Error> {
        match self.encoding_mode {
            EncodingMode::ISO8859_1 => {
                let (bytes, _, had_errors) = encoding_rs::WINDOWS_1252.encode(s);
                if had_errors {
                    return Err(invalid_data(format!(
                        "string not representable in ISO-8859-1: {s:?}"
                    )));
                }
                self.writer.write_all(&bytes)?;
                writeln!(self.writer)
            }
            EncodingMode::UTF8 => writeln!(self.writer, "{s}"),
        }
    }

    fn write_obj(&mut self, obj: &Objid) -> Result<(), io::Error> {
        writeln!(self.writer, "{}", obj.0)
    }

    fn write_value(&mut self, value: &Value) -> Result<(), io::Error> {
        let t_num = value.type_code() as i64;
        writeln!(self.writer, "{t_num}")?;
        match value {
            Value::Str(s) => self.write_string(s)?,
            Value::Obj(o) | Value::Anon(o) => self.write_obj(o)?,
            Value::Int(i) | Value::Err(i) => writeln!(self.writer, "{i}")?,
            // Exponent form, read back exactly by `f64::from_str`.
            Value::Float(f) => writeln!(self.writer, "{f:+e}")?,
            Value::Bool(b) => writeln!(self.writer, "{}", u8::from(*b))?,
            Value::List(l) => {
                writeln!(self.writer, "{}", l.len())?;
                for v in l {
                    self.write_value(v)?;
                }
            }
            Value::Map(m) => {
                writeln!(self.writer, "{}", m.len())?;
                for (k, v) in m {
                    self.write_value(k)?;
                    self.write_value(v)?;
                }
            }
            Value::Clear | Value::None => {}
        }
        Ok(())
    }

    fn write_verbdef(&mut self, verb: &Verb) -> Result<(), io::Error> {
        self.write_string(&verb.name)?;
        self.write_obj(&verb.owner)?;
        writeln!(self.writer, "{}", verb.perms)?;
        writeln!(self.writer, "{}", verb.prep)
    }

    fn write_properties(&mut self, object: &Object) -> Result<(), io::Error> {
        let names: Vec<&str> = object
            .properties
            .iter()
            .map_while(|p| p.name.as_deref())
            .collect();
        if names.len() != object.defined_properties().count() {
            return Err(invalid_data(format!(
                "object {} has named properties after unnamed ones",
                object.id
            )));
        }
        writeln!(self.writer, "{}", names.len())?;
        for name in names {
            self.write_string(name)?;
        }
        writeln!(self.writer, "{}", object.properties.len())?;
        for Property {
            value,
            owner,
            perms,
            ..
        } in &object.properties
        {
            self.write_value(value)?;
            self.write_obj(owner)?;
            writeln!(self.writer, "{perms}")?;
        }
        Ok(())
    }

    fn write_object_v4(&mut self, object: &Object) -> Result<(), io::Error> {
        let Some(location) = object.location.as_object() else {
            return Err(invalid_data(format!(
                "object {} has a non-object location, which v4 cannot store",
                object.id
            )));
        };
        let parent = match object.parent_ids().as_slice() {
            [] => crate::NOTHING,
            [parent] => *parent,
            _ => {
                return Err(invalid_data(format!(
                    "object {} has several parents, which v4 cannot store",
                    object.id
                )));
            }
        };
        writeln!(self.writer, "#{}", object.id.0)?;
        self.write_string(&object.name)?;
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", object.flags)?;
        self.write_obj(&object.owner)?;
        self.write_obj(&location)?;
        // contents, next
        writeln!(self.writer, "-1\n-1")?;
        self.write_obj(&parent)?;
        // child, sibling
        writeln!(self.writer, "-1\n-1")?;
        Ok(())
    }

    fn write_object_ng(
        &mut self,
        object: &Object,
        features: &SchemaFeatures,
        contents: &Value,
        children: &Value,
    ) -> Result<(), io::Error> {
        writeln!(self.writer, "#{}", object.id.0)?;
        self.write_string(&object.name)?;
        writeln!(self.writer, "{}", object.flags)?;
        self.write_obj(&object.owner)?;
        self.write_value(&object.location)?;
        if features.last_move {
            self.write_value(object.last_move.as_ref().unwrap_or(&Value::None))?;
        }
        self.write_value(contents)?;
        self.write_value(&object.parents)?;
        self.write_value(children)?;
        Ok(())
    }

    fn write_object(
        &mut self,
        object: &Object,
        features: &SchemaFeatures,
        links: &Links,
    ) -> Result<(), io::Error> {
        if features.is_next_gen() {
            let contents = links.contents(object.id);
            let children = links.children(object.id);
            self.write_object_ng(object, features, &contents, &children)?;
        } else {
            self.write_object_v4(object)?;
        }
        writeln!(self.writer, "{}", object.verbs.len())?;
        for verb in &object.verbs {
            self.write_verbdef(verb)?;
        }
        self.write_properties(object)
    }

    fn write_objects(&mut self, db: &Database, features: &SchemaFeatures) -> Result<(), io::Error> {
        if let Some((id, _)) = db.objects.range(Objid(db.total_objects as i64)..).next() {
            return Err(invalid_data(format!(
                "object {id} lies outside the {} declared slots",
                db.total_objects
            )));
        }
        if let Some((id, _)) = db.objects.range(..Objid(0)).next() {
            return Err(invalid_data(format!("object {id} has a negative id")));
        }
        let links = Links::new(db);
        for slot in 0..db.total_objects as i64 {
            match db.objects.get(&Objid(slot)) {
                Some(object) => self.write_object(object, features, &links)?,
                None => writeln!(self.writer, "#{slot} recycled")?,
            }
        }
        Ok(())
    }

    fn write_verb_code(&mut self, db: &Database) -> Result<(), io::Error> {
        for object in db.objects.values() {
            for (verbnum, verb) in object.verbs.iter().enumerate() {
                let Some(code) = &verb.code else {
                    continue;
                };
                writeln!(self.writer, "#{}:{}", object.id.0, verbnum)?;
                self.write_program(code)?;
            }
        }
        Ok(())
    }

    fn write_program(&mut self, code: &[String]) -> Result<(), io::Error> {
        for line in code {
            if line == "." {
                return Err(invalid_data("program line is a lone '.'".to_string()));
            }
            self.write_string(line)?;
        }
        writeln!(self.writer, ".")
    }

    fn write_activation(
        &mut self,
        activation: &Activation,
        features: &SchemaFeatures,
    ) -> Result<(), io::Error> {
        self.write_value(&Value::None)?;
        if features.activation_this {
            self.write_value(&Value::Obj(activation.this))?;
        }
        if features.activation_vloc {
            self.write_value(&Value::Obj(activation.vloc))?;
        }
        if features.activation_threading {
            writeln!(self.writer, "0")?;
        }
        writeln!(
            self.writer,
            "{} -7 -8 {} -9 {} {} -10 {}",
            activation.this.0,
            activation.player.0,
            activation.programmer.0,
            activation.vloc.0,
            u8::from(activation.debug)
        )?;
        // argstr, dobjstr, prepstr, iobjstr
        writeln!(self.writer, "\n\n\n")?;
        self.write_string(&activation.verb_location)?;
        self.write_string(&activation.verb_name)
    }

    fn write_queued_task(
        &mut self,
        task: &QueuedTask,
        features: &SchemaFeatures,
    ) -> Result<(), io::Error> {
        let Some(activation) = &task.activation else {
            return Err(invalid_data(format!(
                "queued task {} has no activation",
                task.id
            )));
        };
        writeln!(
            self.writer,
            "0 {} {} {}",
            task.first_lineno, task.start_time, task.id
        )?;
        self.write_activation(activation, features)?;
        writeln!(self.writer, "{} variables", task.rt_env.len())?;
        for (name, value) in &task.rt_env {
            self.write_string(name)?;
            self.write_value(value)?;
        }
        self.write_program(&task.code)
    }

    fn write_task_queue(
        &mut self,
        db: &Database,
        features: &SchemaFeatures,
    ) -> Result<(), io::Error> {
        let queued: Vec<_> = db
            .queued_tasks
            .iter()
            .filter(|t| t.kind == TaskKind::Queued)
            .collect();
        writeln!(self.writer, "{} queued tasks", queued.len())?;
        for task in queued {
            self.write_queued_task(task, features)?;
        }
        Ok(())
    }

    fn write_suspended_tasks(&mut self, db: &Database) -> Result<(), io::Error> {
        let suspended: Vec<_> = db
            .queued_tasks
            .iter()
            .filter(|t| t.kind == TaskKind::Suspended)
            .collect();
        writeln!(self.writer, "{} suspended tasks", suspended.len())?;
        for task in suspended {
            match &task.value {
                None => writeln!(self.writer, "{} {}", task.start_time, task.id)?,
                Some(value) => {
                    // The value's type tag shares the header line.
                    write!(self.writer, "{} {} ", task.start_time, task.id)?;
                    self.write_value(value)?;
                }
            }
        }
        Ok(())
    }

    pub fn write_database(&mut self, db: &Database) -> Result<(), io::Error> {
        let Some(features) = SchemaFeatures::supported(db.version) else {
            return Err(invalid_data(format!(
                "database version {} cannot be written",
                db.version
            )));
        };
        if db.queued_tasks.iter().any(|t| t.kind == TaskKind::Suspended) && !features.is_next_gen()
        {
            return Err(invalid_data(
                "suspended tasks cannot be written in the v4 layout".to_string(),
            ));
        }
        self.write_string(&db.version_string)?;

        let nprogs = db
            .objects
            .values()
            .flat_map(|o| o.verbs.iter())
            .filter(|v| v.code.is_some())
            .count();

        if features.is_next_gen() {
            self.write_players(db)?;
            writeln!(self.writer, "0 values pending finalization")?;
            writeln!(self.writer, "0 clocks")?;
            self.write_task_queue(db, &features)?;
            self.write_suspended_tasks(db)?;
            writeln!(self.writer, "0 interrupted tasks")?;
            writeln!(self.writer, "0 active connections")?;
            writeln!(self.writer, "{}", db.total_objects)?;
            self.write_objects(db, &features)?;
            writeln!(self.writer, "{nprogs}")?;
            self.write_verb_code(db)?;
        } else {
            writeln!(self.writer, "{}\n{}\n0", db.total_objects, nprogs)?;
            self.write_players(db)?;
            self.write_objects(db, &features)?;
            self.write_verb_code(db)?;
            writeln!(self.writer, "0 clocks")?;
            self.write_task_queue(db, &features)?;
        }
        self.writer.flush()
    }

    fn write_players(&mut self, db: &Database) -> Result<(), io::Error> {
        writeln!(self.writer, "{}", db.players.len())?;
        for player in &db.players {
            self.write_obj(player)?;
        }
        Ok(())
    }
}

/// Reverse indexes for the next-gen `contents` and `children` fields, which the decoded graph
/// only holds in the forward direction.
struct Links {
    contents: BTreeMap<Objid, Vec<Value>>,
    children: BTreeMap<Objid, Vec<Value>>,
}

impl Links {
    fn new(db: &Database) -> Self {
        let mut contents: BTreeMap<Objid, Vec<Value>> = BTreeMap::new();
        let mut children: BTreeMap<Objid, Vec<Value>> = BTreeMap::new();
        for object in db.objects.values() {
            if let Some(location) = object.location_id() {
                contents
                    .entry(location)
                    .or_default()
                    .push(Value::Obj(object.id));
            }
            for parent in object.parent_ids() {
                children
                    .entry(parent)
                    .or_default()
                    .push(Value::Obj(object.id));
            }
        }
        Self { contents, children }
    }

    fn contents(&self, id: Objid) -> Value {
        Value::List(self.contents.get(&id).cloned().unwrap_or_default())
    }

    fn children(&self, id: Objid) -> Value {
        Value::List(self.children.get(&id).cloned().unwrap_or_default())
    }
}
