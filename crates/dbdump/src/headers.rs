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

//! Parsers for the fixed-grammar header lines that introduce each section or record.
//! Each returns `None` when the line doesn't match; the reader turns that into a positioned
//! `MalformedDatabase` error.

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VersionLine {
    pub format_name: String,
    pub version: u32,
}

/// `** LambdaMOO Database, Format Version 4 **`
pub fn parse_version_line(line: &str) -> Option<VersionLine> {
    let inner = line.trim().strip_prefix("** ")?.strip_suffix(" **")?;
    let (format_name, version) = inner.rsplit_once(", Format Version ")?;
    let version = version.trim().parse::<u32>().ok()?;
    Some(VersionLine {
        format_name: format_name.to_string(),
        version,
    })
}

fn parse_count(line: &str, suffix: &str) -> Option<usize> {
    let (count, rest) = line.trim().split_once(' ')?;
    if rest != suffix {
        return None;
    }
    count.parse().ok()
}

fn parse_numbers(line: &str) -> Option<Vec<i64>> {
    line.split_whitespace().map(|n| n.parse().ok()).collect()
}

/// `N variables`
pub fn parse_variable_count(line: &str) -> Option<usize> {
    parse_count(line, "variables")
}

/// `N clocks`
pub fn parse_clock_count(line: &str) -> Option<usize> {
    parse_count(line, "clocks")
}

/// `N queued tasks`
pub fn parse_queued_task_count(line: &str) -> Option<usize> {
    parse_count(line, "queued tasks")
}

/// `N values pending finalization`
pub fn parse_pending_finalization_count(line: &str) -> Option<usize> {
    parse_count(line, "values pending finalization")
}

/// `N suspended tasks`
pub fn parse_suspended_task_count(line: &str) -> Option<usize> {
    parse_count(line, "suspended tasks")
}

/// `N interrupted tasks`
pub fn parse_interrupted_task_count(line: &str) -> Option<usize> {
    parse_count(line, "interrupted tasks")
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ConnectionsHeader {
    pub count: usize,
    /// Each connection line is `who listener` rather than just `who`.
    pub with_listeners: bool,
}

/// `N active connections` or `N active connections with listeners`
pub fn parse_connection_count(line: &str) -> Option<ConnectionsHeader> {
    if let Some(count) = parse_count(line, "active connections with listeners") {
        return Some(ConnectionsHeader {
            count,
            with_listeners: true,
        });
    }
    parse_count(line, "active connections").map(|count| ConnectionsHeader {
        count,
        with_listeners: false,
    })
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TaskHeader {
    pub first_lineno: i64,
    pub start_time: i64,
    pub id: i64,
}

/// Queued task header. Servers write `<unused> lineno start id`; `lineno start id` is accepted
/// as well.
pub fn parse_task_header(line: &str) -> Option<TaskHeader> {
    let numbers = parse_numbers(line)?;
    let fields = match numbers.as_slice() {
        [_, lineno, start, id] | [lineno, start, id] => (*lineno, *start, *id),
        _ => return None,
    };
    Some(TaskHeader {
        first_lineno: fields.0,
        start_time: fields.1,
        id: fields.2,
    })
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ActivationHeader {
    pub this: i64,
    pub player: i64,
    pub programmer: i64,
    pub vloc: i64,
    pub debug: bool,
}

/// The numeric line of a stored activation. Servers write nine signed integers
/// (`this -7 -8 player -9 programmer vloc -10 debug`); the compact six-field form
/// `this player programmer vloc <unused> debug` is accepted as well.
pub fn parse_activation_header(line: &str) -> Option<ActivationHeader> {
    let numbers = parse_numbers(line)?;
    let (this, player, programmer, vloc, debug) = match numbers.as_slice() {
        [this, _, _, player, _, programmer, vloc, _, debug] => {
            (*this, *player, *programmer, *vloc, *debug)
        }
        [this, player, programmer, vloc, _, debug] => (*this, *player, *programmer, *vloc, *debug),
        _ => return None,
    };
    Some(ActivationHeader {
        this,
        player,
        programmer,
        vloc,
        debug: debug != 0,
    })
}

/// Where a suspended task's resume value lives, if it has one.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SuspendedValue {
    Absent,
    /// The value's type tag ends the header line; its payload follows.
    InlineTag(i64),
    /// The header ended with a space; a complete tagged value follows.
    Following,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SuspendedTaskHeader {
    pub start_time: i64,
    pub id: i64,
    pub value: SuspendedValue,
}

/// `startTime id`, optionally followed by a space and the start of a value.
pub fn parse_suspended_task_header(line: &str) -> Option<SuspendedTaskHeader> {
    let numbers = parse_numbers(line)?;
    let (start_time, id, value) = match numbers.as_slice() {
        [start, id] if line.ends_with(' ') => (*start, *id, SuspendedValue::Following),
        [start, id] => (*start, *id, SuspendedValue::Absent),
        [start, id, tag] => (*start, *id, SuspendedValue::InlineTag(*tag)),
        _ => return None,
    };
    Some(SuspendedTaskHeader {
        start_time,
        id,
        value,
    })
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct VmHeader {
    pub top: usize,
    pub vector: i64,
    pub func_id: i64,
    pub max_stack_frames: Option<i64>,
}

/// `top vector funcId [maxStackframes]`, the header of a serialized task VM.
pub fn parse_vm_header(line: &str) -> Option<VmHeader> {
    let numbers = parse_numbers(line)?;
    let (top, vector, func_id, max_stack_frames) = match numbers.as_slice() {
        [top, vector, func_id] => (*top, *vector, *func_id, None),
        [top, vector, func_id, max] => (*top, *vector, *func_id, Some(*max)),
        _ => return None,
    };
    Some(VmHeader {
        top: usize::try_from(top).ok()?,
        vector,
        func_id,
        max_stack_frames,
    })
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ObjectHeader {
    pub id: i64,
    pub recycled: bool,
}

/// `#12` or `#12 recycled`
pub fn parse_object_header(line: &str) -> Option<ObjectHeader> {
    let spec = line.trim().strip_prefix('#')?;
    let (id, recycled) = match spec.split_once(' ') {
        None => (spec, false),
        Some((id, rest)) if rest.trim() == "recycled" => (id, true),
        Some(_) => return None,
    };
    Some(ObjectHeader {
        id: id.parse().ok()?,
        recycled,
    })
}

/// `#<object>:<verb index>`
pub fn parse_verb_code_header(line: &str) -> Option<(i64, usize)> {
    let (oid, verbnum) = line.trim().strip_prefix('#')?.split_once(':')?;
    Some((oid.parse().ok()?, verbnum.parse().ok()?))
}
