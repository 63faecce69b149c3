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

use serde::Serialize;
use strum::{Display, FromRepr};

/// Format versions as numbered by LambdaMOO's and ToastStunt's `version.h`.
///
/// Only `BfbugFixed` (4) and `Bool` (17) and later are decodable; the rest are kept because the
/// thresholds between them decide which optional fields are present on disk.
#[repr(u32)]
#[derive(Debug, Eq, PartialEq, Display, Ord, PartialOrd, Copy, Clone, FromRepr, Serialize)]
pub enum FormatVersion {
    Prehistory = 0, // Before format versions
    Exceptions = 1, // Addition of the `try', `except', `finally', and `endtry' keywords.
    BreakCont = 2,  // Addition of the `break' and `continue' keywords.
    Float = 3,      // Addition of `FLOAT' and `INT' variables and the `E_FLOAT' keyword.
    BfbugFixed = 4, // Built-in function overrides fixed by making them tail-call.
    NextGen = 5,    // The next-generation object layout.
    TaskLocal = 6,  // Addition of task local value.
    Map = 7,        // Addition of `MAP' variables
    FileIo = 8,     // Includes addition of the 'E_FILE' keyword.
    Exec = 9,       // Includes addition of the 'E_EXEC' keyword.
    Interrupt = 10, // Includes addition of the 'E_INTRPT' keyword.
    This = 11,      // Varification of `this'.
    Iter = 12,      // Addition of map iterator
    Anon = 13,      // Addition of anonymous objects
    Waif = 14,      // Addition of waifs
    LastMove = 15,  // Addition of the 'last_move' built-in property
    Threaded = 16,  // Store threading information
    Bool = 17,      // Boolean type
}

impl FormatVersion {
    pub fn number(self) -> u32 {
        self as u32
    }
}

/// The two mutually exclusive on-disk layouts for the world and task sections.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize)]
pub enum Schema {
    /// LambdaMOO's v4 layout: linked-list object hierarchy, single inheritance.
    Legacy,
    /// ToastStunt's layout: value-typed locations, parent lists.
    NextGen,
}

/// Everything the decoder needs to know about a database version, worked out once.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize)]
pub struct SchemaFeatures {
    pub version: u32,
    pub schema: Schema,
    /// Objects carry a `last_move` value after their location.
    pub last_move: bool,
    /// Activations carry a second leading value (`this`).
    pub activation_this: bool,
    /// Activations carry a third leading value (`vloc`).
    pub activation_vloc: bool,
    /// Activations carry a trailing threading-mode integer.
    pub activation_threading: bool,
}

impl SchemaFeatures {
    /// Derive the features of any format number, whether or not it is decodable.
    pub fn for_version(version: u32) -> Self {
        let at_least = |threshold: FormatVersion| version >= threshold.number();
        let schema = if at_least(FormatVersion::NextGen) {
            Schema::NextGen
        } else {
            Schema::Legacy
        };
        Self {
            version,
            schema,
            last_move: at_least(FormatVersion::LastMove),
            activation_this: at_least(FormatVersion::This),
            activation_vloc: at_least(FormatVersion::Anon),
            activation_threading: at_least(FormatVersion::Threaded),
        }
    }

    /// Features of a version this decoder accepts, or `None` if the version is unsupported.
    pub fn supported(version: u32) -> Option<Self> {
        if version == FormatVersion::BfbugFixed.number() || version >= FormatVersion::Bool.number()
        {
            Some(Self::for_version(version))
        } else {
            None
        }
    }

    pub fn is_next_gen(&self) -> bool {
        self.schema == Schema::NextGen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(4, Schema::Legacy, false, false, false, false; "lambdamoo v4")]
    #[test_case(10, Schema::NextGen, false, false, false, false; "interrupt")]
    #[test_case(11, Schema::NextGen, false, true, false, false; "this threshold")]
    #[test_case(13, Schema::NextGen, false, true, true, false; "anon threshold")]
    #[test_case(14, Schema::NextGen, false, true, true, false; "just below last move")]
    #[test_case(15, Schema::NextGen, true, true, true, false; "last move threshold")]
    #[test_case(16, Schema::NextGen, true, true, true, true; "threaded threshold")]
    #[test_case(17, Schema::NextGen, true, true, true, true; "bool")]
    fn features_by_threshold(
        version: u32,
        schema: Schema,
        last_move: bool,
        this: bool,
        vloc: bool,
        threading: bool,
    ) {
        let f = SchemaFeatures::for_version(version);
        assert_eq!(f.schema, schema);
        assert_eq!(f.last_move, last_move);
        assert_eq!(f.activation_this, this);
        assert_eq!(f.activation_vloc, vloc);
        assert_eq!(f.activation_threading, threading);
    }

    #[test]
    fn supported_versions() {
        assert!(SchemaFeatures::supported(4).is_some());
        assert!(SchemaFeatures::supported(17).is_some());
        assert!(SchemaFeatures::supported(18).is_some());
        for v in [0, 1, 3, 5, 15, 16] {
            assert!(SchemaFeatures::supported(v).is_none(), "version {v}");
        }
    }

    #[test]
    fn format_version_from_number() {
        assert_eq!(FormatVersion::from_repr(15), Some(FormatVersion::LastMove));
        assert_eq!(FormatVersion::from_repr(18), None);
    }
}
