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

/// Every way a decode can fail. All of them are fatal; there is no partial result.
#[derive(Debug, thiserror::Error)]
pub enum DbReaderError {
    #[error("could not open file: {0}")]
    CouldNotOpenFile(String),
    #[error("io error: {0} @ line {1}")]
    IoError(std::io::Error, usize),
    #[error("unexpected end of input @ line {0}")]
    UnexpectedEndOfInput(usize),
    #[error("malformed database: {0} @ line {1}")]
    MalformedDatabase(String, usize),
    #[error("reference not found: {0} @ line {1}")]
    ReferenceNotFound(String, usize),
    #[error("unsupported database version {0} @ line {1}")]
    UnsupportedVersion(u32, usize),
    #[error("unsupported feature: {0} @ line {1}")]
    UnsupportedFeature(String, usize),
}

impl DbReaderError {
    /// The 1-based input line the failure was detected at, if it happened mid-decode.
    pub fn line(&self) -> Option<usize> {
        match self {
            DbReaderError::CouldNotOpenFile(_) => None,
            DbReaderError::IoError(_, line)
            | DbReaderError::UnexpectedEndOfInput(line)
            | DbReaderError::MalformedDatabase(_, line)
            | DbReaderError::ReferenceNotFound(_, line)
            | DbReaderError::UnsupportedVersion(_, line)
            | DbReaderError::UnsupportedFeature(_, line) => Some(*line),
        }
    }
}
