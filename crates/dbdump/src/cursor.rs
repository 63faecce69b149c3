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

use std::io::BufRead;

use crate::EncodingMode;
use crate::error::DbReaderError;

/// Forward-only source of lines with a 1-based line counter.
///
/// `line_num` is the number of the line most recently returned, so errors raised right after a
/// read point at the offending line.
pub struct LineCursor<R: BufRead> {
    reader: R,
    line_num: usize,
    encoding_mode: EncodingMode,
    buf: Vec<u8>,
}

impl<R: BufRead> LineCursor<R> {
    pub fn new(reader: R, encoding_mode: EncodingMode) -> Self {
        Self {
            reader,
            line_num: 0,
            encoding_mode,
            buf: Vec::new(),
        }
    }

    pub fn line_num(&self) -> usize {
        self.line_num
    }

    pub fn encoding_mode(&self) -> EncodingMode {
        self.encoding_mode
    }

    pub fn next_line(&mut self) -> Result<String, DbReaderError> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| DbReaderError::IoError(e, self.line_num + 1))?;
        if read == 0 {
            return Err(DbReaderError::UnexpectedEndOfInput(self.line_num + 1));
        }
        self.line_num += 1;

        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }

        match self.encoding_mode {
            EncodingMode::UTF8 => match std::str::from_utf8(&self.buf) {
                Ok(s) => Ok(s.to_string()),
                Err(e) => self.fail(format!("invalid UTF-8: {e}")),
            },
            EncodingMode::ISO8859_1 => {
                let (decoded, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(&self.buf);
                Ok(decoded.into_owned())
            }
        }
    }

    /// A `MalformedDatabase` error at the current line.
    pub fn malformed(&self, message: impl Into<String>) -> DbReaderError {
        DbReaderError::MalformedDatabase(message.into(), self.line_num)
    }

    pub fn fail<T>(&self, message: impl Into<String>) -> Result<T, DbReaderError> {
        Err(self.malformed(message))
    }
}
