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

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, span};

use crate::{Database, DatabaseReader, DbReaderError, ReaderOptions};

/// Open and decode the dump at `path`. The file is closed on every exit path.
pub fn load_database(
    path: impl AsRef<Path>,
    options: ReaderOptions,
) -> Result<Database, DbReaderError> {
    let path = path.as_ref();
    let db_load_span = span!(tracing::Level::INFO, "db_load", path = %path.display());
    let _enter = db_load_span.enter();

    let dbfile = File::open(path)
        .map_err(|e| DbReaderError::CouldNotOpenFile(format!("{}: {e}", path.display())))?;

    read_database(BufReader::new(dbfile), options)
}

/// Decode a dump from any line source.
pub fn read_database<R: BufRead>(
    reader: R,
    options: ReaderOptions,
) -> Result<Database, DbReaderError> {
    let db_decode_span = span!(tracing::Level::INFO, "db_decode", encoding = ?options.encoding);
    let _enter = db_decode_span.enter();

    let mut dbr = DatabaseReader::new(reader, options)?;
    let db = dbr.read_database()?;
    info!(
        objects = db.objects.len(),
        recycled = db.recycled_count(),
        tasks = db.queued_tasks.len(),
        "decoded {}",
        db.format_name
    );
    Ok(db)
}
