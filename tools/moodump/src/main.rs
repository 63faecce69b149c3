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

mod logging;

use clap::Parser;
use clap_derive::{Parser, ValueEnum};
use eyre::WrapErr;
use figment::{
    Figment,
    providers::{Format, Serialized, Yaml},
};
use moo_dbdump::{
    Database, DatabaseWriter, EncodingMode, ReaderOptions, TaskKind, load_database,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputFormat {
    /// Version, counts, players and tasks, one per line.
    Summary,
    /// The whole decoded database.
    Json,
}

#[derive(Parser, Debug, Serialize, Deserialize)]
struct Args {
    #[arg(long, value_name = "db", help = "Path to the database dump to decode")]
    db: PathBuf,

    #[arg(
        long,
        help = "Character encoding of the dump (utf8, iso8859-1)",
        default_value = "utf8"
    )]
    encoding: EncodingMode,

    #[arg(
        long,
        help = "How deeply lists and maps may nest before the dump is rejected",
        default_value = "512"
    )]
    max_value_depth: usize,

    #[arg(long, value_enum, help = "What to print", default_value = "summary")]
    output: OutputFormat,

    #[arg(
        long,
        help = "Write the decoded database back out to this path, in the same format version"
    )]
    reencode: Option<PathBuf>,

    #[arg(long, help = "Enable debug logging", default_value = "false")]
    debug: bool,

    #[arg(long, help = "Yaml config file to use, overrides values in CLI args")]
    config_file: Option<String>,
}

fn write_summary(db: &Database, out: &mut impl Write) -> Result<(), std::io::Error> {
    writeln!(out, "{} (format version {})", db.format_name, db.version)?;
    writeln!(
        out,
        "objects: {} slots, {} live, {} recycled",
        db.total_objects,
        db.objects.len(),
        db.recycled_count()
    )?;
    let verbs = db.objects.values().map(|o| o.verbs.len()).sum::<usize>();
    writeln!(out, "verbs: {verbs} defined, {} with code", db.total_verbs)?;
    let players: Vec<String> = db.players.iter().map(|p| p.to_string()).collect();
    writeln!(out, "players: {}", players.join(", "))?;
    writeln!(out, "tasks: {}", db.queued_tasks.len())?;
    for task in &db.queued_tasks {
        match task.kind {
            TaskKind::Queued => {
                let verb = task
                    .activation
                    .as_ref()
                    .map(|a| format!("{}:{}", a.this, a.verb_name))
                    .unwrap_or_default();
                writeln!(
                    out,
                    "  queued {} at {}: {verb} ({} lines)",
                    task.id,
                    task.start_time,
                    task.code.len()
                )?;
            }
            TaskKind::Suspended => {
                let value = task
                    .value
                    .as_ref()
                    .map(|v| v.to_literal())
                    .unwrap_or_default();
                writeln!(
                    out,
                    "  suspended {} at {} {value}",
                    task.id, task.start_time
                )?;
            }
        }
    }
    Ok(())
}

fn reencode(db: &Database, path: &Path, encoding: EncodingMode) -> Result<(), eyre::Report> {
    let file = File::create(path)
        .wrap_err_with(|| format!("could not create {}", path.display()))?;
    DatabaseWriter::new(BufWriter::new(file), encoding)
        .write_database(db)
        .wrap_err_with(|| format!("could not write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn main() -> Result<(), eyre::Report> {
    color_eyre::install()?;

    let cli_args = Args::parse();
    let config_file = cli_args.config_file.clone();
    let mut args_figment = Figment::new().merge(Serialized::defaults(cli_args));
    if let Some(config_file) = config_file {
        args_figment = args_figment.merge(Yaml::file(config_file));
    }
    let args = args_figment.extract::<Args>()?;

    logging::init_tracing_simple(args.debug)?;

    let options = ReaderOptions {
        encoding: args.encoding,
        max_value_depth: args.max_value_depth,
    };
    let db = load_database(&args.db, options)
        .wrap_err_with(|| format!("could not decode {}", args.db.display()))?;

    let mut stdout = std::io::stdout().lock();
    match args.output {
        OutputFormat::Summary => write_summary(&db, &mut stdout)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut stdout, &db)?;
            writeln!(stdout)?;
        }
    }

    if let Some(path) = &args.reencode {
        reencode(&db, path, args.encoding)?;
    }

    Ok(())
}
