//! `extstore`: inspect, merge and patch extended-data stores.
//!
//! Every command prints one JSON document on stdout. Logs go to stderr.
//! Exit status: 0 on success, 1 when the operation fails (or `check` finds
//! problems), 2 on a usage error.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use extstore::logging;
use extstore::{
    DatRecord, ExtError, FieldLayout, IdxRecord, InfoRecord, MergeOptions, StoreConfig,
    StorePaths, StoreReader, build_offsets, check_store, latest_generation_date,
    merge_series_file, merge_stores, patch_records, read_all, read_range, set_period,
    stamp_generation,
};
use serde_json::{Value, json};
use tracing::error;

fn main() {
    let exit_code = run_cli(std::env::args_os());
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Options that consume the following argument.
const VALUE_OPTIONS: &[&str] = &[
    "--config",
    "--offset",
    "--count",
    "--out",
    "--out-idx",
    "--out-dat",
    "--window",
    "--records",
    "--layout",
    "--date",
    "--time",
    "--period-start",
    "--period-end",
];

#[derive(Debug)]
enum CliError {
    Usage(String),
    Failed(ExtError),
}

impl From<ExtError> for CliError {
    fn from(err: ExtError) -> Self {
        Self::Failed(err)
    }
}

type CliResult<T> = Result<T, CliError>;

fn usage(message: impl Into<String>) -> CliError {
    CliError::Usage(message.into())
}

/// A parsed command line: global switches, the command word, its
/// positionals and its `--name value` options.
#[derive(Debug, Default)]
struct Invocation {
    command: String,
    positional: Vec<String>,
    values: BTreeMap<String, String>,
    config: Option<PathBuf>,
    json_log: bool,
    pretty: bool,
}

impl Invocation {
    fn parse(tail: &[String]) -> CliResult<Self> {
        let mut inv = Self::default();
        let mut i = 0;
        while i < tail.len() {
            let arg = tail[i].as_str();
            match arg {
                "--json-log" => inv.json_log = true,
                "--pretty" => inv.pretty = true,
                _ if VALUE_OPTIONS.contains(&arg) => {
                    i += 1;
                    let Some(value) = tail.get(i) else {
                        return Err(usage(format!("{arg} requires a value")));
                    };
                    if arg == "--config" {
                        inv.config = Some(PathBuf::from(value));
                    } else if inv.values.insert(arg.to_owned(), value.clone()).is_some() {
                        return Err(usage(format!("{arg} given twice")));
                    }
                }
                _ if arg.starts_with("--") => {
                    return Err(usage(format!("unknown option `{arg}`")));
                }
                _ if inv.command.is_empty() => inv.command = arg.to_owned(),
                _ => inv.positional.push(arg.to_owned()),
            }
            i += 1;
        }
        if inv.command.is_empty() {
            return Err(usage("missing command"));
        }
        Ok(inv)
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    fn take_parsed<T>(&mut self, name: &str, parse: impl Fn(&str) -> Option<T>) -> CliResult<Option<T>> {
        self.take(name)
            .map(|text| parse(&text).ok_or_else(|| usage(format!("{name}: cannot parse {text:?}"))))
            .transpose()
    }

    /// Positionals, checked against an exact or minimum count.
    fn positionals(&self, min: usize, max: Option<usize>, shape: &str) -> CliResult<&[String]> {
        let n = self.positional.len();
        if n < min || max.is_some_and(|max| n > max) {
            return Err(usage(format!("usage: extstore {} {shape}", self.command)));
        }
        Ok(&self.positional)
    }

    /// Fail on options the command did not consume.
    fn finish(&self) -> CliResult<()> {
        match self.values.keys().next() {
            Some(name) => Err(usage(format!(
                "option {name} is not accepted by `{}`",
                self.command
            ))),
            None => Ok(()),
        }
    }
}

fn parse_number<T: FromStr + TryFrom<u64>>(text: &str) -> Option<T> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok().and_then(|v| T::try_from(v).ok()),
        None => text.parse().ok(),
    }
}

fn parse_indices(text: &str) -> Option<Vec<u64>> {
    text.split(',')
        .map(|part| parse_number::<u64>(part.trim()))
        .collect()
}

/// Result of a command: a JSON body and whether it counts as success.
struct Outcome {
    body: Value,
    success: bool,
}

impl Outcome {
    fn ok(body: Value) -> Self {
        Self {
            body,
            success: true,
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> CliResult<Value> {
    serde_json::to_value(value).map_err(|err| CliError::Failed(ExtError::internal(err.to_string())))
}

fn merge_options(inv: &mut Invocation, config: &StoreConfig) -> CliResult<MergeOptions> {
    let mut options = config.merge;
    if let Some(window) = inv.take_parsed("--window", parse_number::<usize>)? {
        options.retention_window = window;
    }
    options.validate()?;
    Ok(options)
}

fn cmd_info(inv: &mut Invocation) -> CliResult<Outcome> {
    let args = inv.positionals(1, Some(1), "<INFO_FILE>")?.to_vec();
    inv.finish()?;
    let records = read_all::<InfoRecord>(&args[0])?;
    Ok(Outcome::ok(json!({
        "records": to_json(&records)?,
        "latest_generation_date": latest_generation_date(&records),
    })))
}

fn cmd_idx(inv: &mut Invocation) -> CliResult<Outcome> {
    let args = inv.positionals(1, Some(1), "<IDX_FILE>")?.to_vec();
    inv.finish()?;
    let records = read_all::<IdxRecord>(&args[0])?;
    let offsets = build_offsets(&records);
    let duplicates: Vec<&str> = offsets
        .shadowed()
        .map(|entry| entry.security_code.as_str())
        .collect();
    Ok(Outcome::ok(json!({
        "entries": to_json(&offsets.entries())?,
        "total_records": offsets.total_records(),
        "duplicate_codes": duplicates,
    })))
}

fn cmd_dat(inv: &mut Invocation) -> CliResult<Outcome> {
    let args = inv.positionals(1, Some(1), "<DAT_FILE> [--offset N --count N]")?.to_vec();
    let offset = inv.take_parsed("--offset", parse_number::<u64>)?;
    let count = inv.take_parsed("--count", parse_number::<u64>)?;
    inv.finish()?;
    let records = match (offset, count) {
        (None, None) => read_all::<DatRecord>(&args[0])?,
        (offset, Some(count)) => read_range::<DatRecord>(&args[0], offset.unwrap_or(0), count)?,
        (Some(_), None) => return Err(usage("--offset needs --count")),
    };
    Ok(Outcome::ok(to_json(&records)?))
}

fn cmd_lookup(inv: &mut Invocation) -> CliResult<Outcome> {
    let args = inv.positionals(3, None, "<IDX_FILE> <DAT_FILE> <CODE>...")?.to_vec();
    inv.finish()?;
    let mut store = StoreReader::open(&args[0], &args[1])?;
    let histories = store.histories(&args[2..])?;
    Ok(Outcome::ok(to_json(&histories)?))
}

fn cmd_cross_section(inv: &mut Invocation) -> CliResult<Outcome> {
    let args = inv.positionals(3, Some(3), "<IDX_FILE> <DAT_FILE> <YYYYMMDD>")?.to_vec();
    inv.finish()?;
    let date = parse_number::<u32>(&args[2]).ok_or_else(|| usage(format!("bad date {:?}", args[2])))?;
    let mut store = StoreReader::open(&args[0], &args[1])?;
    Ok(Outcome::ok(to_json(&store.cross_section(date)?)?))
}

fn cmd_merge(inv: &mut Invocation, config: &StoreConfig) -> CliResult<Outcome> {
    let args = inv
        .positionals(
            4,
            Some(4),
            "<OLD_IDX> <OLD_DAT> <NEW_IDX> <NEW_DAT> [--out-idx P --out-dat P] [--window N]",
        )?
        .to_vec();
    let options = merge_options(inv, config)?;
    let old = StorePaths::new(&args[0], &args[1]);
    let new = StorePaths::new(&args[2], &args[3]);
    let output = match (inv.take("--out-idx"), inv.take("--out-dat")) {
        (Some(idx), Some(dat)) => StorePaths::new(idx, dat),
        (None, None) => old.clone(),
        _ => return Err(usage("--out-idx and --out-dat go together")),
    };
    inv.finish()?;
    let report = merge_stores(&old, &new, &output, &options)?;
    Ok(Outcome::ok(to_json(&report)?))
}

fn cmd_merge_series(inv: &mut Invocation, config: &StoreConfig) -> CliResult<Outcome> {
    let args = inv
        .positionals(2, Some(2), "<EXISTING_DAT> <INCOMING_DAT> [--out P] [--window N]")?
        .to_vec();
    let options = merge_options(inv, config)?;
    let output = inv.take("--out").map_or_else(|| PathBuf::from(&args[0]), PathBuf::from);
    inv.finish()?;
    let incoming = read_all::<DatRecord>(&args[1])?;
    let summary = merge_series_file(&args[0], &incoming, &output, &options)?;
    Ok(Outcome::ok(to_json(&summary)?))
}

fn take_records(inv: &mut Invocation) -> CliResult<Vec<u64>> {
    inv.take_parsed("--records", parse_indices)?
        .ok_or_else(|| usage("--records <I,J,...> is required"))
}

fn cmd_patch_info(inv: &mut Invocation) -> CliResult<Outcome> {
    let args = inv
        .positionals(
            2,
            None,
            "<INFO_FILE> --records I,J --offset OFF --layout CODES <VALUE>...",
        )?
        .to_vec();
    let records = take_records(inv)?;
    let offset = inv
        .take_parsed("--offset", parse_number::<usize>)?
        .ok_or_else(|| usage("--offset is required"))?;
    let layout = inv
        .take("--layout")
        .ok_or_else(|| usage("--layout is required"))?;
    inv.finish()?;
    let layout = FieldLayout::parse(&layout)?;
    let values = layout.parse_values(&args[1..])?;
    let patched = patch_records(&args[0], &records, offset, &layout, &values)?;
    Ok(Outcome::ok(json!({ "patched": patched, "layout": layout.to_string() })))
}

fn cmd_stamp(inv: &mut Invocation) -> CliResult<Outcome> {
    let args = inv
        .positionals(
            1,
            Some(1),
            "<INFO_FILE> --records I,J [--date D [--time T]] [--period-start D --period-end D]",
        )?
        .to_vec();
    let records = take_records(inv)?;
    let date = inv.take_parsed("--date", parse_number::<u32>)?;
    let time = inv.take_parsed("--time", parse_number::<u32>)?;
    let start = inv.take_parsed("--period-start", parse_number::<u32>)?;
    let end = inv.take_parsed("--period-end", parse_number::<u32>)?;
    inv.finish()?;

    let path = Path::new(&args[0]);
    let mut body = serde_json::Map::new();
    match (date, time) {
        (Some(date), time) => {
            let n = stamp_generation(path, &records, date, time.unwrap_or(0))?;
            body.insert("generation_stamped".to_owned(), json!(n));
        }
        (None, Some(_)) => return Err(usage("--time needs --date")),
        (None, None) => {}
    }
    match (start, end) {
        (Some(start), Some(end)) => {
            let n = set_period(path, &records, start, end)?;
            body.insert("period_set".to_owned(), json!(n));
        }
        (None, None) => {}
        _ => return Err(usage("--period-start and --period-end go together")),
    }
    if body.is_empty() {
        return Err(usage("nothing to stamp: give --date and/or --period-start/--period-end"));
    }
    Ok(Outcome::ok(Value::Object(body)))
}

fn cmd_check(inv: &mut Invocation) -> CliResult<Outcome> {
    let args = inv.positionals(2, Some(2), "<IDX_FILE> <DAT_FILE> [--window N]")?.to_vec();
    let window = inv.take_parsed("--window", parse_number::<usize>)?;
    inv.finish()?;
    let report = check_store(&args[0], &args[1], window)?;
    Ok(Outcome {
        success: report.is_clean(),
        body: to_json(&report)?,
    })
}

fn run_command(inv: &mut Invocation, config: &StoreConfig) -> CliResult<Outcome> {
    match inv.command.as_str() {
        "info" => cmd_info(inv),
        "idx" => cmd_idx(inv),
        "dat" => cmd_dat(inv),
        "lookup" => cmd_lookup(inv),
        "cross-section" => cmd_cross_section(inv),
        "merge" => cmd_merge(inv, config),
        "merge-series" => cmd_merge_series(inv, config),
        "patch-info" => cmd_patch_info(inv),
        "stamp" => cmd_stamp(inv),
        "check" => cmd_check(inv),
        other => Err(usage(format!("unknown command `{other}`"))),
    }
}

fn run_cli<I>(os_args: I) -> i32
where
    I: IntoIterator<Item = OsString>,
{
    run_cli_to(os_args, &mut io::stdout().lock())
}

/// Write `text` and a newline, then flush.
fn emit(out: &mut impl Write, text: &str) -> i32 {
    match writeln!(out, "{text}").and_then(|()| out.flush()) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: cannot write output: {err}");
            1
        }
    }
}

fn run_cli_to<I, W>(os_args: I, out: &mut W) -> i32
where
    I: IntoIterator<Item = OsString>,
    W: Write,
{
    let raw: Vec<String> = os_args
        .into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    let tail = if raw.len() > 1 { &raw[1..] } else { &[] };

    if tail.is_empty() || tail.iter().any(|a| a == "-h" || a == "--help") {
        return emit(out, HELP.trim_end());
    }

    let mut inv = match Invocation::parse(tail) {
        Ok(inv) => inv,
        Err(CliError::Usage(message)) => {
            eprintln!("error: {message}");
            return 2;
        }
        Err(CliError::Failed(err)) => {
            eprintln!("error: {err}");
            return 1;
        }
    };

    let config = match StoreConfig::load_or_default(inv.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };
    let mut log_config = config.logging.clone();
    log_config.json |= inv.json_log;
    if let Err(err) = logging::init(&log_config) {
        eprintln!("warning: logging disabled: {err}");
    }

    match run_command(&mut inv, &config) {
        Ok(outcome) => {
            let rendered = if inv.pretty {
                serde_json::to_string_pretty(&outcome.body)
            } else {
                serde_json::to_string(&outcome.body)
            };
            match rendered {
                Ok(text) => {
                    if emit(out, &text) != 0 {
                        return 1;
                    }
                }
                Err(err) => {
                    eprintln!("error: JSON serialization failed: {err}");
                    return 1;
                }
            }
            i32::from(!outcome.success)
        }
        Err(CliError::Usage(message)) => {
            eprintln!("error: {message}");
            2
        }
        Err(CliError::Failed(err)) => {
            error!(command = %inv.command, error = %err, "command failed");
            eprintln!("error: {err}");
            1
        }
    }
}

const HELP: &str = "\
extstore: inspect, merge and patch extended-data stores

USAGE:
    extstore [GLOBAL OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    info <INFO_FILE>                       Decode an INFO file
    idx <IDX_FILE>                         List IDX entries with start offsets
    dat <DAT_FILE> [--offset N --count N]  Decode a DAT file or a window of it
    lookup <IDX> <DAT> <CODE>...           Histories of the given securities
    cross-section <IDX> <DAT> <YYYYMMDD>   Every security's value on one date
    merge <OLD_IDX> <OLD_DAT> <NEW_IDX> <NEW_DAT>
          [--out-idx P --out-dat P] [--window N]
                                           Merge new data into a store
                                           (in place unless --out-* given)
    merge-series <EXISTING_DAT> <INCOMING_DAT> [--out P] [--window N]
                                           Merge a flat single-series file
    patch-info <INFO_FILE> --records I,J --offset OFF --layout CODES <VALUE>...
                                           Overwrite fields in INFO records
                                           (layout codes: B H I i f)
    stamp <INFO_FILE> --records I,J [--date D [--time T]]
          [--period-start D --period-end D]
                                           Set generation stamp / period
    check <IDX> <DAT> [--window N]         Consistency report (exit 1 if dirty)

GLOBAL OPTIONS:
    --config <FILE>    TOML configuration ([merge], [logging])
    --json-log         Log JSON lines to stderr
    --pretty           Pretty-print JSON output
    -h, --help         Show this help message

ENVIRONMENT:
    EXTSTORE_LOG       Log filter, overrides [logging] level

EXAMPLES:
    extstore lookup extdata_1.idx extdata_1.dat 600000 000001
    extstore merge extdata_1.idx extdata_1.dat new_1.idx new_1.dat --window 500
    extstore patch-info extdata_info.dat --records 12 --offset 0xA1 --layout II 20230822 20240820
";
