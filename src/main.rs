use std::env;
use std::path::{Path, PathBuf};

use xbase_reader::{ReaderOptions, TextEncoding, XBaseReader};

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} <file.dbf> [--memo <file>] [--encoding <label>] [--deleted] [--ignore-unsupported] [--limit N]",
        program
    );
    std::process::exit(1);
}

/// Returns the value following `flag`, exiting if the flag is present without one.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let idx = args.iter().position(|arg| arg == flag)?;
    match args.get(idx + 1) {
        Some(value) => Some(value),
        None => {
            eprintln!("ERROR: {} flag requires an argument.", flag);
            std::process::exit(1);
        }
    }
}

/// Looks for a `.fpt` or `.dbt` file next to the data file, in either letter case.
fn companion_memo(data_path: &Path) -> Option<PathBuf> {
    ["fpt", "FPT", "dbt", "DBT"]
        .iter()
        .map(|ext| data_path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1].starts_with("--") {
        usage(&args[0]);
    }

    let data_path = Path::new(&args[1]);
    let mut options = ReaderOptions::new()
        .with_read_deleted_records(args.iter().any(|arg| arg == "--deleted"))
        .with_ignore_unsupported_types(args.iter().any(|arg| arg == "--ignore-unsupported"));

    if let Some(label) = flag_value(&args, "--encoding") {
        match TextEncoding::for_label(label) {
            Some(encoding) => options = options.with_encoding(encoding),
            None => {
                eprintln!("ERROR: Unknown encoding label '{}'", label);
                std::process::exit(1);
            }
        }
    }

    let limit = match flag_value(&args, "--limit").map(str::parse::<u64>) {
        Some(Ok(limit)) => Some(limit),
        Some(Err(_)) => {
            eprintln!("ERROR: --limit expects a non-negative number.");
            std::process::exit(1);
        }
        None => None,
    };

    let memo_path = flag_value(&args, "--memo")
        .map(PathBuf::from)
        .or_else(|| companion_memo(data_path));
    // No memo file: memo fields fail one by one instead of the whole open
    if memo_path.is_none() {
        options = options.with_ignore_missing_memo(true);
    }

    println!("Reading xBase file: {}", data_path.display());
    if let Some(memo_path) = &memo_path {
        println!("Memo file: {}", memo_path.display());
    }
    println!("{}", "=".repeat(60));

    let mut reader = match XBaseReader::open(data_path, memo_path.as_deref(), options) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("\nERROR: Failed to open xBase file");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    let header = reader.header();
    println!("\nTable Information:");
    println!("  Version: {:?}", header.version);
    match header.last_modified() {
        Some(date) => println!("  Last modified: {}", date),
        None => println!("  Last modified: (invalid) {:?}", header.modified),
    }
    println!("  Declared records: {}", header.record_count);
    println!("  Record length: {} bytes", header.record_length);
    println!("  Encoding: {}", reader.encoding().name());

    println!("\nColumns:");
    for (ordinal, column) in reader.schema().iter().enumerate() {
        println!(
            "  {:>3}. {:<10} {:<10} len={:<4} dec={:<2} nullable={}",
            ordinal,
            column.name,
            column.data_type.to_string(),
            column.length,
            column.decimal_count,
            column.is_nullable()
        );
    }

    let schema = reader.schema();
    println!("\nRows:");
    let mut shown = 0u64;
    loop {
        if limit.is_some_and(|limit| shown >= limit) {
            break;
        }
        match reader.read() {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                eprintln!("\nERROR: Failed to read row {}", shown + 1);
                eprintln!("  {}", e);
                std::process::exit(1);
            }
        }
        shown += 1;

        let mut fields = Vec::with_capacity(schema.len());
        for (ordinal, column) in schema.iter().enumerate() {
            let text = match reader.get_value(ordinal) {
                Ok(value) => value.to_string(),
                Err(e) => format!("<{}>", e),
            };
            fields.push(format!("{}={}", column.name, text));
        }
        let deleted = if reader.is_deleted_row().unwrap_or(false) { " (deleted)" } else { "" };
        println!("  {}{}: {}", shown, deleted, fields.join(", "));
    }

    println!("\n{}", "=".repeat(60));
    println!("Rows shown: {} (records read: {})", shown, reader.records_read());
}
