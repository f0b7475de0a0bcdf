use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use csvtab_echo::{EchoOptions, OverwriteSource, SqliteOverwrites, VecOverwrites, echo};
use csvtab_error::CsvTabError;

fn main() {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = BufWriter::new(io::stdout().lock());
    let mut stderr = io::stderr();

    let exit_code = run(std::env::args_os(), &mut input, &mut stdout, &mut stderr);
    drop(input);
    let _ = stdout.flush();
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run<I, R, W, E>(args: I, input: &mut R, out: &mut W, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    R: Read,
    W: Write,
    E: Write,
{
    let options = match parse_args(args) {
        Ok(options) => options,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            let _ = write_usage(err);
            return 2;
        }
    };

    if options.show_help {
        if write_usage(out).is_err() {
            return 1;
        }
        return 0;
    }

    match execute(&options, input, out) {
        Ok(()) => 0,
        Err(error) => {
            let _ = writeln!(err, "error: {error}");
            if let Some(hint) = error.suggestion() {
                let _ = writeln!(err, "hint: {hint}");
            }
            error.exit_code()
        }
    }
}

fn execute<R, W>(options: &EchoOptions, input: &mut R, out: &mut W) -> Result<(), CsvTabError>
where
    R: Read,
    W: Write,
{
    let mut overwrites: Box<dyn OverwriteSource> = match options.overwrite.as_deref() {
        Some(source) => Box::new(SqliteOverwrites::from_source(source)?),
        None => Box::new(VecOverwrites::default()),
    };
    match &options.input {
        Some(path) => {
            let file = File::open(path).map_err(|source| CsvTabError::CannotOpen {
                path: path.clone(),
                source,
            })?;
            echo(file, out, overwrites.as_mut(), options)?;
        }
        None => {
            echo(input, out, overwrites.as_mut(), options)?;
        }
    }
    Ok(())
}

fn parse_args<I>(args: I) -> Result<EchoOptions, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let _argv0 = iter.next();

    let mut options = EchoOptions::default();
    let mut has_input = false;

    while let Some(argument) = iter.next() {
        let arg = argument.to_string_lossy();
        match arg.as_ref() {
            "-h" | "--help" => {
                options.show_help = true;
            }
            "-b" => {
                options.with_bom = true;
            }
            "--overwrite" => {
                if options.overwrite.is_some() {
                    return Err(String::from("`--overwrite` may only be provided once"));
                }
                let next = iter
                    .next()
                    .ok_or_else(|| String::from("Option --overwrite requires a value"))?;
                options.overwrite = Some(next.to_string_lossy().into_owned());
            }
            "-" if !has_input => {
                has_input = true;
            }
            other => {
                if let Some(value) = other.strip_prefix("--overwrite=") {
                    if options.overwrite.is_some() {
                        return Err(String::from("`--overwrite` may only be provided once"));
                    }
                    options.overwrite = Some(value.to_owned());
                    continue;
                }
                if has_input || (other.starts_with('-') && other.len() > 1) {
                    return Err(format!("Unrecognized option: {other}"));
                }
                has_input = true;
                options.input = Some(PathBuf::from(&argument));
            }
        }
    }

    Ok(options)
}

fn write_usage<W>(out: &mut W) -> io::Result<()>
where
    W: Write,
{
    writeln!(
        out,
        "csvtab-echo: write tabular input to stdout with optional cell overwrites\n\
         \n\
         Usage: csvtab-echo [FILENAME|-] [-b] [--overwrite SOURCE]\n\
         \n\
         Options:\n\
         \x20 -b                   write a UTF-8 byte order mark first\n\
         \x20 --overwrite SOURCE   overwrite cells using SOURCE, which may be:\n\
         \x20                      sqlite3://FILENAME?sql=QUERY\n\
         \n\
         Example:\n\
         \n\
         csvtab-echo data.csv --overwrite \\\n\
         \x20 'sqlite3://patches.db?sql=select row, col, value from patches order by row, col'\n",
    )
}
