use std::env;

use timeonsite_core::TrackedBy;

#[derive(Debug, Default)]
pub struct CliArgs {
    pub endpoint: Option<String>,
    pub track_by: TrackedBy,
}

pub fn parse_args() -> Result<CliArgs, String> {
    let mut args = env::args().skip(1);
    let mut parsed = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--endpoint" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --endpoint".to_string())?;
                parsed.endpoint = Some(value);
            }
            "--track-by" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --track-by".to_string())?;
                parsed.track_by = match value.as_str() {
                    "millisecond" => TrackedBy::Millisecond,
                    "second" => TrackedBy::Second,
                    _ => return Err(format!("invalid track-by unit: {value}")),
                };
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                return Err(format!("unknown argument: {arg}"));
            }
        }
    }

    Ok(parsed)
}

pub fn print_help() {
    println!(
        "Time-on-site demo\n\n\
Usage:\n  timeonsite-demo [--endpoint <url>] [--track-by <unit>]\n\n\
Options:\n  --endpoint <url>   POST queued records to this collector URL\n  --track-by <unit>  Report durations in 'millisecond' (default) or 'second'\n  -h, --help         Show this help message\n"
    );
}
