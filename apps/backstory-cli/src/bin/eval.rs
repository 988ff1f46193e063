use std::env;

use backstory_cli::{init_tracing, load_settings};
use backstory_core::config::expand_path;
use backstory_verify::eval::evaluate;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let settings = load_settings()?;
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Usage: backstory-eval [results.csv] [labels.csv]");
        return Ok(());
    }
    let results = args.first().map(|a| expand_path(a)).unwrap_or_else(|| expand_path(&settings.batch.output_csv));
    let labels = args.get(1).map(|a| expand_path(a)).unwrap_or_else(|| expand_path(&settings.batch.input_csv));

    let report = evaluate(&results, &labels)?;
    if report.matched == 0 {
        eprintln!("No matching IDs between {} and {}.", results.display(), labels.display());
        std::process::exit(1);
    }
    print!("{report}");
    Ok(())
}
