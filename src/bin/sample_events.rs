use std::env;
use std::path::PathBuf;

use territory_analyze::ingest;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() != 4 {
        eprintln!("Usage: {} <input.csv> <output.csv> <sample_percentage>", args[0]);
        eprintln!("Example: sample-events acled_syria.csv sample.csv 10");
        std::process::exit(1);
    }

    let input_path = PathBuf::from(&args[1]);
    let output_path = PathBuf::from(&args[2]);
    let sample_percentage: f64 = args[3]
        .parse()
        .map_err(|_| "Sample percentage must be a number")?;

    println!(
        "Sampling {}% of events from {} to {}",
        sample_percentage,
        input_path.display(),
        output_path.display()
    );

    let sampled = ingest::sample_rows(&input_path, &output_path, sample_percentage)?;

    println!("✅ Successfully created sample file with {} events", sampled);
    println!("Sample file: {}", output_path.display());

    Ok(())
}
