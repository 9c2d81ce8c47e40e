//! FHIRPath CLI executable
//!
//! Evaluates a JSON-encoded parse tree against a FHIR resource and prints the
//! resulting collection as JSON. See the cli module documentation for usage.

use clap::Parser;
use kestrel_fhirpath::cli::{Args, init_tracing, run_cli};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args.log_level);
    run_cli(args)?;
    Ok(())
}
