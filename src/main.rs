//! Poseidon2 / Groth16 demo
//!
//! Runs a ceremony, proves knowledge of a preimage and verifies the proof.
//!
//! Usage: poseidon2-groth16 [config.json] [preimage...]

use poseidon2_groth16::groth16::public_signals_to_json;
use poseidon2_groth16::{Fr, Pipeline, PipelineConfig, ZkError};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        tracing::error!(error = %e, "pipeline failed");
        std::process::exit(1);
    }
}

fn run() -> Result<(), ZkError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config, values) = match args.first() {
        Some(path) if path.ends_with(".json") => (PipelineConfig::from_file(path)?, &args[1..]),
        _ => (PipelineConfig::default(), &args[..]),
    };

    let pipeline = Pipeline::new(config)?;
    let preimage: Vec<Fr> = if values.is_empty() {
        [123u64, 456].iter().copied().map(Fr::from_u64).take(pipeline.circuit().params().rate()).collect()
    } else {
        values
            .iter()
            .map(|v| Fr::from_decimal(v).ok_or_else(|| ZkError::MalformedInput(format!("not a field element: {v}"))))
            .collect::<Result<_, _>>()?
    };

    let out = pipeline.run(&preimage)?;
    println!("Constraints: {}", out.num_constraints);
    println!("Contributions: {}", out.log.len());
    println!();
    println!("verification_key.json:");
    println!("{}", out.verifying_key.to_json()?);
    println!();
    println!("proof.json:");
    println!("{}", out.proof.to_json()?);
    println!();
    println!("public.json:");
    println!("{}", public_signals_to_json(&out.public_signals)?);
    println!();
    println!("Verified: {}", out.verified);

    if !out.verified {
        std::process::exit(2);
    }
    Ok(())
}
