//! Create sign request data from a configuration and a sign request input
//!
//! Loads the integration configuration and a JSON sign request input, prepares
//! every document and prints the resulting sign request data as JSON.
//!
//! Usage:
//!   cargo run --bin create_sign_request -- --config config.json --input input.json
//!   cargo run --bin create_sign_request -- --config config.json --input input.json --output data.json

use signservice_integration::config::IntegrationConfig;
use signservice_integration::document::pdf::PageTreePdfHandler;
use signservice_integration::pipeline::SignRequestInput;
use signservice_integration::SignServiceIntegration;
use std::fs;
use std::path::PathBuf;

struct CliConfig {
    config_path: Option<PathBuf>,
    input_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    decode: bool,
}

impl CliConfig {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut config_path = None;
        let mut input_path = None;
        let mut output_path = None;
        let mut decode = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config_path = Some(PathBuf::from(&args[i]));
                    }
                },
                "--input" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        input_path = Some(PathBuf::from(&args[i]));
                    }
                },
                "--output" | "-o" => {
                    i += 1;
                    if i < args.len() {
                        output_path = Some(PathBuf::from(&args[i]));
                    }
                },
                "--decode" => {
                    decode = true;
                },
                other => {
                    eprintln!("Ignoring unknown argument: {}", other);
                },
            }
            i += 1;
        }

        Self {
            config_path,
            input_path,
            output_path,
            decode,
        }
    }
}

fn run(cli: &CliConfig) -> Result<String, Box<dyn std::error::Error>> {
    let config = match &cli.config_path {
        Some(path) => IntegrationConfig::from_json_file(path)?,
        None => IntegrationConfig::default(),
    };
    let input_path = cli.input_path.as_ref().ok_or("--input is required")?;
    let input: SignRequestInput = serde_json::from_str(&fs::read_to_string(input_path)?)?;

    let service = SignServiceIntegration::new(config, PageTreePdfHandler::new())?;
    let data = service.create_sign_request(&input)?;

    if cli.decode {
        let request = data.decode_sign_request()?;
        return Ok(serde_json::to_string_pretty(&serde_json::json!({
            "data": data,
            "signRequest": request,
        }))?);
    }
    Ok(serde_json::to_string_pretty(&data)?)
}

fn main() {
    env_logger::init();

    let cli = CliConfig::from_args();

    match run(&cli) {
        Ok(json) => match &cli.output_path {
            Some(path) => {
                if let Err(e) = fs::write(path, json) {
                    eprintln!("Failed to write {}: {}", path.display(), e);
                    std::process::exit(1);
                }
                println!("Sign request data written to {}", path.display());
            },
            None => println!("{}", json),
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(err) = e.downcast_ref::<signservice_integration::Error>() {
                eprintln!("Code: {} (status {})", err.error_code(), err.http_status());
            }
            std::process::exit(1);
        },
    }
}
