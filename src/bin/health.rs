use std::env;
use std::error;

use reqwest::Url;
use shachiku_ai::api::HealthResponse;

const HEALTH_PATHS: [&str; 2] = ["v1/excuse/health", "shatiku-ai/health"];

fn main() -> Result<(), Box<dyn error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        panic!("Missing URL argument")
    }

    let base = Url::parse(&args[1])?;
    for path in HEALTH_PATHS {
        let url = base.join(path)?;
        let response = reqwest::blocking::get(url.clone())?;
        if !response.status().is_success() {
            panic!("Request to {url} failed with {}", response.status())
        }
        let health: HealthResponse = response.json()?;
        if health.status != "healthy" {
            panic!("{} reported {}", health.service, health.status)
        }
    }

    Ok(())
}
