//! Prints the Gemini models available to `GEMINI_API_KEY`.

use std::env;
use std::process::ExitCode;

use app_trust_check::llm::list_gemini_models;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let api_key = match env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            eprintln!("GEMINI_API_KEY is not set");
            return ExitCode::FAILURE;
        }
    };

    match list_gemini_models(&api_key).await {
        Ok(models) => {
            println!("Models available for this key:");
            for model in models {
                println!(
                    "- {} (supports: {})",
                    model.name,
                    model.supported_generation_methods.join(", ")
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Failed to list models: {err}");
            ExitCode::FAILURE
        }
    }
}
