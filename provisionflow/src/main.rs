use clap::Parser;
use provisionflow::cli::Cli;

#[tokio::main]
async fn main() {
    let code = match Cli::parse().run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    };
    std::process::exit(code);
}
