use clap::Parser;
use pdf2zh_pipeline::cli;
use tracing::error;

fn main() {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        error!("{:#}", err);
        // callers read stdout, so failures are reported there too
        println!(
            "{}",
            serde_json::json!({"status": "error", "message": format!("{err:#}")})
        );
        std::process::exit(1);
    }
}
