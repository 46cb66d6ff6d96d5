use std::env;

use pgbl::api::CommandError;

#[tokio::main]
async fn main() {
    env_logger::init();

    let raw_args: Vec<String> = env::args().collect();
    match raw_args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            let port = raw_args
                .get(2)
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(8080);
            if let Err(e) = pgbl::api::run_http_server(port).await {
                log::error!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Some("simulate") => match pgbl::api::run_simulate_command(&raw_args[1..]) {
            Ok(output) => println!("{output}"),
            Err(CommandError::Args(e)) => e.exit(),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("Usage: pgbl serve [port] | pgbl simulate [--help]");
            std::process::exit(1);
        }
    }
}
