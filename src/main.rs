use extendible_kv::*;
use tracing::{error, Level};

#[tokio::main]
async fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("Usage: extendible_kv [--repl] [--db <name>] [--new] [--coalesce] [--verbose]");
            std::process::exit(2);
        }
    };

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let result = if args.repl {
        run_repl(&args.setup).await
    } else {
        process_from_stdin(&args.setup).await
    };

    if let Err(err) = result {
        error!(%err, "stopped");
        std::process::exit(1);
    }
}
