use anyhow::Result;
use clap::Parser;
use destruct::cli::{dispatch, Cli, Output, BANNER};
use destruct::config::Environment;
use destruct::input::piped_stdin;
use secrecy::ExposeSecret;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,destruct=debug")
    } else {
        EnvFilter::try_from_env("DESTRUCT_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let env = Environment::from_process();
    match dispatch(&cli, &env, piped_stdin()).await? {
        Output::Banner => println!("{BANNER}"),
        Output::Token(token) => println!("{}", token.expose_secret()),
        Output::Secret(secret) => println!("{}", secret.expose_secret()),
    }

    Ok(())
}
