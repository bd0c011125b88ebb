use gumdrop::Options;
use miette::{Context, Result};

mod client;
mod migrate;
mod protocol;

use client::StoreClient;
use migrate::Migrator;

const USAGE: &str =
    "Usage: hashferry <source_host:port> <source_db_idx> <dest_host:port> <dest_db_idx>";

#[derive(Options, Debug)]
struct Args {
    #[options(help = "Print help message")]
    help: bool,

    #[options(
        help = "<source_host:port> <source_db_idx> <dest_host:port> <dest_db_idx>",
        free
    )]
    endpoints: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args_default_or_exit();

    // Any count other than exactly four prints usage and exits cleanly
    let Some((source_addr, source_db, dest_addr, dest_db)) = split_endpoints(&args.endpoints)
    else {
        println!("{}", USAGE);
        return Ok(());
    };

    let source = StoreClient::connect(source_addr)
        .await
        .wrap_err("connecting to source store")?;
    let dest = StoreClient::connect(dest_addr)
        .await
        .wrap_err("connecting to destination store")?;

    let report = Migrator::new(source, dest).run(source_db, dest_db).await?;

    tracing::info!(
        "migration finished: {} keys seen, {} hashes copied, {} skipped in {} ms",
        report.keys_seen,
        report.hashes_copied,
        report.skipped.len(),
        report.elapsed.as_millis()
    );

    Ok(())
}

fn split_endpoints(free: &[String]) -> Option<(&str, &str, &str, &str)> {
    match free {
        [source_addr, source_db, dest_addr, dest_db] => Some((
            source_addr.as_str(),
            source_db.as_str(),
            dest_addr.as_str(),
            dest_db.as_str(),
        )),
        _ => None,
    }
}
