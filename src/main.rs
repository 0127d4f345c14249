use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = modsim::cli::parse_args();

    if let Some(path) = matches.get_one::<String>("log-file") {
        modsim::boot::init_daemon_logger(path)?;
    } else {
        modsim::boot::init_common();
    }

    modsim::boot::run(&matches).await
}
