use anyhow::{anyhow, Result};
use chrono::Local;
use log::LevelFilter;
use std::{
    io::{self, Write},
    sync::Arc,
};

use clap::ArgMatches;
use env_logger::{Builder, Target};

use crate::{
    api::modbus::{LoggingHook, ModbusServerBuilder},
    cli::config::SimulatorConfig,
    core::MemoryStore,
};

/// Multi-writer for logging to both file and stdout
struct DualWriter {
    file: std::fs::File,
    stdout: io::Stdout,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        self.stdout.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.stdout.flush()?;
        Ok(())
    }
}

/// Logger setup when no `--log-file` is given: `MODSIM_LOG_FILE` selects a
/// file logger, otherwise `RUST_LOG` drives the default stderr logger.
pub fn init_common() {
    if let Ok(path) = std::env::var("MODSIM_LOG_FILE") {
        if let Err(err) = init_file_logger(&path) {
            eprintln!("Failed to initialize file logger at '{path}': {err}");
            env_logger::init();
        }
    } else {
        Builder::new()
            .filter_level(LevelFilter::Info)
            .parse_default_env()
            .init();
    }
}

/// Dual logger (file and terminal) used when the simulator runs with `--log-file`
pub fn init_daemon_logger(path: &str) -> io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let dual_writer = DualWriter {
        file,
        stdout: io::stdout(),
    };

    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(dual_writer)))
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("Logging to {path} and terminal");

    Ok(())
}

fn init_file_logger(path: &str) -> io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} {} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(file)))
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .init();

    log::info!("File logger initialized at {path}");

    Ok(())
}

/// Run the simulator described by the parsed command line until Ctrl-C
pub async fn run(matches: &ArgMatches) -> Result<()> {
    let path = matches
        .get_one::<String>("config")
        .ok_or_else(|| anyhow!("--config is required"))?;
    let mut config = SimulatorConfig::from_file(path)?;
    if let Some(host) = matches.get_one::<String>("bind") {
        config.bind_host = host.clone();
    }

    if matches.get_flag("dump-config") {
        println!("{}", config.normalized()?.to_json()?);
        return Ok(());
    }

    let store = Arc::new(MemoryStore::from_config(&config)?);
    let port_map = store.port_map();
    log::info!(
        "Loaded {} connection(s) from {path}",
        config.connections.len()
    );

    let server = ModbusServerBuilder::new(store.clone(), store.clone())
        .with_bind_host(config.bind_host.clone())
        .with_read_buffer_size(config.read_buffer_size)
        .add_hook(Arc::new(LoggingHook))
        .build()?;

    if let Err(err) = server.start(port_map).await {
        server.stop_all().await;
        return Err(err);
    }
    log::info!("Listening on ports {:?}", server.active_ports());

    tokio::signal::ctrl_c().await?;
    log::info!("Shutdown requested");
    server.stop_all().await;

    Ok(())
}
