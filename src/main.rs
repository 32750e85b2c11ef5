use std::net::SocketAddr;

use clap::Parser;
use log::{LevelFilter, info};
use request_observer::{ObserverConfig, RequestLogging};

mod routes;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Environment {
    /// The address where the server should bind to
    #[arg(short, long, default_value_t=String::from("localhost:3000"))]
    pub server_address: String,

    /// Append the local time to every "Started" line
    #[arg(short, long)]
    pub timestamp: bool,

    /// Leave the request duration off every "Completed" line
    #[arg(long)]
    pub hide_duration: bool,

    /// Blank lines to print after each request
    #[arg(short, long, default_value_t = 0)]
    pub new_lines: usize,

    /// Print debug logs as well
    #[arg(short, long)]
    pub verbose: bool,
}

impl Environment {
    fn observer_config(&self) -> ObserverConfig {
        ObserverConfig {
            include_timestamp: self.timestamp,
            suppress_duration: self.hide_duration,
            trailing_blank_lines: self.new_lines,
        }
    }
}

lazy_static::lazy_static! {
    static ref ENVIRONMENT: Environment = Environment::parse();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut logger = colog::default_builder();
    logger.filter_level(if ENVIRONMENT.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    logger.init();

    let app = routes::router(RequestLogging::new(ENVIRONMENT.observer_config()));

    let listener = tokio::net::TcpListener::bind(&ENVIRONMENT.server_address).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
