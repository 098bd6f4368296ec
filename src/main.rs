use clap::Parser;
use labctl::configuration::{Cli, Command};
use labctl::container_management::{OpContext, RuntimeRegistry};
use labctl::controller::Controller;
use labctl::network::IpHostNetwork;
use log::{error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let Command::Destroy(args) = cli.command;

    // https://docs.rs/env_logger/latest/env_logger/
    let level = if args.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_target(false)
        .init();

    let options = match args.into_options() {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let host = Arc::new(IpHostNetwork::new(options.timeout));
    let controller = match Controller::new(options, &RuntimeRegistry::default(), host) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}", e);
            std::process::exit(1);
        }
    };

    let token = CancellationToken::new();
    let ctx = OpContext::new(token.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding operations");
            token.cancel();
        }
    });

    if let Err(e) = controller.run(&ctx).await {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("Done");
}
