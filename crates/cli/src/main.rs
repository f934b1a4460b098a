use clap::Parser;
use conduit_dns_domain::Config;
use conduit_dns_infrastructure::dns;
use conduit_dns_jobs::JobRunner;
use tracing::info;

mod bootstrap;
mod server;

#[derive(Parser)]
#[command(name = "conduit-dns")]
#[command(version)]
#[command(about = "DNS stub resolver, proxy and router")]
#[command(long_about = "DNS stub resolver, proxy and router.

Listens for incoming DNS queries, routes them through a configurable
pipeline of groups, modifiers, caches and blocklists, and forwards them
to upstream resolvers over plain DNS, DNS-over-TLS, DNS-over-HTTPS or
DNS-over-QUIC.

Configuration can be split over multiple files, with listeners, groups
and routers defined in different files and passed as arguments.")]
struct Cli {
    /// Configuration file(s)
    #[arg(required = true, value_name = "CONFIG")]
    configs: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    bootstrap::init_logging(&cli.log_level);

    info!("Starting Conduit DNS v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_files(&cli.configs)?;

    let graph = dns::assemble(&config).await?;
    let listeners = dns::build_listeners(&config, &graph.resolvers)?;
    if listeners.is_empty() {
        anyhow::bail!("no listeners configured");
    }

    let job_runner = JobRunner::new(graph.refresh_ports, graph.cache_ports);
    job_runner.start();

    server::run_listeners(listeners);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    job_runner.shutdown_token().cancel();
    Ok(())
}
