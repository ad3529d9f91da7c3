mod backend;

use std::net::IpAddr;
use std::time::Duration;

use clap::Parser;
use ipmi_bmc::transport::UdpTransport;
use ipmi_bmc::{IpmiServer, MonotonicClock, ServerConfig, StaticAuth};

/// Software BMC serving IPMI 2.0 over RMCP+ (cipher suite 3 only).
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// UDP port to listen on.
    #[arg(long, default_value_t = 623)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "::")]
    address: IpAddr,

    /// Credentials accepted for RAKP login, as user:password. May be
    /// given multiple times.
    #[arg(short, long = "user", value_parser = parse_user, required = true)]
    users: Vec<(String, String)>,

    /// BMC integrity key (Kg) override; per-user keys when absent.
    #[arg(long)]
    kg: Option<String>,

    /// Seconds of inactivity before a session is swept.
    #[arg(long, default_value_t = 60)]
    inactivity_timeout: u64,
}

fn parse_user(raw: &str) -> Result<(String, String), String> {
    raw.split_once(':')
        .map(|(user, password)| (user.to_string(), password.to_string()))
        .ok_or_else(|| format!("expected user:password, got {raw:?}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut auth = StaticAuth::new();
    for (user, password) in &cli.users {
        auth.add_user(user, password);
    }

    let config = ServerConfig {
        address: cli.address,
        port: cli.port,
        kg: cli.kg.map(String::into_bytes),
        inactivity_timeout: Duration::from_secs(cli.inactivity_timeout),
        ..Default::default()
    };

    let mut transport = UdpTransport::bind(&config.bind_config())?;
    transport.set_recv_timeout(Some(Duration::from_secs(5)))?;
    log::info!("BMC listening on {}", transport.local_addr()?);

    let mut server = IpmiServer::new(
        config,
        Box::new(auth),
        Box::new(backend::DemoBackend::default()),
    );
    server.run(&mut transport, &MonotonicClock)?;
    Ok(())
}
