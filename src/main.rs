use anyhow::{anyhow, Result};
use clap::Parser;
use is_terminal::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trust_dns_proto::rr::Name;
use unicast_dnssd::{
    AutomaticUnregister, Browser, ClientTransport, Config, DomainEnumerator, DynTransport,
    Registrator, ServiceData, ServiceName, ServiceType, SharedConfig, SystemTopology,
};

#[derive(Parser)]
#[clap(name = "dnssd")]
#[clap(about = "Browse and register DNS-SD services over unicast DNS")]
struct Args {
    /// JSON config file
    #[clap(long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// List the browsing and registration domains
    Domains,
    /// List the service types in the browsing domains
    Types,
    /// List the instances of a service type, e.g. `_http._tcp,_printer`
    Instances { service_type: ServiceType },
    /// Show the endpoint and properties of a service instance
    Resolve { service: ServiceName },
    /// Register a service instance
    Register {
        instance: String,
        service_type: ServiceType,
        port: u16,
        /// Properties, as `key=value` or a bare `key`
        properties: Vec<String>,
        /// Target host, the local host name if absent
        #[clap(long)]
        host: Option<Name>,
        /// Keep the registration until interrupted
        #[clap(long)]
        wait: bool,
    },
    /// Unregister a service instance
    Unregister { service: ServiceName },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let args = Args::parse();
    let config = config_init(args.config)?;
    let transport: DynTransport = Arc::new(ClientTransport::from_config(&config)?);
    let topology = Arc::new(SystemTopology::from_config(&config));
    let enumerator = DomainEnumerator::from_topology(transport.clone(), topology.as_ref());

    match args.command {
        Command::Domains => {
            print_domains("browsing", enumerator.browsing_domains().await?);
            print_domains("default browsing", enumerator.default_browsing_domain().await?);
            print_domains("registering", enumerator.registering_domains().await?);
            print_domains(
                "default registering",
                enumerator.default_registering_domain().await?,
            );
            print_domains("legacy browsing", enumerator.legacy_browsing_domains().await?);
        }
        Command::Types => {
            for service_type in browser(&config, &enumerator).await?.service_types().await? {
                println!("{service_type}");
            }
        }
        Command::Instances { service_type } => {
            let browser = browser(&config, &enumerator).await?;
            for service in browser.service_instances(&service_type).await? {
                println!("{service}");
            }
        }
        Command::Resolve { service } => {
            let browser = browser(&config, &enumerator).await?;
            match browser.service_data(&service).await? {
                Some(data) => println!("{data}"),
                None => return Err(anyhow!("{service} not found")),
            }
        }
        Command::Register {
            instance,
            service_type,
            port,
            properties,
            host,
            wait,
        } => {
            let registrator = Arc::new(
                registrator(&config, &enumerator)
                    .await?
                    .with_topology(topology),
            );
            let host = match host {
                Some(host) => host,
                None => registrator.local_host_name()?,
            };
            let name = registrator.make_service_name(instance, service_type);
            let mut data = ServiceData::new(name.clone(), host, port);
            data.extend_from_txt(properties);

            if !registrator.register_service(&data).await? {
                return Err(anyhow!("{name} already exists"));
            }
            println!("registered {data}");

            if wait {
                let unregister = AutomaticUnregister::new(registrator.clone());
                unregister.add_service(name).await;
                signal::ctrl_c().await?;
                tracing::info!("quitting from signal");
                unregister.unregister_all().await;
            }
        }
        Command::Unregister { service } => {
            let registrator = registrator(&config, &enumerator).await?;
            if !registrator.unregister_service(&service).await? {
                return Err(anyhow!("{service} not found"));
            }
            println!("unregistered {service}");
        }
    }
    Ok(())
}

async fn browser(config: &Config, enumerator: &DomainEnumerator) -> Result<Browser> {
    if config.browsing_domains.is_empty() {
        Ok(Browser::from_enumerator(enumerator).await?)
    } else {
        Ok(Browser::new(
            enumerator.transport().clone(),
            config.browsing_domains.clone(),
        ))
    }
}

async fn registrator(config: &Config, enumerator: &DomainEnumerator) -> Result<Registrator> {
    let registrator = match &config.registration_domain {
        Some(domain) => Registrator::new(enumerator.transport().clone(), domain.clone()).await?,
        None => Registrator::from_enumerator(enumerator).await?,
    };
    Ok(registrator
        .with_time_to_live(config.ttl)
        .with_signing_key(config.signing_key()?))
}

fn print_domains(kind: &str, domains: impl IntoIterator<Item = Name>) {
    for domain in domains {
        println!("{kind}: {domain}");
    }
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "unicast_dnssd=info,dnssd=info".into()),
        )
        .init();
}

fn config_init(config_file: Option<PathBuf>) -> Result<SharedConfig> {
    match config_file {
        None => Ok(Arc::new(Config::default())),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file)?;
            tracing::debug!("loaded config from {}", config_file.display());
            Ok(Arc::new(config))
        }
    }
}
