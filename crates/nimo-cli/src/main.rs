//! Boundary CLI tools (§6): `check`, `stop`, and the node/channel/
//! connection commands used to drive the §8 end-to-end scenarios by
//! hand. Subcommand shape grounded in the `clap` derive pattern used by
//! the pack's own multi-command build tool (`Commands`/`Args`/
//! `ValueEnum`), adapted to one binary with a `--registry` target
//! instead of that tool's `--clean` global flag.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use nimo_registry_client::RegistryClient;
use nimo_types::{ChannelKey, ChannelPath, Endpoint, ErrorKind, NimoError, ServiceKind, TransportPref};

#[derive(Parser, Debug)]
#[command(name = "nimo", about = "nImO fleet control", version)]
struct Cli {
    /// Registry command-port address (`host:port`); if omitted, resolved
    /// via mDNS (§4.D).
    #[arg(long, global = true)]
    registry: Option<SocketAddrV4>,

    /// RPC deadline in seconds (§5 "RPC calls take a deadline").
    #[arg(long, global = true, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Confirm the Registry is reachable (exit 0) or not (exit 2).
    Check,
    /// Ask the Registry to stop.
    Stop,
    /// List every registered node's name.
    ListNodes,
    /// List the channels registered on one node.
    ListChannels { node: String },
    /// Register a machine.
    AddMachine { name: String, address: Ipv4Addr },
    /// Register a node.
    AddNode {
        name: String,
        machine: String,
        #[arg(value_enum)]
        kind: ServiceKindArg,
        address: Ipv4Addr,
        port: u16,
    },
    /// Deregister a node (cascades to its channels and connections).
    RemoveNode { name: String },
    /// Register a channel on a node.
    AddChannel {
        node: String,
        path: String,
        #[arg(long)]
        output: bool,
        #[arg(long = "type", default_value = "logic data")]
        data_type: String,
        #[arg(long, value_enum, default_value = "any")]
        transport: TransportArg,
    },
    /// Deregister a channel.
    RemoveChannel { node: String, path: String },
    /// Connect an output channel to an input channel.
    Connect {
        from_node: String,
        from_path: String,
        to_node: String,
        to_path: String,
    },
    /// Remove the connection an input channel is the sink of.
    Disconnect { node: String, path: String },
    /// Print the byte/message counters for one channel.
    ChannelStats { node: String, path: String },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum ServiceKindArg {
    Filter,
    Source,
    Sink,
    Utility,
    Launcher,
    Registry,
    Miscellaneous,
}

impl From<ServiceKindArg> for ServiceKind {
    fn from(kind: ServiceKindArg) -> Self {
        match kind {
            ServiceKindArg::Filter => ServiceKind::Filter,
            ServiceKindArg::Source => ServiceKind::Source,
            ServiceKindArg::Sink => ServiceKind::Sink,
            ServiceKindArg::Utility => ServiceKind::Utility,
            ServiceKindArg::Launcher => ServiceKind::Launcher,
            ServiceKindArg::Registry => ServiceKind::Registry,
            ServiceKindArg::Miscellaneous => ServiceKind::Miscellaneous,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum TransportArg {
    Any,
    Tcp,
    Udp,
}

impl From<TransportArg> for TransportPref {
    fn from(t: TransportArg) -> Self {
        match t {
            TransportArg::Any => TransportPref::Any,
            TransportArg::Tcp => TransportPref::Tcp,
            TransportArg::Udp => TransportPref::Udp,
        }
    }
}

/// §6 exit codes: `0` success, `1` usage error, `2` Registry not found,
/// `3` command refused, `-1` unexpected exception.
fn main() {
    nimo_context::init_for_tool();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            std::process::exit(-1);
        }
    };

    std::process::exit(rt.block_on(run(cli)));
}

async fn run(cli: Cli) -> i32 {
    let deadline = Duration::from_secs(cli.timeout);
    let endpoint = match cli.registry {
        Some(addr) => Endpoint::from(addr),
        None => match nimo_discovery::resolve_once(nimo_discovery::default_deadline()).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                eprintln!("{e}");
                return 2;
            }
        },
    };

    let client = match RegistryClient::connect(endpoint)
        .await
        .map(|c| c.with_call_timeout(deadline))
    {
        Ok(client) => client,
        Err(_) => {
            eprintln!("{}", NimoError::registry_not_found(format!("{endpoint} is not reachable")));
            return 2;
        }
    };

    match execute(&client, cli.command).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{e}");
            match e.kind {
                ErrorKind::RegistryNotFound | ErrorKind::Timeout => 2,
                _ => 3,
            }
        }
    }
}

async fn execute(client: &RegistryClient, command: Command) -> Result<(), NimoError> {
    match command {
        Command::Check => client.check().await,
        Command::Stop => client.stop().await,
        Command::ListNodes => {
            for name in client.get_names_of_nodes().await? {
                println!("{name}");
            }
            Ok(())
        }
        Command::ListChannels { node } => {
            let count = client.get_number_of_output_channels_on_node(&node).await?;
            println!("{node}: {count} output channel(s)");
            Ok(())
        }
        Command::AddMachine { name, address } => client.add_machine(&name, address).await,
        Command::AddNode {
            name,
            machine,
            kind,
            address,
            port,
        } => {
            client
                .add_node(&name, &machine, kind.into(), Endpoint::new(address, port))
                .await
        }
        Command::RemoveNode { name } => client.remove_node(&name).await,
        Command::AddChannel {
            node,
            path,
            output,
            data_type,
            transport,
        } => {
            client
                .add_channel(&node, &path, output, &data_type, transport.into())
                .await
        }
        Command::RemoveChannel { node, path } => client.remove_channel(&node, &path).await,
        Command::Connect {
            from_node,
            from_path,
            to_node,
            to_path,
        } => {
            let from = ChannelKey::new(from_node.into(), ChannelPath::parse(from_path)?);
            let to = ChannelKey::new(to_node.into(), ChannelPath::parse(to_path)?);
            let transport = client.add_connection(&from, &to).await?;
            println!("connected, transport={}", transport.as_str());
            Ok(())
        }
        Command::Disconnect { node, path } => {
            let endpoint = ChannelKey::new(node.into(), ChannelPath::parse(path)?);
            client.remove_connection(&endpoint).await
        }
        Command::ChannelStats { node, path } => {
            match client.get_channel_statistics(&node, &path).await? {
                Some((bytes, messages)) => println!("bytes={bytes} messages={messages}"),
                None => println!("no such channel"),
            }
            Ok(())
        }
    }
}
