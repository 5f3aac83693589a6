//! Wires [`Registry`] operations into a [`nimo_proto::HandlerTable`]
//! (§4.C, §4.G). Request keys follow the naming convention used
//! throughout §4.G's command surface: `?` for queries, `.` for commands,
//! with no result payload beyond `ok`.

use std::net::Ipv4Addr;
use std::sync::Arc;

use nimo_proto::{HandlerTable, HandlerTableBuilder, ShutdownFlag};
use nimo_types::{ChannelKey, ChannelPath, NimoError, ServiceKind, TransportPref};
use nimo_value::{Key, Map, Value};

use crate::registry::Registry;
use crate::tables::{ApplicationRow, ChannelRow, ChannelStatistics, ConnectionRow, MachineRow, NodeRow};

fn arg(args: &[Value], index: usize, name: &str) -> Result<Value, NimoError> {
    args.get(index)
        .cloned()
        .ok_or_else(|| NimoError::missing_argument(format!("missing argument {index} ({name})")))
}

fn arg_string(args: &[Value], index: usize, name: &str) -> Result<String, NimoError> {
    match arg(args, index, name)? {
        Value::String(s) => Ok(s),
        other => Err(NimoError::bad_argument(format!(
            "argument {name} must be a string, got {}",
            other.kind_name()
        ))),
    }
}

fn arg_bool(args: &[Value], index: usize, name: &str) -> Result<bool, NimoError> {
    match arg(args, index, name)? {
        Value::Logical(b) => Ok(b),
        other => Err(NimoError::bad_argument(format!(
            "argument {name} must be a logical, got {}",
            other.kind_name()
        ))),
    }
}

fn arg_integer(args: &[Value], index: usize, name: &str) -> Result<i64, NimoError> {
    match arg(args, index, name)? {
        Value::Integer(n) => Ok(n),
        other => Err(NimoError::bad_argument(format!(
            "argument {name} must be an integer, got {}",
            other.kind_name()
        ))),
    }
}

fn arg_address(args: &[Value], index: usize, name: &str) -> Result<Ipv4Addr, NimoError> {
    match arg(args, index, name)? {
        Value::Address(a) => Ok(a),
        other => Err(NimoError::bad_argument(format!(
            "argument {name} must be an address, got {}",
            other.kind_name()
        ))),
    }
}

fn arg_channel_path(args: &[Value], index: usize, name: &str) -> Result<ChannelPath, NimoError> {
    ChannelPath::parse(arg_string(args, index, name)?)
}

fn arg_transport_pref(args: &[Value], index: usize, name: &str) -> Result<TransportPref, NimoError> {
    let s = arg_string(args, index, name)?;
    TransportPref::parse(&s).ok_or_else(|| {
        NimoError::bad_argument(format!("argument {name} is not a known transport ({s})"))
    })
}

fn arg_service_kind(args: &[Value], index: usize, name: &str) -> Result<ServiceKind, NimoError> {
    let s = arg_string(args, index, name)?;
    ServiceKind::parse(&s)
        .ok_or_else(|| NimoError::bad_argument(format!("argument {name} is not a known service kind ({s})")))
}

fn arg_string_array(args: &[Value], index: usize, name: &str) -> Result<Vec<String>, NimoError> {
    match arg(args, index, name)? {
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(NimoError::bad_argument(format!(
                    "argument {name} must be an array of strings, found {}",
                    other.kind_name()
                ))),
            })
            .collect(),
        other => Err(NimoError::bad_argument(format!(
            "argument {name} must be an array, got {}",
            other.kind_name()
        ))),
    }
}

/// Parses one `[shortName, description, executablePath, argumentTemplate,
/// optionTemplate]` array, the wire shape `setApplicationsForNode.` takes
/// per application (§4.I catalogue entries pushed by the launcher).
fn arg_application_row(value: Value, launcher_node: &nimo_types::NodeName) -> Result<ApplicationRow, NimoError> {
    let Value::Array(fields) = value else {
        return Err(NimoError::bad_argument("application entry must be an array"));
    };
    if fields.len() != 5 {
        return Err(NimoError::bad_argument(format!(
            "application entry must have 5 fields, found {}",
            fields.len()
        )));
    }
    Ok(ApplicationRow {
        launcher_node: launcher_node.clone(),
        short_name: arg_string(&fields, 0, "shortName")?,
        description: arg_string(&fields, 1, "description")?,
        executable_path: arg_string(&fields, 2, "executablePath")?,
        argument_template: arg_string_array(&fields, 3, "argumentTemplate")?,
        option_template: arg_string_array(&fields, 4, "optionTemplate")?,
    })
}

fn found_payload(value: Option<Value>) -> Value {
    // The "per-row found/not-found discriminator" (§4.G): a two-element
    // array `[found, row-or-invalid]` rather than an error, since a
    // missing row from a lookup is not itself a handler failure.
    match value {
        Some(v) => Value::Array(vec![Value::Logical(true), v]),
        None => Value::Array(vec![Value::Logical(false), Value::Logical(false)]),
    }
}

fn machine_row_to_value(row: &MachineRow) -> Value {
    let mut map = Map::new();
    let _ = map.insert(Key::String("name".into()), Value::String(row.name.as_str().to_owned()));
    let _ = map.insert(Key::String("address".into()), Value::Address(row.address));
    Value::Map(map)
}

fn node_row_to_value(row: &NodeRow) -> Value {
    let mut map = Map::new();
    let _ = map.insert(Key::String("name".into()), Value::String(row.name.as_str().to_owned()));
    let _ = map.insert(
        Key::String("machine".into()),
        Value::String(row.machine.as_str().to_owned()),
    );
    let _ = map.insert(Key::String("kind".into()), Value::String(row.kind.as_str().into()));
    let _ = map.insert(
        Key::String("address".into()),
        Value::Address(row.command_endpoint.address),
    );
    let _ = map.insert(
        Key::String("port".into()),
        Value::Integer(row.command_endpoint.port as i64),
    );
    Value::Map(map)
}

fn channel_row_to_value(row: &ChannelRow) -> Value {
    let mut map = Map::new();
    let _ = map.insert(Key::String("node".into()), Value::String(row.key.node.as_str().to_owned()));
    let _ = map.insert(Key::String("path".into()), Value::String(row.key.path.as_str().to_owned()));
    let _ = map.insert(Key::String("isOutput".into()), Value::Logical(row.is_output));
    let _ = map.insert(Key::String("dataType".into()), Value::String(row.data_type.clone()));
    let _ = map.insert(
        Key::String("transport".into()),
        Value::String(row.transport_pref.as_str().into()),
    );
    let _ = map.insert(Key::String("inUse".into()), Value::Logical(row.in_use));
    let _ = map.insert(Key::String("modifiable".into()), Value::Logical(row.modifiable));
    Value::Map(map)
}

fn connection_row_to_value(row: &ConnectionRow) -> Value {
    let mut map = Map::new();
    let _ = map.insert(
        Key::String("fromNode".into()),
        Value::String(row.from.node.as_str().to_owned()),
    );
    let _ = map.insert(
        Key::String("fromPath".into()),
        Value::String(row.from.path.as_str().to_owned()),
    );
    let _ = map.insert(Key::String("toNode".into()), Value::String(row.to.node.as_str().to_owned()));
    let _ = map.insert(Key::String("toPath".into()), Value::String(row.to.path.as_str().to_owned()));
    let _ = map.insert(
        Key::String("transport".into()),
        Value::String(row.transport.as_str().into()),
    );
    Value::Map(map)
}

fn application_row_to_value(row: &ApplicationRow) -> Value {
    let mut map = Map::new();
    let _ = map.insert(
        Key::String("launcherNode".into()),
        Value::String(row.launcher_node.as_str().to_owned()),
    );
    let _ = map.insert(Key::String("shortName".into()), Value::String(row.short_name.clone()));
    let _ = map.insert(
        Key::String("description".into()),
        Value::String(row.description.clone()),
    );
    let _ = map.insert(
        Key::String("executablePath".into()),
        Value::String(row.executable_path.clone()),
    );
    Value::Map(map)
}

fn statistics_to_value(stats: ChannelStatistics) -> Value {
    let mut map = Map::new();
    let _ = map.insert(Key::String("bytes".into()), Value::Integer(stats.bytes as i64));
    let _ = map.insert(Key::String("messages".into()), Value::Integer(stats.messages as i64));
    Value::Map(map)
}

fn name_array<I: IntoIterator<Item = S>, S: std::fmt::Display>(names: I) -> Value {
    Value::Array(names.into_iter().map(|n| Value::String(n.to_string())).collect())
}

/// Build the frozen handler table for a Registry process (§4.C, §4.G).
/// `shutdown` is the same flag observed by the command engine's accept
/// loops; `stop.` just sets it and lets the engine's own loops notice.
pub fn build_handlers(registry: Arc<Registry>, shutdown: ShutdownFlag) -> HandlerTable {
    let mut builder = HandlerTableBuilder::new();

    builder = builder.on("stop.", move |_args| {
        shutdown.request_stop();
        Ok(None)
    });

    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("addMachine.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let name = arg_string(&args, 0, "name")?.into();
                let address = arg_address(&args, 1, "address")?;
                registry.add_machine(name, address).await?;
                Ok(None)
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getMachineInformation?", move |args| {
            let name = arg_string(&args, 0, "name")?.into();
            let row = registry.get_machine_information(&name);
            Ok(Some(found_payload(row.as_ref().map(machine_row_to_value))))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("isMachinePresent?", move |args| {
            let name = arg_string(&args, 0, "name")?.into();
            Ok(Some(Value::Logical(registry.is_machine_present(&name))))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNamesOfMachines?", move |_args| {
            Ok(Some(name_array(registry.get_names_of_machines())))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNumberOfMachines?", move |_args| {
            Ok(Some(Value::Integer(registry.get_number_of_machines() as i64)))
        });
    }

    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("addNode.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let name = arg_string(&args, 0, "name")?.into();
                let machine = arg_string(&args, 1, "machine")?.into();
                let kind = arg_service_kind(&args, 2, "serviceKind")?;
                let address = arg_address(&args, 3, "address")?;
                let port = arg_integer(&args, 4, "port")? as u16;
                registry
                    .add_node(name, machine, kind, nimo_types::Endpoint::new(address, port), None)
                    .await?;
                Ok(None)
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("removeNode.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let name = arg_string(&args, 0, "name")?.into();
                registry.remove_node(&name).await?;
                Ok(None)
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("touchNode.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let name = arg_string(&args, 0, "name")?.into();
                registry.touch_node(&name).await?;
                Ok(None)
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNodeInformation?", move |args| {
            let name = arg_string(&args, 0, "name")?.into();
            let row = registry.get_node_information(&name);
            Ok(Some(found_payload(row.as_ref().map(node_row_to_value))))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("isNodePresent?", move |args| {
            let name = arg_string(&args, 0, "name")?.into();
            Ok(Some(Value::Logical(registry.is_node_present(&name))))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNamesOfNodes?", move |_args| {
            Ok(Some(name_array(registry.get_names_of_nodes())))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getInformationForAllNodes?", move |_args| {
            let rows = registry.get_information_for_all_nodes();
            Ok(Some(Value::Array(rows.iter().map(node_row_to_value).collect())))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNumberOfNodes?", move |_args| {
            Ok(Some(Value::Integer(registry.get_number_of_nodes() as i64)))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNumberOfNodesOnMachine?", move |args| {
            let machine = arg_string(&args, 0, "machine")?.into();
            Ok(Some(Value::Integer(
                registry.get_number_of_nodes_on_machine(&machine) as i64,
            )))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNamesOfNodesOnMachine?", move |args| {
            let machine = arg_string(&args, 0, "machine")?.into();
            Ok(Some(name_array(registry.get_names_of_nodes_on_machine(&machine))))
        });
    }

    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("addChannel.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let node = arg_string(&args, 0, "node")?.into();
                let path = arg_channel_path(&args, 1, "path")?;
                let is_output = arg_bool(&args, 2, "isOutput")?;
                let data_type = arg_string(&args, 3, "dataType")?;
                let transport = arg_transport_pref(&args, 4, "transport")?;
                registry.add_channel(node, path, is_output, data_type, transport).await?;
                Ok(None)
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("removeChannel.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let node = arg_string(&args, 0, "node")?.into();
                let path = arg_channel_path(&args, 1, "path")?;
                registry.remove_channel(&ChannelKey::new(node, path)).await?;
                Ok(None)
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("removeChannelsForNode.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let node = arg_string(&args, 0, "node")?.into();
                let count = registry.remove_channels_for_node(&node).await?;
                Ok(Some(Value::Integer(count as i64)))
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("isChannelPresent?", move |args| {
            let node = arg_string(&args, 0, "node")?.into();
            let path = arg_channel_path(&args, 1, "path")?;
            Ok(Some(Value::Logical(
                registry.is_channel_present(&ChannelKey::new(node, path)),
            )))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getChannelInformation?", move |args| {
            let node = arg_string(&args, 0, "node")?.into();
            let path = arg_channel_path(&args, 1, "path")?;
            let row = registry.get_channel_information(&ChannelKey::new(node, path));
            Ok(Some(found_payload(row.as_ref().map(channel_row_to_value))))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getInformationForAllChannelsOnNode?", move |args| {
            let node = arg_string(&args, 0, "node")?.into();
            let rows = registry.get_information_for_all_channels_on_node(&node);
            Ok(Some(Value::Array(
                rows.iter().map(channel_row_to_value).collect(),
            )))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNumberOfInputChannelsOnNode?", move |args| {
            let node = arg_string(&args, 0, "node")?.into();
            Ok(Some(Value::Integer(
                registry.get_number_of_input_channels_on_node(&node) as i64,
            )))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNumberOfOutputChannelsOnNode?", move |args| {
            let node = arg_string(&args, 0, "node")?.into();
            Ok(Some(Value::Integer(
                registry.get_number_of_output_channels_on_node(&node) as i64,
            )))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("setChannelInUse.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let node = arg_string(&args, 0, "node")?.into();
                let path = arg_channel_path(&args, 1, "path")?;
                let in_use = arg_bool(&args, 2, "inUse")?;
                registry
                    .set_channel_in_use(&ChannelKey::new(node, path), in_use)
                    .await?;
                Ok(None)
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("getChannelInUseAndSet.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let node = arg_string(&args, 0, "node")?.into();
                let path = arg_channel_path(&args, 1, "path")?;
                let previous = registry
                    .get_channel_in_use_and_set(&ChannelKey::new(node, path))
                    .await?;
                Ok(Some(Value::Logical(previous)))
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("clearChannelInUse.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let node = arg_string(&args, 0, "node")?.into();
                let path = arg_channel_path(&args, 1, "path")?;
                registry.clear_channel_in_use(&ChannelKey::new(node, path)).await?;
                Ok(None)
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getChannelStatistics?", move |args| {
            let node = arg_string(&args, 0, "node")?.into();
            let path = arg_channel_path(&args, 1, "path")?;
            let stats = registry.get_channel_statistics(&ChannelKey::new(node, path));
            Ok(Some(found_payload(stats.map(statistics_to_value))))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("updateChannelStatistics.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let node = arg_string(&args, 0, "node")?.into();
                let path = arg_channel_path(&args, 1, "path")?;
                let bytes_delta = arg_integer(&args, 2, "bytesDelta")? as u64;
                registry
                    .update_channel_statistics(&ChannelKey::new(node, path), bytes_delta)
                    .await?;
                Ok(None)
            }
        });
    }

    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("addConnection.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let from_node = arg_string(&args, 0, "fromNode")?.into();
                let from_path = arg_channel_path(&args, 1, "fromPath")?;
                let to_node = arg_string(&args, 2, "toNode")?.into();
                let to_path = arg_channel_path(&args, 3, "toPath")?;
                let transport = registry
                    .add_connection(
                        ChannelKey::new(from_node, from_path),
                        ChannelKey::new(to_node, to_path),
                    )
                    .await?;
                Ok(Some(Value::String(transport.as_str().into())))
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("removeConnection.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let node = arg_string(&args, 0, "node")?.into();
                let path = arg_channel_path(&args, 1, "path")?;
                registry
                    .remove_connection_by_endpoint(&ChannelKey::new(node, path))
                    .await?;
                Ok(None)
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getInformationForAllConnections?", move |_args| {
            let rows = registry.get_information_for_all_connections();
            Ok(Some(Value::Array(
                rows.iter().map(connection_row_to_value).collect(),
            )))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getInformationForAllConnectionsOnNode?", move |args| {
            let node = arg_string(&args, 0, "node")?.into();
            let rows = registry.get_information_for_all_connections_on_node(&node);
            Ok(Some(Value::Array(
                rows.iter().map(connection_row_to_value).collect(),
            )))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNumberOfConnections?", move |_args| {
            Ok(Some(Value::Integer(registry.get_number_of_connections() as i64)))
        });
    }

    {
        let registry = Arc::clone(&registry);
        builder = builder.on_async("setApplicationsForNode.", move |args| {
            let registry = Arc::clone(&registry);
            async move {
                let node: nimo_types::NodeName = arg_string(&args, 0, "launcherNode")?.into();
                let Value::Array(entries) = arg(&args, 1, "apps")? else {
                    return Err(NimoError::bad_argument("apps must be an array"));
                };
                let rows = entries
                    .into_iter()
                    .map(|entry| arg_application_row(entry, &node))
                    .collect::<Result<Vec<_>, _>>()?;
                registry.set_applications_for_node(node, rows).await?;
                Ok(None)
            }
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNumberOfApplications?", move |_args| {
            Ok(Some(Value::Integer(registry.get_number_of_applications() as i64)))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getNamesOfApplicationsOnNode?", move |args| {
            let node = arg_string(&args, 0, "node")?.into();
            Ok(Some(name_array(registry.get_names_of_applications_on_node(&node))))
        });
    }
    {
        let registry = Arc::clone(&registry);
        builder = builder.on("getInformationForAllApplicationsOnNode?", move |args| {
            let node = arg_string(&args, 0, "node")?.into();
            let rows = registry.get_information_for_all_applications_on_node(&node);
            Ok(Some(Value::Array(
                rows.iter().map(application_row_to_value).collect(),
            )))
        });
    }

    builder.build()
}
