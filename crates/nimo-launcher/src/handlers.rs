//! Wires [`Launcher`] operations into a [`nimo_proto::HandlerTable`]
//! (§4.I). Same request-key convention as the Registry's own handlers:
//! `?` for queries, `.` for commands.

use std::sync::Arc;

use nimo_proto::{HandlerTable, HandlerTableBuilder, ShutdownFlag};
use nimo_types::NimoError;
use nimo_value::{Key, Map, Value};

use crate::{AppDescriptor, Launcher};

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

fn found_payload(value: Option<Value>) -> Value {
    match value {
        Some(v) => Value::Array(vec![Value::Logical(true), v]),
        None => Value::Array(vec![Value::Logical(false), Value::Logical(false)]),
    }
}

fn descriptor_to_value(app: &AppDescriptor) -> Value {
    let mut map = Map::new();
    let _ = map.insert(Key::String("shortName".into()), Value::String(app.short_name.clone()));
    let _ = map.insert(
        Key::String("description".into()),
        Value::String(app.description.clone()),
    );
    let _ = map.insert(
        Key::String("executablePath".into()),
        Value::String(app.executable_path.clone()),
    );
    Value::Map(map)
}

fn name_array<I: IntoIterator<Item = S>, S: std::fmt::Display>(names: I) -> Value {
    Value::Array(names.into_iter().map(|n| Value::String(n.to_string())).collect())
}

/// Parses one `[shortName, description, executablePath, argumentDescriptors,
/// optionDescriptors]` array, the shape `reloadAppList.` takes per entry —
/// the same wire shape the Registry's `setApplicationsForNode.` expects,
/// since both describe one catalogue row (§4.I).
fn arg_descriptor(value: Value) -> Result<AppDescriptor, NimoError> {
    let Value::Array(fields) = value else {
        return Err(NimoError::bad_argument("application entry must be an array"));
    };
    if fields.len() != 5 {
        return Err(NimoError::bad_argument(format!(
            "application entry must have 5 fields, found {}",
            fields.len()
        )));
    }
    Ok(AppDescriptor {
        short_name: arg_string(&fields, 0, "shortName")?,
        description: arg_string(&fields, 1, "description")?,
        executable_path: arg_string(&fields, 2, "executablePath")?,
        argument_descriptors: arg_string_array(&fields, 3, "argumentDescriptors")?,
        option_descriptors: arg_string_array(&fields, 4, "optionDescriptors")?,
    })
}

/// Build the frozen handler table for a Launcher process (§4.I).
/// `shutdown` is the same flag observed by the command engine's accept
/// loops; `stop.` just sets it.
pub fn build_handlers(launcher: Arc<Launcher>, shutdown: ShutdownFlag) -> HandlerTable {
    let mut builder = HandlerTableBuilder::new();

    builder = builder.on("stop.", move |_args| {
        shutdown.request_stop();
        Ok(None)
    });

    {
        let launcher = Arc::clone(&launcher);
        builder = builder.on("getNumberOfApplications?", move |_args| {
            Ok(Some(Value::Integer(launcher.get_number_of_applications() as i64)))
        });
    }
    {
        let launcher = Arc::clone(&launcher);
        builder = builder.on("getNamesOfApplications?", move |_args| {
            Ok(Some(name_array(launcher.get_names_of_applications())))
        });
    }
    {
        let launcher = Arc::clone(&launcher);
        builder = builder.on("getApplicationInfo?", move |args| {
            let short_name = arg_string(&args, 0, "shortName")?;
            let descriptor = launcher.get_application_info(&short_name);
            Ok(Some(found_payload(descriptor.as_ref().map(descriptor_to_value))))
        });
    }
    {
        let launcher = Arc::clone(&launcher);
        builder = builder.on("getRunOptionsForApp?", move |args| {
            let short_name = arg_string(&args, 0, "shortName")?;
            Ok(Some(name_array(launcher.get_run_options_for_app(&short_name)?)))
        });
    }
    {
        let launcher = Arc::clone(&launcher);
        builder = builder.on("getRunParamsForApp?", move |args| {
            let short_name = arg_string(&args, 0, "shortName")?;
            Ok(Some(name_array(launcher.get_run_params_for_app(&short_name)?)))
        });
    }
    {
        let launcher = Arc::clone(&launcher);
        builder = builder.on_async("startApp.", move |args| {
            let launcher = Arc::clone(&launcher);
            async move {
                let short_name = arg_string(&args, 0, "shortName")?;
                let run_args = arg_string_array(&args, 1, "args")?;
                let options = arg_string_array(&args, 2, "options")?;
                let pid = launcher.start_app(&short_name, run_args, options).await?;
                Ok(Some(Value::Integer(pid as i64)))
            }
        });
    }
    {
        let launcher = Arc::clone(&launcher);
        builder = builder.on("reloadAppList.", move |args| {
            let Value::Array(entries) = arg(&args, 0, "apps")? else {
                return Err(NimoError::bad_argument("apps must be an array"));
            };
            let apps = entries
                .into_iter()
                .map(arg_descriptor)
                .collect::<Result<Vec<_>, _>>()?;
            launcher.reload_app_list(apps);
            Ok(None)
        });
    }

    builder.build()
}
