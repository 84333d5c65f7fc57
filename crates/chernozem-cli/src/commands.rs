use std::fs;
use std::path::Path;

use anyhow::Context;
use chernozem::{
    Container, ContainerError, ContainerResult, FactoryRegistry, KeyInput, Lifetime, OrderedMap,
    Snapshot, Value,
};
use colored::Colorize;
use serde::Deserialize;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Get(args) => cmd_get(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let container = load(&args.file)?;
    print!("{}", render_inspect(&container));
    Ok(())
}

fn cmd_get(args: GetArgs) -> anyhow::Result<()> {
    let container = load(&args.file)?;
    let value = container
        .get(parse_key(&args.key))
        .with_context(|| format!("resolving '{}'", args.key))?;
    println!("{}", serde_json::to_string_pretty(&value.to_json()?)?);
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let container = load(&args.file)?;
    let json = export(&container)?;
    if args.compact {
        println!("{}", serde_json::to_string(&json)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}

/// Factories every snapshot loaded by `chz` may refer to.
pub fn builtin_registry() -> ContainerResult<FactoryRegistry> {
    let mut registry = FactoryRegistry::new();
    registry.register("literal", |_, args| Value::from_json(args.clone()))?;
    registry.register("env", |_, args| {
        let args: EnvArgs = serde_json::from_value(args.clone())?;
        match std::env::var(&args.name) {
            Ok(value) => Ok(Value::String(value)),
            Err(_) => match args.default {
                Some(default) => Value::from_json(default),
                None => Err(ContainerError::KeyNotFound {
                    key: format!("${}", args.name),
                }),
            },
        }
    })?;
    Ok(registry)
}

#[derive(Deserialize)]
struct EnvArgs {
    name: String,
    #[serde(default)]
    default: Option<serde_json::Value>,
}

fn load(path: &Path) -> anyhow::Result<Container> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let snapshot = Snapshot::from_json(&json)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    let container = Container::restore(&snapshot, &builtin_registry()?)?;
    debug!(path = %path.display(), keys = container.count(), "loaded snapshot");
    Ok(container)
}

/// Integer-looking keys address integer keys.
fn parse_key(raw: &str) -> KeyInput<'_> {
    match raw.parse::<i64>() {
        Ok(i) => KeyInput::Int(i),
        Err(_) => KeyInput::Str(raw),
    }
}

fn render_inspect(container: &Container) -> String {
    let mut out = String::new();
    for (key, value) in container {
        let mut flags = Vec::new();
        if container.is_locked(key) {
            flags.push("locked".red().to_string());
        }
        match container.service_lifetime(key) {
            Some(Lifetime::Shared) => flags.push("service".cyan().to_string()),
            Some(Lifetime::Factory) => flags.push("factory".cyan().to_string()),
            None => {}
        }
        if let Some(hints) = container.type_constraint(key) {
            let hints: Vec<String> = hints.iter().map(ToString::to_string).collect();
            flags.push(format!("hint: {}", hints.join("|")).yellow().to_string());
        }
        out.push_str(&format!("{} {}", key.to_string().bold(), value.kind().to_string().dimmed()));
        if !flags.is_empty() {
            out.push_str(&format!(" [{}]", flags.join(", ")));
        }
        out.push('\n');
    }
    out.push_str(&format!("{} keys\n", container.count()));
    out
}

/// Resolve every key, services included, into one JSON object.
fn export(container: &Container) -> anyhow::Result<serde_json::Value> {
    let mut resolved = OrderedMap::new();
    for key in container.keys() {
        let value = container
            .get(key)
            .with_context(|| format!("resolving '{key}'"))?;
        resolved.insert(key.clone(), value);
    }
    Ok(Value::Map(resolved).to_json()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_snapshot(json: serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.to_string().as_bytes()).unwrap();
        file
    }

    fn sample() -> serde_json::Value {
        json!({
            "entries": [
                {"key": "host", "value": {"string": "localhost"}, "locked": true, "hints": ["string"]},
                {"key": 0, "value": {"int": 8080}},
                {"key": "tags", "value": {"factory": {"name": "literal", "args": ["a", "b"]}}, "lifetime": "shared"},
                {"key": "home", "value": {"factory": {"name": "env", "args": {"name": "CHZ_TEST_UNSET_VAR", "default": "/tmp"}}}, "lifetime": "factory"}
            ]
        })
    }

    #[test]
    fn load_restores_snapshot_file() {
        let file = write_snapshot(sample());
        let container = load(file.path()).unwrap();
        assert_eq!(container.count(), 4);
        assert!(container.is_locked("host"));
        assert_eq!(container.get(parse_key("0")).unwrap(), Value::from(8080));
        assert_eq!(
            container.get("tags").unwrap(),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(container.get("home").unwrap(), Value::from("/tmp"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("reading snapshot"));
    }

    #[test]
    fn load_rejects_unknown_factory() {
        let file = write_snapshot(json!({
            "entries": [{"key": "x", "value": {"factory": {"name": "nope"}}}]
        }));
        assert!(load(file.path()).is_err());
    }

    #[test]
    fn parse_key_prefers_integers() {
        assert!(matches!(parse_key("42"), KeyInput::Int(42)));
        assert!(matches!(parse_key("-1"), KeyInput::Int(-1)));
        assert!(matches!(parse_key("name"), KeyInput::Str("name")));
    }

    #[test]
    fn literal_factory_keeps_field_order() {
        let registry = builtin_registry().unwrap();
        let callable = registry
            .callable("literal", serde_json::from_str(r#"{"zeta": 1, "alpha": 2}"#).unwrap())
            .unwrap();
        let value = callable.call(&Container::new()).unwrap();
        let keys: Vec<String> = value.as_map().unwrap().keys().map(ToString::to_string).collect();
        assert_eq!(keys, ["zeta", "alpha"]);
    }

    #[test]
    fn env_factory_requires_value_or_default() {
        let registry = builtin_registry().unwrap();
        let container = Container::new();
        let missing = registry
            .callable("env", json!({"name": "CHZ_TEST_UNSET_VAR"}))
            .unwrap();
        assert!(matches!(
            missing.call(&container),
            Err(ContainerError::KeyNotFound { .. })
        ));
        let malformed = registry.callable("env", json!(3)).unwrap();
        assert!(malformed.call(&container).is_err());
    }

    #[test]
    fn inspect_lists_keys_and_flags() {
        let file = write_snapshot(sample());
        let out = render_inspect(&load(file.path()).unwrap());
        assert!(out.contains("host"));
        assert!(out.contains("locked"));
        assert!(out.contains("hint: string"));
        assert!(out.contains("service"));
        assert!(out.contains("factory"));
        assert!(out.contains("4 keys"));
    }

    #[test]
    fn export_resolves_services() {
        let file = write_snapshot(sample());
        let json = export(&load(file.path()).unwrap()).unwrap();
        assert_eq!(
            serde_json::to_string(&json).unwrap(),
            r#"{"host":"localhost","0":8080,"tags":["a","b"],"home":"/tmp"}"#
        );
    }
}
