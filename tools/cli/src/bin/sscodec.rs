use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use script_state_codec::{
    DecodeLimits, EngineKind, ScriptState, StateCodec, TypeRegistry, TypedValue,
};
use serde::Serialize;

#[derive(Parser)]
#[command(author, version, about = "Script state checkpoint tool")]
struct Cli {
    /// TOML file with decode limits.
    #[arg(long, global = true)]
    limits: Option<PathBuf>,
    /// Opaque type names to accept without checking their payload.
    #[arg(long = "allow-type", global = true)]
    allow_types: Vec<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a summary of a checkpoint document.
    Inspect {
        document: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Re-encode a checkpoint with another engine.
    Convert {
        document: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Target engine; defaults to the one the input was not written with.
        #[arg(long, value_enum)]
        to: Option<EngineArg>,
    },
    /// Decode, re-encode and decode again, failing if anything changed.
    Verify { document: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    Xml,
    Tlv,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Xml => EngineKind::Xml,
            EngineArg::Tlv => EngineKind::Tlv,
        }
    }
}

#[derive(Serialize)]
struct InspectReport<'a> {
    engine: &'static str,
    state: &'a ScriptState,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let codec = build_codec(cli.limits.as_deref(), &cli.allow_types)?;
    match cli.command {
        Command::Inspect { document, json } => inspect(&codec, &document, json),
        Command::Convert {
            document,
            output,
            to,
        } => convert(&codec, &document, &output, to.map(EngineKind::from)),
        Command::Verify { document } => verify(&codec, &document),
    }
}

fn build_codec(limits: Option<&Path>, allow_types: &[String]) -> Result<StateCodec> {
    let mut registry = TypeRegistry::builder();
    for name in allow_types {
        registry = registry.register_raw(name.clone(), |_| Ok(()));
    }
    let mut codec = StateCodec::new(Arc::new(registry.build()));
    if let Some(path) = limits {
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        codec = codec.with_limits(DecodeLimits::from_toml_str(&raw)?);
    }
    Ok(codec)
}

fn load(codec: &StateCodec, path: &Path) -> Result<(EngineKind, ScriptState)> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let loaded = codec
        .decode_tagged(&text)
        .with_context(|| format!("decode {}", path.display()))?;
    tracing::info!(engine = %loaded.0, path = %path.display(), "loaded checkpoint");
    Ok(loaded)
}

fn inspect(codec: &StateCodec, path: &Path, json: bool) -> Result<()> {
    let (engine, state) = load(codec, path)?;
    if json {
        let report = InspectReport {
            engine: engine.id(),
            state: &state,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("engine:          {engine}");
    println!("item:            {}", state.item_id);
    println!("asset:           {}", state.asset_id);
    println!("state:           {}", state.current_state);
    println!("running:         {}", state.is_running);
    println!("start parameter: {}", state.start_parameter);
    println!("min event delay: {}", state.min_event_delay);
    match &state.perms_granter {
        Some(grant) => println!("permissions:     {:#x} from {}", grant.mask, grant.granter),
        None => println!("permissions:     none"),
    }
    println!("variables:       {}", state.variables.len());
    for (name, value) in &state.variables {
        println!("  {name}: {}", describe(value));
    }
    println!("queued events:   {}", state.event_queue.len());
    for record in &state.event_queue {
        println!(
            "  {} ({} params, {} detected)",
            record.name,
            record.params.len(),
            record.detected.len()
        );
    }
    println!("plugin values:   {}", state.plugin_data.len());
    Ok(())
}

fn describe(value: &TypedValue) -> String {
    match value {
        TypedValue::Integer32(v) => format!("integer32 {v}"),
        TypedValue::Integer64(v) => format!("integer64 {v}"),
        TypedValue::Real64(v) => format!("real64 {v}"),
        TypedValue::Text(v) => format!("text {v:?}"),
        TypedValue::EntityKey(v) => format!("key {v}"),
        TypedValue::Vector3(v) => format!("vector {}", v.to_legacy_string()),
        TypedValue::Quaternion(v) => format!("rotation {}", v.to_legacy_string()),
        TypedValue::List(items) => format!("list of {}", items.len()),
        TypedValue::OpaqueBlob { type_name, bytes } => {
            format!("{type_name} ({} bytes)", bytes.len())
        }
    }
}

fn convert(
    codec: &StateCodec,
    input: &Path,
    output: &Path,
    target: Option<EngineKind>,
) -> Result<()> {
    let (engine, state) = load(codec, input)?;
    let target = target.unwrap_or_else(|| engine.other());
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(output).with_context(|| format!("create {}", output.display()))?;
    codec
        .serialize(BufWriter::new(file), &state, target)
        .with_context(|| format!("write {}", output.display()))?;
    println!("{engine} -> {target}: {}", output.display());
    Ok(())
}

fn verify(codec: &StateCodec, path: &Path) -> Result<()> {
    let (engine, first) = load(codec, path)?;
    let document = codec.to_document(&first, engine)?;
    let second = codec
        .from_document(&document)
        .with_context(|| format!("decode re-encoded {engine} document"))?;
    if second != first {
        bail!("{engine} round trip changed the state of {}", path.display());
    }
    println!("ok: {} ({engine})", path.display());
    Ok(())
}
