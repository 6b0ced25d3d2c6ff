//! Command-line interface for gmlschema

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::sync::Arc;
#[cfg(feature = "cli")]
use std::time::Duration;

#[cfg(feature = "cli")]
use gmlschema::{Decoder, DecodeHints, FeatureReader, QName, SchemaRegistry, StreamConfig};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "gmlschema")]
#[command(author, version, about = "GML feature decoding tool", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a GML document and print its features as JSON
    Decode {
        /// Path to the application schema
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Path to the GML document
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Stream root-level features one per line
        #[arg(long)]
        stream: bool,

        /// Local name of the element to stream
        #[arg(short, long)]
        element: Option<String>,

        /// Ring buffer capacity
        #[arg(long, default_value_t = gmlschema::config::DEFAULT_CAPACITY)]
        capacity: usize,

        /// Liveness timeout in milliseconds
        #[arg(long, default_value_t = gmlschema::config::DEFAULT_TIMEOUT_MS)]
        timeout_ms: u64,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the inferred entity schema of an element
    Inspect {
        /// Path to the application schema
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Element local name; lists the feature elements when omitted
        #[arg(short, long)]
        element: Option<String>,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Decode {
            schema,
            file,
            stream,
            element,
            capacity,
            timeout_ms,
            pretty,
        } => cmd_decode(schema, file, stream, element, capacity, timeout_ms, pretty),
        Commands::Inspect { schema, element } => cmd_inspect(schema, element),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn print_json(value: &serde_json::Value, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_decode(
    schema_path: PathBuf,
    file: PathBuf,
    stream: bool,
    element: Option<String>,
    capacity: usize,
    timeout_ms: u64,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(SchemaRegistry::from_xsd_file(&schema_path)?);
    let mut hints = DecodeHints::new();
    if let Some(name) = element {
        hints = hints.with_stream_element(QName::local(name));
    }
    let decoder = Decoder::new(registry).with_hints(hints);

    if !stream {
        let value = decoder.decode_file(&file)?;
        return print_json(&value.to_json(), pretty);
    }

    let config = StreamConfig::new()
        .with_capacity(capacity)
        .with_timeout(Duration::from_millis(timeout_ms));
    let reader = FeatureReader::open(decoder, &file, &config)?;
    let mut count = 0usize;
    for entity in reader {
        print_json(&entity?.to_json(), pretty)?;
        count += 1;
    }
    log::info!("Decoded {} features from {}", count, file.display());
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_inspect(schema_path: PathBuf, element: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let registry = SchemaRegistry::from_xsd_file(&schema_path)?;

    let Some(name) = element else {
        let feature = QName::gml("AbstractFeatureType");
        println!("Feature elements in {}:", schema_path.display());
        for decl in registry.elements() {
            let is_feature = registry
                .type_of(decl)
                .map_or(false, |ty| registry.derives_from(&ty, &feature));
            let in_target = decl
                .name
                .namespace()
                .map_or(true, |ns| registry.target_namespaces().iter().any(|t| t == ns));
            if is_feature && in_target && !decl.is_abstract {
                println!("  {}", decl.name);
            }
        }
        return Ok(());
    };

    let decl = registry
        .element_by_name(&name)
        .ok_or_else(|| format!("Element '{}' not found", name))?;
    print_json(&registry.entity_schema(decl).to_json(), true)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
