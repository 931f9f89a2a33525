use clap::{Parser, Subcommand, ValueEnum};
use docmodel::{parse_definitions, Database, MemoryDriver};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;

/// docmodel CLI: inspect model definitions and materialize records from JSON
#[derive(Parser)]
#[command(name = "docmodel", version, about)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "json", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Print the field descriptors of every model, or of one
    Inspect {
        /// Path to the model definitions YAML file
        definitions: PathBuf,
        /// Only show this model
        #[arg(long)]
        model: Option<String>,
    },

    /// Create a record (JSON object) or a collection (JSON array)
    Create {
        /// Path to the model definitions YAML file
        definitions: PathBuf,
        /// Model name
        model: String,
        /// Attributes as JSON
        json: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Inspect { definitions, model } => {
            let db = load(&definitions)?;
            let output = match model {
                Some(name) => db.factory(&name)?.schema().to_json(),
                None => {
                    let mut map = serde_json::Map::new();
                    for (name, factory) in db.models() {
                        map.insert(name.clone(), factory.schema().to_json());
                    }
                    Value::Object(map)
                }
            };
            print_output(&output, &cli.format)?;
        }

        Command::Create {
            definitions,
            model,
            json,
        } => {
            let db = load(&definitions)?;
            let factory = db.factory(&model)?;
            factory.on_create(|record| log::info!("Created {} record", record.model_name()));
            let input: Value = serde_json::from_str(&json)?;
            let created = factory.create_from(input)?;
            print_output(&created.to_json(), &cli.format)?;
        }
    }

    Ok(())
}

fn load(path: &Path) -> docmodel::Result<Database<MemoryDriver>> {
    let definitions = parse_definitions(path)?;
    let mut db = Database::new(MemoryDriver::new());
    db.on_event(|event| log::debug!("{event:?}"));
    db.connect()?;
    definitions.register(&mut db)?;
    log::debug!("Loaded {} models from {}", db.models().len(), path.display());
    Ok(db)
}

fn print_output(value: &Value, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
