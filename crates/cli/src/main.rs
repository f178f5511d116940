mod settings;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

use facematch_core::extraction::infrastructure::detecting_embedding_extractor::DetectingEmbeddingExtractor;
use facematch_core::matching::domain::threshold::Threshold;
use facematch_core::pipeline::face_image_use_case::FaceImageUseCase;
use facematch_core::pipeline::face_lifecycle_manager::FaceLifecycleManager;
use facematch_core::pipeline::face_validation::{
    validate_confidence, validate_description, validate_limit, validate_person_name,
};
use facematch_core::shared::constants::DEFAULT_LIST_LIMIT;
use facematch_core::shared::error::FaceMatchError;
use facematch_core::storage::domain::face_store::FaceStore;
use facematch_core::storage::infrastructure::qdrant_face_store::QdrantConfig;
use facematch_core::storage::infrastructure::store_factory::{
    create_store, StoreBackend, StoreOptions,
};

use settings::Settings;

/// Register and verify faces against a store of face embeddings.
#[derive(Parser)]
#[command(name = "facematch")]
struct Cli {
    /// Settings file (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Face store backend: memory, json or qdrant.
    #[arg(long, global = true)]
    store: Option<StoreBackend>,

    /// JSON store file.
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    /// Qdrant server URL.
    #[arg(long, global = true)]
    qdrant_url: Option<String>,

    /// Qdrant collection name.
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Embedding dimension the store is configured for.
    #[arg(long, global = true)]
    dimension: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a face under a person's name.
    Register {
        #[command(flatten)]
        source: FaceSource,

        /// Name of the person.
        #[arg(long)]
        name: String,

        /// Optional free-text description.
        #[arg(long)]
        description: Option<String>,
    },
    /// Check whether a face matches a registered one.
    Verify {
        #[command(flatten)]
        source: FaceSource,

        /// Similarity threshold (0.0-1.0).
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// List registered faces.
    List {
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },
    /// Show one registered face, including its embedding.
    Show { face_id: String },
    /// Delete one registered face.
    Delete { face_id: String },
    /// Delete every registered face.
    Clear {
        /// Confirm the irreversible deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Print face store statistics.
    Stats,
    /// Report whether the face store is reachable.
    Health,
}

/// Either an image to run through the face models or a precomputed embedding.
#[derive(Args)]
struct FaceSource {
    /// Image file containing a face.
    #[arg(required_unless_present = "embedding", conflicts_with = "embedding")]
    image: Option<PathBuf>,

    /// JSON file holding a precomputed embedding (array of numbers).
    #[arg(long)]
    embedding: Option<PathBuf>,

    /// Detection confidence reported for a precomputed embedding.
    #[arg(long, requires = "embedding", default_value_t = 1.0)]
    confidence: f64,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Face(#[from] FaceMatchError),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) | CliError::NotFound(_) => 2,
            CliError::Face(e) if e.is_client_fault() => 2,
            CliError::Face(_) => 1,
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        process::exit(code);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    execute(Cli::parse())
}

fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = resolve_settings(&cli)?;
    check_inputs(&cli.command, &settings)?;

    match cli.command {
        Command::Register {
            source,
            name,
            description,
        } => {
            let embedding = source.embedding.as_deref().map(read_embedding).transpose()?;
            let store = open_store(&settings)?;
            let registered = match embedding {
                Some(embedding) => manager(&settings, store)?.register(
                    &embedding,
                    source.confidence,
                    &name,
                    description.as_deref(),
                ),
                None => {
                    let image = read_image(source.image.as_deref())?;
                    image_use_case(&settings, store)?.register_image(
                        &image,
                        &name,
                        description.as_deref(),
                    )
                }
            }
            .map_err(CliError::from)?;
            print_json(&registered)
        }
        Command::Verify { source, threshold } => {
            let threshold = threshold.unwrap_or(settings.match_threshold);
            let embedding = source.embedding.as_deref().map(read_embedding).transpose()?;
            let store = open_store(&settings)?;
            let result = match embedding {
                Some(embedding) => {
                    manager(&settings, store)?.verify(&embedding, source.confidence, threshold)
                }
                None => {
                    let image = read_image(source.image.as_deref())?;
                    image_use_case(&settings, store)?.verify_image(&image, threshold)
                }
            }
            .map_err(CliError::from)?;
            print_json(&result)
        }
        Command::List { limit } => {
            let faces = manager(&settings, open_store(&settings)?)?
                .list(limit)
                .map_err(CliError::from)?;
            print_json(&FaceList {
                total_count: faces.len(),
                faces,
            })
        }
        Command::Show { face_id } => {
            let record = manager(&settings, open_store(&settings)?)?
                .fetch(&face_id)
                .map_err(CliError::from)?
                .ok_or_else(|| CliError::NotFound(format!("Face {face_id} not found")))?;
            print_json(&record)
        }
        Command::Delete { face_id } => {
            let deleted = manager(&settings, open_store(&settings)?)?
                .delete(&face_id)
                .map_err(CliError::from)?;
            if !deleted {
                return Err(CliError::NotFound(format!("Face {face_id} not found")).into());
            }
            print_json(&serde_json::json!({ "face_id": face_id, "deleted": true }))
        }
        Command::Clear { .. } => {
            let cleared = manager(&settings, open_store(&settings)?)?
                .clear()
                .map_err(CliError::from)?;
            print_json(&serde_json::json!({ "cleared": cleared }))
        }
        Command::Stats => print_json(&manager(&settings, open_store(&settings)?)?.stats()),
        Command::Health => {
            let manager = manager(&settings, open_store(&settings)?)?;
            let stats = manager.stats();
            let healthy = !stats.is_degraded();
            print_json(&serde_json::json!({
                "status": if healthy { "healthy" } else { "unhealthy" },
                "store": stats,
                "detection_confidence": manager.min_detection_confidence(),
            }))?;
            if !healthy {
                process::exit(1);
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct FaceList<T: Serialize> {
    faces: Vec<T>,
    total_count: usize,
}

/// Rejects bad arguments before any store is opened or model resolved.
fn check_inputs(command: &Command, settings: &Settings) -> Result<(), CliError> {
    match command {
        Command::Register {
            source,
            name,
            description,
        } => {
            validate_person_name(name).map_err(FaceMatchError::from)?;
            validate_description(description.as_deref()).map_err(FaceMatchError::from)?;
            validate_confidence(source.confidence, 0.0).map_err(FaceMatchError::from)?;
        }
        Command::Verify { source, threshold } => {
            Threshold::new(threshold.unwrap_or(settings.match_threshold))
                .map_err(FaceMatchError::from)?;
            validate_confidence(source.confidence, 0.0).map_err(FaceMatchError::from)?;
        }
        Command::List { limit } => {
            validate_limit(*limit).map_err(FaceMatchError::from)?;
        }
        Command::Clear { yes: false } => {
            return Err(CliError::Usage(
                "Refusing to delete every face without --yes".into(),
            ));
        }
        _ => {}
    }
    Ok(())
}

/// File settings, then command-line overrides.
fn resolve_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path).map_err(|e| CliError::Usage(e.to_string()))?,
        None => Settings::load(),
    };
    if let Some(store) = cli.store {
        settings.store = store;
    }
    if let Some(path) = &cli.store_path {
        settings.store_path = Some(path.clone());
    }
    if let Some(url) = &cli.qdrant_url {
        settings.qdrant_url = url.clone();
    }
    if let Some(collection) = &cli.collection {
        settings.collection = collection.clone();
    }
    if let Some(dimension) = cli.dimension {
        if dimension == 0 {
            return Err(CliError::Usage("Dimension must be positive".into()).into());
        }
        settings.dimension = dimension;
    }
    Ok(settings)
}

fn open_store(settings: &Settings) -> Result<Arc<dyn FaceStore>, Box<dyn std::error::Error>> {
    let mut qdrant = QdrantConfig::new(
        settings.qdrant_url.clone(),
        settings.collection.clone(),
        settings.dimension,
    );
    qdrant.api_key = settings.qdrant_api_key.clone();
    qdrant.timeout = Duration::from_secs(settings.qdrant_timeout_secs);

    let options = StoreOptions {
        backend: settings.store,
        dimension: settings.dimension,
        json_path: settings.json_store_path(),
        qdrant,
    };
    Ok(create_store(options).map_err(FaceMatchError::from).map_err(CliError::from)?)
}

fn manager(
    settings: &Settings,
    store: Arc<dyn FaceStore>,
) -> Result<FaceLifecycleManager, CliError> {
    let manager = FaceLifecycleManager::new(store)
        .with_min_detection_confidence(settings.detection_confidence)
        .map_err(FaceMatchError::from)?;
    Ok(manager)
}

fn image_use_case(
    settings: &Settings,
    store: Arc<dyn FaceStore>,
) -> Result<FaceImageUseCase, Box<dyn std::error::Error>> {
    let extractor = DetectingEmbeddingExtractor::from_default_models(
        settings.models_dir.as_deref(),
        settings.detection_confidence,
        download_progress,
    )?;
    Ok(FaceImageUseCase::new(
        Box::new(extractor),
        manager(settings, store)?,
    ))
}

fn read_image(path: Option<&Path>) -> Result<Vec<u8>, CliError> {
    let path = path.ok_or_else(|| CliError::Usage("An image or --embedding is required".into()))?;
    std::fs::read(path)
        .map_err(|e| CliError::Usage(format!("Cannot read image {}: {e}", path.display())))
}

fn read_embedding(path: &Path) -> Result<Vec<f32>, CliError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| CliError::Usage(format!("Cannot read embedding {}: {e}", path.display())))?;
    parse_embedding(&json)
        .map_err(|e| CliError::Usage(format!("Invalid embedding {}: {e}", path.display())))
}

fn parse_embedding(json: &str) -> Result<Vec<f32>, serde_json::Error> {
    serde_json::from_str(json)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
    if total > 0 && downloaded >= total {
        eprintln!();
    }
}
