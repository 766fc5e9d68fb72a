//! retiscan CLI: command-line interface for fundus photograph triage.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use retiscan::{
    arbitrate, Analyzer, AnalyzerConfig, ClassifierFinding, DrGrade, EnsembleVerdict,
    FsArtifactStore, FsImageSource, JobOutcome, JobQueue, JsonRecordStore, LesionAreas,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "retiscan")]
#[command(about = "Grade diabetic retinopathy in colour fundus photographs with a model ensemble")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single fundus image.
    Analyze(CliAnalyzeArgs),

    /// Show which ensemble members are configured and loaded.
    Models(CliModelArgs),

    /// Run the background job queue over every image in a directory.
    Batch(CliBatchArgs),

    /// Evaluate the arbitration rules on given lesion areas (no models needed).
    Rules(CliRulesArgs),
}

#[derive(Debug, Clone, Args)]
struct CliModelArgs {
    /// Analyzer configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding `<NAME>.onnx` artifacts. Overrides `models_dir` in the config.
    #[arg(long)]
    models_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    #[command(flatten)]
    models: CliModelArgs,

    /// Path to write the full analysis (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path to write the lesion overlay (PNG).
    #[arg(long)]
    overlay: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliBatchArgs {
    /// Directory of input images (PNG/JPEG).
    #[arg(long)]
    input_dir: PathBuf,

    /// Output directory; receives `records/` and `overlays/`.
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    models: CliModelArgs,

    /// Worker threads. Overrides `workers` in the config.
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GradeArg {
    NoDr,
    Mild,
    Moderate,
    Severe,
    Proliferative,
}

impl GradeArg {
    fn to_core(self) -> DrGrade {
        match self {
            GradeArg::NoDr => DrGrade::NoDr,
            GradeArg::Mild => DrGrade::Mild,
            GradeArg::Moderate => DrGrade::Moderate,
            GradeArg::Severe => DrGrade::Severe,
            GradeArg::Proliferative => DrGrade::Proliferative,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliRulesArgs {
    /// Hemorrhage area (pixels).
    #[arg(long, default_value_t = 0)]
    he: u64,
    /// Microaneurysm area (pixels).
    #[arg(long, default_value_t = 0)]
    ma: u64,
    /// Hard exudate area (pixels).
    #[arg(long, default_value_t = 0)]
    ex: u64,
    /// Soft exudate area (pixels).
    #[arg(long, default_value_t = 0)]
    se: u64,
    /// Optic disc area (pixels).
    #[arg(long, default_value_t = 0)]
    od: u64,
    /// Vessel area (pixels).
    #[arg(long, default_value_t = 0)]
    vessels: u64,
    /// Classifier grade. Omit for an undetermined classifier.
    #[arg(long, value_enum)]
    grade: Option<GradeArg>,
    /// Classifier confidence in [0, 1].
    #[arg(long, default_value_t = 1.0)]
    confidence: f32,
}

impl CliModelArgs {
    fn to_config(&self) -> CliResult<AnalyzerConfig> {
        let mut config = match &self.config {
            Some(path) => AnalyzerConfig::from_json_file(path)?,
            None => AnalyzerConfig::default(),
        };
        if let Some(dir) = &self.models_dir {
            if config.models.is_empty() {
                config.models = AnalyzerConfig::with_models_dir(dir).models;
            }
            config.models_dir = Some(dir.clone());
        }
        if config.models.is_empty() {
            return Err("no models configured; pass --config or --models-dir".into());
        }
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Models(args) => run_models(&args),
        Commands::Batch(args) => run_batch(&args),
        Commands::Rules(args) => run_rules(&args),
    }
}

fn print_verdict(verdict: &EnsembleVerdict) {
    println!("Diagnosis:        {}", verdict.final_diagnosis);
    println!("Severity score:   {}", verdict.severity_score);
    println!(
        "Classifier:       {} ({:.2}%)",
        verdict.classifier.label(),
        verdict.classifier.confidence() * 100.0
    );
    if let Some(reason) = &verdict.override_reason {
        println!("Override:         {reason}");
    }
    if verdict.needs_referral() {
        println!("Flag:             refer to ophthalmologist");
    }
    if verdict.low_confidence() {
        println!("Flag:             low classifier confidence");
    }
    println!();
    println!("{}", verdict.risk_narrative());
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let analyzer = Analyzer::from_config(args.models.to_config()?)?;

    tracing::info!("Loading image: {}", args.image.display());
    let bytes = std::fs::read(&args.image).map_err(|e| -> CliError {
        format!("Failed to read image {}: {}", args.image.display(), e).into()
    })?;

    let analysis = analyzer.analyze(&bytes)?;
    print_verdict(&analysis.verdict);

    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&analysis)?;
        std::fs::write(out, json)?;
        tracing::info!("Analysis written to {}", out.display());
    }
    if let Some(path) = &args.overlay {
        std::fs::write(path, &analysis.overlay_png)?;
        tracing::info!("Overlay written to {}", path.display());
    }
    Ok(())
}

// ── models ─────────────────────────────────────────────────────────────

fn run_models(args: &CliModelArgs) -> CliResult<()> {
    let analyzer = Analyzer::from_config(args.to_config()?)?;
    let registry = analyzer.registry();

    println!("retiscan model registry");
    for spec in registry.specs() {
        println!(
            "  {:<11} {:<9} {:?}  {}",
            spec.name.as_str(),
            if spec.loaded { "loaded" } else { "missing" },
            spec.input_shape,
            spec.artifact_path.display()
        );
    }
    println!(
        "  {} of {} configured models available",
        registry.available().len(),
        registry.specs().len()
    );
    Ok(())
}

// ── batch ──────────────────────────────────────────────────────────────

fn list_images(dir: &Path) -> CliResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || image::ImageFormat::from_path(&path).is_err() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// `(record_id, locator)` per image. The full file name is the record id, so
/// `a.png` and `a.jpg` never share a record or an overlay tag.
fn batch_jobs(images: &[String]) -> Vec<(String, String)> {
    images.iter().map(|name| (name.clone(), name.clone())).collect()
}

fn run_batch(args: &CliBatchArgs) -> CliResult<()> {
    let mut config = args.models.to_config()?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    let analyzer = Analyzer::from_config(config)?;

    let images = list_images(&args.input_dir)?;
    tracing::info!("Found {} images in {}", images.len(), args.input_dir.display());

    let records = Arc::new(JsonRecordStore::new(args.out_dir.join("records")));
    let queue = JobQueue::start(
        analyzer,
        Arc::new(FsImageSource::new(&args.input_dir)),
        Arc::new(FsArtifactStore::new(args.out_dir.join("overlays"))),
        records,
    );

    let handles: Vec<_> = batch_jobs(&images)
        .into_iter()
        .map(|(record_id, locator)| queue.submit(record_id, locator))
        .collect();

    let mut completed = 0usize;
    let mut failed = 0usize;
    for handle in handles {
        match handle.wait() {
            JobOutcome::Completed { record_id, result, .. } => {
                completed += 1;
                println!("{record_id}: {}", result.result_line());
            }
            JobOutcome::Failed { record_id, reason, .. } => {
                failed += 1;
                println!("{record_id}: FAILED ({reason})");
            }
        }
    }
    queue.shutdown();

    println!("{completed} completed, {failed} failed");
    tracing::info!("Records written to {}", args.out_dir.join("records").display());
    Ok(())
}

// ── rules ──────────────────────────────────────────────────────────────

fn run_rules(args: &CliRulesArgs) -> CliResult<()> {
    if !(0.0..=1.0).contains(&args.confidence) {
        return Err(format!("--confidence must be in [0, 1], got {}", args.confidence).into());
    }
    let areas = LesionAreas {
        he: args.he,
        ma: args.ma,
        ex: args.ex,
        se: args.se,
        od: args.od,
        vessels: args.vessels,
    };
    let classifier = match args.grade {
        Some(grade) => ClassifierFinding::Graded {
            grade: grade.to_core(),
            confidence: args.confidence,
        },
        None => ClassifierFinding::Undetermined,
    };
    print_verdict(&arbitrate(&areas, &classifier));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn same_stem_images_get_distinct_record_ids() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "a.jpg", "b.jpeg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let images = list_images(dir.path()).unwrap();
        assert_eq!(images, vec!["a.jpg", "a.png", "b.jpeg"]);

        let jobs = batch_jobs(&images);
        let ids: BTreeSet<_> = jobs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids.len(), jobs.len());
        assert!(jobs.iter().all(|(id, locator)| id == locator));
    }

    #[test]
    fn rules_rejects_out_of_range_confidence() {
        let args = CliRulesArgs {
            he: 0,
            ma: 0,
            ex: 0,
            se: 0,
            od: 0,
            vessels: 0,
            grade: Some(GradeArg::Mild),
            confidence: 1.5,
        };
        assert!(run_rules(&args).is_err());
    }
}
