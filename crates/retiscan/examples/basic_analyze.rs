use retiscan::{Analyzer, AnalyzerConfig, InferenceResult};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <models_dir> <image.jpg> [overlay.png]", args[0]);
        std::process::exit(2);
    }

    let analyzer = Analyzer::from_config(AnalyzerConfig::with_models_dir(&args[1]))?;
    println!(
        "Loaded {} of {} models.",
        analyzer.registry().available().len(),
        analyzer.registry().specs().len()
    );

    let bytes = std::fs::read(Path::new(&args[2]))?;
    let analysis = analyzer.analyze(&bytes)?;
    let referral = analysis.verdict.needs_referral();
    let result = InferenceResult::from(analysis);

    println!("{}", result.result_line());
    if referral {
        println!("-> refer to ophthalmologist");
    }
    println!("{}", result.risk_narrative);

    if let Some(out_path) = args.get(3) {
        std::fs::write(out_path, &result.overlay_image)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
