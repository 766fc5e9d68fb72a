use retiscan::{arbitrate, ClassifierFinding, DrGrade, LesionAreas};

fn main() {
    let cases = [
        (
            "mild map, confident normal classifier",
            LesionAreas {
                ma: 25,
                vessels: 6000,
                ..LesionAreas::default()
            },
            ClassifierFinding::Graded {
                grade: DrGrade::NoDr,
                confidence: 0.9,
            },
        ),
        (
            "clean map, severe classifier",
            LesionAreas {
                vessels: 1500,
                ..LesionAreas::default()
            },
            ClassifierFinding::Graded {
                grade: DrGrade::Severe,
                confidence: 0.8,
            },
        ),
        (
            "heavy hemorrhage, no classifier",
            LesionAreas {
                he: 950,
                od: 5200,
                vessels: 16000,
                ..LesionAreas::default()
            },
            ClassifierFinding::Undetermined,
        ),
    ];

    for (name, areas, classifier) in cases {
        let verdict = arbitrate(&areas, &classifier);
        println!("== {name}");
        println!(
            "{} (score {}, override: {})",
            verdict.final_diagnosis,
            verdict.severity_score,
            verdict.override_reason.as_deref().unwrap_or("none")
        );
        println!("{}\n", verdict.risk_narrative());
    }
}
