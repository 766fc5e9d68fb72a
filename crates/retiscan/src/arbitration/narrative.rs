//! Risk narrative lines derived from the final score and raw lesion areas.

use crate::lesion::LesionAreas;

const SPARSE_VESSEL_AREA: u64 = 2000;
const DILATED_VESSEL_AREA: u64 = 15000;
const ENLARGED_DISC_AREA: u64 = 4500;

/// Heading of one narrative line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSection {
    EyeFindings,
    Prognosis,
    Diabetes,
    Cardiovascular,
    Glaucoma,
    Technical,
}

impl RiskSection {
    pub fn title(self) -> &'static str {
        match self {
            RiskSection::EyeFindings => "Eye findings",
            RiskSection::Prognosis => "Prognosis",
            RiskSection::Diabetes => "Diabetes",
            RiskSection::Cardiovascular => "Cardiovascular",
            RiskSection::Glaucoma => "Glaucoma",
            RiskSection::Technical => "Technical",
        }
    }
}

/// One line of the risk report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RiskLine {
    pub section: RiskSection,
    pub text: String,
}

impl RiskLine {
    fn new(section: RiskSection, text: impl Into<String>) -> Self {
        Self {
            section,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for RiskLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.section.title(), self.text)
    }
}

fn eye_findings(score: u8) -> &'static str {
    match score {
        0 => "no diabetic retinopathy lesions detected",
        1 => "early lesions (microaneurysms or small hemorrhages)",
        2 => "hemorrhages and/or hard exudates consistent with non-proliferative retinopathy",
        _ => "extensive hemorrhages or cotton-wool spots; retinal ischemia likely",
    }
}

fn prognosis(score: u8) -> &'static str {
    match score {
        0 => "routine screening in 12 months",
        1 => "re-examine in 6 to 12 months with glycemic control",
        2 => "ophthalmology follow-up within 3 months",
        _ => "urgent referral to an ophthalmologist",
    }
}

fn diabetes(score: u8) -> &'static str {
    match score {
        0 => "retina looks healthy; no sign of diabetic damage",
        1 => "early microvascular change; monitor blood glucose and HbA1c",
        2 => "retinopathy is progressing; diabetes control should be reviewed",
        _ => "warning: advanced retinopathy suggests systemic complications (kidney, nerve)",
    }
}

fn cardiovascular(vessel_area: u64) -> &'static str {
    if vessel_area < SPARSE_VESSEL_AREA {
        "sparse or narrow vessels; elevated hypertension risk"
    } else if vessel_area > DILATED_VESSEL_AREA {
        "abnormal vessel dilation; check blood pressure and circulation"
    } else {
        "vessel density stable"
    }
}

/// Build the ordered report. Always contains eye findings, prognosis,
/// diabetes, cardiovascular and technical lines; glaucoma only for an
/// enlarged optic disc.
pub fn risk_report(score: u8, areas: &LesionAreas) -> Vec<RiskLine> {
    let mut lines = vec![
        RiskLine::new(RiskSection::EyeFindings, eye_findings(score)),
        RiskLine::new(RiskSection::Prognosis, prognosis(score)),
        RiskLine::new(RiskSection::Diabetes, diabetes(score)),
        RiskLine::new(RiskSection::Cardiovascular, cardiovascular(areas.vessels)),
    ];
    if areas.od > ENLARGED_DISC_AREA {
        lines.push(RiskLine::new(
            RiskSection::Glaucoma,
            "enlarged optic disc; suspected cupping, intraocular pressure check advised",
        ));
    }
    lines.push(RiskLine::new(
        RiskSection::Technical,
        format!("HE={} MA={} EX+SE={}", areas.he, areas.ma, areas.exudates()),
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections(lines: &[RiskLine]) -> Vec<RiskSection> {
        lines.iter().map(|l| l.section).collect()
    }

    #[test]
    fn glaucoma_only_above_disc_threshold() {
        let mut areas = LesionAreas {
            od: 4500,
            vessels: 5000,
            ..LesionAreas::default()
        };
        assert!(!sections(&risk_report(0, &areas)).contains(&RiskSection::Glaucoma));
        areas.od = 4501;
        let lines = risk_report(0, &areas);
        assert_eq!(
            sections(&lines),
            vec![
                RiskSection::EyeFindings,
                RiskSection::Prognosis,
                RiskSection::Diabetes,
                RiskSection::Cardiovascular,
                RiskSection::Glaucoma,
                RiskSection::Technical,
            ]
        );
    }

    #[test]
    fn vessel_bands() {
        assert!(cardiovascular(1999).contains("hypertension"));
        assert_eq!(cardiovascular(2000), "vessel density stable");
        assert_eq!(cardiovascular(15000), "vessel density stable");
        assert!(cardiovascular(15001).contains("dilation"));
    }

    #[test]
    fn technical_line_is_last_and_sums_exudates() {
        let areas = LesionAreas {
            he: 12,
            ma: 3,
            ex: 40,
            se: 2,
            ..LesionAreas::default()
        };
        let lines = risk_report(3, &areas);
        let last = lines.last().unwrap();
        assert_eq!(last.to_string(), "Technical: HE=12 MA=3 EX+SE=42");
        assert!(lines[2].text.starts_with("warning"));
    }
}
