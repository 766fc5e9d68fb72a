//! Retinopathy grades shared by the classifier and the arbitration rules.

/// Five-class output of the whole-image severity classifier, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrGrade {
    NoDr,
    Mild,
    Moderate,
    Severe,
    Proliferative,
}

impl DrGrade {
    pub const ALL: [DrGrade; 5] = [
        DrGrade::NoDr,
        DrGrade::Mild,
        DrGrade::Moderate,
        DrGrade::Severe,
        DrGrade::Proliferative,
    ];

    /// Grade for a classifier output index.
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Display label used in records and reports.
    pub fn label(self) -> &'static str {
        match self {
            DrGrade::NoDr => "Bình thường (No DR)",
            DrGrade::Mild => "Nhẹ (Mild)",
            DrGrade::Moderate => "Trung bình (Moderate)",
            DrGrade::Severe => "Nặng (Severe)",
            DrGrade::Proliferative => "Tăng sinh (Proliferative)",
        }
    }

    /// `true` for grades the arbitration treats as "classifier says Normal".
    pub fn is_normal(self) -> bool {
        self == DrGrade::NoDr
    }

    /// `true` for grades the arbitration treats as "classifier says Severe".
    pub fn is_severe(self) -> bool {
        matches!(self, DrGrade::Severe | DrGrade::Proliferative)
    }
}

impl std::fmt::Display for DrGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity tier derived from lesion areas (0 = normal .. 3 = severe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal = 0,
    Mild = 1,
    Moderate = 2,
    Severe = 3,
}

impl Severity {
    pub fn score(self) -> u8 {
        self as u8
    }

    pub fn from_score(score: u8) -> Option<Self> {
        match score {
            0 => Some(Severity::Normal),
            1 => Some(Severity::Mild),
            2 => Some(Severity::Moderate),
            3 => Some(Severity::Severe),
            _ => None,
        }
    }

    /// Matching classifier grade; segmentation never reports proliferative disease.
    pub fn grade(self) -> DrGrade {
        match self {
            Severity::Normal => DrGrade::NoDr,
            Severity::Mild => DrGrade::Mild,
            Severity::Moderate => DrGrade::Moderate,
            Severity::Severe => DrGrade::Severe,
        }
    }

    pub fn label(self) -> &'static str {
        self.grade().label()
    }
}
