//! Lesion types and their fixed binarization / denoising parameters.
//!
//! The parameter table is a `match` over [`LesionType`], so adding a lesion
//! type without thresholds is a compile error rather than a silent default.

use crate::registry::ModelId;

/// Retinal finding category produced by one segmentation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum LesionType {
    /// Hemorrhages.
    #[serde(rename = "HE")]
    He,
    /// Microaneurysms.
    #[serde(rename = "MA")]
    Ma,
    /// Hard exudates.
    #[serde(rename = "EX")]
    Ex,
    /// Soft exudates (cotton-wool spots).
    #[serde(rename = "SE")]
    Se,
    /// Optic disc.
    #[serde(rename = "OD")]
    Od,
    /// Vessel tree.
    Vessels,
}

/// Per-lesion binarization threshold and connected-component minimum area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LesionParams {
    /// Probabilities strictly above this value become foreground.
    pub threshold: f32,
    /// Components with fewer pixels are removed. `None` disables denoising.
    pub min_area: Option<u32>,
}

impl LesionType {
    /// Every lesion type, in segmentation run order.
    pub const ALL: [LesionType; 6] = [
        LesionType::He,
        LesionType::Ma,
        LesionType::Ex,
        LesionType::Se,
        LesionType::Od,
        LesionType::Vessels,
    ];

    /// Fixed parameters for this lesion type.
    ///
    /// MA uses a low threshold because microaneurysms are small and faint;
    /// vessels are never denoised since they are thin by nature.
    pub const fn params(self) -> LesionParams {
        match self {
            LesionType::He => LesionParams {
                threshold: 0.5,
                min_area: Some(15),
            },
            LesionType::Ma => LesionParams {
                threshold: 0.2,
                min_area: Some(5),
            },
            LesionType::Ex => LesionParams {
                threshold: 0.5,
                min_area: Some(20),
            },
            LesionType::Se => LesionParams {
                threshold: 0.3,
                min_area: Some(20),
            },
            LesionType::Od => LesionParams {
                threshold: 0.5,
                min_area: Some(20),
            },
            LesionType::Vessels => LesionParams {
                threshold: 0.5,
                min_area: None,
            },
        }
    }

    /// Overlay channels `[red, green, blue]` this lesion contributes to.
    pub const fn overlay_channels(self) -> [bool; 3] {
        match self {
            LesionType::He | LesionType::Ma => [true, false, false],
            LesionType::Ex | LesionType::Se => [true, true, false],
            LesionType::Od => [false, false, true],
            LesionType::Vessels => [false, true, false],
        }
    }

    /// Registry entry for the model that segments this lesion.
    pub const fn model_id(self) -> ModelId {
        match self {
            LesionType::He => ModelId::He,
            LesionType::Ma => ModelId::Ma,
            LesionType::Ex => ModelId::Ex,
            LesionType::Se => ModelId::Se,
            LesionType::Od => ModelId::Od,
            LesionType::Vessels => ModelId::Vessels,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.model_id().as_str()
    }
}

impl std::fmt::Display for LesionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Surviving pixel count per lesion type. Missing models contribute zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LesionAreas {
    pub he: u64,
    pub ma: u64,
    pub ex: u64,
    pub se: u64,
    pub od: u64,
    pub vessels: u64,
}

impl LesionAreas {
    pub fn get(&self, lesion: LesionType) -> u64 {
        match lesion {
            LesionType::He => self.he,
            LesionType::Ma => self.ma,
            LesionType::Ex => self.ex,
            LesionType::Se => self.se,
            LesionType::Od => self.od,
            LesionType::Vessels => self.vessels,
        }
    }

    pub fn set(&mut self, lesion: LesionType, area: u64) {
        let slot = match lesion {
            LesionType::He => &mut self.he,
            LesionType::Ma => &mut self.ma,
            LesionType::Ex => &mut self.ex,
            LesionType::Se => &mut self.se,
            LesionType::Od => &mut self.od,
            LesionType::Vessels => &mut self.vessels,
        };
        *slot = area;
    }

    /// Combined hard + soft exudate area.
    pub fn exudates(&self) -> u64 {
        self.ex + self.se
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_table_matches_clinical_constants() {
        assert_eq!(LesionType::He.params().threshold, 0.5);
        assert_eq!(LesionType::Ex.params().threshold, 0.5);
        assert_eq!(LesionType::Se.params().threshold, 0.3);
        assert_eq!(LesionType::Ma.params().threshold, 0.2);

        assert_eq!(LesionType::Ma.params().min_area, Some(5));
        assert_eq!(LesionType::He.params().min_area, Some(15));
        assert_eq!(LesionType::Ex.params().min_area, Some(20));
        assert_eq!(LesionType::Se.params().min_area, Some(20));
        assert_eq!(LesionType::Od.params().min_area, Some(20));
        assert_eq!(LesionType::Vessels.params().min_area, None);
    }

    #[test]
    fn exudates_feed_red_and_green() {
        assert_eq!(LesionType::Ex.overlay_channels(), [true, true, false]);
        assert_eq!(LesionType::Od.overlay_channels(), [false, false, true]);
    }

    #[test]
    fn areas_round_trip_by_type() {
        let mut areas = LesionAreas::default();
        for (i, lesion) in LesionType::ALL.into_iter().enumerate() {
            areas.set(lesion, i as u64 * 10);
        }
        assert_eq!(areas.get(LesionType::Se), 30);
        assert_eq!(areas.exudates(), 20 + 30);
    }
}
