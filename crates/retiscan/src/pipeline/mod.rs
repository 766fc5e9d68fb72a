//! End-to-end analysis of one fundus photograph.
//!
//! The pipeline layer wires the stages together in a fixed order:
//! decode -> segmentation (model by model) -> classifier -> arbitration ->
//! overlay compositing. Stage algorithms live in `crate::preprocess`,
//! `crate::segmentation`, `crate::classifier`, `crate::arbitration` and
//! `crate::overlay`; this module only owns call order and data flow.

mod prelude;
mod result;
mod run;

pub use result::{Analysis, InferenceResult, LesionSummary};

pub(crate) use run::{analyze_bytes, analyze_image};
