use std::path::Path;

use tract_onnx::prelude::*;

use super::{ModelId, RawOutput, ScoringModel};
use crate::error::{AnalysisError, AnalysisResult};
use crate::preprocess::PreprocessedTensor;

/// ONNX graph compiled with `tract`, input fact pinned to one NHWC shape.
pub struct OnnxModel {
    id: ModelId,
    plan: TypedRunnableModel<TypedModel>,
}

impl OnnxModel {
    /// Load, pin the input shape, optimize and compile an ONNX artifact.
    ///
    /// A graph that cannot accept `input_shape` fails here, at startup.
    pub fn load(id: ModelId, path: &Path, input_shape: [usize; 4]) -> AnalysisResult<Self> {
        let build = || -> TractResult<TypedRunnableModel<TypedModel>> {
            tract_onnx::onnx()
                .model_for_path(path)?
                .with_input_fact(0, f32::fact(input_shape).into())?
                .into_optimized()?
                .into_runnable()
        };
        let plan = build().map_err(|err| AnalysisError::ModelLoad {
            model: id,
            path: path.display().to_string(),
            reason: format!("{err:#}"),
        })?;
        Ok(Self { id, plan })
    }
}

impl ScoringModel for OnnxModel {
    fn run(&self, input: &PreprocessedTensor) -> AnalysisResult<RawOutput> {
        let fail = |err: TractError| AnalysisError::inference(self.id, format!("{err:#}"));

        let tensor = Tensor::from_shape(&input.shape(), input.data()).map_err(fail)?;
        let outputs = self.plan.run(tvec!(tensor.into())).map_err(fail)?;
        let first = outputs
            .first()
            .ok_or_else(|| AnalysisError::inference(self.id, "graph produced no outputs"))?;
        let view = first.to_array_view::<f32>().map_err(fail)?;
        Ok(RawOutput::new(
            view.shape().to_vec(),
            view.iter().copied().collect(),
        ))
    }
}
