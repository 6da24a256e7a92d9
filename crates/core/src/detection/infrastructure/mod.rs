pub mod execution_provider;
pub mod math;
pub mod onnx_expression_detector;
