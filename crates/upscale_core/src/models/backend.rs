//! TensorRT backend options passed to vs-mlrt.

use serde::{Deserialize, Serialize};

/// Execution options for one inference stage.
///
/// A fresh value is built for every stage so the upscale and interpolation
/// stages can use different stream counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendOptions {
    pub fp16: bool,
    pub tf32: bool,
    /// 0 = fp32 output, 1 = fp16 output.
    pub output_format: u8,
    pub use_cublas: bool,
    pub use_cuda_graph: bool,
    pub use_cudnn: bool,
    pub num_streams: u32,
    pub force_fp16: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            fp16: true,
            tf32: false,
            output_format: 1,
            use_cublas: true,
            use_cuda_graph: true,
            use_cudnn: false,
            num_streams: 1,
            force_fp16: true,
        }
    }
}

impl BackendOptions {
    /// Default options with the given stream count and cuBLAS toggle.
    pub fn with_streams(num_streams: u32, use_cublas: bool) -> Self {
        Self {
            num_streams,
            use_cublas,
            ..Self::default()
        }
    }

    /// Python expression constructing this backend.
    pub fn to_python(&self) -> String {
        format!(
            "vsmlrt.Backend.TRT(fp16={}, tf32={}, output_format={}, use_cublas={}, \
             use_cuda_graph={}, use_cudnn={}, num_streams={}, force_fp16={})",
            py_bool(self.fp16),
            py_bool(self.tf32),
            self.output_format,
            py_bool(self.use_cublas),
            py_bool(self.use_cuda_graph),
            py_bool(self.use_cudnn),
            self.num_streams,
            py_bool(self.force_fp16),
        )
    }
}

fn py_bool(v: bool) -> &'static str {
    if v {
        "True"
    } else {
        "False"
    }
}
