//! Compute backend probing and precision policy.

use anyhow::Result;
use candle_core::{DType, Device};
use serde::{Deserialize, Serialize};

/// The hardware backend model computation runs on.
///
/// Probed once per process, in the priority order Metal > CUDA > CPU,
/// and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionTarget {
    Metal,
    Cuda,
    Cpu,
}

impl ExecutionTarget {
    /// Probe available acceleration backends and pick one.
    ///
    /// Deterministic for a given host/driver configuration: the probes
    /// only inspect what the running binary was compiled with and what
    /// the host exposes.
    pub fn detect() -> Self {
        if candle_core::utils::metal_is_available() {
            tracing::info!("using Metal backend");
            return Self::Metal;
        }
        if candle_core::utils::cuda_is_available() {
            tracing::info!("using CUDA backend");
            return Self::Cuda;
        }
        tracing::info!("using CPU backend");
        Self::Cpu
    }

    /// Materialize the Candle device for this target (ordinal 0 for
    /// accelerators). Initialization failure is fatal upstream.
    pub fn device(&self) -> Result<Device> {
        let device = match self {
            Self::Metal => Device::new_metal(0)?,
            Self::Cuda => Device::new_cuda(0)?,
            Self::Cpu => Device::Cpu,
        };
        Ok(device)
    }

    /// Numeric precision for model weights and KV cache on this target:
    /// half precision on accelerators, full precision on CPU.
    pub fn dtype(&self) -> DType {
        match self {
            Self::Metal | Self::Cuda => DType::F16,
            Self::Cpu => DType::F32,
        }
    }
}

impl std::fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Metal => "metal",
            Self::Cuda => "cuda",
            Self::Cpu => "cpu",
        };
        f.write_str(s)
    }
}
