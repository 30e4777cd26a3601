use thiserror::Error;

/// Failures while bringing up or presenting to the GPU.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("invalid window handle: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("surface supports no usable texture format")]
    UnsupportedSurface,

    #[error("the renderer is not backed by wgpu")]
    NotWgpu,
}
