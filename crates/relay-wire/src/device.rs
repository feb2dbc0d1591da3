use bytemuck::{Pod, Zeroable};

/// Graphics API the client renders with.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum GpuBackendKind {
    Unknown = 0,
    Vulkan = 1,
    Metal = 2,
    Dx12 = 3,
    Gl = 4,
}

/// Identity of the GPU device handed to the endpoint when binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuDeviceInfo {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub backend: GpuBackendKind,
}

impl GpuDeviceInfo {
    pub fn to_raw(&self) -> RawGpuDeviceInfo {
        RawGpuDeviceInfo {
            vendor_id: self.vendor_id,
            device_id: self.device_id,
            backend: self.backend as u32,
            _reserved: 0,
        }
    }
}

/// C layout of [`GpuDeviceInfo`] (name omitted).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct RawGpuDeviceInfo {
    pub vendor_id: u32,
    pub device_id: u32,
    pub backend: u32,
    pub _reserved: u32,
}
