use relay_wire::PixelFormat;

/// Maps a stream pixel format to the texture format its render target uses.
///
/// Returns `None` for formats this client cannot render.
pub fn texture_format(format: PixelFormat) -> Option<wgpu::TextureFormat> {
    match format {
        PixelFormat::Bgra8 => Some(wgpu::TextureFormat::Bgra8Unorm),
        PixelFormat::Bgra8Srgb => Some(wgpu::TextureFormat::Bgra8UnormSrgb),
        PixelFormat::Rgba8 => Some(wgpu::TextureFormat::Rgba8Unorm),
        PixelFormat::Rgba8Srgb => Some(wgpu::TextureFormat::Rgba8UnormSrgb),
        PixelFormat::Rgba16Float => Some(wgpu::TextureFormat::Rgba16Float),
        PixelFormat::Rgba32Float => Some(wgpu::TextureFormat::Rgba32Float),
        PixelFormat::Unknown(_) => None,
    }
}

/// Row pitch for a texture-to-buffer copy.
///
/// wgpu requires each copied row to start on a 256-byte boundary.
pub fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let unpadded = width * bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}
