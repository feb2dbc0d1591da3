//! Session bootstrap: endpoint, GPU device, binding, then the exchange loop.

use crate::backend::GpuBackend;
use crate::config::{ClientConfig, EndpointConfig};
use crate::endpoint::{Endpoint, SdkEndpoint, SimulatedEndpoint};
use crate::error::{Exit, FatalError};
use crate::exchange::FrameExchange;

/// Opens the endpoint named by `config`.
pub fn open_endpoint(config: &EndpointConfig) -> Result<Box<dyn Endpoint>, FatalError> {
    match config {
        EndpointConfig::Sdk(sdk) => Ok(Box::new(SdkEndpoint::load(&sdk.library_path())?)),
        EndpointConfig::Simulated(sim) => {
            log::info!(
                "using the simulated endpoint with {} stream(s)",
                sim.streams.len()
            );
            Ok(Box::new(
                SimulatedEndpoint::new(sim.simulated_streams(), sim.frame_interval())
                    .quit_after(sim.quit_after_frames)
                    .change_streams_every(sim.change_streams_every),
            ))
        }
    }
}

/// Runs one complete session and returns how it ended.
///
/// Must be called on the main thread: the display host owns the platform
/// event loop.
pub fn run(config: &ClientConfig) -> Exit {
    let mut endpoint = match open_endpoint(&config.endpoint) {
        Ok(endpoint) => endpoint,
        Err(err) => return fatal(err),
    };

    let (major, minor) = config.endpoint.api_version();
    if let Err(status) = endpoint.initialize(major, minor) {
        return fatal(FatalError::Initialize(status));
    }
    log::info!("endpoint initialised (protocol {major}.{minor})");

    let backend = match GpuBackend::new(config.gpu.to_init()) {
        Ok(backend) => backend,
        Err(err) => return abort(endpoint.as_mut(), FatalError::Device(format!("{err:#}"))),
    };

    let device = backend.device_info();
    if let Err(status) = endpoint.bind_gpu_device(&device) {
        return abort(endpoint.as_mut(), FatalError::GpuBinding(status));
    }
    log::info!("bound GPU `{}` ({:?}) to the endpoint", device.name, device.backend);

    FrameExchange::new(endpoint, backend, config.exchange.settings()).run()
}

fn fatal(err: FatalError) -> Exit {
    err.report();
    Exit::Fatal(err)
}

/// Reports `err` after a best-effort shutdown of an initialised endpoint.
fn abort(endpoint: &mut dyn Endpoint, err: FatalError) -> Exit {
    if let Err(status) = endpoint.shutdown() {
        log::warn!("endpoint shutdown during abort failed: {status}");
    }
    fatal(err)
}
