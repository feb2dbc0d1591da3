//! Active streams and their render resources.
//!
//! The registry holds the stream set of the current epoch and, at the same
//! index, the slot owning that stream's resource. [`StreamRegistry::reconcile`]
//! replaces the set wholesale when the endpoint reports a change, keeping the
//! resources of streams that survive and releasing the rest.

use std::collections::{HashMap, VecDeque};

use relay_wire::{DecodeError, Status, StreamDescription, StreamHandle, StreamSet};

use crate::backend::{ProvisionError, RenderBackend};
use crate::endpoint::{Endpoint, GetStreamsError};

/// Full fetch attempts made when the table keeps growing between the size
/// query and the fetch.
pub const FETCH_ATTEMPTS: usize = 3;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("endpoint returned {0}")]
    Endpoint(Status),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("stream table kept growing after {} attempts", FETCH_ATTEMPTS)]
    Unstable,
}

#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("failed to fetch the stream set")]
    Fetch(#[source] FetchError),

    #[error("failed to provision stream {index} `{name}` ({handle})")]
    Provision {
        index: usize,
        name: String,
        handle: StreamHandle,
        #[source]
        source: ProvisionError,
    },
}

/// Fetches and decodes the current stream table with the two-phase protocol.
///
/// The first call passes an empty buffer to learn the required size; the
/// overflow it reports is expected. `buffer` is reused across calls.
pub fn fetch_stream_set<E>(endpoint: &mut E, buffer: &mut Vec<u8>) -> Result<StreamSet, FetchError>
where
    E: Endpoint + ?Sized,
{
    let mut required = match endpoint.get_streams(&mut []) {
        Ok(_) => return Ok(StreamSet::default()),
        Err(GetStreamsError::BufferTooSmall { required }) => required,
        Err(GetStreamsError::Failed(status)) => return Err(FetchError::Endpoint(status)),
    };

    for _ in 0..FETCH_ATTEMPTS {
        buffer.clear();
        buffer.resize(required, 0);

        match endpoint.get_streams(buffer) {
            Ok(written) => {
                let written = written.min(buffer.len());
                return Ok(StreamSet::decode(&buffer[..written])?);
            }
            Err(GetStreamsError::BufferTooSmall { required: grown }) => {
                log::debug!("stream table grew from {required} to {grown} bytes, retrying");
                required = grown;
            }
            Err(GetStreamsError::Failed(status)) => return Err(FetchError::Endpoint(status)),
        }
    }

    Err(FetchError::Unstable)
}

/// Counts of what one reconciliation did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub kept: usize,
    pub provisioned: usize,
    pub released: usize,
}

/// Resource slot of one stream.
#[derive(Debug)]
pub struct StreamSlot<R> {
    resource: Option<R>,
    payload_loaded: bool,
    pose_failures: u32,
}

impl<R> StreamSlot<R> {
    fn new(resource: R) -> Self {
        Self {
            resource: Some(resource),
            payload_loaded: false,
            pose_failures: 0,
        }
    }

    /// `false` once the stream's window was closed.
    pub fn is_open(&self) -> bool {
        self.resource.is_some()
    }

    pub fn resource(&self) -> Option<&R> {
        self.resource.as_ref()
    }

    pub fn resource_mut(&mut self) -> Option<&mut R> {
        self.resource.as_mut()
    }

    pub fn payload_loaded(&self) -> bool {
        self.payload_loaded
    }

    pub fn mark_payload_loaded(&mut self) {
        self.payload_loaded = true;
    }

    /// Records a failed pose fetch; returns how many happened in a row.
    pub fn note_pose_failure(&mut self) -> u32 {
        self.pose_failures = self.pose_failures.saturating_add(1);
        self.pose_failures
    }

    pub fn clear_pose_failures(&mut self) {
        self.pose_failures = 0;
    }

    /// Releases the resource and keeps the slot as a closed placeholder.
    pub fn close<B>(&mut self, backend: &mut B)
    where
        B: RenderBackend<Resource = R>,
    {
        if let Some(resource) = self.resource.take() {
            backend.release(resource);
        }
    }
}

/// Index-aligned stream descriptions and resource slots.
#[derive(Debug)]
pub struct StreamRegistry<R> {
    streams: StreamSet,
    slots: Vec<StreamSlot<R>>,
    buffer: Vec<u8>,
    epoch: u64,
}

impl<R> Default for StreamRegistry<R> {
    fn default() -> Self {
        Self {
            streams: StreamSet::default(),
            slots: Vec::new(),
            buffer: Vec::new(),
            epoch: 0,
        }
    }
}

impl<R> StreamRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streams(&self) -> &StreamSet {
        &self.streams
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of successful reconciliations so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn slot(&self, index: usize) -> Option<&StreamSlot<R>> {
        self.slots.get(index)
    }

    pub fn entry_mut(&mut self, index: usize) -> Option<(&StreamDescription, &mut StreamSlot<R>)> {
        let description = self.streams.get(index)?;
        let slot = self.slots.get_mut(index)?;
        Some((description, slot))
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_open()).count()
    }

    /// Refetches the stream set and brings the resources in line with it.
    pub fn reconcile<E, B>(&mut self, endpoint: &mut E, backend: &mut B) -> Result<ReconcileReport, ReconcileError>
    where
        E: Endpoint + ?Sized,
        B: RenderBackend<Resource = R>,
    {
        let set = fetch_stream_set(endpoint, &mut self.buffer).map_err(ReconcileError::Fetch)?;
        self.apply(set, backend)
    }

    /// Replaces the stream set with `set`.
    ///
    /// A stream keeps its slot when a stream with the same handle and the same
    /// size and format was present before; everything else is provisioned
    /// anew, and slots of streams that disappeared are released. On a
    /// provisioning failure every resource is released and the registry ends
    /// up empty.
    pub fn apply<B>(&mut self, set: StreamSet, backend: &mut B) -> Result<ReconcileReport, ReconcileError>
    where
        B: RenderBackend<Resource = R>,
    {
        // Duplicate keys queue up so every old slot is either reused or released.
        let mut previous: HashMap<StreamKey, VecDeque<StreamSlot<R>>> = HashMap::new();
        for (key, slot) in self.streams.iter().map(StreamKey::of).zip(self.slots.drain(..)) {
            previous.entry(key).or_default().push_back(slot);
        }
        self.streams = StreamSet::default();

        let mut report = ReconcileReport::default();
        let mut slots = Vec::with_capacity(set.len());

        for (index, description) in set.iter().enumerate() {
            if let Some(slot) = previous
                .get_mut(&StreamKey::of(description))
                .and_then(VecDeque::pop_front)
            {
                report.kept += 1;
                slots.push(slot);
                continue;
            }

            match backend.provision(description) {
                Ok(resource) => {
                    log::info!(
                        "stream {index} `{}` {}x{} {:?} ready",
                        description.name,
                        description.width,
                        description.height,
                        description.format
                    );
                    report.provisioned += 1;
                    slots.push(StreamSlot::new(resource));
                }
                Err(source) => {
                    for mut slot in slots.into_iter().chain(previous.into_values().flatten()) {
                        slot.close(backend);
                    }
                    return Err(ReconcileError::Provision {
                        index,
                        name: description.name.clone(),
                        handle: description.handle,
                        source,
                    });
                }
            }
        }

        for mut slot in previous.into_values().flatten() {
            report.released += 1;
            slot.close(backend);
        }

        self.streams = set;
        self.slots = slots;
        self.epoch += 1;
        Ok(report)
    }

    /// Releases every resource.
    pub fn clear<B>(&mut self, backend: &mut B)
    where
        B: RenderBackend<Resource = R>,
    {
        for mut slot in self.slots.drain(..) {
            slot.close(backend);
        }
        self.streams = StreamSet::default();
    }
}

/// Identity under which a resource survives reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StreamKey {
    handle: StreamHandle,
    width: u32,
    height: u32,
    format: u32,
}

impl StreamKey {
    fn of(description: &StreamDescription) -> Self {
        Self {
            handle: description.handle,
            width: description.width,
            height: description.height,
            format: description.format.as_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{description, BackendEvent, RecordingBackend, ScriptedEndpoint};
    use relay_wire::PixelFormat;

    fn two_streams() -> StreamSet {
        StreamSet::new(vec![
            description(1, "front", 640, 480),
            description(2, "wide", 1920, 1080),
        ])
    }

    #[test]
    fn two_phase_fetch_sizes_the_buffer() {
        let mut endpoint = ScriptedEndpoint::new(two_streams());
        let mut buffer = Vec::new();

        let set = fetch_stream_set(&mut endpoint, &mut buffer).unwrap();
        assert_eq!(set, two_streams());
        assert_eq!(endpoint.get_streams_calls, vec![0, two_streams().encoded_len()]);
    }

    #[test]
    fn fetch_retries_when_the_table_grows() {
        let mut endpoint = ScriptedEndpoint::new(two_streams());
        endpoint.grow_on_fetch = 1;
        let mut buffer = Vec::new();

        let set = fetch_stream_set(&mut endpoint, &mut buffer).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(endpoint.get_streams_calls.len(), 3);
    }

    #[test]
    fn fetch_gives_up_on_an_unstable_table() {
        let mut endpoint = ScriptedEndpoint::new(two_streams());
        endpoint.grow_on_fetch = usize::MAX;
        let err = fetch_stream_set(&mut endpoint, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, FetchError::Unstable));
    }

    #[test]
    fn fetch_surfaces_endpoint_failures() {
        let mut endpoint = ScriptedEndpoint::new(two_streams());
        endpoint.fail_get_streams = Some(Status::Failure(42));
        let err = fetch_stream_set(&mut endpoint, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, FetchError::Endpoint(Status::Failure(42))));
    }

    #[test]
    fn empty_set_is_legal() {
        let mut endpoint = ScriptedEndpoint::new(StreamSet::default());
        let mut backend = RecordingBackend::default();
        let mut registry = StreamRegistry::new();

        let report = registry.reconcile(&mut endpoint, &mut backend).unwrap();
        assert_eq!(report, ReconcileReport::default());
        assert!(registry.is_empty());
        assert_eq!(registry.epoch(), 1);
    }

    #[test]
    fn resources_follow_stream_order() {
        let mut endpoint = ScriptedEndpoint::new(two_streams());
        let mut backend = RecordingBackend::default();
        let mut registry = StreamRegistry::new();

        registry.reconcile(&mut endpoint, &mut backend).unwrap();

        assert_eq!(registry.len(), 2);
        for (index, description) in two_streams().iter().enumerate() {
            let resource = registry.slot(index).and_then(|s| s.resource()).unwrap();
            assert_eq!(resource.handle, description.handle);
            assert_eq!((resource.width, resource.height), (description.width, description.height));
            assert!(resource.has_target);
        }
    }

    #[test]
    fn reconcile_is_idempotent_for_unchanged_streams() {
        let mut endpoint = ScriptedEndpoint::new(two_streams());
        let mut backend = RecordingBackend::default();
        let mut registry = StreamRegistry::new();

        registry.reconcile(&mut endpoint, &mut backend).unwrap();
        let report = registry.reconcile(&mut endpoint, &mut backend).unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                kept: 2,
                provisioned: 0,
                released: 0
            }
        );
        assert_eq!(backend.count(|e| matches!(e, BackendEvent::Provisioned(_))), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn changed_set_keeps_survivors_and_releases_the_rest() {
        let mut endpoint = ScriptedEndpoint::new(two_streams());
        let mut backend = RecordingBackend::default();
        let mut registry = StreamRegistry::new();
        registry.reconcile(&mut endpoint, &mut backend).unwrap();
        let kept_id = registry.slot(1).and_then(|s| s.resource()).unwrap().id;

        endpoint.streams = StreamSet::new(vec![
            description(2, "wide", 1920, 1080),
            description(3, "top", 320, 240),
        ]);
        let report = registry.reconcile(&mut endpoint, &mut backend).unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                kept: 1,
                provisioned: 1,
                released: 1
            }
        );
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.slot(0).and_then(|s| s.resource()).unwrap().id, kept_id);
        assert_eq!(
            registry.slot(1).and_then(|s| s.resource()).unwrap().handle,
            StreamHandle(3)
        );
        assert!(backend.events.contains(&BackendEvent::Released(StreamHandle(1))));
    }

    #[test]
    fn resized_stream_is_provisioned_again() {
        let mut endpoint = ScriptedEndpoint::new(two_streams());
        let mut backend = RecordingBackend::default();
        let mut registry = StreamRegistry::new();
        registry.reconcile(&mut endpoint, &mut backend).unwrap();

        let mut resized = description(1, "front", 800, 600);
        resized.format = PixelFormat::Rgba8;
        endpoint.streams = StreamSet::new(vec![resized, description(2, "wide", 1920, 1080)]);
        let report = registry.reconcile(&mut endpoint, &mut backend).unwrap();

        assert_eq!(report.provisioned, 1);
        assert_eq!(report.released, 1);
        let resource = registry.slot(0).and_then(|s| s.resource()).unwrap();
        assert_eq!((resource.width, resource.height), (800, 600));
    }

    #[test]
    fn provisioning_failure_releases_everything() {
        let set = StreamSet::new(vec![
            description(1, "a", 64, 64),
            description(2, "b", 64, 64),
            description(3, "c", 64, 64),
        ]);
        let mut endpoint = ScriptedEndpoint::new(set);
        let mut backend = RecordingBackend::default();
        backend.fail_provision.insert(StreamHandle(2));
        let mut registry = StreamRegistry::new();

        let err = registry.reconcile(&mut endpoint, &mut backend).unwrap_err();
        match err {
            ReconcileError::Provision { index, handle, .. } => {
                assert_eq!(index, 1);
                assert_eq!(handle, StreamHandle(2));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(registry.is_empty());
        assert_eq!(
            backend.events,
            vec![
                BackendEvent::Provisioned(StreamHandle(1)),
                BackendEvent::Released(StreamHandle(1)),
            ]
        );
    }

    #[test]
    fn duplicate_streams_are_all_released() {
        let mut endpoint = ScriptedEndpoint::new(StreamSet::new(vec![
            description(1, "front", 640, 480),
            description(1, "front", 640, 480),
        ]));
        let mut backend = RecordingBackend::default();
        let mut registry = StreamRegistry::new();
        registry.reconcile(&mut endpoint, &mut backend).unwrap();
        assert_eq!(registry.open_count(), 2);

        endpoint.streams = StreamSet::new(vec![description(1, "front", 640, 480)]);
        let report = registry.reconcile(&mut endpoint, &mut backend).unwrap();
        assert_eq!(report.kept, 1);
        assert_eq!(report.released, 1);

        endpoint.streams = StreamSet::default();
        registry.reconcile(&mut endpoint, &mut backend).unwrap();

        let provisioned = backend.count(|e| matches!(e, BackendEvent::Provisioned(_)));
        let released = backend.count(|e| matches!(e, BackendEvent::Released(_)));
        assert_eq!(provisioned, 2);
        assert_eq!(released, 2);
    }

    #[test]
    fn pose_failure_count_saturates() {
        let mut slot = StreamSlot::new(());
        slot.pose_failures = u32::MAX - 1;
        assert_eq!(slot.note_pose_failure(), u32::MAX);
        assert_eq!(slot.note_pose_failure(), u32::MAX);
        slot.clear_pose_failures();
        assert_eq!(slot.note_pose_failure(), 1);
    }

    #[test]
    fn closed_slot_stays_in_place() {
        let mut endpoint = ScriptedEndpoint::new(two_streams());
        let mut backend = RecordingBackend::default();
        let mut registry = StreamRegistry::new();
        registry.reconcile(&mut endpoint, &mut backend).unwrap();

        let (_, slot) = registry.entry_mut(0).unwrap();
        slot.close(&mut backend);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.open_count(), 1);
        assert!(!registry.slot(0).unwrap().is_open());
    }
}
