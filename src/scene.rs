use std::time::{Duration, Instant};

use log::info;
use rand::Rng;

use crate::galaxy::{self, PointCloud};
use crate::params::GalaxyParams;

/// Destination for generated point clouds.
///
/// The renderer implements this for GPU vertex buffers; tests substitute a
/// recording fake to observe the release/upload order.
pub trait PointCloudBackend {
    /// Handle to an uploaded cloud.
    type Batch;

    /// Uploads a cloud and returns the handle that keeps it alive.
    fn upload(&mut self, cloud: &PointCloud, point_size: f32) -> Self::Batch;

    /// Releases a previously uploaded cloud.
    fn release(&mut self, batch: Self::Batch);
}

/// Owns the single live galaxy batch and drives its regeneration.
///
/// The scene starts empty and becomes populated on the first
/// [`GalaxyScene::regenerate`]; it never returns to empty. Teardown happens
/// with the process, when the backend's device reclaims the final batch.
pub struct GalaxyScene<B: PointCloudBackend> {
    batch: Option<B::Batch>,
    point_count: u32,
    last_regeneration: Option<Duration>,
}

impl<B: PointCloudBackend> Default for GalaxyScene<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: PointCloudBackend> GalaxyScene<B> {
    /// Creates an empty scene with no live batch.
    pub fn new() -> Self {
        Self {
            batch: None,
            point_count: 0,
            last_regeneration: None,
        }
    }

    /// True once a galaxy batch is live.
    pub fn is_populated(&self) -> bool {
        self.batch.is_some()
    }

    /// Number of points in the live batch, 0 while empty.
    pub fn point_count(&self) -> u32 {
        self.point_count
    }

    /// Time the last regeneration spent generating and uploading.
    pub fn last_regeneration(&self) -> Option<Duration> {
        self.last_regeneration
    }

    /// Handle of the live batch, if any.
    pub fn batch(&self) -> Option<&B::Batch> {
        self.batch.as_ref()
    }

    /// Replaces the live galaxy with one generated from `params`.
    ///
    /// An existing batch is released before the replacement is generated
    /// and uploaded, so at most one galaxy ever holds GPU memory.
    pub fn regenerate(&mut self, backend: &mut B, params: &GalaxyParams, rng: &mut impl Rng) {
        if let Some(old) = self.batch.take() {
            backend.release(old);
        }

        let started = Instant::now();
        let cloud = galaxy::generate(params, rng);
        let batch = backend.upload(&cloud, params.point_size);
        let elapsed = started.elapsed();

        self.batch = Some(batch);
        self.point_count = params.count;
        self.last_regeneration = Some(elapsed);
        info!("regenerated galaxy: {} points in {elapsed:?}", params.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Debug, PartialEq, Clone, Copy)]
    enum BackendEvent {
        Upload(u32),
        Release(u32),
    }

    #[derive(Default)]
    struct RecordingBackend {
        events: Vec<BackendEvent>,
        next_id: u32,
        last_point_size: f32,
    }

    impl PointCloudBackend for RecordingBackend {
        type Batch = u32;

        fn upload(&mut self, cloud: &PointCloud, point_size: f32) -> u32 {
            assert!(!cloud.is_empty());
            let id = self.next_id;
            self.next_id += 1;
            self.last_point_size = point_size;
            self.events.push(BackendEvent::Upload(id));
            id
        }

        fn release(&mut self, batch: u32) {
            self.events.push(BackendEvent::Release(batch));
        }
    }

    fn small_params() -> GalaxyParams {
        GalaxyParams {
            count: 100,
            ..GalaxyParams::default()
        }
    }

    #[test]
    fn first_regenerate_populates_the_scene() {
        let mut backend = RecordingBackend::default();
        let mut scene = GalaxyScene::new();
        assert!(!scene.is_populated());

        scene.regenerate(&mut backend, &small_params(), &mut StdRng::seed_from_u64(1));

        assert!(scene.is_populated());
        assert_eq!(scene.point_count(), 100);
        assert!(scene.last_regeneration().is_some());
        assert_eq!(backend.events, vec![BackendEvent::Upload(0)]);
        assert!((backend.last_point_size - small_params().point_size).abs() < f32::EPSILON);
    }

    #[test]
    fn regenerate_releases_the_old_batch_before_uploading() {
        let mut backend = RecordingBackend::default();
        let mut scene = GalaxyScene::new();
        let mut rng = StdRng::seed_from_u64(2);

        for _ in 0..5 {
            scene.regenerate(&mut backend, &small_params(), &mut rng);
        }

        let uploads = backend
            .events
            .iter()
            .filter(|e| matches!(e, BackendEvent::Upload(_)))
            .count();
        let releases = backend
            .events
            .iter()
            .filter(|e| matches!(e, BackendEvent::Release(_)))
            .count();
        assert_eq!(uploads, 5);
        assert_eq!(releases, 4);

        // Exactly one batch stays live, and every replacement batch is
        // created only after its predecessor was released.
        for (i, event) in backend.events.iter().enumerate() {
            match event {
                BackendEvent::Upload(id) => assert_eq!(i as u32, id * 2),
                BackendEvent::Release(id) => assert_eq!(i as u32, id * 2 + 1),
            }
        }
        assert_eq!(scene.batch(), Some(&4));
    }

    #[test]
    fn regenerate_tracks_the_latest_parameters() {
        let mut backend = RecordingBackend::default();
        let mut scene = GalaxyScene::new();
        let mut rng = StdRng::seed_from_u64(3);

        scene.regenerate(&mut backend, &small_params(), &mut rng);
        let bigger = GalaxyParams {
            count: 250,
            ..small_params()
        };
        scene.regenerate(&mut backend, &bigger, &mut rng);

        assert_eq!(scene.point_count(), 250);
    }
}
