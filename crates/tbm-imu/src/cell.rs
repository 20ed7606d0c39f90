use crate::types::OrientationSample;
use std::sync::Arc;
use tokio::sync::watch;

/// Latest-value cell holding the current orientation.
///
/// Each `publish` replaces the stored sample; readers only ever see whole
/// samples. There is no queue: samples nobody looked at are dropped.
/// Cloning shares the same slot.
#[derive(Clone)]
pub struct OrientationCell {
    tx: Arc<watch::Sender<OrientationSample>>,
}

impl OrientationCell {
    /// New cell holding the identity orientation.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(OrientationSample::default());
        Self { tx: Arc::new(tx) }
    }

    /// Overwrite the stored sample.
    pub fn publish(&self, sample: OrientationSample) {
        self.tx.send_replace(sample);
    }

    /// Copy of the stored sample. The lock is held only for the copy.
    pub fn snapshot(&self) -> OrientationSample {
        *self.tx.borrow()
    }

    /// Receiver that is woken on every publish.
    #[cfg(test)]
    pub(crate) fn subscribe(&self) -> watch::Receiver<OrientationSample> {
        self.tx.subscribe()
    }
}

impl Default for OrientationCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EulerAngles;
    use glam::Quat;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    /// Every field carries the same value, so a torn read shows up as a mismatch.
    fn uniform_sample(v: f32) -> OrientationSample {
        OrientationSample {
            quaternion: Quat::from_xyzw(v, v, v, v),
            euler: EulerAngles {
                roll: v,
                pitch: v,
                yaw: v,
            },
        }
    }

    fn is_uniform(sample: &OrientationSample) -> bool {
        let q = sample.quaternion;
        let v = q.w;
        [q.x, q.y, q.z, sample.euler.roll, sample.euler.pitch, sample.euler.yaw]
            .iter()
            .all(|&c| c == v)
    }

    #[test]
    fn starts_at_identity() {
        let cell = OrientationCell::new();
        assert_eq!(cell.snapshot(), OrientationSample::default());
    }

    #[test]
    fn publish_overwrites() {
        let cell = OrientationCell::new();
        cell.publish(uniform_sample(1.0));
        cell.publish(uniform_sample(2.0));
        assert_eq!(cell.snapshot(), uniform_sample(2.0));

        // Clones share the slot.
        let reader = cell.clone();
        cell.publish(uniform_sample(3.0));
        assert_eq!(reader.snapshot(), uniform_sample(3.0));
    }

    #[test]
    fn concurrent_readers_never_see_torn_samples() {
        let cell = OrientationCell::new();
        cell.publish(uniform_sample(0.0));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let cell = cell.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut reads = 0u64;
                    loop {
                        let sample = cell.snapshot();
                        assert!(is_uniform(&sample), "torn sample: {sample:?}");
                        reads += 1;
                        if done.load(Ordering::Relaxed) {
                            break reads;
                        }
                    }
                })
            })
            .collect();

        let writer = {
            let cell = cell.clone();
            thread::spawn(move || {
                for i in 1..=20_000 {
                    cell.publish(uniform_sample(i as f32));
                }
            })
        };

        writer.join().unwrap();
        done.store(true, Ordering::Relaxed);
        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert_eq!(cell.snapshot(), uniform_sample(20_000.0));
    }

    #[tokio::test]
    async fn subscribers_are_woken_by_publish() {
        let cell = OrientationCell::new();
        let mut rx = cell.subscribe();
        cell.publish(uniform_sample(5.0));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), uniform_sample(5.0));
    }
}
