pub mod cell;
pub mod sensor;
pub mod types;

use cell::OrientationCell;
use sensor::{LineSensor, MockSensor, OrientationSensor, SensorError};
use std::time::Duration;
use tbm_config::{SensorConfig, SensorSource};
use tokio::sync::watch;
use types::OrientationSample;

/// Opens a sensor driver. Runs on a blocking thread inside the acquisition task.
pub type SensorOpener =
    Box<dyn FnOnce() -> Result<Box<dyn OrientationSensor>, SensorError> + Send + 'static>;

/// Build the opener for a configured sensor source.
pub fn opener_for(source: &SensorSource) -> SensorOpener {
    match source.clone() {
        SensorSource::Mock => Box::new(|| Ok(boxed(MockSensor))),
        SensorSource::Stdin => Box::new(|| {
            tracing::info!("Reading orientation lines from stdin");
            Ok(boxed(LineSensor::stdin()))
        }),
        SensorSource::Tcp { address } => Box::new(move || {
            tracing::info!(%address, "Connecting to sensor stream");
            Ok(boxed(LineSensor::connect(&address)?))
        }),
    }
}

pub fn boxed<S: OrientationSensor + 'static>(sensor: S) -> Box<dyn OrientationSensor> {
    Box::new(sensor)
}

/// Background sensor acquisition.
///
/// Polls the sensor at a fixed interval, converts each reading into an
/// [`OrientationSample`] and publishes it into the shared [`OrientationCell`].
/// The task never touches rendering state.
pub struct Acquisition {
    cell: OrientationCell,
    stop_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl Acquisition {
    /// Spawn the acquisition task for a configured sensor. Needs a Tokio runtime.
    pub fn start(config: &SensorConfig) -> Self {
        Self::spawn(
            opener_for(&config.source),
            OrientationCell::new(),
            Duration::from_millis(config.poll_interval_ms),
        )
    }

    /// Spawn the acquisition task with an explicit sensor opener and cell.
    pub fn spawn(open: SensorOpener, cell: OrientationCell, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(acquisition_loop(open, cell.clone(), interval, stop_rx));
        Self {
            cell,
            stop_tx,
            task,
        }
    }

    /// The cell this task publishes into.
    pub fn cell(&self) -> OrientationCell {
        self.cell.clone()
    }

    /// Whether the task has exited (stopped, sensor failed or disconnected).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the loop to stop and wait up to `grace` for it.
    ///
    /// A sensor read that is still blocked after `grace` is left behind.
    pub async fn stop(self, grace: Duration) {
        let _ = self.stop_tx.send(true);
        match tokio::time::timeout(grace, self.task).await {
            Ok(Ok(())) => tracing::info!("Sensor acquisition stopped"),
            Ok(Err(e)) => tracing::error!(?e, "Sensor acquisition task failed"),
            Err(_) => tracing::warn!(
                grace_ms = grace.as_millis() as u64,
                "Sensor read still blocked, detaching acquisition task"
            ),
        }
    }
}

/// Take one reading and publish it. Returns whether anything was published.
pub fn acquire_once(
    sensor: &mut dyn OrientationSensor,
    cell: &OrientationCell,
) -> Result<bool, SensorError> {
    match sensor.read()? {
        Some(reading) => {
            cell.publish(OrientationSample::from_reading(reading));
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Unreadable readings are warned about on the first and then every
/// power-of-two occurrence, so a garbage stream cannot flood the log.
fn warn_on_skip(skipped: u64) -> bool {
    skipped.is_power_of_two()
}

async fn acquisition_loop(
    open: SensorOpener,
    cell: OrientationCell,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut sensor = match tokio::task::spawn_blocking(open).await {
        Ok(Ok(sensor)) => sensor,
        Ok(Err(e)) => {
            tracing::error!(?e, "Sensor unavailable, orientation stays at last value");
            return;
        }
        Err(e) => {
            tracing::error!(?e, "Sensor initialization task failed");
            return;
        }
    };
    tracing::info!(interval_ms = interval.as_millis() as u64, "Sensor acquisition running");

    let mut published: u64 = 0;
    let mut skipped: u64 = 0;

    loop {
        if *stop_rx.borrow() {
            break;
        }

        // Reads block, so each one runs on the blocking pool and hands the
        // sensor back afterwards.
        let step_cell = cell.clone();
        let step = tokio::task::spawn_blocking(move || {
            let outcome = acquire_once(sensor.as_mut(), &step_cell);
            (sensor, outcome)
        })
        .await;

        let outcome = match step {
            Ok((returned, outcome)) => {
                sensor = returned;
                outcome
            }
            Err(e) => {
                tracing::error!(?e, "Sensor read task failed");
                break;
            }
        };

        match outcome {
            Ok(true) => {
                published += 1;
                if published % 500 == 0 {
                    tracing::debug!(published, "Orientation samples published");
                }
            }
            Ok(false) => {}
            Err(SensorError::Disconnected) => {
                tracing::warn!("Sensor disconnected, orientation stays at last value");
                break;
            }
            Err(e) => {
                skipped += 1;
                if warn_on_skip(skipped) {
                    tracing::warn!(?e, skipped, "Skipping unreadable sensor reading");
                } else {
                    tracing::trace!(?e, "Skipping unreadable sensor reading");
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop_rx.changed() => {
                // Handle dropped without `stop`.
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor::ScriptedSensor;
    use std::io;
    use types::SensorQuaternion;

    const INTERVAL: Duration = Duration::from_millis(20);

    fn scripted(readings: Vec<SensorQuaternion>) -> SensorOpener {
        Box::new(move || Ok(boxed(ScriptedSensor::new(readings))))
    }

    fn yaw_script() -> Vec<SensorQuaternion> {
        vec![
            SensorQuaternion::from_wxyz(1.0, 0.0, 0.0, 0.0),
            SensorQuaternion::from_wxyz(0.707, 0.0, 0.0, 0.707),
            SensorQuaternion::from_wxyz(0.0, 0.0, 0.0, 1.0),
        ]
    }

    #[test]
    fn acquire_once_publishes_readings_only() {
        let cell = OrientationCell::new();
        let mut sensor = ScriptedSensor::new(yaw_script());

        let mut yaws = Vec::new();
        for _ in 0..3 {
            assert!(acquire_once(&mut sensor, &cell).unwrap());
            yaws.push(cell.snapshot().euler.yaw);
        }
        assert!(yaws[0].abs() < 0.1);
        assert!((yaws[1] - 90.0).abs() < 0.1);
        assert!((yaws[2] - 180.0).abs() < 0.1);

        // Nothing left: the last value is retained.
        assert!(!acquire_once(&mut sensor, &cell).unwrap());
        assert!((cell.snapshot().euler.yaw - 180.0).abs() < 0.1);
    }

    #[test]
    fn skip_warnings_thin_out() {
        let warned: Vec<u64> = (1..=1000).filter(|&n| warn_on_skip(n)).collect();
        assert_eq!(warned, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512]);
    }

    #[test]
    fn acquire_once_skips_stale_buffered_lines() {
        let cell = OrientationCell::new();
        let mut sensor = LineSensor::new(io::Cursor::new(
            "0 0 0 1\n0 0 0.7071068 0.7071068\n0 0 1 0\n",
        ));

        assert!(acquire_once(&mut sensor, &cell).unwrap());
        let yaw = cell.snapshot().euler.yaw;
        assert!((yaw - 180.0).abs() < 0.1, "yaw = {yaw}");
    }

    #[tokio::test]
    async fn loop_publishes_scripted_yaw_sequence() {
        let cell = OrientationCell::new();
        let mut rx = cell.subscribe();
        let acquisition = Acquisition::spawn(scripted(yaw_script()), cell.clone(), INTERVAL);

        let mut yaws = Vec::new();
        while yaws.len() < 3 {
            tokio::time::timeout(Duration::from_secs(5), rx.changed())
                .await
                .expect("publish timed out")
                .unwrap();
            yaws.push(rx.borrow_and_update().euler.yaw);
        }

        assert!(yaws.windows(2).all(|w| w[1] > w[0]), "{yaws:?}");
        assert!(yaws[0].abs() < 0.1);
        assert!((yaws[1] - 90.0).abs() < 0.1);
        assert!((yaws[2] - 180.0).abs() < 0.1);

        acquisition.stop(Duration::from_secs(1)).await;
        assert!((cell.snapshot().euler.yaw - 180.0).abs() < 0.1);
    }

    #[tokio::test]
    async fn init_failure_leaves_identity() {
        let cell = OrientationCell::new();
        let open: SensorOpener = Box::new(|| {
            Err(SensorError::Init(io::Error::new(
                io::ErrorKind::NotFound,
                "no device",
            )))
        });
        let acquisition = Acquisition::spawn(open, cell.clone(), INTERVAL);

        tokio::time::timeout(Duration::from_secs(5), async {
            while !acquisition.is_finished() {
                tokio::time::sleep(INTERVAL).await;
            }
        })
        .await
        .expect("loop should terminate on init failure");

        assert_eq!(cell.snapshot(), OrientationSample::default());
    }

    #[tokio::test]
    async fn stop_ends_the_loop() {
        let acquisition = Acquisition::spawn(
            Box::new(|| Ok(boxed(MockSensor))),
            OrientationCell::new(),
            Duration::from_secs(60),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!acquisition.is_finished());

        let started = std::time::Instant::now();
        acquisition.stop(Duration::from_secs(5)).await;
        // The 60 s sleep was interrupted by the stop signal.
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
