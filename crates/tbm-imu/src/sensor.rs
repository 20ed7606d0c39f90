use crate::types::SensorQuaternion;
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};
use std::net::TcpStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Sensor initialization failed: {0}")]
    Init(#[source] io::Error),
    #[error("Sensor read failed: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed sensor line {line:?}: {reason}")]
    Malformed { line: String, reason: &'static str },
    #[error("Sensor disconnected")]
    Disconnected,
}

/// Blocking source of orientation readings.
///
/// `read` is called once per acquisition cycle and may block for as long as
/// the underlying bus needs. `Ok(None)` means no new reading this cycle.
pub trait OrientationSensor: Send {
    fn read(&mut self) -> Result<Option<SensorQuaternion>, SensorError>;
}

/// Sensor that never produces a reading, for running without hardware.
pub struct MockSensor;

impl OrientationSensor for MockSensor {
    fn read(&mut self) -> Result<Option<SensorQuaternion>, SensorError> {
        Ok(None)
    }
}

/// Replays a fixed list of readings, one per cycle, then reports none.
pub struct ScriptedSensor {
    readings: VecDeque<SensorQuaternion>,
}

impl ScriptedSensor {
    pub fn new(readings: impl IntoIterator<Item = SensorQuaternion>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
        }
    }
}

impl OrientationSensor for ScriptedSensor {
    fn read(&mut self) -> Result<Option<SensorQuaternion>, SensorError> {
        Ok(self.readings.pop_front())
    }
}

/// Text line protocol: one `i j k real` reading per line.
///
/// Components are separated by whitespace and/or commas. A blank line or
/// `none` means the sensor had nothing. End of stream is a disconnect.
///
/// Each `read` blocks for one line, then drains every further complete line
/// already buffered and returns the newest reading, so a producer faster
/// than the poll rate never builds up a backlog.
pub struct LineSensor<R> {
    reader: BufReader<R>,
    line: String,
}

impl<R: Read + Send> LineSensor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: String::new(),
        }
    }

    fn next_line(&mut self) -> Result<Option<SensorQuaternion>, SensorError> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Err(SensorError::Disconnected);
        }
        parse_line(&self.line)
    }

    /// Whether another complete line can be read without blocking.
    fn line_buffered(&self) -> bool {
        self.reader.buffer().contains(&b'\n')
    }
}

impl LineSensor<io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(io::stdin())
    }
}

impl LineSensor<TcpStream> {
    pub fn connect(address: &str) -> Result<Self, SensorError> {
        let stream = TcpStream::connect(address).map_err(SensorError::Init)?;
        stream.set_nodelay(true).map_err(SensorError::Init)?;
        tracing::info!(%address, "Connected to sensor stream");
        Ok(Self::new(stream))
    }
}

impl<R: Read + Send> OrientationSensor for LineSensor<R> {
    fn read(&mut self) -> Result<Option<SensorQuaternion>, SensorError> {
        let mut latest = None;
        let mut malformed = None;
        loop {
            match self.next_line() {
                Ok(Some(reading)) => latest = Some(reading),
                Ok(None) => {}
                Err(e @ SensorError::Malformed { .. }) => malformed = Some(e),
                Err(e) => return Err(e),
            }
            if !self.line_buffered() {
                break;
            }
        }

        match (latest, malformed) {
            (Some(reading), _) => Ok(Some(reading)),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }
}

/// Parse one protocol line.
pub fn parse_line(line: &str) -> Result<Option<SensorQuaternion>, SensorError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let malformed = |reason| SensorError::Malformed {
        line: trimmed.to_string(),
        reason,
    };

    let mut components = [0f32; 4];
    let mut count = 0;
    for field in trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
    {
        if count == components.len() {
            return Err(malformed("more than four components"));
        }
        components[count] = field.parse().map_err(|_| malformed("not a number"))?;
        count += 1;
    }
    if count < components.len() {
        return Err(malformed("fewer than four components"));
    }
    if components.iter().any(|c| !c.is_finite()) {
        return Err(malformed("non-finite component"));
    }

    let [i, j, k, real] = components;
    Ok(Some(SensorQuaternion::new(i, j, k, real)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_whitespace_and_commas() {
        let q = parse_line("0.1 0.2, 0.3 ,0.9\n").unwrap().unwrap();
        assert_eq!(q, SensorQuaternion::new(0.1, 0.2, 0.3, 0.9));
    }

    #[test]
    fn blank_and_none_mean_no_reading() {
        assert!(parse_line("\n").unwrap().is_none());
        assert!(parse_line("  NONE \n").unwrap().is_none());
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(matches!(
            parse_line("0.1 0.2 0.3"),
            Err(SensorError::Malformed { .. })
        ));
        assert!(matches!(
            parse_line("0.1 0.2 0.3 0.4 0.5"),
            Err(SensorError::Malformed { .. })
        ));
        assert!(matches!(
            parse_line("0.1 x 0.3 0.4"),
            Err(SensorError::Malformed { .. })
        ));
        assert!(matches!(
            parse_line("0.1 NaN 0.3 0.4"),
            Err(SensorError::Malformed { .. })
        ));
    }

    #[test]
    fn line_sensor_returns_newest_buffered_reading() {
        let input = "0 0 0 1\n\ngarbage\n0 0 1 0\n";
        let mut sensor = LineSensor::new(Cursor::new(input));

        assert_eq!(
            sensor.read().unwrap(),
            Some(SensorQuaternion::new(0.0, 0.0, 1.0, 0.0))
        );
        assert!(matches!(sensor.read(), Err(SensorError::Disconnected)));
    }

    #[test]
    fn line_sensor_reports_none_and_malformed_when_nothing_valid_is_buffered() {
        let mut sensor = LineSensor::new(Cursor::new("none\n\n"));
        assert_eq!(sensor.read().unwrap(), None);

        let mut sensor = LineSensor::new(Cursor::new("1 2 3\n\n"));
        assert!(matches!(sensor.read(), Err(SensorError::Malformed { .. })));
    }

    #[test]
    fn line_sensor_leaves_partial_line_for_next_read() {
        // The trailing reading has no newline yet; it is read (and then hits
        // end of stream) on the following call.
        let mut sensor = LineSensor::new(Cursor::new("0 0 0 1\n0 0 1 0"));
        assert_eq!(
            sensor.read().unwrap(),
            Some(SensorQuaternion::new(0.0, 0.0, 0.0, 1.0))
        );
        assert_eq!(
            sensor.read().unwrap(),
            Some(SensorQuaternion::new(0.0, 0.0, 1.0, 0.0))
        );
        assert!(matches!(sensor.read(), Err(SensorError::Disconnected)));
    }

    #[test]
    fn scripted_sensor_runs_dry() {
        let mut sensor = ScriptedSensor::new([SensorQuaternion::from_wxyz(1.0, 0.0, 0.0, 0.0)]);
        assert!(sensor.read().unwrap().is_some());
        assert!(sensor.read().unwrap().is_none());
        assert!(sensor.read().unwrap().is_none());
    }
}
