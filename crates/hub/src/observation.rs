use crate::error::Error;
use sample::{format_number, Kind, Sample, SampleRef, Value};
use std::collections::VecDeque;
use std::io::Write;
use std::rc::Rc;

/// Start times below this many seconds (thirty years) are offsets
/// before now; at or above, absolute epoch seconds.
pub(crate) const RELATIVE_TIME_THRESHOLD: f64 = 946_080_000.0;

pub(crate) fn resolve_start_time(start: f64) -> f64 {
    if start < RELATIVE_TIME_THRESHOLD {
        sample::now() - start
    } else {
        start
    }
}

/// Statistical transform applied to pushed samples over the buffer
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    None,
    Mean,
    StdDev,
    Max,
    Min,
}

/// Per-observation state: the sample ring buffer, acceptance filter,
/// transform, JSON extraction, and backup bookkeeping.
pub(crate) struct ObsState {
    pub buffer: VecDeque<SampleRef>,
    pub buffer_max: usize,
    pub min_period: f64,
    pub low_limit: Option<f64>,
    pub high_limit: Option<f64>,
    pub change_by: f64,
    pub transform: Transform,
    pub transform_window: usize,
    pub json_extraction: Option<(String, json::Path)>,
    pub backup_period: f64,
    pub last_backup: f64,
    pub buffer_dirty: bool,
    pub last_accepted_ts: Option<f64>,
    pub last_accepted: Option<Value>,
}

impl ObsState {
    pub fn new() -> ObsState {
        ObsState {
            buffer: VecDeque::new(),
            buffer_max: 0,
            min_period: 0.0,
            low_limit: None,
            high_limit: None,
            change_by: 0.0,
            transform: Transform::None,
            transform_window: 0,
            json_extraction: None,
            backup_period: 0.0,
            last_backup: 0.0,
            buffer_dirty: false,
            last_accepted_ts: None,
            last_accepted: None,
        }
    }

    /// Append to the ring buffer, evicting the oldest on overflow.
    pub fn append(&mut self, sample: SampleRef) {
        if self.buffer_max == 0 {
            return;
        }
        self.buffer.push_back(sample);
        while self.buffer.len() > self.buffer_max {
            self.buffer.pop_front();
        }
        self.buffer_dirty = true;
    }

    /// Resize the ring, discarding oldest samples that no longer fit.
    pub fn set_buffer_max(&mut self, max: usize) {
        self.buffer_max = max;
        while self.buffer.len() > max {
            self.buffer.pop_front();
            self.buffer_dirty = true;
        }
    }

    pub fn backup_due(&self, now: f64) -> bool {
        self.buffer_max > 0
            && self.backup_period > 0.0
            && self.buffer_dirty
            && now - self.last_backup >= self.backup_period
    }

    /// Replace the pushed sample with the configured transform over the
    /// buffer window. Identity when no transform is set or the window
    /// holds no numeric samples.
    pub fn apply_transform(&self, sample: &SampleRef) -> SampleRef {
        if matches!(self.transform, Transform::None) {
            return sample.clone();
        }
        let window = self.numeric_window();
        if window.is_empty() {
            return sample.clone();
        }
        let value = match self.transform {
            Transform::None => return sample.clone(),
            Transform::Mean => mean(&window),
            Transform::StdDev => std_dev(&window),
            Transform::Max => window.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Transform::Min => window.iter().copied().fold(f64::INFINITY, f64::min),
        };
        Rc::new(Sample::new(
            sample.timestamp(),
            Value::Numeric(value),
        ))
    }

    /// The trailing `transform_window` numeric samples of the buffer;
    /// zero selects the whole buffer.
    fn numeric_window(&self) -> Vec<f64> {
        let take = if self.transform_window == 0 {
            self.buffer.len()
        } else {
            self.transform_window
        };
        self.buffer
            .iter()
            .rev()
            .take(take)
            .filter_map(|sample| sample.value().as_numeric())
            .collect()
    }

    /// Evaluate the acceptance filter: range limits, then throttling,
    /// then the dead band. Accepted samples update the last-accepted
    /// record.
    pub fn filter(&mut self, ts: f64, value: &Value) -> bool {
        if let Value::Numeric(v) = value {
            let v = *v;
            match (self.low_limit, self.high_limit) {
                (Some(low), Some(high)) if low > high => {
                    // Inverted limits select a band-stop: the open
                    // interval (high, low) is rejected.
                    if v > high && v < low {
                        return false;
                    }
                }
                (low, high) => {
                    if matches!(high, Some(high) if v > high) {
                        return false;
                    }
                    if matches!(low, Some(low) if v < low) {
                        return false;
                    }
                }
            }
        }

        if self.min_period > 0.0 {
            if let Some(last) = self.last_accepted_ts {
                if ts - last < self.min_period {
                    return false;
                }
            }
        }

        if self.change_by > 0.0 {
            match (value, &self.last_accepted) {
                // Triggers always pass the dead band.
                (Value::Trigger, _) => {}
                (Value::Numeric(v), Some(Value::Numeric(last))) => {
                    if (v - last).abs() < self.change_by {
                        return false;
                    }
                }
                (value, Some(last)) if value == last => return false,
                _ => {}
            }
        }

        self.last_accepted_ts = Some(ts);
        self.last_accepted = Some(value.clone());
        true
    }

    fn numeric_since<'s>(&'s self, start: f64) -> impl Iterator<Item = f64> + 's {
        self.buffer
            .iter()
            .filter(move |sample| sample.timestamp() > start)
            .filter_map(|sample| sample.value().as_numeric())
    }

    pub fn min_since(&self, start: f64) -> f64 {
        self.numeric_since(start).fold(f64::NAN, f64::min)
    }

    pub fn max_since(&self, start: f64) -> f64 {
        self.numeric_since(start).fold(f64::NAN, f64::max)
    }

    pub fn mean_since(&self, start: f64) -> f64 {
        let (count, sum) = self
            .numeric_since(start)
            .fold((0u32, 0.0), |(count, sum), v| (count + 1, sum + v));
        sum / count as f64
    }

    pub fn std_dev_since(&self, start: f64) -> f64 {
        let window: Vec<f64> = self.numeric_since(start).collect();
        if window.is_empty() {
            return f64::NAN;
        }
        std_dev(&window)
    }

    /// Write buffered samples newer than `start_after` as a JSON array
    /// of `{"t":<seconds>,"v":<value>}` elements; triggers omit `"v"`.
    pub fn write_buffer_json(&self, start_after: f64, w: &mut dyn Write) -> std::io::Result<()> {
        write!(w, "[")?;
        let mut first = true;
        for sample in self.buffer.iter().filter(|s| s.timestamp() > start_after) {
            if !first {
                write!(w, ",")?;
            }
            first = false;
            match sample.value() {
                Value::Trigger => write!(w, "{{\"t\":{:.3}}}", sample.timestamp())?,
                value => write!(
                    w,
                    "{{\"t\":{:.3},\"v\":{}}}",
                    sample.timestamp(),
                    value.to_json_text()
                )?,
            }
        }
        write!(w, "]")
    }

    /// Serialize the buffer and last-backup time as an opaque blob.
    /// Decoding an encoded blob reproduces it byte for byte.
    pub fn encode_backup(&self) -> Vec<u8> {
        let backup = Backup {
            last_backup: self.last_backup,
            samples: self
                .buffer
                .iter()
                .map(|sample| BackupSample {
                    t: sample.timestamp(),
                    k: sample.kind(),
                    v: match sample.value() {
                        Value::Trigger => None,
                        Value::Boolean(true) => Some("true".to_string()),
                        Value::Boolean(false) => Some("false".to_string()),
                        Value::Numeric(v) => Some(format_number(*v)),
                        Value::String(s) => Some(s.to_string()),
                        Value::Json(s) => Some(s.to_string()),
                    },
                })
                .collect(),
        };
        serde_json::to_vec(&backup).unwrap()
    }

    /// Load buffer contents and last-backup time from a blob written by
    /// `encode_backup`.
    pub fn restore_backup(&mut self, blob: &[u8]) -> Result<(), Error> {
        let backup: Backup =
            serde_json::from_slice(blob).map_err(|_| Error::FormatMismatch)?;
        self.last_backup = backup.last_backup;
        self.buffer = backup
            .samples
            .into_iter()
            .map(|sample| {
                let text = sample.v.unwrap_or_default();
                let value = match sample.k {
                    Kind::Trigger => Value::Trigger,
                    Kind::Boolean => Value::Boolean(text == "true"),
                    Kind::Numeric => Value::Numeric(json::parse_number(&text)),
                    Kind::String => Value::String(text.into()),
                    Kind::Json => Value::Json(text.into()),
                };
                Rc::new(Sample::new(sample.t, value))
            })
            .collect();
        self.buffer_dirty = false;
        Ok(())
    }
}

fn mean(window: &[f64]) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}

/// Population standard deviation.
fn std_dev(window: &[f64]) -> f64 {
    let mean = mean(window);
    let variance = window
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / window.len() as f64;
    variance.sqrt()
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Backup {
    last_backup: f64,
    samples: Vec<BackupSample>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct BackupSample {
    t: f64,
    k: Kind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    v: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn numeric(ts: f64, v: f64) -> SampleRef {
        Rc::new(Sample::new(ts, Value::Numeric(v)))
    }

    #[test]
    fn test_ring_buffer_eviction() {
        let mut obs = ObsState::new();
        obs.set_buffer_max(3);
        for i in 0..5 {
            obs.append(numeric(i as f64 + 1.0, i as f64));
        }
        let held: Vec<f64> = obs
            .buffer
            .iter()
            .filter_map(|s| s.value().as_numeric())
            .collect();
        assert_eq!(held, vec![2.0, 3.0, 4.0]);

        obs.set_buffer_max(2);
        assert_eq!(obs.buffer.len(), 2);
    }

    #[test]
    fn test_min_period_throttle() {
        let mut obs = ObsState::new();
        obs.min_period = 1.0;
        let accepted: Vec<bool> = [10.0, 10.5, 11.0, 11.6, 12.5]
            .iter()
            .map(|ts| obs.filter(*ts, &Value::Numeric(1.0)))
            .collect();
        assert_eq!(accepted, vec![true, false, true, false, true]);
    }

    #[test]
    fn test_range_limits() {
        let mut obs = ObsState::new();
        obs.low_limit = Some(0.0);
        obs.high_limit = Some(10.0);
        assert!(obs.filter(1.0, &Value::Numeric(5.0)));
        assert!(!obs.filter(2.0, &Value::Numeric(-1.0)));
        assert!(!obs.filter(3.0, &Value::Numeric(11.0)));

        // Non-numeric kinds bypass the range check.
        assert!(obs.filter(4.0, &Value::Boolean(true)));
    }

    #[test]
    fn test_band_stop_when_limits_inverted() {
        let mut obs = ObsState::new();
        obs.low_limit = Some(10.0);
        obs.high_limit = Some(2.0);
        assert!(obs.filter(1.0, &Value::Numeric(1.0)));
        assert!(!obs.filter(2.0, &Value::Numeric(5.0)));
        assert!(obs.filter(3.0, &Value::Numeric(12.0)));
        assert!(obs.filter(4.0, &Value::Numeric(2.0)));
        assert!(obs.filter(5.0, &Value::Numeric(10.0)));
    }

    #[test]
    fn test_dead_band() {
        let mut obs = ObsState::new();
        obs.change_by = 0.5;
        assert!(obs.filter(1.0, &Value::Numeric(1.0)));
        assert!(!obs.filter(2.0, &Value::Numeric(1.2)));
        assert!(obs.filter(3.0, &Value::Numeric(1.6)));

        // Non-numeric values accept only on change.
        let mut obs = ObsState::new();
        obs.change_by = 1.0;
        assert!(obs.filter(1.0, &Value::String("on".into())));
        assert!(!obs.filter(2.0, &Value::String("on".into())));
        assert!(obs.filter(3.0, &Value::String("off".into())));

        // Triggers always pass.
        assert!(obs.filter(4.0, &Value::Trigger));
        assert!(obs.filter(5.0, &Value::Trigger));
    }

    #[test]
    fn test_transforms() {
        let mut obs = ObsState::new();
        obs.set_buffer_max(10);
        for (ts, v) in [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)] {
            obs.append(numeric(ts, v));
        }
        let pushed = numeric(3.0, 6.0);

        obs.transform = Transform::Mean;
        assert_eq!(obs.apply_transform(&pushed).value(), &Value::Numeric(4.0));
        obs.transform = Transform::Max;
        assert_eq!(obs.apply_transform(&pushed).value(), &Value::Numeric(6.0));
        obs.transform = Transform::Min;
        assert_eq!(obs.apply_transform(&pushed).value(), &Value::Numeric(2.0));
        obs.transform = Transform::StdDev;
        let out = obs.apply_transform(&pushed).value().as_numeric().unwrap();
        assert!((out - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);

        // A two-sample window restricts the aggregate.
        obs.transform = Transform::Mean;
        obs.transform_window = 2;
        assert_eq!(obs.apply_transform(&pushed).value(), &Value::Numeric(5.0));
    }

    #[test]
    fn test_queries_respect_start_time() {
        let mut obs = ObsState::new();
        obs.set_buffer_max(10);
        let base = 1_600_000_000.0;
        for (offset, v) in [(1.0, 5.0), (2.0, 1.0), (3.0, 9.0)] {
            obs.append(numeric(base + offset, v));
        }

        assert_eq!(obs.min_since(base), 1.0);
        assert_eq!(obs.max_since(base), 9.0);
        assert_eq!(obs.mean_since(base), 5.0);
        assert_eq!(obs.mean_since(base + 1.0), 5.0);
        assert!(obs.mean_since(base + 3.0).is_nan());
        assert!(obs.std_dev_since(base + 3.0).is_nan());
    }

    #[test]
    fn test_buffer_json_format() {
        let mut obs = ObsState::new();
        obs.set_buffer_max(10);
        obs.append(Rc::new(Sample::new(10.0, Value::Trigger)));
        obs.append(numeric(11.5, 1.5));
        obs.append(Rc::new(Sample::new(12.0, Value::String("dim".into()))));

        let mut out = Vec::new();
        obs.write_buffer_json(10.0, &mut out).unwrap();
        insta::assert_snapshot!(
            String::from_utf8(out).unwrap(),
            @r#"[{"t":11.500,"v":1.500000},{"t":12.000,"v":"dim"}]"#
        );
    }

    #[quickcheck_macros::quickcheck]
    fn throttled_accepts_are_min_period_apart(steps: Vec<u8>) -> bool {
        let mut obs = ObsState::new();
        obs.min_period = 1.0;
        let mut ts = 0.0;
        let mut accepted = Vec::new();
        for step in steps {
            ts += step as f64 / 100.0;
            if obs.filter(ts, &Value::Numeric(ts)) {
                accepted.push(ts);
            }
        }
        accepted.windows(2).all(|pair| pair[1] - pair[0] >= 1.0)
    }

    #[test]
    fn test_backup_round_trip_is_byte_identical() {
        let mut obs = ObsState::new();
        obs.set_buffer_max(10);
        obs.append(Rc::new(Sample::new(10.0, Value::Trigger)));
        obs.append(numeric(11.0, f64::NAN));
        obs.append(numeric(12.0, -2.5));
        obs.append(Rc::new(Sample::new(13.0, Value::Boolean(true))));
        obs.append(Rc::new(Sample::new(14.0, Value::Json("{\"a\":1}".into()))));
        obs.last_backup = 14.5;

        let blob = obs.encode_backup();

        let mut restored = ObsState::new();
        restored.restore_backup(&blob).unwrap();
        assert_eq!(restored.last_backup, 14.5);
        assert_eq!(restored.buffer.len(), 5);
        assert_eq!(restored.encode_backup(), blob);
    }
}
