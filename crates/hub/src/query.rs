//! The `query` surface: typed value getters, observation statistics,
//! and buffered-sample reads.

use crate::error::Error;
use crate::hub::{Hub, SessionId};
use crate::observation::resolve_start_time;
use crate::tree::EntryKind;
use sample::{Kind, SampleRef};
use std::io::Write;

impl Hub {
    /// Kind of the entry at `path`.
    pub fn entry_kind(&self, session: Option<SessionId>, path: &str) -> Result<EntryKind, Error> {
        let entry = self.resolve(session, path)?;
        Ok(self.kind_of_entry(entry))
    }

    pub fn get_timestamp(&self, session: Option<SessionId>, path: &str) -> Result<f64, Error> {
        Ok(self.current_of(session, path)?.timestamp())
    }

    pub fn get_boolean(
        &self,
        session: Option<SessionId>,
        path: &str,
    ) -> Result<(f64, bool), Error> {
        let sample = self.current_of(session, path)?;
        let value = sample.value().as_boolean().ok_or(Error::FormatMismatch)?;
        Ok((sample.timestamp(), value))
    }

    pub fn get_numeric(
        &self,
        session: Option<SessionId>,
        path: &str,
    ) -> Result<(f64, f64), Error> {
        let sample = self.current_of(session, path)?;
        let value = sample.value().as_numeric().ok_or(Error::FormatMismatch)?;
        Ok((sample.timestamp(), value))
    }

    pub fn get_string(
        &self,
        session: Option<SessionId>,
        path: &str,
    ) -> Result<(f64, String), Error> {
        let sample = self.current_of(session, path)?;
        let value = sample.value().as_string().ok_or(Error::FormatMismatch)?;
        Ok((sample.timestamp(), value.to_string()))
    }

    /// Any current value reads as JSON through the canonical rendering.
    pub fn get_json(
        &self,
        session: Option<SessionId>,
        path: &str,
    ) -> Result<(f64, String), Error> {
        let sample = self.current_of(session, path)?;
        Ok((sample.timestamp(), sample.to_json_text()))
    }

    pub fn get_data_type(&self, session: Option<SessionId>, path: &str) -> Result<Kind, Error> {
        let (_, rid) = self.resolve_resource(session, path)?;
        Ok(self.resources[rid].data_type())
    }

    /// Units of the carried value; empty means unspecified.
    pub fn get_units(&self, session: Option<SessionId>, path: &str) -> Result<String, Error> {
        let (_, rid) = self.resolve_resource(session, path)?;
        Ok(self.resources[rid].units.clone())
    }

    pub fn get_json_example(
        &self,
        session: Option<SessionId>,
        path: &str,
    ) -> Result<String, Error> {
        let (_, rid) = self.resolve_resource(session, path)?;
        self.resources[rid]
            .json_example
            .as_ref()
            .map(|example| example.to_string())
            .ok_or(Error::Unavailable)
    }

    pub fn get_min(&self, path: &str, start_time: f64) -> Result<f64, Error> {
        self.aggregate(path, start_time, |obs, start| obs.min_since(start))
    }

    pub fn get_max(&self, path: &str, start_time: f64) -> Result<f64, Error> {
        self.aggregate(path, start_time, |obs, start| obs.max_since(start))
    }

    pub fn get_mean(&self, path: &str, start_time: f64) -> Result<f64, Error> {
        self.aggregate(path, start_time, |obs, start| obs.mean_since(start))
    }

    pub fn get_std_dev(&self, path: &str, start_time: f64) -> Result<f64, Error> {
        self.aggregate(path, start_time, |obs, start| obs.std_dev_since(start))
    }

    /// Write buffered samples newer than `start_after` to `writer` as a
    /// JSON array. The completion callback observes the outcome; write
    /// failures surface there as `CommError`.
    pub fn read_buffer_json<W: Write>(
        &self,
        path: &str,
        start_after: f64,
        writer: &mut W,
        completion: impl FnOnce(Result<(), Error>),
    ) -> Result<(), Error> {
        let (_, rid) = self.resolve_observation(path)?;
        let obs = match self.resources[rid].obs() {
            Some(obs) => obs,
            None => return Err(Error::Unsupported),
        };
        let result = obs
            .write_buffer_json(resolve_start_time(start_after), writer)
            .map_err(|err| {
                tracing::warn!(%err, "failed writing buffered samples");
                Error::CommError
            });
        completion(result);
        Ok(())
    }

    fn current_of(&self, session: Option<SessionId>, path: &str) -> Result<SampleRef, Error> {
        let (_, rid) = self.resolve_resource(session, path)?;
        self.resources[rid]
            .current
            .clone()
            .ok_or(Error::Unavailable)
    }

    fn aggregate(
        &self,
        path: &str,
        start_time: f64,
        f: impl FnOnce(&crate::observation::ObsState, f64) -> f64,
    ) -> Result<f64, Error> {
        let (_, rid) = self.resolve_observation(path)?;
        let obs = match self.resources[rid].obs() {
            Some(obs) => obs,
            None => return Err(Error::Unsupported),
        };
        Ok(f(obs, resolve_start_time(start_time)))
    }
}
