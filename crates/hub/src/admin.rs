//! The `admin` surface: observation management, routing, overrides and
//! defaults. Paths are absolute; observation paths may also be given
//! relative to `/obs`.

use crate::error::Error;
use crate::hub::Hub;
use crate::observation::Transform;
use crate::tree::ResourceId;
use sample::{Sample, Value};
use std::rc::Rc;

impl Hub {
    pub fn create_obs(&mut self, path: &str) -> Result<(), Error> {
        self.create_observation(path)
    }

    pub fn delete_obs(&mut self, path: &str) -> Result<(), Error> {
        let (entry, _) = self.resolve_observation(path)?;
        self.delete_observation_entry(entry);
        Ok(())
    }

    /// Minimum seconds between accepted samples; zero disables.
    pub fn set_min_period(&mut self, path: &str, period: f64) -> Result<(), Error> {
        self.with_observation(path, |obs| obs.min_period = period.max(0.0))
    }

    /// Reject numeric samples above this limit; NaN clears it.
    pub fn set_high_limit(&mut self, path: &str, limit: f64) -> Result<(), Error> {
        self.with_observation(path, |obs| {
            obs.high_limit = (!limit.is_nan()).then_some(limit)
        })
    }

    /// Reject numeric samples below this limit; NaN clears it.
    pub fn set_low_limit(&mut self, path: &str, limit: f64) -> Result<(), Error> {
        self.with_observation(path, |obs| {
            obs.low_limit = (!limit.is_nan()).then_some(limit)
        })
    }

    /// Dead band: the least change from the last accepted value that a
    /// new sample must show; zero disables.
    pub fn set_change_by(&mut self, path: &str, change: f64) -> Result<(), Error> {
        self.with_observation(path, |obs| obs.change_by = change.max(0.0))
    }

    /// Statistical transform over the trailing `window` buffered
    /// samples; a zero window spans the whole buffer.
    pub fn set_transform(
        &mut self,
        path: &str,
        transform: Transform,
        window: usize,
    ) -> Result<(), Error> {
        self.with_observation(path, |obs| {
            obs.transform = transform;
            obs.transform_window = window;
        })
    }

    pub fn set_buffer_max_count(&mut self, path: &str, count: usize) -> Result<(), Error> {
        self.with_observation(path, |obs| obs.set_buffer_max(count))
    }

    pub fn set_buffer_backup_period(&mut self, path: &str, period: f64) -> Result<(), Error> {
        self.with_observation(path, |obs| obs.backup_period = period.max(0.0))
    }

    /// Extract a location from pushed JSON documents before they are
    /// buffered and filtered. An empty specification clears it.
    pub fn set_json_extraction(&mut self, path: &str, spec: &str) -> Result<(), Error> {
        let extraction = if spec.is_empty() {
            None
        } else {
            Some((spec.to_string(), json::Path::parse(spec)?))
        };
        self.with_observation(path, move |obs| obs.json_extraction = extraction)
    }

    /// Route `source` into `dest`. `None` detaches. Either endpoint is
    /// created as a placeholder when it does not exist yet.
    pub fn set_source(&mut self, dest: &str, source: Option<&str>) -> Result<(), Error> {
        let (_, dest) = self.placeholder_at(None, dest)?;
        let source = match source {
            Some(path) => Some(self.placeholder_at(None, path)?.1),
            None => None,
        };
        self.set_source_ids(dest, source)
    }

    /// Force a value in place of whatever is pushed.
    pub fn set_override(&mut self, path: &str, value: Value) -> Result<(), Error> {
        let (_, rid) = self.placeholder_at(None, path)?;
        self.set_override_value(rid, value)
    }

    pub fn remove_override(&mut self, path: &str) -> Result<(), Error> {
        let (_, rid) = self.resolve_resource(None, path)?;
        self.resources[rid].override_value = None;
        self.mark_config_changing(rid);
        Ok(())
    }

    pub fn set_default(&mut self, path: &str, value: Value) -> Result<(), Error> {
        let (_, rid) = self.placeholder_at(None, path)?;
        self.set_default_value(rid, value)
    }

    pub fn remove_default(&mut self, path: &str) -> Result<(), Error> {
        let (_, rid) = self.resolve_resource(None, path)?;
        self.resources[rid].default_value = None;
        self.mark_config_changing(rid);
        Ok(())
    }

    /// Push a sample to any resource, driving the same pipeline the
    /// owning client would.
    pub fn push(&mut self, path: &str, timestamp: f64, value: Value) -> Result<(), Error> {
        let (_, rid) = self.resolve_resource(None, path)?;
        self.push_sample(rid, None, Rc::new(Sample::new(timestamp, value)));
        Ok(())
    }

    // ---- internal helpers ----

    fn with_observation(
        &mut self,
        path: &str,
        f: impl FnOnce(&mut crate::observation::ObsState),
    ) -> Result<(), Error> {
        let (_, rid) = self.resolve_observation(path)?;
        if let Some(obs) = self.resources[rid].obs_mut() {
            f(obs);
        }
        self.mark_config_changing(rid);
        Ok(())
    }

    pub(crate) fn set_override_value(
        &mut self,
        rid: ResourceId,
        value: Value,
    ) -> Result<(), Error> {
        let resource = &mut self.resources[rid];
        if let Some(fixed) = resource.io_kind() {
            if fixed != value.kind() {
                return Err(Error::FormatMismatch);
            }
        }
        resource.override_value = Some(value.clone());
        self.mark_config_changing(rid);

        // An acceptable override takes effect immediately, except while
        // an update window holds the graph quiet.
        if !self.update_in_progress() && self.resources[rid].accepts(value.kind()) {
            self.update_current_value(rid, Rc::new(Sample::new(0.0, value)));
        }
        Ok(())
    }

    pub(crate) fn set_default_value(&mut self, rid: ResourceId, value: Value) -> Result<(), Error> {
        let resource = &mut self.resources[rid];
        if let Some(fixed) = resource.io_kind() {
            if fixed != value.kind() {
                return Err(Error::FormatMismatch);
            }
        }
        resource.default_value = Some(value.clone());
        self.mark_config_changing(rid);

        // A winning default becomes the current value right away.
        let resource = &self.resources[rid];
        if !self.update_in_progress()
            && resource.default_is_winning()
            && resource.accepts(value.kind())
        {
            self.update_current_value(rid, Rc::new(Sample::new(0.0, value)));
        }
        Ok(())
    }
}
