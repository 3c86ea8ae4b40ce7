use crate::error::Error;
use crate::hub::Hub;
use crate::resource::{Class, MAX_UNITS_BYTES};
use crate::tree::ResourceId;
use json::Token;
use sample::{Kind, Sample, SampleRef, Value};
use std::rc::Rc;

impl Hub {
    /// Route `source` into `dest`, replacing any previous source edge.
    /// `None` detaches. Rejects edges that would let a push reach
    /// itself.
    pub(crate) fn set_source_ids(
        &mut self,
        dest: ResourceId,
        source: Option<ResourceId>,
    ) -> Result<(), Error> {
        if self.resources[dest].source == source {
            return Ok(());
        }

        let previous = self.resources[dest].source.take();
        if let Some(previous) = previous {
            self.resources[previous]
                .destinations
                .retain(|d| *d != dest);
        }

        match source {
            Some(source) => {
                if self.route_reaches(dest, source) {
                    return Err(Error::CycleDetected);
                }
                self.resources[dest].source = Some(source);
                self.resources[source].destinations.push(dest);

                if let Some(example) = self.resources[source].json_example.clone() {
                    self.propagate_json_example(dest, &example);
                }
                if self.update_in_progress() {
                    self.resources[dest].config_changing = true;
                    self.resources[source].config_changing = true;
                }
            }
            None => {
                if self.update_in_progress() {
                    self.resources[dest].config_changing = true;
                    if let Some(previous) = previous {
                        self.resources[previous].config_changing = true;
                    }
                }
                let dest = &mut self.resources[dest];
                if dest.units_flexible() {
                    dest.units.clear();
                }
            }
        }
        Ok(())
    }

    /// True when a push entering `from` can reach `target` through the
    /// destination graph.
    fn route_reaches(&self, from: ResourceId, target: ResourceId) -> bool {
        let mut stack = vec![from];
        let mut seen = Vec::new();
        while let Some(at) = stack.pop() {
            if at == target {
                return true;
            }
            if seen.contains(&at) {
                continue;
            }
            seen.push(at);
            if let Some(resource) = self.resources.get(at) {
                stack.extend(resource.destinations.iter().copied());
            }
        }
        false
    }

    /// Seed `rid` (and, transitively, its JSON-accepting destinations)
    /// with an example inherited from a new source.
    fn propagate_json_example(&mut self, rid: ResourceId, example: &str) {
        let resource = &mut self.resources[rid];
        if !resource.accepts(Kind::Json) || resource.json_example.is_some() {
            return;
        }
        resource.json_example = Some(example.into());
        for dest in resource.destinations.clone() {
            self.propagate_json_example(dest, example);
        }
    }

    /// The push pipeline. Kind is implied by the sample; `units` is the
    /// producer's claim, already-empty meaning unspecified.
    pub(crate) fn push_sample(&mut self, rid: ResourceId, units: Option<&str>, sample: SampleRef) {
        let mut units = units.filter(|u| !u.is_empty());

        let resource = match self.resources.get_mut(rid) {
            Some(resource) => resource,
            None => return,
        };

        // A resource being reconfigured holds pushes aside; the last
        // one replays when the update window closes.
        if resource.config_changing {
            resource.pushed_kind = sample.kind();
            resource.pushed = Some(sample);
            resource.held_push = true;
            return;
        }

        let mut sample = sample;
        if resource.is_observation() {
            sample = match self.observe(rid, sample) {
                Some(sample) => sample,
                None => return,
            };
        }

        let resource = &mut self.resources[rid];
        resource.pushed_kind = sample.kind();
        resource.pushed = Some(sample.clone());

        // An acceptable override replaces whatever was pushed, keeping
        // the incoming timestamp.
        if let Some(value) = &resource.override_value {
            if resource.accepts(value.kind()) {
                sample = Rc::new(Sample::new(sample.timestamp(), value.clone()));
                units = None;
            }
        }

        match &resource.class {
            Class::Io { kind, .. } => {
                if !resource.units.is_empty() {
                    if let Some(claimed) = units {
                        if claimed != resource.units {
                            tracing::debug!(
                                claimed,
                                declared = %resource.units,
                                "unit mismatch; dropping push"
                            );
                            return;
                        }
                    }
                }
                if sample.kind() != *kind {
                    sample = Rc::new(sample.coerce(*kind));
                }
            }
            _ => {
                if let Some(claimed) = units {
                    if claimed.len() <= MAX_UNITS_BYTES && resource.units != claimed {
                        resource.units = claimed.to_string();
                    }
                }
            }
        }

        self.update_current_value(rid, sample);
    }

    /// Observation-specific processing: JSON extraction, buffering and
    /// backup, transform, then the acceptance filter. Returns the
    /// sample to continue with, or None when it is dropped.
    fn observe(&mut self, rid: ResourceId, sample: SampleRef) -> Option<SampleRef> {
        let entry = self.resources[rid].entry;
        let key = self.tree.absolute_path(entry);

        let obs = match self.resources[rid].obs_mut() {
            Some(obs) => obs,
            None => return Some(sample),
        };

        let mut sample = sample;
        if let Some((spec, path)) = &obs.json_extraction {
            let text = match sample.value().as_json() {
                Some(text) => text,
                None => {
                    tracing::debug!(kind = ?sample.kind(), "extraction needs JSON; dropping push");
                    return None;
                }
            };
            match json::extract_path(text, path) {
                Ok((token, raw)) => {
                    let value = extracted_value(token, raw);
                    sample = Rc::new(Sample::new(sample.timestamp(), value));
                }
                Err(err) => {
                    tracing::debug!(spec = %spec, %err, "extraction failed; dropping push");
                    return None;
                }
            }
        }

        obs.append(sample.clone());

        let now = sample::now();
        if obs.backup_due(now) {
            obs.last_backup = now;
            obs.buffer_dirty = false;
            let blob = obs.encode_backup();
            self.store.save(&key, &blob);
        }

        let obs = match self.resources[rid].obs_mut() {
            Some(obs) => obs,
            None => return Some(sample),
        };
        let sample = obs.apply_transform(&sample);

        if !obs.filter(sample.timestamp(), sample.value()) {
            tracing::debug!(ts = sample.timestamp(), "observation filter rejected push");
            return None;
        }
        Some(sample)
    }

    /// Accept `sample` as the resource's current value and fan it out:
    /// destinations first, in list order, then push handlers in
    /// registration order. Transitive pushes run depth-first.
    pub(crate) fn update_current_value(&mut self, rid: ResourceId, sample: SampleRef) {
        let resource = match self.resources.get_mut(rid) {
            Some(resource) => resource,
            None => return,
        };
        let kind = sample.kind();
        if !resource.accepts(kind) {
            tracing::warn!(
                kind = ?kind,
                declared = ?resource.io_kind(),
                "sample kind not accepted by resource; dropping"
            );
            return;
        }
        resource.current_kind = kind;
        resource.current = Some(sample.clone());

        if kind == Kind::Json {
            if resource.json_example.is_none() {
                if let Some(text) = sample.value().as_json() {
                    resource.json_example = Some(text.into());
                }
            }
        } else {
            resource.json_example = None;
        }

        let units = resource.units.clone();
        let units = (!units.is_empty()).then_some(units);
        let destinations = resource.destinations.clone();
        let handler_list = resource.push_handlers.clone();

        for dest in destinations {
            self.push_sample(dest, units.as_deref(), sample.clone());
        }
        self.handlers.call_all(&handler_list, &sample);
    }
}

/// Map an extracted JSON token onto a sample value.
fn extracted_value(token: Token, raw: &str) -> Value {
    match token {
        Token::Number => Value::Numeric(json::parse_number(raw)),
        Token::Boolean => Value::Boolean(raw == "true"),
        Token::String => Value::String(raw.into()),
        Token::Object | Token::Array => Value::Json(raw.into()),
        Token::Null => Value::Trigger,
    }
}
