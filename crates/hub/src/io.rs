//! The `io` surface: calls available to producer and consumer clients.
//! Relative paths resolve under the session's `/app/<name>` namespace.

use crate::error::Error;
use crate::handler::{Callback, HandlerRef};
use crate::hub::{Hub, SessionId};
use crate::resource::{Class, Direction};
use sample::{Kind, Sample, Value, MAX_STRING_VALUE_BYTES};
use std::rc::Rc;

impl Hub {
    pub fn create_input(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        kind: Kind,
        units: &str,
    ) -> Result<(), Error> {
        self.create_io(session, path, Direction::Input, kind, units)
    }

    pub fn create_output(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        kind: Kind,
        units: &str,
    ) -> Result<(), Error> {
        self.create_io(session, path, Direction::Output, kind, units)
    }

    /// Delete an I/O point. The entry survives as a placeholder when it
    /// still carries admin settings or children.
    pub fn delete_resource(
        &mut self,
        session: Option<SessionId>,
        path: &str,
    ) -> Result<(), Error> {
        let (entry, rid) = self.resolve_resource(session, path)?;
        if !matches!(self.resources[rid].class, Class::Io { .. }) {
            return Err(Error::Unsupported);
        }
        self.delete_io_entry(entry);
        Ok(())
    }

    pub fn push_trigger(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        timestamp: f64,
    ) -> Result<(), Error> {
        self.push_value(session, path, timestamp, Value::Trigger)
    }

    pub fn push_boolean(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        timestamp: f64,
        value: bool,
    ) -> Result<(), Error> {
        self.push_value(session, path, timestamp, Value::Boolean(value))
    }

    pub fn push_numeric(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        timestamp: f64,
        value: f64,
    ) -> Result<(), Error> {
        self.push_value(session, path, timestamp, Value::Numeric(value))
    }

    pub fn push_string(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        timestamp: f64,
        value: &str,
    ) -> Result<(), Error> {
        if value.len() > MAX_STRING_VALUE_BYTES {
            return Err(Error::Overflow);
        }
        self.push_value(session, path, timestamp, Value::String(value.into()))
    }

    pub fn push_json(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        timestamp: f64,
        value: &str,
    ) -> Result<(), Error> {
        if value.len() > MAX_STRING_VALUE_BYTES {
            return Err(Error::Overflow);
        }
        if !json::validate(value) {
            return Err(Error::FormatMismatch);
        }
        self.push_value(session, path, timestamp, Value::Json(value.into()))
    }

    fn push_value(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        timestamp: f64,
        value: Value,
    ) -> Result<(), Error> {
        let (_, rid) = self.resolve_resource(session, path)?;
        self.push_sample(rid, None, Rc::new(Sample::new(timestamp, value)));
        Ok(())
    }

    pub fn add_trigger_push_handler(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        callback: impl FnMut(f64) + 'static,
    ) -> Result<HandlerRef, Error> {
        self.add_push_handler(session, path, Callback::Trigger(Box::new(callback)))
    }

    pub fn add_boolean_push_handler(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        callback: impl FnMut(f64, bool) + 'static,
    ) -> Result<HandlerRef, Error> {
        self.add_push_handler(session, path, Callback::Boolean(Box::new(callback)))
    }

    pub fn add_numeric_push_handler(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        callback: impl FnMut(f64, f64) + 'static,
    ) -> Result<HandlerRef, Error> {
        self.add_push_handler(session, path, Callback::Numeric(Box::new(callback)))
    }

    pub fn add_string_push_handler(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        callback: impl FnMut(f64, &str) + 'static,
    ) -> Result<HandlerRef, Error> {
        self.add_push_handler(session, path, Callback::String(Box::new(callback)))
    }

    pub fn add_json_push_handler(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        callback: impl FnMut(f64, &str) + 'static,
    ) -> Result<HandlerRef, Error> {
        self.add_push_handler(session, path, Callback::Json(Box::new(callback)))
    }

    /// Remove a push handler by its reference. Stale references fail
    /// with `NotFound`.
    pub fn remove_push_handler(&mut self, handler: HandlerRef) -> Result<(), Error> {
        let owner = self.handlers.owner_of(handler)?;
        let handlers = &mut self.handlers;
        let resource = self.resources.get_mut(owner).ok_or(Error::NotFound)?;
        handlers.remove(&mut resource.push_handlers, handler)
    }

    /// Handlers may be registered ahead of resource creation; the entry
    /// is held as a placeholder until then. A resource that already has
    /// a current value delivers it to the new handler once, right away.
    pub(crate) fn add_push_handler(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        callback: Callback,
    ) -> Result<HandlerRef, Error> {
        let (_, rid) = self.placeholder_at(session, path)?;
        let handlers = &mut self.handlers;
        let resource = &mut self.resources[rid];
        let handler = handlers.add(&mut resource.push_handlers, rid, callback);

        let current = self.resources[rid].current.clone();
        if let Some(sample) = current {
            let _ = self.handlers.call(handler, &sample);
        }
        Ok(handler)
    }

    /// Flag an input as optional: consumers need not wait for it.
    pub fn mark_optional(
        &mut self,
        session: Option<SessionId>,
        path: &str,
    ) -> Result<(), Error> {
        let (_, rid) = self.resolve_resource(session, path)?;
        match &mut self.resources[rid].class {
            Class::Io { mandatory, .. } => *mandatory = false,
            _ => return Err(Error::Unsupported),
        }
        self.mark_config_changing(rid);
        Ok(())
    }

    pub fn is_mandatory(&self, session: Option<SessionId>, path: &str) -> Result<bool, Error> {
        let (_, rid) = self.resolve_resource(session, path)?;
        match self.resources[rid].class {
            Class::Io { mandatory, .. } => Ok(mandatory),
            _ => Err(Error::Unsupported),
        }
    }

    pub fn set_boolean_default(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        value: bool,
    ) -> Result<(), Error> {
        let (_, rid) = self.resolve_resource(session, path)?;
        self.set_default_value(rid, Value::Boolean(value))
    }

    pub fn set_numeric_default(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        value: f64,
    ) -> Result<(), Error> {
        let (_, rid) = self.resolve_resource(session, path)?;
        self.set_default_value(rid, Value::Numeric(value))
    }

    pub fn set_string_default(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        value: &str,
    ) -> Result<(), Error> {
        if value.len() > MAX_STRING_VALUE_BYTES {
            return Err(Error::Overflow);
        }
        let (_, rid) = self.resolve_resource(session, path)?;
        self.set_default_value(rid, Value::String(value.into()))
    }

    pub fn set_json_default(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        value: &str,
    ) -> Result<(), Error> {
        if !json::validate(value) {
            return Err(Error::FormatMismatch);
        }
        let (_, rid) = self.resolve_resource(session, path)?;
        self.set_default_value(rid, Value::Json(value.into()))
    }

    /// Attach an example document describing the JSON this resource
    /// carries.
    pub fn set_json_example(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        example: &str,
    ) -> Result<(), Error> {
        if !json::validate(example) {
            return Err(Error::FormatMismatch);
        }
        let (_, rid) = self.resolve_resource(session, path)?;
        self.resources[rid].json_example = Some(example.into());
        self.mark_config_changing(rid);
        Ok(())
    }
}
