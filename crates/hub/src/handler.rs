use crate::error::Error;
use sample::{Kind, Sample, Value};

/// HandlerRef is the stable opaque token returned when a push handler is
/// registered. Generation tags catch stale references to removed or
/// reused slots, which fail with `NotFound` instead of dereferencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerRef {
    index: u32,
    generation: u32,
}

/// A registered callback, typed by the kind it subscribed to.
pub(crate) enum Callback {
    Trigger(Box<dyn FnMut(f64)>),
    Boolean(Box<dyn FnMut(f64, bool)>),
    Numeric(Box<dyn FnMut(f64, f64)>),
    String(Box<dyn FnMut(f64, &str)>),
    Json(Box<dyn FnMut(f64, &str)>),
}

struct Slot {
    generation: u32,
    owner: usize,
    callback: Option<Callback>,
}

/// Handlers is the arena owning every registered callback.
///
/// Resources keep per-list insertion order in a `HandlerList`; the arena
/// provides stable references and the typed dispatch rule.
pub(crate) struct Handlers {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

/// Per-resource list of handler references, in insertion order.
#[derive(Clone, Default)]
pub(crate) struct HandlerList(Vec<HandlerRef>);

impl HandlerList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append every reference of `from`, preserving order. References
    /// stay valid: they index the arena, not the list.
    pub fn move_all(&mut self, from: &mut HandlerList) {
        self.0.append(&mut from.0);
    }
}

impl Handlers {
    pub fn new() -> Handlers {
        Handlers {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn add(&mut self, list: &mut HandlerList, owner: usize, callback: Callback) -> HandlerRef {
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.owner = owner;
                slot.callback = Some(callback);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    owner,
                    callback: Some(callback),
                });
                (self.slots.len() - 1) as u32
            }
        };
        let handler = HandlerRef {
            index,
            generation: self.slots[index as usize].generation,
        };
        list.0.push(handler);
        handler
    }

    /// Resource that owns the referenced handler.
    pub fn owner_of(&self, handler: HandlerRef) -> Result<usize, Error> {
        let slot = self
            .slots
            .get(handler.index as usize)
            .ok_or(Error::NotFound)?;
        if slot.generation != handler.generation || slot.callback.is_none() {
            return Err(Error::NotFound);
        }
        Ok(slot.owner)
    }

    pub fn remove(&mut self, list: &mut HandlerList, handler: HandlerRef) -> Result<(), Error> {
        self.owner_of(handler)?;
        let slot = &mut self.slots[handler.index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        slot.callback = None;
        self.free.push(handler.index);
        list.0.retain(|h| *h != handler);
        Ok(())
    }

    pub fn remove_all(&mut self, list: &mut HandlerList) {
        for handler in std::mem::take(&mut list.0) {
            let slot = &mut self.slots[handler.index as usize];
            if slot.generation == handler.generation && slot.callback.is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                slot.callback = None;
                self.free.push(handler.index);
            }
        }
    }

    /// Deliver one sample to one handler, converting per the dispatch
    /// rule. Fails with `NotFound` for stale references.
    pub fn call(&mut self, handler: HandlerRef, sample: &Sample) -> Result<(), Error> {
        self.owner_of(handler)?;
        let slot = &mut self.slots[handler.index as usize];

        // Take the callback out while it runs, so a slot mutation from
        // inside the callback cannot alias it.
        let mut callback = match slot.callback.take() {
            Some(callback) => callback,
            None => return Err(Error::NotFound),
        };
        dispatch(&mut callback, sample);

        let slot = &mut self.slots[handler.index as usize];
        if slot.generation == handler.generation && slot.callback.is_none() {
            slot.callback = Some(callback);
        }
        Ok(())
    }

    /// Deliver one sample to every handler of the list, in insertion
    /// order.
    pub fn call_all(&mut self, list: &HandlerList, sample: &Sample) {
        for handler in &list.0 {
            // Stale refs are unlinked eagerly; ignore them if raced.
            let _ = self.call(*handler, sample);
        }
    }
}

/// The dispatch rule: exact kind matches deliver the typed value;
/// string and json subscriptions receive any sample converted to that
/// representation; any other mismatch is silently skipped.
fn dispatch(callback: &mut Callback, sample: &Sample) {
    let ts = sample.timestamp();
    match (callback, sample.value()) {
        (Callback::Trigger(f), Value::Trigger) => f(ts),
        (Callback::Boolean(f), Value::Boolean(v)) => f(ts, *v),
        (Callback::Numeric(f), Value::Numeric(v)) => f(ts, *v),
        (Callback::String(f), Value::String(v)) => f(ts, v),
        (Callback::Json(f), Value::Json(v)) => f(ts, v),
        (Callback::String(f), value) => {
            if let Value::String(text) = value.coerce(Kind::String) {
                f(ts, &text);
            }
        }
        (Callback::Json(f), value) => f(ts, &value.to_json_text()),
        _ => {
            tracing::trace!(
                kind = ?sample.kind(),
                "push handler is not eligible for this sample kind; skipping"
            );
        }
    }
}
