use crate::handler::HandlerList;
use crate::observation::ObsState;
use crate::tree::{EntryId, EntryKind};
use sample::{Kind, SampleRef, Value};

/// Longest units string, in bytes.
pub const MAX_UNITS_BYTES: usize = 23;

/// Direction of an I/O point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// What a resource is: a bare placeholder keeping admin settings, a
/// fixed-type I/O point, or an observation.
pub(crate) enum Class {
    Placeholder,
    Io {
        direction: Direction,
        kind: Kind,
        mandatory: bool,
    },
    Observation(Box<ObsState>),
}

/// A resource: the data-flow state attached to a tree entry.
pub(crate) struct Resource {
    pub entry: EntryId,
    pub class: Class,
    /// Units of the carried value; empty means unspecified. Fixed at
    /// creation for I/O points, mirrored from the source otherwise.
    pub units: String,
    pub current_kind: Kind,
    pub current: Option<SampleRef>,
    /// Latest received sample, recorded even when the pipeline later
    /// rejects it.
    pub pushed_kind: Kind,
    pub pushed: Option<SampleRef>,
    pub source: Option<usize>,
    pub destinations: Vec<usize>,
    pub override_value: Option<Value>,
    pub default_value: Option<Value>,
    pub json_example: Option<Box<str>>,
    pub push_handlers: HandlerList,
    /// Set while an update window reconfigures this resource; pushes
    /// are held as `pushed` only until the window closes.
    pub config_changing: bool,
    /// A push arrived while `config_changing`; replay it at window end.
    pub held_push: bool,
}

impl Resource {
    pub fn new(entry: EntryId, class: Class) -> Resource {
        Resource {
            entry,
            class,
            units: String::new(),
            current_kind: Kind::Trigger,
            current: None,
            pushed_kind: Kind::Trigger,
            pushed: None,
            source: None,
            destinations: Vec::new(),
            override_value: None,
            default_value: None,
            json_example: None,
            push_handlers: HandlerList::default(),
            config_changing: false,
            held_push: false,
        }
    }

    pub fn entry_kind(&self) -> EntryKind {
        match &self.class {
            Class::Placeholder => EntryKind::Placeholder,
            Class::Io {
                direction: Direction::Input,
                ..
            } => EntryKind::Input,
            Class::Io {
                direction: Direction::Output,
                ..
            } => EntryKind::Output,
            Class::Observation(_) => EntryKind::Observation,
        }
    }

    pub fn is_observation(&self) -> bool {
        matches!(self.class, Class::Observation(_))
    }

    pub fn obs(&self) -> Option<&ObsState> {
        match &self.class {
            Class::Observation(obs) => Some(obs),
            _ => None,
        }
    }

    pub fn obs_mut(&mut self) -> Option<&mut ObsState> {
        match &mut self.class {
            Class::Observation(obs) => Some(obs),
            _ => None,
        }
    }

    pub fn io_kind(&self) -> Option<Kind> {
        match &self.class {
            Class::Io { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether a sample of `kind` may become this resource's current
    /// value: observations and placeholders adopt any kind, I/O points
    /// only their fixed kind.
    pub fn accepts(&self, kind: Kind) -> bool {
        match self.io_kind() {
            Some(fixed) => fixed == kind,
            None => true,
        }
    }

    /// Observations and placeholders mirror their source's units; I/O
    /// units are fixed at creation.
    pub fn units_flexible(&self) -> bool {
        !matches!(self.class, Class::Io { .. })
    }

    /// True when deleting this resource must leave a placeholder
    /// behind.
    pub fn has_admin_settings(&self) -> bool {
        self.source.is_some()
            || !self.destinations.is_empty()
            || self.override_value.is_some()
            || self.default_value.is_some()
            || !self.push_handlers.is_empty()
    }

    /// The default drives the current value only while no override is
    /// set and nothing acceptable has been pushed.
    pub fn default_is_winning(&self) -> bool {
        self.override_value.is_none()
            && (self.pushed.is_none() || !self.accepts(self.pushed_kind))
    }

    /// The data type reported for this resource: the declared kind for
    /// I/O points, the current value's kind otherwise.
    pub fn data_type(&self) -> Kind {
        self.io_kind().unwrap_or(self.current_kind)
    }
}
