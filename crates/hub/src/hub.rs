use crate::arena::Arena;
use crate::error::Error;
use crate::handler::Handlers;
use crate::observation::ObsState;
use crate::resource::{Class, Direction, Resource, MAX_UNITS_BYTES};
use crate::store::{BufferStore, MemoryBufferStore};
use crate::tree::{
    split_path, EntryId, EntryKind, ResourceId, Tree, TreeChange, OBS_NAMESPACE,
};
use sample::{Kind, Sample};
use std::rc::Rc;

/// Identifies one open client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(pub(crate) usize);

struct Session {
    namespace: EntryId,
}

/// The hub: resource tree, resources, handler registry, buffer store,
/// and the global update window. Single-threaded; every operation runs
/// to completion on the caller's thread.
pub struct Hub {
    pub(crate) tree: Tree,
    pub(crate) resources: Arena<Resource>,
    pub(crate) handlers: Handlers,
    pub(crate) store: Box<dyn BufferStore>,
    sessions: Arena<Session>,
    pub(crate) update_open: bool,
    tree_handlers: Vec<Box<dyn FnMut(&str, EntryKind, TreeChange)>>,
    update_handlers: Vec<Box<dyn FnMut(bool)>>,
}

impl Hub {
    pub fn new() -> Hub {
        Hub::with_store(Box::new(MemoryBufferStore::default()))
    }

    pub fn with_store(store: Box<dyn BufferStore>) -> Hub {
        Hub {
            tree: Tree::new(),
            resources: Arena::new(),
            handlers: Handlers::new(),
            store,
            sessions: Arena::new(),
            update_open: false,
            tree_handlers: Vec::new(),
            update_handlers: Vec::new(),
        }
    }

    /// Open a client session, binding it to the `/app/<name>` namespace.
    pub fn open_session(&mut self, app: &str) -> Result<SessionId, Error> {
        let (absolute, segments) = split_path(app)?;
        if absolute || segments.len() != 1 {
            return Err(Error::BadParameter);
        }
        let namespace = self
            .tree
            .get_or_create(self.tree.root, &format!("app/{}", app))?;
        self.tree.get_mut(namespace).pins += 1;
        Ok(SessionId(self.sessions.insert(Session { namespace })))
    }

    /// Close a session: every I/O point under its namespace is deleted
    /// (left as a placeholder when it carries admin settings), then the
    /// namespace itself collapses if nothing else holds it.
    pub fn close_session(&mut self, session: SessionId) -> Result<(), Error> {
        let closed = self.sessions.remove(session.0).ok_or(Error::NotFound)?;

        let mut io_entries = Vec::new();
        self.tree.walk(closed.namespace, &mut |entry| {
            io_entries.push(entry);
        });
        for entry in io_entries {
            let is_io = self
                .rid_of(entry)
                .and_then(|rid| self.resources.get(rid))
                .map(|r| matches!(r.class, Class::Io { .. }))
                .unwrap_or(false);
            if is_io {
                self.delete_io_entry(entry);
            }
        }

        self.tree.get_mut(closed.namespace).pins -= 1;
        self.tree.prune(closed.namespace);
        Ok(())
    }

    /// The update-window flag, observable for inspection.
    pub fn update_in_progress(&self) -> bool {
        self.update_open
    }

    /// Open the update window: admin writes mark the resources they
    /// touch, and pushes to marked resources are held aside.
    pub fn start_update(&mut self) {
        self.update_open = true;
        self.fire_update_handlers(true);
    }

    /// Close the update window: clear every mark, replay the last held
    /// push of each reconfigured resource, and drop buffer backups that
    /// no longer correspond to a backed-up observation.
    pub fn end_update(&mut self) {
        self.update_open = false;

        let mut replays = Vec::new();
        for rid in self.resources.ids() {
            let resource = &mut self.resources[rid];
            if resource.config_changing {
                resource.config_changing = false;
                if resource.held_push {
                    if let Some(sample) = resource.pushed.clone() {
                        replays.push((rid, sample));
                    }
                }
            }
            resource.held_push = false;
        }
        for (rid, sample) in replays {
            self.push_sample(rid, None, sample);
        }

        self.collect_obsolete_backups();
        self.fire_update_handlers(false);
    }

    /// Register a callback fired at update window start (true) and end
    /// (false).
    pub fn add_update_start_end_handler(&mut self, callback: impl FnMut(bool) + 'static) {
        self.update_handlers.push(Box::new(callback));
    }

    /// Register a callback fired when a resource enters or leaves the
    /// tree, with its absolute path and entry kind.
    pub fn add_resource_tree_change_handler(
        &mut self,
        callback: impl FnMut(&str, EntryKind, TreeChange) + 'static,
    ) {
        self.tree_handlers.push(Box::new(callback));
    }

    /// Preorder walk over every entry, with absolute path and kind.
    pub fn for_each_entry(&self, mut f: impl FnMut(&str, EntryKind)) {
        let mut entries = Vec::new();
        self.tree.walk(self.tree.root, &mut |entry| entries.push(entry));
        for entry in entries {
            f(&self.tree.absolute_path(entry), self.kind_of_entry(entry));
        }
    }

    // ---- internal plumbing ----

    pub(crate) fn rid_of(&self, entry: EntryId) -> Option<ResourceId> {
        self.tree.try_get(entry)?.resource
    }

    pub(crate) fn kind_of_entry(&self, entry: EntryId) -> EntryKind {
        match self.rid_of(entry).and_then(|rid| self.resources.get(rid)) {
            Some(resource) => resource.entry_kind(),
            None => EntryKind::Namespace,
        }
    }

    pub(crate) fn session_namespace(&self, session: SessionId) -> Result<EntryId, Error> {
        self.sessions
            .get(session.0)
            .map(|s| s.namespace)
            .ok_or(Error::NotFound)
    }

    /// Resolve a path to an existing entry. Absolute paths walk from
    /// the root; relative paths need a session to anchor them.
    pub(crate) fn resolve(
        &self,
        session: Option<SessionId>,
        path: &str,
    ) -> Result<EntryId, Error> {
        let (absolute, _) = split_path(path)?;
        let base = if absolute {
            self.tree.root
        } else {
            self.session_namespace(session.ok_or(Error::BadParameter)?)?
        };
        self.tree.find(base, path)?.ok_or(Error::NotFound)
    }

    /// Resolve to an entry carrying a resource.
    pub(crate) fn resolve_resource(
        &self,
        session: Option<SessionId>,
        path: &str,
    ) -> Result<(EntryId, ResourceId), Error> {
        let entry = self.resolve(session, path)?;
        let rid = self.rid_of(entry).ok_or(Error::Unsupported)?;
        Ok((entry, rid))
    }

    /// Resolve a path, creating namespaces and a placeholder resource
    /// as needed. Used by admin writes that may precede creation.
    pub(crate) fn placeholder_at(
        &mut self,
        session: Option<SessionId>,
        path: &str,
    ) -> Result<(EntryId, ResourceId), Error> {
        let (absolute, segments) = split_path(path)?;
        if segments.is_empty() {
            return Err(Error::BadParameter);
        }
        let base = if absolute {
            self.tree.root
        } else {
            self.session_namespace(session.ok_or(Error::BadParameter)?)?
        };
        let entry = self.tree.get_or_create(base, path)?;
        let rid = match self.rid_of(entry) {
            Some(rid) => rid,
            None => {
                let rid = self
                    .resources
                    .insert(Resource::new(entry, Class::Placeholder));
                self.tree.get_mut(entry).resource = Some(rid);
                rid
            }
        };
        Ok((entry, rid))
    }

    pub(crate) fn mark_config_changing(&mut self, rid: ResourceId) {
        if self.update_open {
            self.resources[rid].config_changing = true;
        }
    }

    pub(crate) fn notify_tree_change(&mut self, path: &str, kind: EntryKind, change: TreeChange) {
        for handler in &mut self.tree_handlers {
            handler(path, kind, change);
        }
    }

    fn fire_update_handlers(&mut self, starting: bool) {
        for handler in &mut self.update_handlers {
            handler(starting);
        }
    }

    /// Create an I/O point, or promote the entry already at `path`.
    pub(crate) fn create_io(
        &mut self,
        session: Option<SessionId>,
        path: &str,
        direction: Direction,
        kind: Kind,
        units: &str,
    ) -> Result<(), Error> {
        if units.len() > MAX_UNITS_BYTES {
            return Err(Error::BadParameter);
        }
        // The obs namespace is reserved for observations.
        let (absolute, segments) = split_path(path)?;
        if absolute && segments.first() == Some(&OBS_NAMESPACE) {
            return Err(Error::BadParameter);
        }
        let (entry, rid) = self.placeholder_at(session, path)?;

        let resource = &mut self.resources[rid];
        match &resource.class {
            Class::Placeholder => {
                resource.class = Class::Io {
                    direction,
                    kind,
                    mandatory: true,
                };
                resource.units = units.to_string();
                // Carried-over state of the wrong kind is dropped.
                if resource.current_kind != kind {
                    resource.current = None;
                }
                if kind != Kind::Json {
                    resource.json_example = None;
                }
                if resource.default_is_winning() {
                    if let Some(default) = resource.default_value.clone() {
                        if default.kind() == kind {
                            self.update_current_value(rid, Rc::new(Sample::new(0.0, default)));
                        }
                    }
                }
                let path = self.tree.absolute_path(entry);
                let entry_kind = self.resources[rid].entry_kind();
                self.notify_tree_change(&path, entry_kind, TreeChange::Added);
                Ok(())
            }
            Class::Io {
                direction: existing_direction,
                kind: existing_kind,
                ..
            } => {
                if *existing_direction == direction
                    && *existing_kind == kind
                    && resource.units == units
                {
                    Ok(())
                } else {
                    Err(Error::Duplicate)
                }
            }
            Class::Observation(_) => Err(Error::Duplicate),
        }
    }

    /// Create an observation, or promote the entry already at `path`.
    /// Relative paths land under the reserved `/obs` namespace.
    pub(crate) fn create_observation(&mut self, path: &str) -> Result<(), Error> {
        let (absolute, segments) = split_path(path)?;
        if segments.is_empty() {
            return Err(Error::BadParameter);
        }
        let full = if absolute {
            path.to_string()
        } else {
            format!("/{}/{}", OBS_NAMESPACE, path)
        };
        let (entry, rid) = self.placeholder_at(None, &full)?;

        let resource = &mut self.resources[rid];
        match &resource.class {
            Class::Placeholder => {
                resource.class = Class::Observation(Box::new(ObsState::new()));
                self.restore_observation_backup(entry, rid);
                let path = self.tree.absolute_path(entry);
                self.notify_tree_change(&path, EntryKind::Observation, TreeChange::Added);
                Ok(())
            }
            Class::Observation(_) => Ok(()),
            Class::Io { .. } => Err(Error::Duplicate),
        }
    }

    fn restore_observation_backup(&mut self, entry: EntryId, rid: ResourceId) {
        let key = self.tree.absolute_path(entry);
        let Some(blob) = self.store.load(&key) else {
            return;
        };
        let Some(obs) = self.resources[rid].obs_mut() else {
            return;
        };
        if let Err(err) = obs.restore_backup(&blob) {
            tracing::warn!(key = %key, %err, "discarding unreadable buffer backup");
        }
    }

    /// Delete the I/O resource at `entry`: remove the entry outright
    /// when nothing else needs it, demote to a placeholder otherwise.
    /// Reported as `Removed` either way.
    pub(crate) fn delete_io_entry(&mut self, entry: EntryId) {
        let Some(rid) = self.rid_of(entry) else {
            return;
        };
        let path = self.tree.absolute_path(entry);
        let kind = self.resources[rid].entry_kind();

        let removable = self.tree.get(entry).children.is_empty()
            && !self.resources[rid].has_admin_settings();
        if removable {
            self.resources.remove(rid);
            self.tree.get_mut(entry).resource = None;
            self.tree.prune(entry);
        } else {
            self.resources[rid].class = Class::Placeholder;
        }
        self.notify_tree_change(&path, kind, TreeChange::Removed);
    }

    /// Delete an observation: routes are unlinked, handlers dropped,
    /// and the entry reverts to a namespace.
    pub(crate) fn delete_observation_entry(&mut self, entry: EntryId) {
        let Some(rid) = self.rid_of(entry) else {
            return;
        };
        let path = self.tree.absolute_path(entry);

        if let Some(source) = self.resources[rid].source.take() {
            self.resources[source].destinations.retain(|d| *d != rid);
        }
        let destinations = std::mem::take(&mut self.resources[rid].destinations);
        for dest in destinations {
            let dest = &mut self.resources[dest];
            dest.source = None;
            if dest.units_flexible() {
                dest.units.clear();
            }
        }

        let handlers = &mut self.handlers;
        handlers.remove_all(&mut self.resources[rid].push_handlers);

        self.resources.remove(rid);
        self.tree.get_mut(entry).resource = None;
        self.tree.prune(entry);
        self.notify_tree_change(&path, EntryKind::Observation, TreeChange::Removed);
    }

    /// Resolve an observation path: absolute, or relative to `/obs`.
    pub(crate) fn resolve_observation(&self, path: &str) -> Result<(EntryId, ResourceId), Error> {
        let (absolute, _) = split_path(path)?;
        let full;
        let path = if absolute {
            path
        } else {
            full = format!("/{}/{}", OBS_NAMESPACE, path);
            &full
        };
        let entry = self
            .tree
            .find(self.tree.root, path)?
            .ok_or(Error::NotFound)?;
        let rid = self.rid_of(entry).ok_or(Error::Unsupported)?;
        if !self.resources[rid].is_observation() {
            return Err(Error::Unsupported);
        }
        Ok((entry, rid))
    }

    /// Drop stored backups that no longer belong to an observation
    /// configured to keep them.
    fn collect_obsolete_backups(&mut self) {
        for key in self.store.keys() {
            let keep = match self.tree.find(self.tree.root, &key) {
                Ok(Some(entry)) => self
                    .rid_of(entry)
                    .and_then(|rid| self.resources.get(rid))
                    .and_then(|resource| resource.obs())
                    .map(|obs| obs.buffer_max > 0 && obs.backup_period > 0.0)
                    .unwrap_or(false),
                _ => false,
            };
            if !keep {
                self.store.delete(&key);
            }
        }
    }
}

impl Default for Hub {
    fn default() -> Hub {
        Hub::new()
    }
}
