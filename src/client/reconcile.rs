//! Client-side mirror of a workspace.
//!
//! Incoming updates are filtered by revision instead of timers: an update is
//! applied only when it is newer than anything this client produced itself
//! and newer than what it already shows. While a local edit is pending or in
//! flight the local buffer is kept, since that edit will overwrite the file
//! on the server anyway.

use crate::models::{File, FileId, WorkspaceSnapshot};

/// Outcome of reconciling one incoming update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// Revision at or below one this client produced itself.
    Echo,
    /// Revision at or below the one already shown.
    Stale,
    /// Newer remote content, but a local edit is still on its way.
    LocalPending,
    UnknownFile,
}

#[derive(Debug, Clone)]
struct Tracked {
    file: File,
    /// Highest revision the coordinator acknowledged for our own edits.
    own_revision: u64,
    dirty: bool,
    in_flight: bool,
}

impl Tracked {
    fn new(file: File) -> Self {
        Self { file, own_revision: 0, dirty: false, in_flight: false }
    }

    fn busy(&self) -> bool {
        self.dirty || self.in_flight
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalWorkspace {
    files: Vec<Tracked>,
    current: Option<FileId>,
}

impl LocalWorkspace {
    fn get(&self, id: &str) -> Option<&Tracked> {
        self.files.iter().find(|t| t.file.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Tracked> {
        self.files.iter_mut().find(|t| t.file.id == id)
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.iter().map(|t| &t.file)
    }

    pub fn file(&self, id: &str) -> Option<&File> {
        self.get(id).map(|t| &t.file)
    }

    pub fn current_file(&self) -> Option<&File> {
        self.current.as_deref().and_then(|id| self.file(id))
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.files().any(|f| f.name == name)
    }

    pub fn open(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.current = Some(id.to_string());
        true
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.get(id).is_some_and(Tracked::busy)
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            files: self.files().cloned().collect(),
            current_file: self.current_file().cloned(),
        }
    }

    /* ---------------- local changes ---------------- */

    /// Add a locally created file. `false` if the id is taken.
    pub fn insert(&mut self, file: File) -> bool {
        if self.get(&file.id).is_some() {
            return false;
        }
        self.files.push(Tracked::new(file));
        true
    }

    /// Record a keystroke-level edit; it stays dirty until taken for sending.
    pub fn edit(&mut self, id: &str, content: impl Into<String>) -> bool {
        let Some(t) = self.get_mut(id) else { return false };
        t.file.content = content.into();
        t.dirty = true;
        true
    }

    /// Content to send for a dirty file, moving it to in-flight.
    pub fn take_outbound(&mut self, id: &str) -> Option<File> {
        let t = self.get_mut(id)?;
        if !t.dirty {
            return None;
        }
        t.dirty = false;
        t.in_flight = true;
        Some(t.file.clone())
    }

    /// The coordinator accepted our update as `revision`.
    pub fn confirm(&mut self, id: &str, revision: u64) {
        if let Some(t) = self.get_mut(id) {
            t.own_revision = t.own_revision.max(revision);
            t.file.revision = t.file.revision.max(revision);
            t.in_flight = false;
        }
    }

    /// The send failed; the edit becomes dirty again for the next flush.
    pub fn fail(&mut self, id: &str) {
        if let Some(t) = self.get_mut(id) {
            t.in_flight = false;
            t.dirty = true;
        }
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        let Some(t) = self.get_mut(id) else { return false };
        t.file.name = name.to_string();
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|t| t.file.id != id);
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        before != self.files.len()
    }

    /* ---------------- remote changes ---------------- */

    pub fn apply_update(&mut self, incoming: &File) -> Applied {
        let Some(t) = self.get_mut(&incoming.id) else {
            return Applied::UnknownFile;
        };
        if incoming.revision <= t.own_revision {
            return Applied::Echo;
        }
        if incoming.revision <= t.file.revision {
            return Applied::Stale;
        }
        t.file.revision = incoming.revision;
        if t.busy() {
            return Applied::LocalPending;
        }
        t.file.content = incoming.content.clone();
        Applied::Applied
    }

    pub fn apply_created(&mut self, file: &File) -> bool {
        self.insert(file.clone())
    }

    pub fn apply_renamed(&mut self, file: &File) -> bool {
        self.rename(&file.id, &file.name)
    }

    pub fn apply_deleted(&mut self, id: &str) -> bool {
        self.remove(id)
    }

    /// Take a full snapshot. Files with local edits still pending keep their
    /// local content; everything else is replaced.
    pub fn apply_snapshot(&mut self, snapshot: &WorkspaceSnapshot) {
        let mut next: Vec<Tracked> = Vec::with_capacity(snapshot.files.len());
        for file in &snapshot.files {
            let tracked = match self.get(&file.id) {
                Some(local) if local.busy() => {
                    let mut keep = local.clone();
                    keep.file.name = file.name.clone();
                    keep.file.revision = keep.file.revision.max(file.revision);
                    keep
                }
                Some(local) => Tracked { file: file.clone(), ..local.clone() },
                None => Tracked::new(file.clone()),
            };
            next.push(tracked);
        }
        self.files = next;
        self.current = snapshot.current_file.as_ref().map(|f| f.id.clone());
    }

    /// Forget everything (switching to another workspace).
    pub fn reset(&mut self) {
        self.files.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, content: &str, revision: u64) -> File {
        File { revision, ..File::new(id, format!("{id}.rs"), content) }
    }

    fn workspace() -> LocalWorkspace {
        let mut ws = LocalWorkspace::default();
        ws.apply_snapshot(&WorkspaceSnapshot {
            files: vec![file("a", "one", 0), file("b", "", 0)],
            current_file: Some(file("a", "one", 0)),
        });
        ws
    }

    #[test]
    fn test_remote_update_applies_when_idle() {
        let mut ws = workspace();
        assert_eq!(ws.apply_update(&file("a", "two", 1)), Applied::Applied);
        assert_eq!(ws.current_file().unwrap().content, "two");
        assert_eq!(ws.apply_update(&file("a", "old", 1)), Applied::Stale);
        assert_eq!(ws.apply_update(&file("zz", "x", 9)), Applied::UnknownFile);
    }

    #[test]
    fn test_own_revision_is_suppressed() {
        let mut ws = workspace();
        ws.edit("a", "mine");
        let out = ws.take_outbound("a").unwrap();
        assert_eq!(out.content, "mine");
        ws.confirm("a", 4);

        assert_eq!(ws.apply_update(&file("a", "mine", 4)), Applied::Echo);
        assert_eq!(ws.apply_update(&file("a", "theirs", 5)), Applied::Applied);
        assert_eq!(ws.file("a").unwrap().content, "theirs");
    }

    #[test]
    fn test_pending_edit_keeps_local_buffer() {
        let mut ws = workspace();
        ws.edit("a", "typing...");
        assert_eq!(ws.apply_update(&file("a", "remote", 1)), Applied::LocalPending);
        assert_eq!(ws.file("a").unwrap().content, "typing...");

        ws.take_outbound("a");
        assert!(ws.is_busy("a"));
        assert_eq!(ws.apply_update(&file("a", "remote", 2)), Applied::LocalPending);
        ws.confirm("a", 3);
        assert!(!ws.is_busy("a"));
        assert_eq!(ws.file("a").unwrap().revision, 3);
    }

    #[test]
    fn test_take_outbound_only_when_dirty() {
        let mut ws = workspace();
        assert!(ws.take_outbound("a").is_none());
        ws.edit("a", "x");
        assert!(ws.take_outbound("a").is_some());
        assert!(ws.take_outbound("a").is_none());
        ws.fail("a");
        assert!(ws.take_outbound("a").is_some());
    }

    #[test]
    fn test_snapshot_preserves_pending_edits() {
        let mut ws = workspace();
        ws.edit("b", "local");
        ws.apply_snapshot(&WorkspaceSnapshot {
            files: vec![file("a", "server", 2), file("b", "server", 2), file("c", "", 0)],
            current_file: None,
        });
        assert_eq!(ws.file("a").unwrap().content, "server");
        assert_eq!(ws.file("b").unwrap().content, "local");
        assert!(ws.file("c").is_some());
        assert!(ws.current_file().is_none());
    }

    #[test]
    fn test_structure_changes() {
        let mut ws = workspace();
        assert!(ws.apply_created(&file("c", "", 0)));
        assert!(!ws.apply_created(&file("c", "", 0)));
        assert!(ws.apply_renamed(&File::new("c", "renamed.rs", "")));
        assert!(ws.has_name("renamed.rs"));
        assert!(ws.apply_deleted("a"));
        assert!(ws.current_file().is_none());
        assert_eq!(ws.snapshot().files.len(), 2);
    }
}
