use std::collections::{HashMap, HashSet};

use crate::{
    error::{invalid, SessionErr, SessionResult},
    models::{File, FileId, WorkspaceSnapshot},
};

/// Ordered files plus the active-file pointer of one room or breakout room.
#[derive(Debug, Clone, Default)]
struct Workspace {
    files: Vec<File>,
    current: Option<FileId>,
    /// Highest revision ever handed out per file id; survives deletes.
    issued: HashMap<FileId, u64>,
}

impl Workspace {
    fn issued(&self, id: &str) -> u64 {
        self.issued.get(id).copied().unwrap_or(0)
    }

    fn bump(&mut self, id: &str) -> u64 {
        let rev = self.issued.entry(id.to_string()).or_default();
        *rev = rev.saturating_add(1);
        *rev
    }

    fn position(&self, id: &str) -> SessionResult<usize> {
        self.files
            .iter()
            .position(|f| f.id == id)
            .ok_or(SessionErr::NotFound("File"))
    }

    fn snapshot(&self) -> WorkspaceSnapshot {
        let current_file = self
            .current
            .as_deref()
            .and_then(|id| self.files.iter().find(|f| f.id == id))
            .cloned();
        WorkspaceSnapshot { files: self.files.clone(), current_file }
    }
}

/// Workspaces keyed by room id or breakout room id, created empty on first use.
#[derive(Debug, Default)]
pub struct FileWorkspaceStore {
    workspaces: HashMap<String, Workspace>,
}

impl FileWorkspaceStore {
    fn workspace(&mut self, id: &str) -> &mut Workspace {
        self.workspaces.entry(id.to_string()).or_default()
    }

    /// Append `file`. Ids must be unique within the workspace.
    pub fn create_file(&mut self, workspace_id: &str, mut file: File) -> SessionResult<File> {
        if file.id.trim().is_empty() {
            return Err(invalid("File id is required"));
        }
        let ws = self.workspace(workspace_id);
        if ws.files.iter().any(|f| f.id == file.id) {
            return Err(invalid(format!("File {} already exists", file.id)));
        }
        file.revision = ws.issued(&file.id);
        ws.files.push(file.clone());
        Ok(file)
    }

    /// Replace the content wholesale and bump the revision. Last write wins.
    pub fn update_file(&mut self, workspace_id: &str, file_id: &str, content: String) -> SessionResult<File> {
        let ws = self.workspace(workspace_id);
        let idx = ws.position(file_id)?;
        let revision = ws.bump(file_id);
        let file = &mut ws.files[idx];
        file.content = content;
        file.revision = revision;
        Ok(file.clone())
    }

    pub fn rename_file(&mut self, workspace_id: &str, file_id: &str, new_name: &str) -> SessionResult<File> {
        if new_name.trim().is_empty() {
            return Err(invalid("File name is required"));
        }
        let ws = self.workspace(workspace_id);
        let idx = ws.position(file_id)?;
        if ws.files.iter().any(|f| f.name == new_name && f.id != file_id) {
            return Err(SessionErr::NameTaken(new_name.to_string()));
        }
        ws.files[idx].name = new_name.to_string();
        Ok(ws.files[idx].clone())
    }

    /// Remove a file; clears the active pointer when it pointed at it.
    pub fn delete_file(&mut self, workspace_id: &str, file_id: &str) -> SessionResult<()> {
        let ws = self.workspace(workspace_id);
        let idx = ws.position(file_id)?;
        ws.files.remove(idx);
        if ws.current.as_deref() == Some(file_id) {
            ws.current = None;
        }
        Ok(())
    }

    /// Overwrite the whole workspace with a client-provided snapshot.
    ///
    /// A `currentFile` that is not among `files` is stored as no active file.
    /// Client revisions are ignored: a file keeps its stored revision, or
    /// gets the next one when the snapshot changed its content.
    pub fn replace(&mut self, workspace_id: &str, snapshot: WorkspaceSnapshot) -> SessionResult<WorkspaceSnapshot> {
        let mut seen = HashSet::new();
        if let Some(dup) = snapshot.files.iter().find(|f| !seen.insert(f.id.as_str())) {
            return Err(invalid(format!("Duplicate file id {}", dup.id)));
        }
        let current = snapshot
            .current_file
            .map(|f| f.id)
            .filter(|id| snapshot.files.iter().any(|f| &f.id == id));

        let ws = self.workspace(workspace_id);
        let mut files = snapshot.files;
        for file in &mut files {
            let unchanged = ws.files.iter().any(|f| f.id == file.id && f.content == file.content);
            file.revision = if unchanged || !ws.issued.contains_key(&file.id) {
                ws.issued(&file.id)
            } else {
                ws.bump(&file.id)
            };
        }
        ws.files = files;
        ws.current = current;
        Ok(ws.snapshot())
    }

    pub fn snapshot(&mut self, workspace_id: &str) -> WorkspaceSnapshot {
        self.workspace(workspace_id).snapshot()
    }

    /// Drop a workspace entirely (closed breakout rooms).
    pub fn discard(&mut self, workspace_id: &str) -> bool {
        self.workspaces.remove(workspace_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }
}
