//! Update actions for `update_item`.

use std::cmp::Reverse;

use serde_json::Value;

use super::path::{AttrPath, PathSegment};
use crate::error::ExpressionError;

/// An individual update action to apply to a document.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// Set the attribute at `path`. The parent of a nested path must already
    /// exist; a list index past the end appends.
    Set { path: AttrPath, value: Value },
    /// Remove the attribute at `path`. Removing a list element shifts the
    /// elements after it down by one. Missing paths are a no-op.
    Remove { path: AttrPath },
}

impl UpdateAction {
    pub fn set(path: AttrPath, value: Value) -> Self {
        UpdateAction::Set { path, value }
    }

    pub fn remove(path: AttrPath) -> Self {
        UpdateAction::Remove { path }
    }

    pub fn path(&self) -> &AttrPath {
        match self {
            UpdateAction::Set { path, .. } | UpdateAction::Remove { path } => path,
        }
    }
}

/// Reject empty updates, updates that touch key attributes, and actions whose
/// paths overlap.
pub fn validate_updates(
    actions: &[UpdateAction],
    pk_name: &str,
    sk_name: Option<&str>,
) -> Result<(), ExpressionError> {
    if actions.is_empty() {
        return Err(ExpressionError::EmptyUpdate);
    }

    for (i, action) in actions.iter().enumerate() {
        let root = action.path().root();
        if root == pk_name || Some(root) == sk_name {
            return Err(ExpressionError::KeyAttributeUpdate(root.to_string()));
        }
        for other in &actions[..i] {
            if overlaps(action.path(), other.path()) {
                return Err(ExpressionError::OverlappingPaths(
                    other.path().to_string(),
                    action.path().to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn overlaps(a: &AttrPath, b: &AttrPath) -> bool {
    let n = a.segments().len().min(b.segments().len());
    a.segments()[..n] == b.segments()[..n]
}

/// Apply update actions to a document.
///
/// SETs run first, in order. REMOVEs follow with list indexes taken from the
/// highest down, so every index refers to the list as it was before the
/// update.
pub fn apply_updates(doc: &mut Value, actions: &[UpdateAction]) -> Result<(), ExpressionError> {
    let mut removes = Vec::new();
    for action in actions {
        match action {
            UpdateAction::Set { path, value } => apply_set(doc, path, value.clone())?,
            UpdateAction::Remove { path } => removes.push(path),
        }
    }

    removes.sort_by_key(|path| {
        Reverse(match path.last() {
            PathSegment::Index(i) => *i,
            PathSegment::Attr(_) => 0,
        })
    });
    for path in removes {
        apply_remove(doc, path)?;
    }
    Ok(())
}

/// The paths whose values an `UPDATED_OLD`/`UPDATED_NEW` response reports.
///
/// Removing a list element changes the whole list, so the list itself is
/// reported.
pub fn updated_paths(actions: &[UpdateAction]) -> Vec<AttrPath> {
    let mut paths: Vec<AttrPath> = Vec::with_capacity(actions.len());
    for action in actions {
        let path = match action {
            UpdateAction::Remove { path } if matches!(path.last(), PathSegment::Index(_)) => {
                path.parent().unwrap_or_else(|| path.clone())
            }
            other => other.path().clone(),
        };
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

fn invalid(path: &AttrPath) -> ExpressionError {
    ExpressionError::InvalidDocumentPath(path.to_string())
}

fn apply_set(doc: &mut Value, path: &AttrPath, value: Value) -> Result<(), ExpressionError> {
    let parent = match path.parent() {
        Some(parent) => parent.resolve_mut(doc).ok_or_else(|| invalid(path))?,
        None => doc,
    };

    match (path.last(), parent) {
        (PathSegment::Attr(name), Value::Object(map)) => {
            map.insert(name.clone(), value);
        }
        (PathSegment::Index(i), Value::Array(list)) => {
            if *i < list.len() {
                list[*i] = value;
            } else {
                list.push(value);
            }
        }
        _ => return Err(invalid(path)),
    }
    Ok(())
}

fn apply_remove(doc: &mut Value, path: &AttrPath) -> Result<(), ExpressionError> {
    let parent = match path.parent() {
        Some(parent) => match parent.resolve_mut(doc) {
            Some(v) => v,
            None => return Ok(()),
        },
        None => doc,
    };

    match (path.last(), parent) {
        (PathSegment::Attr(name), Value::Object(map)) => {
            map.remove(name);
        }
        (PathSegment::Index(i), Value::Array(list)) => {
            if *i < list.len() {
                list.remove(*i);
            }
        }
        _ => return Err(invalid(path)),
    }
    Ok(())
}
