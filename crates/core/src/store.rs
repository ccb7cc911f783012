//! Authoritative in-memory annotation collection
//!
//! The store keeps creation order, assigns order numbers and broadcasts every
//! committed change to subscribers. It performs no I/O.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use thiserror::Error;

use crate::annotation::{Annotation, AnnotationId, AnnotationPatch, NewAnnotation};
use crate::geometry::BoxSize;

/// Store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("annotation not found: {0}")]
    NotFound(AnnotationId),
}

/// A committed change: `previous` is `None` for additions, `next` is `None` for deletions
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationChange {
    pub id: AnnotationId,
    pub previous: Option<Annotation>,
    pub next: Option<Annotation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

impl AnnotationChange {
    pub fn kind(&self) -> ChangeKind {
        match (&self.previous, &self.next) {
            (None, _) => ChangeKind::Added,
            (Some(_), Some(_)) => ChangeKind::Updated,
            (Some(_), None) => ChangeKind::Deleted,
        }
    }
}

/// Annotation collection for one open document
#[derive(Debug)]
pub struct AnnotationStore {
    annotations: HashMap<AnnotationId, Annotation>,
    /// Ids in creation order
    order: Vec<AnnotationId>,
    selected: Option<AnnotationId>,
    min_size: f32,
    subscribers: Vec<Sender<AnnotationChange>>,
}

impl AnnotationStore {
    /// Create a store enforcing a minimum box side of `min_size` points
    pub fn new(min_size: f32) -> Self {
        Self {
            annotations: HashMap::new(),
            order: Vec::new(),
            selected: None,
            min_size,
            subscribers: Vec::new(),
        }
    }

    pub fn min_size(&self) -> f32 {
        self.min_size
    }

    /// Receive every committed change from now on
    pub fn subscribe(&mut self) -> Receiver<AnnotationChange> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn add(&mut self, new: NewAnnotation) -> AnnotationId {
        let id = AnnotationId::new_v4();
        let order = self.annotations.values().map(|a| a.order).max().unwrap_or(0) + 1;
        let annotation = Annotation {
            id,
            page_index: new.page_index,
            position: new.position,
            size: new.size.map(|s| self.floor(s)),
            payload: new.payload,
            order,
        };

        log::debug!(
            "added {:?} annotation {} on page {} at ({:.2}, {:.2})",
            annotation.tool(),
            id,
            annotation.page_index,
            annotation.position.x,
            annotation.position.y
        );

        self.annotations.insert(id, annotation.clone());
        self.order.push(id);
        self.emit(AnnotationChange {
            id,
            previous: None,
            next: Some(annotation),
        });
        id
    }

    pub fn update(&mut self, id: AnnotationId, patch: AnnotationPatch) -> Result<(), StoreError> {
        let min_size = self.min_size;
        let annotation = self.annotations.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        let previous = annotation.clone();
        let patch = AnnotationPatch {
            size: patch.size.map(|s| s.with_floor(min_size)),
            ..patch
        };
        if !annotation.apply(&patch) {
            return Ok(());
        }

        let next = annotation.clone();
        log::debug!(
            "updated annotation {} to ({:.2}, {:.2})",
            id,
            next.position.x,
            next.position.y
        );
        self.emit(AnnotationChange {
            id,
            previous: Some(previous),
            next: Some(next),
        });
        Ok(())
    }

    pub fn delete(&mut self, id: AnnotationId) -> Result<Annotation, StoreError> {
        let removed = self.annotations.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.order.retain(|other| *other != id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.emit(AnnotationChange {
            id,
            previous: Some(removed.clone()),
            next: None,
        });
        Ok(removed)
    }

    /// Select an annotation, or clear the selection with `None`
    pub fn select(&mut self, id: Option<AnnotationId>) -> Result<(), StoreError> {
        if let Some(id) = id {
            if !self.annotations.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
        }
        self.selected = id;
        Ok(())
    }

    pub fn selected(&self) -> Option<&Annotation> {
        self.selected.and_then(|id| self.annotations.get(&id))
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    /// Annotations on one page, in creation order
    pub fn list(&self, page_index: u32) -> Vec<&Annotation> {
        self.all()
            .into_iter()
            .filter(|a| a.page_index == page_index)
            .collect()
    }

    /// Every annotation, in creation order
    pub fn all(&self) -> Vec<&Annotation> {
        self.order
            .iter()
            .filter_map(|id| self.annotations.get(id))
            .collect()
    }

    /// Owned copy for export
    pub fn snapshot(&self) -> Vec<Annotation> {
        self.all().into_iter().cloned().collect()
    }

    /// Remove every annotation, emitting a deletion for each
    pub fn clear(&mut self) {
        let ids = std::mem::take(&mut self.order);
        self.selected = None;
        for id in ids {
            if let Some(removed) = self.annotations.remove(&id) {
                self.emit(AnnotationChange {
                    id,
                    previous: Some(removed),
                    next: None,
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    fn floor(&self, size: BoxSize) -> BoxSize {
        size.with_floor(self.min_size)
    }

    fn emit(&mut self, change: AnnotationChange) {
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MIN_ANNOTATION_SIZE)
    }
}
