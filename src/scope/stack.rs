//! The nested item stack templates execute against.
//!
//! Every lookup chain in a compiled template starts with [`ScopeStack::locally`]
//! and drills down with [`ScopeStack::obj`]; each step appends a transient
//! frame, and [`ScopeStack::reset_local_scope`] throws those frames away once
//! the chain has produced its value. Blocks (`<% loop %>`, `<% with %>`) make
//! the item a chain ended on the new local scope with [`ScopeStack::push_scope`]
//! and leave it again with [`ScopeStack::pop_scope`].
//!
//! Frame indexes recorded on each frame:
//!
//! - `pop_index`: the local scope to return to when the block ends
//! - `up_index`: the frame `$Up` navigates to
//! - `current_index`: the frame's own position, used to compute `up_index`
//!   for the next drill-down
//!
//! Frame 0 is the outermost item and is what `$Top` navigates to.

use std::sync::Arc;

use crate::core::{Result, StrataError};
use crate::model::Item;
use crate::properties::{IteratorPosition, PropertyMap};

/// Position within a collection being looped over.
#[derive(Debug, Clone)]
pub(crate) struct ItemCursor {
    items: Arc<[Item]>,
    position: usize,
}

impl ItemCursor {
    fn new(items: Vec<Item>) -> Self {
        Self {
            items: items.into(),
            position: 0,
        }
    }

    fn current(&self) -> Option<Item> {
        self.items.get(self.position).cloned()
    }

    fn valid(&self) -> bool {
        self.position < self.items.len()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Frame {
    item: Option<Item>,
    iterator: Option<ItemCursor>,
    total: usize,
    pop_index: Option<usize>,
    up_index: Option<usize>,
    current_index: Option<usize>,
    pub(crate) overlay: Option<PropertyMap>,
}

/// Stack of item contexts: index 0 is `$Top`, the last frame is `$this`.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    stack: Vec<Frame>,
    local_stack: Vec<Vec<Frame>>,
    local_index: usize,

    // Registers mirroring the frame the current lookup is positioned on
    item: Option<Item>,
    iterator: Option<ItemCursor>,
    total: usize,
    pop_index: Option<usize>,
    up_index: Option<usize>,
    current_index: Option<usize>,
}

impl ScopeStack {
    /// Start a stack for `item`.
    ///
    /// With an inherited scope (an included template rendering inside a loop),
    /// the parent's iterator and total carry over so position properties keep
    /// answering for the enclosing loop.
    pub fn new(item: Item, inherited: Option<&ScopeStack>) -> Self {
        let iterator = inherited.and_then(|scope| scope.iterator.clone());
        let total = inherited.map_or(0, |scope| scope.total);
        let root = Frame {
            item: Some(item.clone()),
            iterator: iterator.clone(),
            total,
            pop_index: None,
            up_index: None,
            current_index: Some(0),
            overlay: None,
        };

        Self {
            stack: vec![root],
            local_stack: Vec::new(),
            local_index: 0,
            item: Some(item),
            iterator,
            total,
            pop_index: None,
            up_index: None,
            current_index: Some(0),
        }
    }

    /// The item lookups currently resolve against.
    pub fn current_item(&self) -> Option<Item> {
        match &self.iterator {
            Some(cursor) => cursor.current(),
            None => self.item.clone(),
        }
    }

    /// Position of the active iteration, or `(0, 1)` outside a loop.
    pub fn iterator_position(&self) -> IteratorPosition {
        match &self.iterator {
            Some(cursor) => IteratorPosition::new(cursor.position, self.total),
            None => IteratorPosition::default(),
        }
    }

    pub fn is_iterating(&self) -> bool {
        self.iterator.is_some()
    }

    /// Index of the frame `$Up` would navigate to.
    pub fn up_index(&self) -> Option<usize> {
        self.up_index
    }

    /// Number of frames, including transient lookup frames.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn frame(&self, index: usize) -> Option<&Frame> {
        self.stack.get(index)
    }

    pub(crate) fn frame_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.stack.get_mut(index)
    }

    fn load(&mut self, frame: &Frame) {
        self.item = frame.item.clone();
        self.iterator = frame.iterator.clone();
        self.total = frame.total;
        self.pop_index = frame.pop_index;
        self.up_index = frame.up_index;
        self.current_index = frame.current_index;
    }

    fn snapshot(&self) -> Frame {
        Frame {
            item: self.item.clone(),
            iterator: self.iterator.clone(),
            total: self.total,
            pop_index: None,
            up_index: self.up_index,
            current_index: self.current_index,
            overlay: None,
        }
    }

    /// Start a lookup chain from the current local scope.
    ///
    /// Any unfinished chain (frames above the local scope) is set aside and
    /// restored by the matching [`reset_local_scope`](Self::reset_local_scope).
    pub fn locally(&mut self) -> &mut Self {
        let frame = self.stack[self.local_index].clone();
        self.load(&frame);
        let pending = self.stack.split_off(self.local_index + 1);
        self.local_stack.push(pending);
        self
    }

    /// Finish a lookup chain: drop its frames and reload the top frame.
    pub fn reset_local_scope(&mut self) {
        let previous = self.local_stack.pop().unwrap_or_default();
        self.stack.truncate(self.local_index + 1);
        self.stack.extend(previous);

        if let Some(frame) = self.stack.last().cloned() {
            self.load(&frame);
        }
    }

    /// Navigate to the parent frame (`$Up`).
    pub fn navigate_up(&mut self) -> Result<&mut Self> {
        let up_index = self.up_index.ok_or(StrataError::NoParentScope)?;
        let frame = self.stack.get(up_index).cloned().ok_or(StrataError::NoParentScope)?;
        self.navigate_to(&frame);
        Ok(self)
    }

    /// Navigate to the outermost frame (`$Top`).
    pub fn navigate_top(&mut self) -> &mut Self {
        let frame = self.stack[0].clone();
        self.navigate_to(&frame);
        self
    }

    fn navigate_to(&mut self, frame: &Frame) {
        self.item = frame.item.clone();
        self.iterator = frame.iterator.clone();
        self.total = frame.total;
        self.up_index = frame.up_index;
        self.current_index = frame.current_index;
        self.stack.push(self.snapshot());
    }

    /// Drill into an already resolved sub-item.
    pub fn descend(&mut self, item: Option<Item>) -> &mut Self {
        self.item = item;
        self.iterator = None;
        self.up_index = match self.current_index {
            Some(index) if index != 0 => Some(index),
            _ => Some(self.stack.len() - 1),
        };
        self.current_index = Some(self.stack.len());
        self.stack.push(self.snapshot());
        self
    }

    /// Look up a named member on the current item.
    pub fn get_obj(&self, name: &str, args: &[serde_json::Value]) -> Option<Item> {
        self.current_item().and_then(|on| on.obj(name, args))
    }

    /// Step of a lookup chain: `Up`, `Top`, `Me`, or a named member of the current item.
    pub fn obj(&mut self, name: &str, args: &[serde_json::Value]) -> Result<&mut Self> {
        match name {
            "Up" => self.navigate_up(),
            "Top" => Ok(self.navigate_top()),
            "Me" => {
                let item = self.current_item();
                Ok(self.descend(item))
            }
            _ => {
                let item = self.get_obj(name, args);
                Ok(self.descend(item))
            }
        }
    }

    /// Make the end of the current lookup chain the new local scope.
    pub fn push_scope(&mut self) -> &mut Self {
        let new_local_index = self.stack.len() - 1;
        let pop_index = self.local_index;

        self.pop_index = Some(pop_index);
        self.local_index = new_local_index;
        // $Up inside the block is whatever scope the block was opened from
        self.up_index = Some(pop_index);
        self.iterator = None;

        let frame = &mut self.stack[new_local_index];
        frame.pop_index = Some(pop_index);
        frame.up_index = Some(pop_index);
        frame.iterator = None;

        tracing::trace!("push_scope: local {pop_index} -> {new_local_index}");
        self
    }

    /// Leave the current block, returning to the scope it was opened from.
    pub fn pop_scope(&mut self) -> &mut Self {
        let pop_index = self.pop_index.unwrap_or(0);
        tracing::trace!("pop_scope: local {} -> {pop_index}", self.local_index);
        self.local_index = pop_index;
        self.reset_local_scope();
        self
    }

    /// Advance the loop over the current local scope's item.
    ///
    /// The first call creates the iterator (a non-collection item iterates
    /// once, an absent item not at all) and records its total. Returns the key
    /// of the new position, or `None` once the collection is exhausted.
    pub fn next(&mut self) -> Option<usize> {
        let item = self.item.clone()?;

        let cursor = match self.iterator.take() {
            Some(mut cursor) => {
                cursor.position += 1;
                cursor
            }
            None => {
                let items = match item.items() {
                    Some(items) => items,
                    None if item.exists() => vec![item],
                    None => Vec::new(),
                };
                let cursor = ItemCursor::new(items);
                self.total = cursor.items.len();
                if let Some(frame) = self.stack.get_mut(self.local_index) {
                    frame.total = self.total;
                }
                cursor
            }
        };

        if let Some(frame) = self.stack.get_mut(self.local_index) {
            frame.iterator = Some(cursor.clone());
        }
        self.iterator = Some(cursor);

        self.reset_local_scope();

        match &self.iterator {
            Some(cursor) if cursor.valid() => Some(cursor.position),
            _ => None,
        }
    }

    /// Render a member of the current item and end the lookup chain.
    pub fn xml_val(&mut self, name: &str, args: &[serde_json::Value]) -> String {
        let result = self.current_item().map(|on| on.xml_val(name, args)).unwrap_or_default();
        self.reset_local_scope();
        result
    }

    /// Truthiness of a member of the current item; ends the lookup chain.
    pub fn has_value(&mut self, name: &str, args: &[serde_json::Value]) -> bool {
        let result = self.current_item().is_some_and(|on| on.has_value(name, args));
        self.reset_local_scope();
        result
    }

    /// The current item itself (`$Me`); ends the lookup chain.
    pub fn self_item(&mut self) -> Option<Item> {
        let result = self.current_item();
        self.reset_local_scope();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataObject;
    use serde_json::json;

    fn page() -> Item {
        Arc::new(DataObject::from_json(json!({
            "Title": "Home",
            "Author": { "Name": "Ada", "Title": "Author page" },
            "Children": [
                { "Title": "One" },
                { "Title": "Two" },
                { "Title": "Three" }
            ]
        })))
    }

    #[test]
    fn test_lookup_chain_resets() {
        let mut scope = ScopeStack::new(page(), None);
        let depth = scope.depth();

        let name = scope.locally().obj("Author", &[]).unwrap().xml_val("Name", &[]);
        assert_eq!(name, "Ada");
        assert_eq!(scope.depth(), depth);
        assert_eq!(scope.locally().xml_val("Title", &[]), "Home");
    }

    #[test]
    fn test_missing_member_renders_empty() {
        let mut scope = ScopeStack::new(page(), None);
        assert_eq!(scope.locally().obj("Nope", &[]).unwrap().xml_val("Name", &[]), "");
        assert!(!scope.locally().has_value("Nope", &[]));
    }

    #[test]
    fn test_loop_iterates_with_positions() {
        let mut scope = ScopeStack::new(page(), None);
        scope.locally().obj("Children", &[]).unwrap();
        scope.push_scope();

        let mut seen = Vec::new();
        while let Some(key) = scope.next() {
            let position = scope.iterator_position();
            assert_eq!(position.index, key);
            assert_eq!(position.total, 3);
            seen.push(scope.locally().xml_val("Title", &[]));
        }
        scope.pop_scope();

        assert_eq!(seen, vec!["One", "Two", "Three"]);
        assert!(!scope.is_iterating());
        assert_eq!(scope.locally().xml_val("Title", &[]), "Home");
    }

    #[test]
    fn test_up_inside_with_block() {
        let mut scope = ScopeStack::new(page(), None);
        scope.locally().obj("Author", &[]).unwrap();
        scope.push_scope();

        assert_eq!(scope.locally().xml_val("Title", &[]), "Author page");
        let up_title = scope.locally().obj("Up", &[]).unwrap().xml_val("Title", &[]);
        assert_eq!(up_title, "Home");

        scope.pop_scope();
        assert_eq!(scope.locally().xml_val("Title", &[]), "Home");
    }

    #[test]
    fn test_up_from_loop_reaches_enclosing_item() {
        let mut scope = ScopeStack::new(page(), None);
        scope.locally().obj("Children", &[]).unwrap();
        scope.push_scope();

        assert_eq!(scope.next(), Some(0));
        let up_title = scope.locally().obj("Up", &[]).unwrap().xml_val("Title", &[]);
        assert_eq!(up_title, "Home");
        // the loop position survives the $Up lookup
        assert_eq!(scope.locally().xml_val("Title", &[]), "One");
        scope.pop_scope();
    }

    #[test]
    fn test_up_at_top_fails() {
        let mut scope = ScopeStack::new(page(), None);
        let err = scope.locally().obj("Up", &[]).unwrap_err();
        assert!(matches!(err, StrataError::NoParentScope));
    }

    #[test]
    fn test_top_from_nested_blocks() {
        let mut scope = ScopeStack::new(page(), None);
        scope.locally().obj("Children", &[]).unwrap();
        scope.push_scope();
        scope.next();
        scope.locally().obj("Author", &[]).unwrap();
        scope.push_scope();

        let top = scope.locally().obj("Top", &[]).unwrap().xml_val("Title", &[]);
        assert_eq!(top, "Home");

        scope.pop_scope();
        scope.pop_scope();
    }

    #[test]
    fn test_non_collection_iterates_once() {
        let mut scope = ScopeStack::new(page(), None);
        scope.locally().obj("Author", &[]).unwrap();
        scope.push_scope();
        assert_eq!(scope.next(), Some(0));
        assert_eq!(scope.next(), None);
        scope.pop_scope();

        scope.locally().obj("Missing", &[]).unwrap();
        scope.push_scope();
        assert_eq!(scope.next(), None);
        scope.pop_scope();
    }

    #[test]
    fn test_inherited_scope_keeps_iterator() {
        let mut parent = ScopeStack::new(page(), None);
        parent.locally().obj("Children", &[]).unwrap();
        parent.push_scope();
        parent.next();
        parent.next();

        let current = parent.current_item().unwrap();
        let child = ScopeStack::new(current, Some(&parent));
        assert_eq!(child.iterator_position(), IteratorPosition::new(1, 3));
    }
}
