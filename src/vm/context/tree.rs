//! This module contains the tree of call contexts.

use crate::vm::context::CallContextId;

/// A node in the tree of call contexts, holding the children in the order
/// they were entered.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallTree {
    context:  CallContextId,
    children: Vec<CallTree>,
}

impl CallTree {
    /// Creates a tree containing only the `root` context.
    #[must_use]
    pub fn new(root: CallContextId) -> Self {
        let children = Vec::new();
        Self {
            context: root,
            children,
        }
    }

    /// Gets the context at this node.
    #[must_use]
    pub fn context(&self) -> CallContextId {
        self.context
    }

    /// Gets the children of this node in the order they were entered.
    #[must_use]
    pub fn children(&self) -> &[CallTree] {
        &self.children
    }

    /// Attaches `child` as the last child of the node for `parent`.
    ///
    /// Returns `false` if `parent` is not in the tree.
    pub fn insert(&mut self, parent: CallContextId, child: CallContextId) -> bool {
        match self.find_mut(parent) {
            Some(node) => {
                node.children.push(Self::new(child));
                true
            }
            None => false,
        }
    }

    /// Finds the node for `context`.
    #[must_use]
    pub fn find(&self, context: CallContextId) -> Option<&CallTree> {
        if self.context == context {
            return Some(self);
        }
        // Newer contexts are most likely to be the ones asked about.
        self.children.iter().rev().find_map(|c| c.find(context))
    }

    fn find_mut(&mut self, context: CallContextId) -> Option<&mut CallTree> {
        if self.context == context {
            return Some(self);
        }
        self.children
            .iter_mut()
            .rev()
            .find_map(|c| c.find_mut(context))
    }

    /// Iterates over the contexts in the tree depth first, in the order they
    /// were entered.
    #[must_use]
    pub fn contexts(&self) -> Vec<CallContextId> {
        let mut result = vec![self.context];
        for child in &self.children {
            result.extend(child.contexts());
        }
        result
    }

    /// Counts the contexts in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(CallTree::len).sum::<usize>()
    }

    /// Checks if the tree is empty, which it never is.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod test {
    use crate::vm::context::{tree::CallTree, CallContextId};

    #[test]
    fn attaches_children_under_their_parent() {
        let mut tree = CallTree::new(CallContextId(0));
        assert!(tree.insert(CallContextId(0), CallContextId(1)));
        assert!(tree.insert(CallContextId(1), CallContextId(2)));
        assert!(tree.insert(CallContextId(0), CallContextId(3)));

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.children().len(), 2);
        assert_eq!(
            tree.contexts(),
            vec![
                CallContextId(0),
                CallContextId(1),
                CallContextId(2),
                CallContextId(3)
            ]
        );
        let inner = tree.find(CallContextId(1)).expect("Node was inserted");
        assert_eq!(inner.children()[0].context(), CallContextId(2));
    }

    #[test]
    fn refuses_unknown_parents() {
        let mut tree = CallTree::new(CallContextId(0));
        assert!(!tree.insert(CallContextId(7), CallContextId(1)));
        assert_eq!(tree.len(), 1);
    }
}
