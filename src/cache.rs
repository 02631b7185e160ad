use crate::node::VNode;
use core::hash::Hash;
use hashbrown::HashMap;

/// Remembers the tree last rendered into each root, so that the next render can be diffed against it.
///
/// This is a side table keyed by handle, so it never keeps a live node alive by itself.
/// Entries go away through [`TreeCache::remove`], which [`Renderer::unmount`](`crate::Renderer::unmount`) calls.
#[derive(Debug)]
pub struct TreeCache<N> {
	trees: HashMap<N, VNode>,
}

impl<N> Default for TreeCache<N> {
	fn default() -> Self {
		Self { trees: HashMap::new() }
	}
}

impl<N: Copy + Eq + Hash> TreeCache<N> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn get(&self, root: N) -> Option<&VNode> {
		self.trees.get(&root)
	}

	/// Returns the replaced tree, if any.
	pub fn set(&mut self, root: N, tree: VNode) -> Option<VNode> {
		self.trees.insert(root, tree)
	}

	pub fn remove(&mut self, root: N) -> Option<VNode> {
		self.trees.remove(&root)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.trees.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.trees.is_empty()
	}
}
