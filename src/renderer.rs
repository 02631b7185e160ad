use crate::{
	cache::TreeCache,
	config::Config,
	error::Error,
	event::{Binding, EventRegistry},
	host::Host,
	node::{Handler, VNode},
	reconcile::{PostAttach, Reconciler},
};
use core::mem;
use tracing::{info, instrument, trace};

/// Renders virtual trees into the live tree of a [`Host`], diffing each render against the previous one.
///
/// Roots are independent of each other. Everything a root needs between renders lives in side tables
/// keyed by node handle, and is dropped when the node is released or the root is [unmounted](`Renderer::unmount`).
///
/// # Correct Use
///
/// The live children of a root are owned by the renderer after the first [`Renderer::mount`].
/// Changing them through other means is logged and repaired on the next render, where possible.
#[derive(Debug)]
pub struct Renderer<H: Host> {
	host: H,
	events: EventRegistry<H::Node>,
	trees: TreeCache<H::Node>,
	config: Config,
	deferred: Vec<PostAttach<H::Node>>,
}

impl<H: Host> Renderer<H> {
	pub fn new(host: H) -> Self {
		Self::with_config(host, Config::default())
	}

	pub fn with_config(host: H, config: Config) -> Self {
		Self {
			host,
			events: EventRegistry::new(),
			trees: TreeCache::new(),
			config,
			deferred: Vec::new(),
		}
	}

	/// Renders `tree` into `root`, replacing what was rendered there before.
	///
	/// The first call for a root clears its existing children. Later calls apply only the difference to the previous tree.
	/// A sequence of nodes is rendered inside a [`FRAGMENT_TYPE`](`crate::FRAGMENT_TYPE`) wrapper.
	///
	/// Focus changes are deferred until [`Renderer::flush_deferred`].
	/// Deferred actions whose node this call releases are dropped.
	///
	/// # Errors
	///
	/// Iff the host fails or the tree is nested too deeply.
	/// The live tree may then be partially updated, so the root is treated as unrendered and will be rebuilt by the next call.
	#[instrument(skip(self, tree))]
	pub fn mount(&mut self, root: H::Node, tree: impl Into<VNode>) -> Result<(), Error<H::Error>> {
		let tree = tree.into();
		let old = self.trees.get(root);
		let reconciled = Reconciler::new(&mut self.host, &mut self.events, &self.config, &mut self.deferred).reconcile(root, old, &tree);
		if let Err(error) = reconciled {
			self.trees.remove(root);
			return Err(error);
		}
		self.trees.set(root, tree);

		info!("Event dispatcher count: {}", self.events.dispatcher_count());
		info!("Deferred action count: {}", self.deferred.len());
		Ok(())
	}

	/// Removes everything rendered into `root` and forgets its tree.
	///
	/// # Errors
	///
	/// Iff the host fails.
	#[instrument(skip(self))]
	pub fn unmount(&mut self, root: H::Node) -> Result<(), Error<H::Error>> {
		if self.trees.remove(root).is_none() {
			trace!("Nothing was mounted here.");
		}
		Reconciler::new(&mut self.host, &mut self.events, &self.config, &mut self.deferred).clear(root)
	}

	/// Runs the actions deferred by previous renders. Call this at the next idle point, once everything is attached.
	///
	/// Returns how many of them took effect. Actions targeting nodes that are gone by now are skipped.
	///
	/// # Errors
	///
	/// Iff the host fails. Remaining actions are dropped.
	#[instrument(skip(self))]
	pub fn flush_deferred(&mut self) -> Result<usize, Error<H::Error>> {
		let mut applied = 0;
		for action in mem::take(&mut self.deferred) {
			if action.run(&mut self.host)? {
				applied += 1;
			}
		}
		Ok(applied)
	}

	#[must_use]
	pub fn pending_deferred(&self) -> usize {
		self.deferred.len()
	}

	/// Binds `handler` to `event` on `node`, next to any handlers bound by rendering.
	///
	/// # Errors
	///
	/// Iff the host fails to install the dispatcher.
	pub fn bind(&mut self, node: H::Node, event: &str, handler: Handler) -> Result<Binding<H::Node>, Error<H::Error>> {
		self.events.bind(&mut self.host, node, event, handler.clone())?;
		Ok(Binding {
			node,
			event: event.into(),
			handler,
		})
	}

	/// Unbinds the first registration of `handler`. Returns whether there was one.
	///
	/// # Errors
	///
	/// Iff the host fails to uninstall the dispatcher.
	pub fn unbind(&mut self, node: H::Node, event: &str, handler: &Handler) -> Result<bool, Error<H::Error>> {
		self.events.unbind(&mut self.host, node, event, handler)
	}

	/// Unbinds what [`Renderer::bind`] bound.
	///
	/// # Errors
	///
	/// Iff the host fails to uninstall the dispatcher.
	pub fn release_binding(&mut self, binding: Binding<H::Node>) -> Result<bool, Error<H::Error>> {
		self.unbind(binding.node, &binding.event, &binding.handler)
	}

	#[must_use]
	pub fn handler_count(&self, node: H::Node, event: &str) -> usize {
		self.events.handler_count(node, event)
	}

	#[must_use]
	pub fn cached_tree(&self, root: H::Node) -> Option<&VNode> {
		self.trees.get(root)
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	pub fn config(&self) -> &Config {
		&self.config
	}
}
