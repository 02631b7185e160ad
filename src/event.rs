//! Fan-out event binding.
//!
//! Each (node, event name) pair gets at most one native listener, a dispatcher that calls the pair's handlers in registration order.
//! Handlers can then be swapped between renders without touching the native listener at all,
//! and without leaking one listener per swap.

use crate::{
	error::{During, Error},
	host::{Dispatcher, Host},
	node::{Event, Handler},
};
use core::{cell::RefCell, hash::Hash};
use hashbrown::HashMap;
use std::rc::{Rc, Weak};
use tracing::{instrument, trace, trace_span};

type HandlerList = Rc<RefCell<Vec<Handler>>>;

/// Side table of logical handlers per live node.
///
/// Entries are dropped when their last handler is unbound or when the node is [forgotten](`EventRegistry::forget`),
/// which the reconciler does before releasing a node. The registry never keeps a live node alive.
#[derive(Debug)]
pub struct EventRegistry<N> {
	entries: HashMap<N, HashMap<Rc<str>, HandlerList>>,
}

impl<N> Default for EventRegistry<N> {
	fn default() -> Self {
		Self { entries: HashMap::new() }
	}
}

/// A handler bound through [`Renderer::bind`](`crate::Renderer::bind`).
///
/// Pass it to [`Renderer::release_binding`](`crate::Renderer::release_binding`) to unsubscribe.
#[derive(Clone, Debug, PartialEq)]
#[must_use = "a binding can only be released through its token"]
pub struct Binding<N> {
	pub(crate) node: N,
	pub(crate) event: Rc<str>,
	pub(crate) handler: Handler,
}

impl<N: Copy> Binding<N> {
	pub fn node(&self) -> N {
		self.node
	}

	#[must_use]
	pub fn event(&self) -> &str {
		&self.event
	}

	pub fn handler(&self) -> &Handler {
		&self.handler
	}
}

impl<N: Copy + Eq + Hash + core::fmt::Debug> EventRegistry<N> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `handler` to the handlers of `(node, event)`, installing the native dispatcher if this is the first one.
	///
	/// Binding the same handler twice registers it twice.
	#[instrument(skip(self, host, handler))]
	pub fn bind<H: Host<Node = N>>(&mut self, host: &mut H, node: N, event: &str, handler: Handler) -> Result<(), Error<H::Error>> {
		let events = self.entries.entry(node).or_default();
		let handlers = match events.get(event) {
			Some(handlers) => Rc::clone(handlers),
			None => {
				let handlers = HandlerList::default();
				if let Err(error) = host.listen(node, event, dispatcher(Rc::downgrade(&handlers))).during("listen") {
					if events.is_empty() {
						self.entries.remove(&node);
					}
					return Err(error);
				}
				trace!("Installed native dispatcher.");
				events.insert(event.into(), Rc::clone(&handlers));
				handlers
			}
		};
		handlers.borrow_mut().push(handler);
		Ok(())
	}

	/// Removes the first registration of `handler` for `(node, event)`, and the native dispatcher with the last one.
	///
	/// Returns whether a registration was removed. Unbinding a handler that isn't bound is not an error.
	#[instrument(skip(self, host, handler))]
	pub fn unbind<H: Host<Node = N>>(&mut self, host: &mut H, node: N, event: &str, handler: &Handler) -> Result<bool, Error<H::Error>> {
		let events = match self.entries.get_mut(&node) {
			Some(events) => events,
			None => {
				trace!("No handlers bound on this node.");
				return Ok(false);
			}
		};
		let drained = match events.get(event) {
			None => {
				trace!("No handlers bound for this event.");
				return Ok(false);
			}
			Some(handlers) => {
				let mut handlers = handlers.borrow_mut();
				match handlers.iter().position(|bound| bound.ptr_eq(handler)) {
					Some(i) => {
						handlers.remove(i);
					}
					None => {
						trace!("Handler not bound.");
						return Ok(false);
					}
				}
				handlers.is_empty()
			}
		};

		if drained {
			// The entry stays while the native dispatcher does, so that `forget` can still uninstall it.
			host.unlisten(node, event).during("unlisten")?;
			trace!("Uninstalled native dispatcher.");
			events.remove(event);
			if events.is_empty() {
				self.entries.remove(&node);
			}
		}
		Ok(true)
	}

	/// Drops all handlers of a node that is about to be released, uninstalling its dispatchers.
	#[instrument(skip(self, host))]
	pub fn forget<H: Host<Node = N>>(&mut self, host: &mut H, node: N) -> Result<(), Error<H::Error>> {
		if let Some(events) = self.entries.remove(&node) {
			for event in events.keys() {
				host.unlisten(node, event).during("unlisten")?;
			}
			trace!("Forgot {} event(s).", events.len());
		}
		Ok(())
	}

	#[must_use]
	pub fn handler_count(&self, node: N, event: &str) -> usize {
		self.entries
			.get(&node)
			.and_then(|events| events.get(event))
			.map_or(0, |handlers| handlers.borrow().len())
	}

	/// The number of installed native dispatchers.
	#[must_use]
	pub fn dispatcher_count(&self) -> usize {
		self.entries.values().map(HashMap::len).sum()
	}
}

fn dispatcher(handlers: Weak<RefCell<Vec<Handler>>>) -> Dispatcher {
	Rc::new(move |event: &Event| {
		let span = trace_span!("dispatch", event = %event.name);
		let _enter = span.enter();

		let handlers = match handlers.upgrade() {
			Some(handlers) => handlers,
			None => return trace!("Dispatcher outlived its handlers."),
		};

		// Snapshot, so that handlers may bind and unbind (or re-render) while this runs.
		let snapshot = handlers.borrow().clone();
		for handler in snapshot {
			handler.call(event);
		}
	})
}
