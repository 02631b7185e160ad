//! The capability interface of a live presentation tree.

use crate::node::Event;
use core::{fmt::Debug, hash::Hash};
use std::rc::Rc;

/// The single native listener installed per (node, event name).
pub type Dispatcher = Rc<dyn Fn(&Event)>;

/// A live, stateful presentation tree the reconciler can mutate.
///
/// Nodes are referred to by copyable handles.
/// A handle stays valid until it is passed to [`Host::release`], which the reconciler does exactly once for each node it removes.
///
/// Implementations are expected to behave like the DOM where it matters:
/// Inserting a node that already has a parent moves it.
pub trait Host {
	type Node: Copy + Eq + Hash + Debug;
	type Error: std::error::Error + 'static;

	fn create_element(&mut self, type_name: &str) -> Result<Self::Node, Self::Error>;
	fn create_text(&mut self, data: &str) -> Result<Self::Node, Self::Error>;
	/// Replaces the data of a text node in place.
	fn set_text(&mut self, node: Self::Node, data: &str) -> Result<(), Self::Error>;

	fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str) -> Result<(), Self::Error>;
	fn remove_attribute(&mut self, node: Self::Node, name: &str) -> Result<(), Self::Error>;
	fn set_class_name(&mut self, node: Self::Node, class_name: &str) -> Result<(), Self::Error>;
	/// Sets live boolean state like `checked`. `false` is the default.
	fn set_flag(&mut self, node: Self::Node, name: &str, on: bool) -> Result<(), Self::Error>;
	/// Sets the live `value`. `""` is the default.
	fn set_value(&mut self, node: Self::Node, value: &str) -> Result<(), Self::Error>;

	/// Installs `dispatcher` as the native listener for `event`, replacing any previous one.
	fn listen(&mut self, node: Self::Node, event: &str, dispatcher: Dispatcher) -> Result<(), Self::Error>;
	fn unlisten(&mut self, node: Self::Node, event: &str) -> Result<(), Self::Error>;

	fn children(&mut self, node: Self::Node) -> Result<Vec<Self::Node>, Self::Error>;
	/// Inserts `child` before `reference`, or appends it if `reference` is [`None`].
	fn insert_before(&mut self, parent: Self::Node, child: Self::Node, reference: Option<Self::Node>) -> Result<(), Self::Error>;
	fn remove_child(&mut self, parent: Self::Node, child: Self::Node) -> Result<(), Self::Error>;
	fn replace_child(&mut self, parent: Self::Node, new: Self::Node, old: Self::Node) -> Result<(), Self::Error>;
	/// Invalidates the handle of a detached node. Unknown handles are ignored.
	fn release(&mut self, node: Self::Node);

	/// Reads an attribute as rendered. `class` reads the class name.
	fn attribute(&self, node: Self::Node, name: &str) -> Option<String>;
	/// The node holding focus, if it is a known node other than the document itself.
	fn focused(&self) -> Option<Self::Node>;
	fn focus(&mut self, node: Self::Node) -> Result<(), Self::Error>;
	fn selection(&self, node: Self::Node) -> Option<(u32, u32)>;
	fn set_selection(&mut self, node: Self::Node, start: u32, end: u32) -> Result<(), Self::Error>;
	fn is_connected(&self, node: Self::Node) -> bool;
	/// Whether the node keeps a text cursor, like `<textarea>` or a text `<input>`.
	fn is_text_input(&self, node: Self::Node) -> bool;
}
