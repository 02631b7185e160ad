//! A headless, in-memory [`Host`].
//!
//! [`ArenaDocument`] keeps its nodes in a [`Slab`] and records every write it receives as a [`Mutation`],
//! which makes it suitable for testing renderers and for rendering without a browser.

use crate::{
	host::{Dispatcher, Host},
	node::Event,
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter, Write as _},
};
use hashbrown::{HashMap, HashSet};
use slab::Slab;
use std::rc::Rc;
use thiserror::Error;
use tracing::trace;

/// Handle of a node in an [`ArenaDocument`]. Slots are reused after release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One write received through [`Host`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
	CreateElement { node: NodeId, type_name: String },
	CreateText { node: NodeId, data: String },
	SetText { node: NodeId, data: String },
	SetAttribute { node: NodeId, name: String, value: String },
	RemoveAttribute { node: NodeId, name: String },
	SetClassName { node: NodeId, class_name: String },
	SetFlag { node: NodeId, name: String, on: bool },
	SetValue { node: NodeId, value: String },
	Listen { node: NodeId, event: String },
	Unlisten { node: NodeId, event: String },
	Insert { parent: NodeId, child: NodeId, before: Option<NodeId> },
	Remove { parent: NodeId, child: NodeId },
	Replace { parent: NodeId, new: NodeId, old: NodeId },
	Focus { node: NodeId },
	SetSelection { node: NodeId, start: u32, end: u32 },
}

impl Mutation {
	/// Whether this creates, moves or removes a node, as opposed to changing one in place.
	#[must_use]
	pub fn is_structural(&self) -> bool {
		matches!(
			self,
			Self::CreateElement { .. } | Self::CreateText { .. } | Self::Insert { .. } | Self::Remove { .. } | Self::Replace { .. }
		)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArenaError {
	#[error("unknown node {0:?}")]
	UnknownNode(NodeId),
	#[error("{child:?} is not a child of {parent:?}")]
	NotAChild { parent: NodeId, child: NodeId },
	#[error("{0:?} is not an element")]
	NotAnElement(NodeId),
	#[error("{0:?} is not a text node")]
	NotAText(NodeId),
	#[error("inserting {child:?} into {parent:?} would create a cycle")]
	Cycle { parent: NodeId, child: NodeId },
}

struct ArenaNode {
	parent: Option<NodeId>,
	data: NodeData,
}

enum NodeData {
	Element(ElementData),
	Text(String),
}

#[derive(Default)]
struct ElementData {
	type_name: String,
	attributes: Vec<(String, String)>,
	class_name: String,
	flags: HashSet<String>,
	value: Option<String>,
	selection: Option<(u32, u32)>,
	listeners: HashMap<String, Dispatcher>,
	children: Vec<NodeId>,
}

struct Tree {
	nodes: Slab<ArenaNode>,
	body: NodeId,
	focused: Option<NodeId>,
	mutations: Vec<Mutation>,
}

impl Tree {
	fn node(&self, id: NodeId) -> Result<&ArenaNode, ArenaError> {
		self.nodes.get(id.0).ok_or(ArenaError::UnknownNode(id))
	}

	fn element(&self, id: NodeId) -> Result<&ElementData, ArenaError> {
		match &self.node(id)?.data {
			NodeData::Element(element) => Ok(element),
			NodeData::Text(_) => Err(ArenaError::NotAnElement(id)),
		}
	}

	fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, ArenaError> {
		match self.nodes.get_mut(id.0).map(|node| &mut node.data) {
			Some(NodeData::Element(element)) => Ok(element),
			Some(NodeData::Text(_)) => Err(ArenaError::NotAnElement(id)),
			None => Err(ArenaError::UnknownNode(id)),
		}
	}

	fn insert(&mut self, data: NodeData) -> NodeId {
		NodeId(self.nodes.insert(ArenaNode { parent: None, data }))
	}

	fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
		loop {
			if node == ancestor {
				return true;
			}
			match self.nodes.get(node.0).and_then(|node| node.parent) {
				Some(parent) => node = parent,
				None => return false,
			}
		}
	}

	fn detach(&mut self, child: NodeId) {
		if let Some(parent) = self.nodes.get_mut(child.0).and_then(|node| node.parent.take()) {
			if let Ok(parent) = self.element_mut(parent) {
				parent.children.retain(|sibling| *sibling != child);
			}
		}
	}

	fn write_html(&self, id: NodeId, out: &mut String) {
		let node = match self.nodes.get(id.0) {
			Some(node) => node,
			None => return,
		};
		match &node.data {
			NodeData::Text(data) => escape(data, out),
			NodeData::Element(element) => {
				out.push('<');
				out.push_str(&element.type_name);

				let mut attributes: Vec<(&str, Option<&str>)> = element.attributes.iter().map(|(name, value)| (name.as_str(), Some(value.as_str()))).collect();
				if !element.class_name.is_empty() {
					attributes.push(("class", Some(element.class_name.as_str())));
				}
				attributes.extend(element.flags.iter().map(|flag| (flag.as_str(), None)));
				if let Some(value) = &element.value {
					attributes.push(("value", Some(value.as_str())));
				}
				attributes.sort_unstable();
				for (name, value) in attributes {
					out.push(' ');
					out.push_str(name);
					if let Some(value) = value {
						out.push_str("=\"");
						escape(value, out);
						out.push('"');
					}
				}

				out.push('>');
				for child in &element.children {
					self.write_html(*child, out);
				}
				let _ = write!(out, "</{}>", element.type_name);
			}
		}
	}
}

fn escape(text: &str, out: &mut String) {
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			c => out.push(c),
		}
	}
}

const TEXT_INPUT_TYPES: &[&str] = &["text", "search", "url", "tel", "password", "email"];

/// An in-memory document with a `<body>` root.
///
/// Clones share the same document, so a test can keep one while a [`Renderer`](`crate::Renderer`) owns another.
#[derive(Clone)]
pub struct ArenaDocument(Rc<RefCell<Tree>>);

impl Default for ArenaDocument {
	fn default() -> Self {
		Self::new()
	}
}

impl Debug for ArenaDocument {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let tree = self.0.borrow();
		f.debug_struct("ArenaDocument")
			.field("nodes", &tree.nodes.len())
			.field("focused", &tree.focused)
			.field("mutations", &tree.mutations.len())
			.finish()
	}
}

impl ArenaDocument {
	#[must_use]
	pub fn new() -> Self {
		let mut nodes = Slab::new();
		let body = NodeId(nodes.insert(ArenaNode {
			parent: None,
			data: NodeData::Element(ElementData {
				type_name: "body".to_owned(),
				..ElementData::default()
			}),
		}));
		Self(Rc::new(RefCell::new(Tree {
			nodes,
			body,
			focused: None,
			mutations: Vec::new(),
		})))
	}

	/// The document root. Nodes are connected if they are (inclusive) descendants of it.
	#[must_use]
	pub fn body(&self) -> NodeId {
		self.0.borrow().body
	}

	/// Creates a detached element without recording it, e.g. to mount into.
	#[must_use]
	pub fn create_root(&self, type_name: &str) -> NodeId {
		self.0.borrow_mut().insert(NodeData::Element(ElementData {
			type_name: type_name.to_owned(),
			..ElementData::default()
		}))
	}

	/// Invokes the native listener for `event.name` on `node`.
	///
	/// No borrow of the document is held while it runs, so handlers may freely re-render.
	/// Returns whether a listener was installed.
	pub fn dispatch(&self, node: NodeId, event: &Event) -> bool {
		let dispatcher = {
			let tree = self.0.borrow();
			tree.element(node).ok().and_then(|element| element.listeners.get(&event.name).cloned())
		};
		match dispatcher {
			Some(dispatcher) => {
				dispatcher(event);
				true
			}
			None => {
				trace!("No listener for {:?} on {:?}.", event.name, node);
				false
			}
		}
	}

	#[must_use]
	pub fn mutations(&self) -> Vec<Mutation> {
		self.0.borrow().mutations.clone()
	}

	pub fn take_mutations(&self) -> Vec<Mutation> {
		core::mem::take(&mut self.0.borrow_mut().mutations)
	}

	/// Serializes a subtree. Attributes are sorted by name, so equal trees serialize equally regardless of write order.
	#[must_use]
	pub fn to_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		self.0.borrow().write_html(node, &mut html);
		html
	}

	/// Serializes the children of `node`.
	#[must_use]
	pub fn inner_html(&self, node: NodeId) -> String {
		let tree = self.0.borrow();
		let mut html = String::new();
		if let Ok(element) = tree.element(node) {
			for child in &element.children {
				tree.write_html(*child, &mut html);
			}
		}
		html
	}

	#[must_use]
	pub fn child_nodes(&self, node: NodeId) -> Vec<NodeId> {
		self.0.borrow().element(node).map(|element| element.children.clone()).unwrap_or_default()
	}

	#[must_use]
	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.0.borrow().node(node).ok().and_then(|node| node.parent)
	}

	#[must_use]
	pub fn tag_name(&self, node: NodeId) -> Option<String> {
		self.0.borrow().element(node).ok().map(|element| element.type_name.clone())
	}

	#[must_use]
	pub fn text(&self, node: NodeId) -> Option<String> {
		match &self.0.borrow().node(node).ok()?.data {
			NodeData::Text(data) => Some(data.clone()),
			NodeData::Element(_) => None,
		}
	}

	#[must_use]
	pub fn flag(&self, node: NodeId, name: &str) -> bool {
		self.0.borrow().element(node).map_or(false, |element| element.flags.contains(name))
	}

	#[must_use]
	pub fn value(&self, node: NodeId) -> Option<String> {
		self.0.borrow().element(node).ok().and_then(|element| element.value.clone())
	}

	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.0.borrow().nodes.iter().map(|(_, node)| match &node.data {
			NodeData::Element(element) => element.listeners.len(),
			NodeData::Text(_) => 0,
		}).sum()
	}

	#[must_use]
	pub fn contains(&self, node: NodeId) -> bool {
		self.0.borrow().nodes.contains(node.0)
	}

	/// The number of live (unreleased) nodes, including the body.
	#[must_use]
	pub fn node_count(&self) -> usize {
		self.0.borrow().nodes.len()
	}

	fn write<T>(&mut self, f: impl FnOnce(&mut Tree) -> Result<(T, Mutation), ArenaError>) -> Result<T, ArenaError> {
		let mut tree = self.0.borrow_mut();
		let (result, mutation) = f(&mut *tree)?;
		trace!(?mutation);
		tree.mutations.push(mutation);
		Ok(result)
	}
}

impl Host for ArenaDocument {
	type Node = NodeId;
	type Error = ArenaError;

	fn create_element(&mut self, type_name: &str) -> Result<NodeId, ArenaError> {
		self.write(|tree| {
			let node = tree.insert(NodeData::Element(ElementData {
				type_name: type_name.to_owned(),
				..ElementData::default()
			}));
			Ok((node, Mutation::CreateElement { node, type_name: type_name.to_owned() }))
		})
	}

	fn create_text(&mut self, data: &str) -> Result<NodeId, ArenaError> {
		self.write(|tree| {
			let node = tree.insert(NodeData::Text(data.to_owned()));
			Ok((node, Mutation::CreateText { node, data: data.to_owned() }))
		})
	}

	fn set_text(&mut self, node: NodeId, data: &str) -> Result<(), ArenaError> {
		self.write(|tree| match tree.nodes.get_mut(node.0).map(|node| &mut node.data) {
			Some(NodeData::Text(text)) => {
				data.clone_into(text);
				Ok(((), Mutation::SetText { node, data: data.to_owned() }))
			}
			Some(NodeData::Element(_)) => Err(ArenaError::NotAText(node)),
			None => Err(ArenaError::UnknownNode(node)),
		})
	}

	fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), ArenaError> {
		self.write(|tree| {
			let attributes = &mut tree.element_mut(node)?.attributes;
			match attributes.iter_mut().find(|(existing, _)| existing == name) {
				Some((_, existing)) => value.clone_into(existing),
				None => attributes.push((name.to_owned(), value.to_owned())),
			}
			Ok((
				(),
				Mutation::SetAttribute {
					node,
					name: name.to_owned(),
					value: value.to_owned(),
				},
			))
		})
	}

	fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), ArenaError> {
		self.write(|tree| {
			tree.element_mut(node)?.attributes.retain(|(existing, _)| existing != name);
			Ok(((), Mutation::RemoveAttribute { node, name: name.to_owned() }))
		})
	}

	fn set_class_name(&mut self, node: NodeId, class_name: &str) -> Result<(), ArenaError> {
		self.write(|tree| {
			class_name.clone_into(&mut tree.element_mut(node)?.class_name);
			Ok(((), Mutation::SetClassName { node, class_name: class_name.to_owned() }))
		})
	}

	fn set_flag(&mut self, node: NodeId, name: &str, on: bool) -> Result<(), ArenaError> {
		self.write(|tree| {
			let flags = &mut tree.element_mut(node)?.flags;
			if on {
				flags.insert(name.to_owned());
			} else {
				flags.remove(name);
			}
			Ok(((), Mutation::SetFlag { node, name: name.to_owned(), on }))
		})
	}

	fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), ArenaError> {
		self.write(|tree| {
			let element = tree.element_mut(node)?;
			element.value = if value.is_empty() { None } else { Some(value.to_owned()) };
			element.selection = None;
			Ok(((), Mutation::SetValue { node, value: value.to_owned() }))
		})
	}

	fn listen(&mut self, node: NodeId, event: &str, dispatcher: Dispatcher) -> Result<(), ArenaError> {
		self.write(|tree| {
			tree.element_mut(node)?.listeners.insert(event.to_owned(), dispatcher);
			Ok(((), Mutation::Listen { node, event: event.to_owned() }))
		})
	}

	fn unlisten(&mut self, node: NodeId, event: &str) -> Result<(), ArenaError> {
		self.write(|tree| {
			tree.element_mut(node)?.listeners.remove(event);
			Ok(((), Mutation::Unlisten { node, event: event.to_owned() }))
		})
	}

	fn children(&mut self, node: NodeId) -> Result<Vec<NodeId>, ArenaError> {
		let tree = self.0.borrow();
		match &tree.node(node)?.data {
			NodeData::Element(element) => Ok(element.children.clone()),
			NodeData::Text(_) => Ok(Vec::new()),
		}
	}

	fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> Result<(), ArenaError> {
		self.write(|tree| {
			tree.element(parent)?;
			tree.node(child)?;
			if tree.is_inclusive_ancestor(child, parent) {
				return Err(ArenaError::Cycle { parent, child });
			}
			if let Some(reference) = reference {
				if tree.node(reference)?.parent != Some(parent) {
					return Err(ArenaError::NotAChild { parent, child: reference });
				}
			}

			// Like the DOM, inserting an attached node moves it.
			tree.detach(child);
			let children = &mut tree.element_mut(parent)?.children;
			let index = match reference {
				Some(reference) => children.iter().position(|sibling| *sibling == reference).unwrap_or(children.len()),
				None => children.len(),
			};
			children.insert(index, child);
			if let Some(node) = tree.nodes.get_mut(child.0) {
				node.parent = Some(parent);
			}
			Ok(((), Mutation::Insert { parent, child, before: reference }))
		})
	}

	fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), ArenaError> {
		self.write(|tree| {
			tree.element(parent)?;
			if tree.node(child)?.parent != Some(parent) {
				return Err(ArenaError::NotAChild { parent, child });
			}
			tree.detach(child);
			Ok(((), Mutation::Remove { parent, child }))
		})
	}

	fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> Result<(), ArenaError> {
		self.write(|tree| {
			tree.element(parent)?;
			tree.node(new)?;
			if tree.node(old)?.parent != Some(parent) {
				return Err(ArenaError::NotAChild { parent, child: old });
			}
			if tree.is_inclusive_ancestor(new, parent) {
				return Err(ArenaError::Cycle { parent, child: new });
			}

			tree.detach(new);
			let children = &mut tree.element_mut(parent)?.children;
			if let Some(slot) = children.iter_mut().find(|sibling| **sibling == old) {
				*slot = new;
			}
			if let Some(node) = tree.nodes.get_mut(new.0) {
				node.parent = Some(parent);
			}
			if let Some(node) = tree.nodes.get_mut(old.0) {
				node.parent = None;
			}
			Ok(((), Mutation::Replace { parent, new, old }))
		})
	}

	fn release(&mut self, node: NodeId) {
		let mut tree = self.0.borrow_mut();
		if node == tree.body {
			return trace!("Not releasing the body.");
		}
		tree.detach(node);
		if tree.nodes.try_remove(node.0).is_none() {
			trace!("Released unknown node {:?}.", node);
		}
		if tree.focused == Some(node) {
			tree.focused = None;
		}
	}

	fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
		let tree = self.0.borrow();
		let element = tree.element(node).ok()?;
		match name {
			"class" => Some(element.class_name.clone()),
			"value" => element.value.clone(),
			name => element.attributes.iter().find(|(existing, _)| existing == name).map(|(_, value)| value.clone()),
		}
	}

	fn focused(&self) -> Option<NodeId> {
		let tree = self.0.borrow();
		tree.focused.filter(|focused| *focused != tree.body && tree.is_inclusive_ancestor(tree.body, *focused))
	}

	fn focus(&mut self, node: NodeId) -> Result<(), ArenaError> {
		self.write(|tree| {
			tree.element(node)?;
			tree.focused = Some(node);
			Ok(((), Mutation::Focus { node }))
		})
	}

	fn selection(&self, node: NodeId) -> Option<(u32, u32)> {
		self.0.borrow().element(node).ok()?.selection
	}

	fn set_selection(&mut self, node: NodeId, start: u32, end: u32) -> Result<(), ArenaError> {
		self.write(|tree| {
			tree.element_mut(node)?.selection = Some((start, end));
			Ok(((), Mutation::SetSelection { node, start, end }))
		})
	}

	fn is_connected(&self, node: NodeId) -> bool {
		let tree = self.0.borrow();
		tree.nodes.contains(node.0) && tree.is_inclusive_ancestor(tree.body, node)
	}

	fn is_text_input(&self, node: NodeId) -> bool {
		let tree = self.0.borrow();
		match tree.element(node) {
			Ok(element) => match element.type_name.as_str() {
				"textarea" => true,
				"input" => element
					.attributes
					.iter()
					.find(|(name, _)| name == "type")
					.map_or(true, |(_, kind)| TEXT_INPUT_TYPES.contains(&kind.as_str())),
				_ => false,
			},
			Err(_) => false,
		}
	}
}
