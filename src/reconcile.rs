//! Diffing of virtual trees against a live tree.

use crate::{
	config::Config,
	error::{During, Error},
	event::EventRegistry,
	host::Host,
	node::{normalize, Content, Element, Prop, PropKind, VNode, Value},
};
use core::fmt::{self, Debug, Formatter};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{error, instrument, level_filters::STATIC_MAX_LEVEL, trace, trace_span, warn, Level};

/// Work that must wait until the reconciliation pass has finished and every new node is attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostAttach<N> {
	/// Focus a (re)built element and, on text inputs, restore the cursor.
	Focus { node: N, selection: Option<(u32, u32)> },
}

impl<N: Copy + Eq + Debug> PostAttach<N> {
	#[must_use]
	pub fn target(&self) -> N {
		match *self {
			PostAttach::Focus { node, .. } => node,
		}
	}

	/// Returns whether the action took effect.
	///
	/// This is a no-op if the node is gone by now, or if focus is held by some other connected node.
	#[instrument(skip(host))]
	pub fn run<H: Host<Node = N>>(&self, host: &mut H) -> Result<bool, Error<H::Error>> {
		match *self {
			PostAttach::Focus { node, selection } => {
				if !host.is_connected(node) {
					trace!("Target is no longer attached.");
					return Ok(false);
				}
				if let Some(current) = host.focused() {
					if current != node && host.is_connected(current) {
						trace!("Focus is held by {:?}.", current);
						return Ok(false);
					}
				}
				host.focus(node).during("focus")?;
				if let Some((start, end)) = selection {
					if host.is_text_input(node) {
						host.set_selection(node, start, end).during("set_selection")?;
					}
				}
				Ok(true)
			}
		}
	}
}

/// What was focused when a pass started.
#[derive(Debug, Default)]
struct FocusSnapshot {
	id: Option<String>,
	class: Option<String>,
	selection: Option<(u32, u32)>,
}

impl FocusSnapshot {
	fn capture<H: Host>(host: &H) -> Option<Self> {
		let node = host.focused()?;
		Some(Self {
			id: host.attribute(node, "id").filter(|id| !id.is_empty()),
			class: host.attribute(node, "class").filter(|class| !class.is_empty()),
			selection: host.selection(node),
		})
	}

	fn matches(&self, element: &Element) -> bool {
		let same = |captured: &Option<String>, name| match (captured, element.identity_attribute(name)) {
			(Some(captured), Some(value)) => *captured == *value,
			_ => false,
		};
		same(&self.id, "id") || same(&self.class, "class")
	}
}

/// Logs text only with the `dangerous-logging` feature, as it may contain personal data.
struct Redacted<'a>(&'a str);

impl Debug for Redacted<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		if cfg!(feature = "dangerous-logging") {
			Debug::fmt(self.0, f)
		} else {
			write!(f, "<{} byte(s)>", self.0.len())
		}
	}
}

/// How a child is recognised across renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Identity<'a> {
	Key(&'a str),
	/// Ordinal among the unkeyed siblings.
	Position(usize),
}

fn identities<'a>(children: &[Content<'a>], keyed: bool) -> Vec<Identity<'a>> {
	let mut seen = HashSet::new();
	let mut position = 0;
	children
		.iter()
		.map(|child| match child.key().filter(|_| keyed) {
			Some(key) if seen.insert(key) => Identity::Key(key),
			duplicate => {
				if let Some(key) = duplicate {
					warn!("Duplicate key {:?}. Matching by position instead.", key);
				}
				position += 1;
				Identity::Position(position - 1)
			}
		})
		.collect()
}

/// Marks the new positions whose matched old index is part of a longest increasing subsequence.
/// Those nodes stay where they are, every other matched node is moved.
fn stable_positions(sources: &[Option<usize>]) -> Vec<bool> {
	// `tails[k]` is the position ending the smallest-valued increasing run of length `k + 1` seen so far.
	let mut tails: Vec<usize> = Vec::new();
	let mut predecessors = vec![None; sources.len()];
	for (position, source) in sources.iter().enumerate() {
		if source.is_none() {
			continue;
		}
		let k = tails.partition_point(|&tail| sources[tail] < *source);
		if k > 0 {
			predecessors[position] = Some(tails[k - 1]);
		}
		if k == tails.len() {
			tails.push(position);
		} else {
			tails[k] = position;
		}
	}

	let mut stable = vec![false; sources.len()];
	let mut cursor = tails.last().copied();
	while let Some(position) = cursor {
		stable[position] = true;
		cursor = predecessors[position];
	}
	stable
}

/// A single reconciliation pass over one root.
///
/// Appends [`PostAttach`] actions to the caller's queue, which the caller runs once the pass has completed.
/// Queued actions targeting a node this pass releases are dropped, since hosts may hand out its handle again.
pub struct Reconciler<'a, H: Host> {
	host: &'a mut H,
	events: &'a mut EventRegistry<H::Node>,
	config: &'a Config,
	focus: Option<FocusSnapshot>,
	post_attach: &'a mut Vec<PostAttach<H::Node>>,
}

impl<'a, H: Host> Reconciler<'a, H> {
	#[must_use]
	pub fn new(host: &'a mut H, events: &'a mut EventRegistry<H::Node>, config: &'a Config, post_attach: &'a mut Vec<PostAttach<H::Node>>) -> Self {
		let focus = if config.restore_focus { FocusSnapshot::capture(&*host) } else { None };
		Self {
			host,
			events,
			config,
			focus,
			post_attach,
		}
	}

	/// Makes the children of `parent` reflect `new`.
	///
	/// Without an `old` tree, `parent` is cleared and `new` is built from scratch.
	/// Otherwise `parent`'s first child is taken to be the live counterpart of `old`.
	#[instrument(skip(self, old, new))]
	pub fn reconcile(mut self, parent: H::Node, old: Option<&VNode>, new: &VNode) -> Result<(), Error<H::Error>> {
		match old {
			None => {
				let span = trace_span!("First render");
				let _enter = span.enter();
				self.clear(parent)?;
				if let Some(content) = new.content() {
					let node = self.create(content, 0)?;
					self.attach(parent, node, None)?;
				}
				Ok(())
			}
			Some(old) => self.update_children(parent, core::slice::from_ref(old), core::slice::from_ref(new), 0),
		}
	}

	/// Removes and releases all children of `parent`.
	#[instrument(skip(self))]
	pub fn clear(&mut self, parent: H::Node) -> Result<(), Error<H::Error>> {
		for child in self.host.children(parent).during("children")? {
			self.remove(parent, child)?;
		}
		Ok(())
	}

	fn check_depth(&self, depth: usize) -> Result<(), Error<H::Error>> {
		if depth > self.config.max_depth {
			error!("Depth limit reached");
			return Err(Error::DepthLimit { limit: self.config.max_depth });
		}
		Ok(())
	}

	/// Builds a detached live subtree.
	fn create(&mut self, content: Content<'_>, depth: usize) -> Result<H::Node, Error<H::Error>> {
		self.check_depth(depth)?;
		match content {
			Content::Text(text) => {
				let span = trace_span!("Creating text node", text = ?Redacted(text.as_str()));
				let _enter = span.enter();
				self.host.create_text(text.as_str()).during("create_text")
			}
			Content::Element(element) => {
				let span = trace_span!("Creating element", tag = element.type_name());
				let _enter = span.enter();

				let node = self.host.create_element(element.type_name()).during("create_element")?;
				if let Err(error) = self.populate(node, element, depth) {
					self.discard(node);
					return Err(error);
				}

				if let Some(selection) = self.focus_request(element) {
					trace!("Scheduling focus.");
					self.post_attach.push(PostAttach::Focus { node, selection });
				}
				Ok(node)
			}
		}
	}

	fn populate(&mut self, node: H::Node, element: &Element, depth: usize) -> Result<(), Error<H::Error>> {
		for prop in element.props() {
			self.set_prop(node, prop)?;
		}
		for child in normalize(element.children()) {
			let child = self.create(child, depth + 1)?;
			self.attach(node, child, None)?;
		}
		Ok(())
	}

	/// Inserts a freshly built `child`, releasing it instead if that fails.
	fn attach(&mut self, parent: H::Node, child: H::Node, reference: Option<H::Node>) -> Result<(), Error<H::Error>> {
		self.host.insert_before(parent, child, reference).during("insert_before").map_err(|error| {
			self.discard(child);
			error
		})
	}

	/// Releases a detached subtree of a pass that is failing already. Further errors are only logged.
	fn discard(&mut self, node: H::Node) {
		if let Err(error) = self.release(node) {
			error!("Failed to release abandoned subtree: {}", error);
		}
	}

	/// `Some` with the cursor to restore if the new element should be focused once attached.
	fn focus_request(&self, element: &Element) -> Option<Option<(u32, u32)>> {
		if !self.config.restore_focus {
			return None;
		}
		match &self.focus {
			Some(focus) if focus.matches(element) => Some(focus.selection),
			_ => element
				.prop("autofocus")
				.filter(|autofocus| autofocus.value().is_truthy())
				.map(|_| None),
		}
	}

	/// Detaches `node` from `parent` and releases its subtree.
	fn remove(&mut self, parent: H::Node, node: H::Node) -> Result<(), Error<H::Error>> {
		self.host.remove_child(parent, node).during("remove_child")?;
		self.release(node)
	}

	/// Releases a detached subtree, children first.
	fn release(&mut self, node: H::Node) -> Result<(), Error<H::Error>> {
		for child in self.host.children(node).during("children")? {
			self.release(child)?;
		}
		self.events.forget(&mut *self.host, node)?;
		self.post_attach.retain(|action| action.target() != node);
		self.host.release(node);
		Ok(())
	}

	/// Updates `live` from `old` to `new` in place where possible, or replaces it.
	///
	/// Returns the live node now standing in for `new`.
	fn update_node(&mut self, parent: H::Node, live: H::Node, old: Content<'_>, new: Content<'_>, depth: usize) -> Result<H::Node, Error<H::Error>> {
		self.check_depth(depth)?;
		match (old, new) {
			(Content::Text(t_1), Content::Text(t_2)) => {
				let span = trace_span!("Diffing text node", t_1 = ?Redacted(t_1.as_str()), t_2 = ?Redacted(t_2.as_str()));
				let _enter = span.enter();
				if t_1 == t_2 {
					trace!("Unchanged.");
				} else {
					self.host.set_text(live, t_2.as_str()).during("set_text")?;
				}
				Ok(live)
			}

			(Content::Element(e_1), Content::Element(e_2)) if e_1.type_name() == e_2.type_name() => {
				let span = trace_span!("Diffing element", tag = e_1.type_name());
				let _enter = span.enter();
				if Rc::ptr_eq(e_1, e_2) {
					trace!("Identical subtree. Skipping.");
					return Ok(live);
				}
				self.update_props(live, e_1, e_2)?;
				self.update_children(live, e_1.children(), e_2.children(), depth + 1)?;
				Ok(live)
			}

			// Mismatching nodes: Destroy and rebuild.
			(n_1, n_2) => {
				let span = trace_span!("Replace mismatching");
				let _enter = span.enter();

				if STATIC_MAX_LEVEL >= Level::WARN {
					if let (Content::Element(e_1), Content::Element(e_2)) = (n_1, n_2) {
						if e_1.type_name().eq_ignore_ascii_case(e_2.type_name()) {
							warn!("Recreating element due to different tag name casing: {:?} -> {:?}", e_1.type_name(), e_2.type_name());
						}
					}
				}

				let node = self.create(n_2, depth)?;
				if let Err(error) = self.host.replace_child(parent, node, live).during("replace_child") {
					self.discard(node);
					return Err(error);
				}
				self.release(live)?;
				Ok(node)
			}
		}
	}

	#[allow(clippy::similar_names)]
	fn update_props(&mut self, live: H::Node, e_1: &Element, e_2: &Element) -> Result<(), Error<H::Error>> {
		for removed in e_1.props().iter().filter(|prop| e_2.prop(prop.name()).is_none()) {
			self.remove_prop(live, removed)?;
		}

		for prop in e_2.props() {
			match e_1.prop(prop.name()) {
				Some(previous) if previous == prop => (),
				Some(previous) if previous.kind() != prop.kind() => {
					self.remove_prop(live, previous)?;
					self.set_prop(live, prop)?;
				}
				Some(previous) => {
					// Bind before unbinding, so that the native dispatcher stays installed.
					self.set_prop(live, prop)?;
					if let (PropKind::EventHandler(event), Value::Handler(handler)) = (previous.kind(), previous.value()) {
						self.events.unbind(&mut *self.host, live, event, handler)?;
					}
				}
				None => self.set_prop(live, prop)?,
			}
		}
		Ok(())
	}

	fn set_prop(&mut self, live: H::Node, prop: &Prop) -> Result<(), Error<H::Error>> {
		let value = prop.value();
		let span = trace_span!("Setting property", name = prop.name(), kind = ?prop.kind());
		let _enter = span.enter();
		match prop.kind() {
			PropKind::Attribute => self.host.set_attribute(live, prop.name(), &value.to_attribute_string()).during("set_attribute"),
			PropKind::ClassName => self.host.set_class_name(live, &value.to_attribute_string()).during("set_class_name"),
			PropKind::BooleanState => self.host.set_flag(live, prop.name(), value.is_truthy()).during("set_flag"),
			PropKind::ValueBinding => self.host.set_value(live, &value.to_attribute_string()).during("set_value"),
			PropKind::EventHandler(event) => match value {
				Value::Handler(handler) => self.events.bind(&mut *self.host, live, event, handler.clone()),
				_ => {
					error!("Event handler property without a handler. Ignoring.");
					Ok(())
				}
			},
		}
	}

	/// Restores the default of a property.
	fn remove_prop(&mut self, live: H::Node, prop: &Prop) -> Result<(), Error<H::Error>> {
		let span = trace_span!("Removing property", name = prop.name(), kind = ?prop.kind());
		let _enter = span.enter();
		match prop.kind() {
			PropKind::Attribute => self.host.remove_attribute(live, prop.name()).during("remove_attribute"),
			PropKind::ClassName => self.host.set_class_name(live, "").during("set_class_name"),
			PropKind::BooleanState => self.host.set_flag(live, prop.name(), false).during("set_flag"),
			PropKind::ValueBinding => self.host.set_value(live, "").during("set_value"),
			PropKind::EventHandler(event) => match prop.value() {
				Value::Handler(handler) => self.events.unbind(&mut *self.host, live, event, handler).map(drop),
				_ => Ok(()),
			},
		}
	}

	/// Reconciles the normalized children of `parent`.
	///
	/// Children are matched by key where declared, otherwise by position among their unkeyed siblings.
	/// Unmatched old children are removed, matched ones are updated in place,
	/// and only those off the longest already-ordered run are moved.
	#[allow(clippy::too_many_lines)]
	#[instrument(skip(self, old, new))]
	fn update_children(&mut self, parent: H::Node, old: &[VNode], new: &[VNode], depth: usize) -> Result<(), Error<H::Error>> {
		let mut old = normalize(old);
		let new = normalize(new);
		let mut live = self.host.children(parent).during("children")?;

		if live.len() != old.len() {
			error!("Expected {} live child node(s) but found {}. Repairing.", old.len(), live.len());
			while live.len() > old.len() {
				if let Some(stray) = live.pop() {
					self.remove(parent, stray)?;
				}
			}
			old.truncate(live.len());
		}

		let old_identities = identities(&old, self.config.keyed);
		let new_identities = identities(&new, self.config.keyed);

		let mut unmatched: HashMap<Identity<'_>, usize> = old_identities.iter().enumerate().map(|(i, &identity)| (identity, i)).collect();
		let sources: Vec<Option<usize>> = new_identities.iter().map(|identity| unmatched.remove(identity)).collect();

		if !unmatched.is_empty() {
			let mut removed: Vec<usize> = unmatched.into_values().collect();
			removed.sort_unstable();
			let span = trace_span!("Removing unmatched", count = removed.len());
			let _enter = span.enter();
			for i in removed {
				self.remove(parent, live[i])?;
			}
		}

		let mut placed = vec![None; new.len()];
		for (j, source) in sources.iter().enumerate() {
			if let Some(i) = *source {
				placed[j] = Some(self.update_node(parent, live[i], old[i], new[j], depth)?);
			}
		}

		let stable = stable_positions(&sources);
		let mut next_sibling = None;
		for j in (0..new.len()).rev() {
			let node = match placed[j] {
				Some(node) if stable[j] => node,
				Some(node) => {
					trace!("Moving child {} into place.", j);
					self.host.insert_before(parent, node, next_sibling).during("insert_before")?;
					node
				}
				None => {
					let node = self.create(new[j], depth)?;
					self.attach(parent, node, next_sibling)?;
					node
				}
			};
			next_sibling = Some(node);
		}
		Ok(())
	}
}
