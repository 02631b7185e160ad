//! A [`Host`] for the browser DOM.
//!
//! DOM nodes are tracked in a handle table. Each tracked node carries its handle in an expando property,
//! so that child lists and the focused element can be mapped back to handles without a reverse lookup table.

use crate::{
	host::{Dispatcher, Host},
	node::Event,
	renderer::Renderer,
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashMap;
use js_sys::{Function, Object, Reflect};
use slab::Slab;
use std::rc::Rc;
use thiserror::Error;
use tracing::{error, instrument, trace, trace_span};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};

const HANDLE_PROPERTY: &str = "__saplingDomHandle";
const TEXT_INPUT_TYPES: &[&str] = &["text", "search", "url", "tel", "password", "email"];

/// Handle of a DOM node tracked by a [`WebHost`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WebNode(usize);

#[derive(Debug, Error)]
pub enum WebError {
	#[error("unknown node {0:?}")]
	UnknownNode(WebNode),
	#[error("{node:?} does not support `{operation}`")]
	Unsupported { node: WebNode, operation: &'static str },
	#[error("no document available")]
	NoDocument,
	#[error("JavaScript error: {0}")]
	Js(String),
}

impl From<JsValue> for WebError {
	fn from(value: JsValue) -> Self {
		Self::Js(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
	}
}

/// Live boolean state is written as a DOM property, which for some names is spelled differently than the attribute.
fn property_name(flag: &str) -> &str {
	match flag {
		"readonly" => "readOnly",
		flag => flag,
	}
}

pub struct WebHost {
	document: web_sys::Document,
	nodes: Slab<web_sys::Node>,
	listeners: HashMap<(WebNode, String), Closure<dyn Fn(web_sys::Event)>>,
}

impl Debug for WebHost {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("WebHost")
			.field("nodes", &self.nodes.len())
			.field("listeners", &self.listeners.len())
			.finish()
	}
}

impl WebHost {
	#[must_use]
	pub fn new(document: web_sys::Document) -> Self {
		Self {
			document,
			nodes: Slab::new(),
			listeners: HashMap::new(),
		}
	}

	/// A host for the current window's document.
	///
	/// # Errors
	///
	/// Iff there is no window or document, e.g. in a worker.
	pub fn for_window() -> Result<Self, WebError> {
		let document = web_sys::window().and_then(|window| window.document()).ok_or(WebError::NoDocument)?;
		Ok(Self::new(document))
	}

	#[must_use]
	pub fn document(&self) -> &web_sys::Document {
		&self.document
	}

	/// Tracks `node`, returning its existing handle if it already is tracked.
	pub fn handle(&mut self, node: &web_sys::Node) -> WebNode {
		if let Some(handle) = self.lookup(node) {
			return handle;
		}
		let handle = WebNode(self.nodes.insert(node.clone()));
		#[allow(clippy::cast_precision_loss)]
		let tag = JsValue::from_f64(handle.0 as f64);
		if let Err(error) = Reflect::set(node, &HANDLE_PROPERTY.into(), &tag) {
			error!("Failed to tag node with its handle: {:?}", error);
		}
		trace!("Tracking {:?}.", handle);
		handle
	}

	/// The handle of `node`, if tracked.
	#[must_use]
	pub fn lookup(&self, node: &web_sys::Node) -> Option<WebNode> {
		let tag = Reflect::get(node, &HANDLE_PROPERTY.into()).ok()?.as_f64()?;
		#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
		let handle = WebNode(tag as usize);
		match self.nodes.get(handle.0) {
			Some(tracked) if tracked.is_same_node(Some(node)) => Some(handle),
			_ => None,
		}
	}

	#[must_use]
	pub fn node(&self, handle: WebNode) -> Option<&web_sys::Node> {
		self.nodes.get(handle.0)
	}

	fn get(&self, handle: WebNode) -> Result<&web_sys::Node, WebError> {
		self.nodes.get(handle.0).ok_or(WebError::UnknownNode(handle))
	}

	fn element(&self, handle: WebNode, operation: &'static str) -> Result<&web_sys::Element, WebError> {
		self.get(handle)?
			.dyn_ref::<web_sys::Element>()
			.ok_or(WebError::Unsupported { node: handle, operation })
	}
}

/// Reads what handlers need from a native event.
fn convert(event: &web_sys::Event) -> Event {
	let mut converted = Event::new(event.type_());
	if let Some(target) = event.target() {
		if let Some(input) = target.dyn_ref::<web_sys::HtmlInputElement>() {
			converted.value = Some(input.value());
			converted.checked = Some(input.checked());
		} else if let Some(textarea) = target.dyn_ref::<web_sys::HtmlTextAreaElement>() {
			converted.value = Some(textarea.value());
		}
	}
	if let Some(keyboard_event) = event.dyn_ref::<web_sys::KeyboardEvent>() {
		converted.key = Some(keyboard_event.key());
	}
	converted
}

impl Host for WebHost {
	type Node = WebNode;
	type Error = WebError;

	fn create_element(&mut self, type_name: &str) -> Result<WebNode, WebError> {
		let element = self.document.create_element(type_name)?;
		Ok(self.handle(element.as_ref()))
	}

	fn create_text(&mut self, data: &str) -> Result<WebNode, WebError> {
		let text = self.document.create_text_node(data);
		Ok(self.handle(text.as_ref()))
	}

	fn set_text(&mut self, node: WebNode, data: &str) -> Result<(), WebError> {
		let character_data = self
			.get(node)?
			.dyn_ref::<web_sys::CharacterData>()
			.ok_or(WebError::Unsupported { node, operation: "set_text" })?;
		character_data.set_data(data);
		Ok(())
	}

	fn set_attribute(&mut self, node: WebNode, name: &str, value: &str) -> Result<(), WebError> {
		Ok(self.element(node, "set_attribute")?.set_attribute(name, value)?)
	}

	fn remove_attribute(&mut self, node: WebNode, name: &str) -> Result<(), WebError> {
		Ok(self.element(node, "remove_attribute")?.remove_attribute(name)?)
	}

	fn set_class_name(&mut self, node: WebNode, class_name: &str) -> Result<(), WebError> {
		self.element(node, "set_class_name")?.set_class_name(class_name);
		Ok(())
	}

	fn set_flag(&mut self, node: WebNode, name: &str, on: bool) -> Result<(), WebError> {
		let element = self.element(node, "set_flag")?;
		Reflect::set(element, &property_name(name).into(), &JsValue::from_bool(on))?;
		Ok(())
	}

	fn set_value(&mut self, node: WebNode, value: &str) -> Result<(), WebError> {
		let element = self.element(node, "set_value")?;
		if let Some(input) = element.dyn_ref::<web_sys::HtmlInputElement>() {
			input.set_value(value);
		} else if let Some(textarea) = element.dyn_ref::<web_sys::HtmlTextAreaElement>() {
			textarea.set_value(value);
		} else if value.is_empty() {
			element.remove_attribute("value")?;
		} else {
			element.set_attribute("value", value)?;
		}
		Ok(())
	}

	#[instrument(skip(self, dispatcher))]
	fn listen(&mut self, node: WebNode, event: &str, dispatcher: Dispatcher) -> Result<(), WebError> {
		self.unlisten(node, event)?;
		let listener = Closure::wrap(Box::new(move |event: web_sys::Event| {
			let span = trace_span!("native listener", event = ?event.type_());
			let _enter = span.enter();
			dispatcher(&convert(&event));
		}) as Box<dyn Fn(web_sys::Event)>);
		self.get(node)?
			.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref::<Function>())?;
		self.listeners.insert((node, event.to_owned()), listener);
		Ok(())
	}

	#[instrument(skip(self))]
	fn unlisten(&mut self, node: WebNode, event: &str) -> Result<(), WebError> {
		if let Some(listener) = self.listeners.remove(&(node, event.to_owned())) {
			self.get(node)?
				.remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref::<Function>())?;
		}
		Ok(())
	}

	fn children(&mut self, node: WebNode) -> Result<Vec<WebNode>, WebError> {
		let child_nodes = self.get(node)?.child_nodes();
		Ok((0..child_nodes.length())
			.filter_map(|i| child_nodes.item(i))
			.map(|child| self.handle(&child))
			.collect())
	}

	fn insert_before(&mut self, parent: WebNode, child: WebNode, reference: Option<WebNode>) -> Result<(), WebError> {
		let reference = reference.map(|reference| self.get(reference)).transpose()?;
		self.get(parent)?.insert_before(self.get(child)?, reference)?;
		Ok(())
	}

	fn remove_child(&mut self, parent: WebNode, child: WebNode) -> Result<(), WebError> {
		self.get(parent)?.remove_child(self.get(child)?)?;
		Ok(())
	}

	fn replace_child(&mut self, parent: WebNode, new: WebNode, old: WebNode) -> Result<(), WebError> {
		self.get(parent)?.replace_child(self.get(new)?, self.get(old)?)?;
		Ok(())
	}

	fn release(&mut self, node: WebNode) {
		self.listeners.retain(|(listening, _), _| *listening != node);
		match self.nodes.try_remove(node.0) {
			Some(released) => {
				if let Err(error) = Reflect::delete_property(released.unchecked_ref::<Object>(), &HANDLE_PROPERTY.into()) {
					error!("Failed to untag released node: {:?}", error);
				}
			}
			None => trace!("Released unknown node {:?}.", node),
		}
	}

	fn attribute(&self, node: WebNode, name: &str) -> Option<String> {
		let element = self.nodes.get(node.0)?.dyn_ref::<web_sys::Element>()?;
		match name {
			"class" => Some(element.class_name()),
			name => element.get_attribute(name),
		}
	}

	fn focused(&self) -> Option<WebNode> {
		let active = self.document.active_element()?;
		if let Some(body) = self.document.body() {
			if active.is_same_node(Some(body.as_ref())) {
				return None;
			}
		}
		self.lookup(active.as_ref())
	}

	fn focus(&mut self, node: WebNode) -> Result<(), WebError> {
		let element = self
			.get(node)?
			.dyn_ref::<web_sys::HtmlElement>()
			.ok_or(WebError::Unsupported { node, operation: "focus" })?;
		Ok(element.focus()?)
	}

	fn selection(&self, node: WebNode) -> Option<(u32, u32)> {
		let node = self.nodes.get(node.0)?;
		let (start, end) = if let Some(input) = node.dyn_ref::<web_sys::HtmlInputElement>() {
			(input.selection_start().ok()??, input.selection_end().ok()??)
		} else {
			let textarea = node.dyn_ref::<web_sys::HtmlTextAreaElement>()?;
			(textarea.selection_start().ok()??, textarea.selection_end().ok()??)
		};
		Some((start, end))
	}

	fn set_selection(&mut self, node: WebNode, start: u32, end: u32) -> Result<(), WebError> {
		let target = self.get(node)?;
		if let Some(input) = target.dyn_ref::<web_sys::HtmlInputElement>() {
			Ok(input.set_selection_range(start, end)?)
		} else if let Some(textarea) = target.dyn_ref::<web_sys::HtmlTextAreaElement>() {
			Ok(textarea.set_selection_range(start, end)?)
		} else {
			Err(WebError::Unsupported { node, operation: "set_selection" })
		}
	}

	fn is_connected(&self, node: WebNode) -> bool {
		self.nodes.get(node.0).map_or(false, web_sys::Node::is_connected)
	}

	fn is_text_input(&self, node: WebNode) -> bool {
		match self.nodes.get(node.0) {
			Some(node) if node.dyn_ref::<web_sys::HtmlTextAreaElement>().is_some() => true,
			Some(node) => node
				.dyn_ref::<web_sys::HtmlInputElement>()
				.map_or(false, |input| TEXT_INPUT_TYPES.contains(&input.type_().as_str())),
			None => false,
		}
	}
}

/// Runs [`Renderer::flush_deferred`] after a zero-delay timeout, once the browser has yielded.
///
/// # Errors
///
/// Iff the timeout can't be scheduled.
pub fn schedule_flush(renderer: &Rc<RefCell<Renderer<WebHost>>>) -> Result<(), WebError> {
	let window = web_sys::window().ok_or(WebError::NoDocument)?;
	let renderer = Rc::downgrade(renderer);
	let callback = Closure::once_into_js(move || {
		let renderer = match renderer.upgrade() {
			Some(renderer) => renderer,
			None => return trace!("Renderer dropped before the deferred flush."),
		};
		let result = renderer.borrow_mut().flush_deferred();
		match result {
			Ok(applied) => trace!("Applied {} deferred action(s).", applied),
			Err(error) => error!("Deferred flush failed: {}", error),
		}
	});
	window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), 0)?;
	Ok(())
}
