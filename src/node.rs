//! The virtual node model: immutable descriptions of desired UI structure.
//!
//! Trees are built with [`el`] and [`Props`] and are never mutated afterwards.
//! Sharing is cheap since elements sit behind [`Rc`], which the reconciler also uses
//! to skip subtrees that are pointer-identical between two renders.

use core::fmt::{self, Debug, Formatter};
use std::{borrow::Cow, rc::Rc};
use tracing::warn;

/// The element type used to wrap a sequence of nodes that is mounted as one tree.
pub const FRAGMENT_TYPE: &str = "div";

/// A virtual node.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum VNode {
	/// Renders nothing. Stands in for `false`, `null` and `undefined` in conditional markup.
	#[default]
	Empty,
	Text(Text),
	Element(Rc<Element>),
}

/// A rendered-as-text leaf value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Text(Rc<str>);

impl Text {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// Formats numbers the way a browser stringifies them.
///
/// Magnitudes of at least 1e21 or below 1e-6 switch to exponent form, with an explicit `+` for positive exponents.
fn number_to_string(number: f64) -> String {
	let magnitude = number.abs();
	if number.is_infinite() {
		if number.is_sign_positive() { "Infinity" } else { "-Infinity" }.to_owned()
	} else if number == 0.0 {
		"0".to_owned()
	} else if magnitude >= 1e21 {
		format!("{:e}", number).replacen('e', "e+", 1)
	} else if magnitude < 1e-6 {
		format!("{:e}", number)
	} else {
		number.to_string()
	}
}

/// A virtual element.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
	type_name: Rc<str>,
	props: Vec<Prop>,
	key: Option<Rc<str>>,
	children: Vec<VNode>,
}

impl Element {
	#[must_use]
	pub fn type_name(&self) -> &str {
		&self.type_name
	}

	/// Properties in declaration order. Never contains `children` or `key`.
	#[must_use]
	pub fn props(&self) -> &[Prop] {
		&self.props
	}

	#[must_use]
	pub fn prop(&self, name: &str) -> Option<&Prop> {
		self.props.iter().find(|prop| &*prop.name == name)
	}

	#[must_use]
	pub fn key(&self) -> Option<&str> {
		self.key.as_deref()
	}

	/// Children as given, including [`VNode::Empty`] placeholders.
	#[must_use]
	pub fn children(&self) -> &[VNode] {
		&self.children
	}

	/// The `id` or class name as rendered, used to recognise the same logical element across rebuilds.
	pub(crate) fn identity_attribute(&self, name: &str) -> Option<Cow<'_, str>> {
		let prop = match name {
			"class" => self.props.iter().find(|prop| prop.kind == PropKind::ClassName),
			name => self.prop(name),
		}?;
		Some(prop.value.to_attribute_string())
	}
}

/// How a property is applied to a live node. Resolved once when the property is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropKind {
	Attribute,
	/// A live boolean like `checked` or `disabled`, as opposed to a string attribute.
	BooleanState,
	/// Carries the event name, e.g. `click` for `onclick`.
	EventHandler(Rc<str>),
	ClassName,
	/// The live `value` of input-like nodes.
	ValueBinding,
}

const BOOLEAN_STATES: &[&str] = &["checked", "disabled", "selected", "hidden", "readonly", "multiple", "autofocus"];

impl PropKind {
	#[must_use]
	pub fn classify(name: &str, value: &Value) -> Self {
		match (name, value) {
			(name, Value::Handler(_)) => {
				let event = name.strip_prefix("on").unwrap_or(name);
				Self::EventHandler(event.to_ascii_lowercase().into())
			}
			("class" | "className", _) => Self::ClassName,
			("value", _) => Self::ValueBinding,
			(_, Value::Bool(_)) => Self::BooleanState,
			(name, _) if BOOLEAN_STATES.contains(&name) => Self::BooleanState,
			_ => Self::Attribute,
		}
	}
}

/// A named property of an [`Element`].
#[derive(Clone, Debug, PartialEq)]
pub struct Prop {
	name: Rc<str>,
	kind: PropKind,
	value: Value,
}

impl Prop {
	#[must_use]
	pub fn new(name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
		let name = name.into();
		let value = value.into();
		let kind = PropKind::classify(&name, &value);
		Self { name, kind, value }
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn kind(&self) -> &PropKind {
		&self.kind
	}

	#[must_use]
	pub fn value(&self) -> &Value {
		&self.value
	}
}

/// A property value.
#[derive(Clone, Debug)]
pub enum Value {
	Str(Rc<str>),
	Number(f64),
	Bool(bool),
	Handler(Handler),
}

impl Value {
	#[must_use]
	pub fn to_attribute_string(&self) -> Cow<'_, str> {
		match self {
			Self::Str(str) => Cow::Borrowed(str),
			Self::Number(number) => Cow::Owned(number_to_string(*number)),
			Self::Bool(bool) => Cow::Borrowed(if *bool { "true" } else { "false" }),
			Self::Handler(_) => Cow::Borrowed(""),
		}
	}

	/// Truthiness when assigned to a live boolean.
	#[must_use]
	pub fn is_truthy(&self) -> bool {
		match self {
			Self::Str(str) => !str.is_empty(),
			Self::Number(number) => *number != 0.0 && !number.is_nan(),
			Self::Bool(bool) => *bool,
			Self::Handler(_) => true,
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Str(a), Self::Str(b)) => a == b,
			// Bitwise, so that NaN stays equal to itself and doesn't cause a write on every update.
			(Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits() || a == b,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Handler(a), Self::Handler(b)) => a.ptr_eq(b),
			_ => false,
		}
	}
}

macro_rules! value_from {
	($($source:ty => |$v:ident| $conversion:expr),*$(,)?) => {$(
		impl From<$source> for Value {
			fn from($v: $source) -> Self {
				$conversion
			}
		}
	)*};
}

value_from! {
	&str => |v| Value::Str(v.into()),
	String => |v| Value::Str(v.into()),
	Rc<str> => |v| Value::Str(v),
	bool => |v| Value::Bool(v),
	f64 => |v| Value::Number(v),
	i32 => |v| Value::Number(v.into()),
	u32 => |v| Value::Number(v.into()),
	Handler => |v| Value::Handler(v),
}

/// An event handler. Compared by identity, never by behaviour.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
	pub fn new(handler: impl 'static + Fn(&Event)) -> Self {
		Self(Rc::new(handler))
	}

	pub fn call(&self, event: &Event) {
		(self.0)(event);
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl PartialEq for Handler {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl Debug for Handler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Handler").field(&Rc::as_ptr(&self.0).cast::<()>()).finish()
	}
}

/// The host-neutral payload handed to [`Handler`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
	pub name: String,
	/// The `value` of the event target, if it has one.
	pub value: Option<String>,
	/// The `checked` state of the event target, if it has one.
	pub checked: Option<bool>,
	/// The key of keyboard events.
	pub key: Option<String>,
}

impl Event {
	#[must_use]
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}
}

/// Builder for an element's property mapping, including its `key` and children.
#[derive(Clone, Debug, Default)]
pub struct Props {
	props: Vec<Prop>,
	key: Option<Rc<str>>,
	children: Vec<VNode>,
}

impl Props {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets a property, replacing an earlier one with the same name in place.
	///
	/// `key` is routed to [`Props::key`]. Children can't be expressed as a [`Value`] and must be added through [`Props::child`] or [`Props::children`].
	#[must_use]
	pub fn set(mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
		let prop = Prop::new(name, value);
		let name = Rc::clone(&prop.name);
		match &*name {
			"key" => self.key = Some(prop.value.to_attribute_string().into()),
			"children" => warn!("Ignoring `children` set as a property value."),
			name => match self.props.iter_mut().find(|existing| existing.name() == name) {
				Some(existing) => *existing = prop,
				None => self.props.push(prop),
			},
		}
		self
	}

	#[must_use]
	pub fn attr(self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
		self.set(name, value)
	}

	#[must_use]
	pub fn class(self, class_name: impl Into<Value>) -> Self {
		self.set("class", class_name)
	}

	#[must_use]
	pub fn flag(self, name: impl Into<Rc<str>>, on: bool) -> Self {
		self.set(name, on)
	}

	#[must_use]
	pub fn value(self, value: impl Into<Value>) -> Self {
		self.set("value", value)
	}

	/// Binds `handler` to `event`, stored as the `on{event}` property.
	#[must_use]
	pub fn on(self, event: &str, handler: impl 'static + Fn(&Event)) -> Self {
		self.on_handler(event, Handler::new(handler))
	}

	/// Like [`Props::on`], but reuses an existing [`Handler`] so that it compares equal across renders.
	#[must_use]
	pub fn on_handler(self, event: &str, handler: Handler) -> Self {
		self.set(format!("on{}", event), handler)
	}

	#[must_use]
	pub fn key(mut self, key: impl Into<Rc<str>>) -> Self {
		self.key = Some(key.into());
		self
	}

	#[must_use]
	pub fn child(mut self, child: impl Into<VNode>) -> Self {
		self.children.push(child.into());
		self
	}

	#[must_use]
	pub fn children<I>(mut self, children: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<VNode>,
	{
		self.children.extend(children.into_iter().map(Into::into));
		self
	}
}

/// Constructs an element node.
///
/// `props` is moved into the node, so a caller-side clone of it can't alter the tree afterwards.
pub fn el(type_name: impl Into<Rc<str>>, props: Props) -> VNode {
	let Props { props, key, children } = props;
	VNode::Element(Rc::new(Element {
		type_name: type_name.into(),
		props,
		key,
		children,
	}))
}

/// Constructs a text leaf.
pub fn text(value: impl Into<Text>) -> VNode {
	VNode::Text(value.into())
}

impl VNode {
	/// Wraps a sequence in a [`FRAGMENT_TYPE`] element, so that it can be reconciled as one node.
	pub fn fragment<I>(children: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<VNode>,
	{
		el(FRAGMENT_TYPE, Props::new().children(children))
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		matches!(self, Self::Empty)
	}

	#[must_use]
	pub fn as_element(&self) -> Option<&Element> {
		match self {
			Self::Element(element) => Some(element),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(text) => Some(text.as_str()),
			_ => None,
		}
	}

	#[must_use]
	pub fn key(&self) -> Option<&str> {
		self.as_element().and_then(Element::key)
	}

	pub(crate) fn content(&self) -> Option<Content<'_>> {
		match self {
			Self::Empty => None,
			Self::Text(text) => Some(Content::Text(text)),
			Self::Element(element) => Some(Content::Element(element)),
		}
	}
}

/// A non-empty [`VNode`], borrowed.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Content<'a> {
	Text(&'a Text),
	Element(&'a Rc<Element>),
}

impl<'a> Content<'a> {
	pub(crate) fn key(self) -> Option<&'a str> {
		match self {
			Content::Text(_) => None,
			Content::Element(element) => element.key(),
		}
	}
}

/// Drops empty entries while keeping the order of the rest.
pub(crate) fn normalize(children: &[VNode]) -> Vec<Content<'_>> {
	children.iter().filter_map(VNode::content).collect()
}

impl From<&str> for Text {
	fn from(text: &str) -> Self {
		Self(text.into())
	}
}

impl From<String> for Text {
	fn from(text: String) -> Self {
		Self(text.into())
	}
}

impl From<Rc<str>> for Text {
	fn from(text: Rc<str>) -> Self {
		Self(text)
	}
}

impl From<f64> for Text {
	fn from(number: f64) -> Self {
		Self(number_to_string(number).into())
	}
}

macro_rules! integer_text {
	($($integer:ty),*) => {$(
		impl From<$integer> for Text {
			fn from(integer: $integer) -> Self {
				Self(integer.to_string().into())
			}
		}

		impl From<$integer> for VNode {
			fn from(integer: $integer) -> Self {
				Self::Text(integer.into())
			}
		}
	)*};
}

integer_text!(i32, i64, u32, u64, usize);

impl From<Text> for VNode {
	fn from(text: Text) -> Self {
		Self::Text(text)
	}
}

impl From<&str> for VNode {
	fn from(text: &str) -> Self {
		Self::Text(text.into())
	}
}

impl From<String> for VNode {
	fn from(text: String) -> Self {
		Self::Text(text.into())
	}
}

impl From<f64> for VNode {
	fn from(number: f64) -> Self {
		Self::Text(number.into())
	}
}

impl From<Element> for VNode {
	fn from(element: Element) -> Self {
		Self::Element(Rc::new(element))
	}
}

/// Only `false` is meaningful here; both values render nothing.
impl From<bool> for VNode {
	fn from(_: bool) -> Self {
		Self::Empty
	}
}

impl<T: Into<VNode>> From<Option<T>> for VNode {
	fn from(node: Option<T>) -> Self {
		node.map_or(Self::Empty, Into::into)
	}
}

impl From<Vec<VNode>> for VNode {
	fn from(nodes: Vec<VNode>) -> Self {
		Self::fragment(nodes)
	}
}
