use sapling_dom::{
	arena::{ArenaDocument, Mutation},
	el, Config, Host as _, Props, Renderer, VNode,
};

mod arena_;
use arena_::{fixture, init_logging};

fn name_field(wrapper: &str, value: &str) -> VNode {
	el(
		wrapper,
		Props::new().child(el("input", Props::new().attr("id", "name").attr("type", "text").value(value))),
	)
}

#[test]
fn autofocus_waits_for_flush() {
	let (document, mut renderer, body) = fixture();
	renderer.mount(body, el("input", Props::new().flag("autofocus", true))).unwrap();
	let input = document.child_nodes(body)[0];

	assert_eq!(document.focused(), None);
	assert_eq!(renderer.pending_deferred(), 1);

	assert_eq!(renderer.flush_deferred().unwrap(), 1);
	assert_eq!(document.focused(), Some(input));
	assert_eq!(renderer.pending_deferred(), 0);
	assert_eq!(renderer.flush_deferred().unwrap(), 0);
}

#[test]
fn rebuilt_input_gets_focus_and_cursor_back() {
	let (document, mut renderer, body) = fixture();
	renderer.mount(body, name_field("div", "Ada")).unwrap();
	let old = document.child_nodes(document.child_nodes(body)[0])[0];

	let mut host = document.clone();
	host.focus(old).unwrap();
	host.set_selection(old, 1, 3).unwrap();

	// A different wrapper forces the input to be rebuilt.
	renderer.mount(body, name_field("section", "Ada")).unwrap();
	let new = document.child_nodes(document.child_nodes(body)[0])[0];
	assert_ne!(new, old);
	assert!(!document.contains(old));

	assert_eq!(renderer.flush_deferred().unwrap(), 1);
	assert_eq!(document.focused(), Some(new));
	assert_eq!(document.selection(new), Some((1, 3)));
}

#[test]
fn focus_survives_in_place_updates() {
	let (document, mut renderer, body) = fixture();
	renderer.mount(body, name_field("div", "Ada")).unwrap();
	let input = document.child_nodes(document.child_nodes(body)[0])[0];
	document.clone().focus(input).unwrap();
	document.take_mutations();

	renderer.mount(body, name_field("div", "Ada L")).unwrap();
	assert_eq!(renderer.pending_deferred(), 0);
	assert_eq!(document.focused(), Some(input));
	assert!(matches!(&document.take_mutations()[..], [Mutation::SetValue { value, .. }] if value == "Ada L"));
}

#[test]
fn focus_target_removed_before_flush_is_skipped() {
	let (document, mut renderer, body) = fixture();
	renderer.mount(body, el("input", Props::new().flag("autofocus", true))).unwrap();
	renderer.mount(body, VNode::Empty).unwrap();

	assert_eq!(renderer.flush_deferred().unwrap(), 0);
	assert_eq!(document.focused(), None);
}

#[test]
fn reused_handle_does_not_inherit_pending_focus() {
	let (document, mut renderer, body) = fixture();
	renderer.mount(body, el("input", Props::new().flag("autofocus", true))).unwrap();
	let input = document.child_nodes(body)[0];

	renderer.mount(body, el("p", Props::new())).unwrap();
	assert!(!document.contains(input));
	assert_eq!(renderer.pending_deferred(), 0);

	// The arena hands out the released slot again.
	renderer.mount(body, el("div", Props::new())).unwrap();
	let div = document.child_nodes(body)[0];
	assert_eq!(div, input);

	assert_eq!(renderer.flush_deferred().unwrap(), 0);
	assert_eq!(document.focused(), None);
}

#[test]
fn focus_held_elsewhere_is_not_stolen() {
	let (document, mut renderer, body) = fixture();
	let view = |extra: bool| {
		el(
			"form",
			Props::new()
				.child(el("input", Props::new().attr("id", "search")))
				.child(extra.then(|| el("input", Props::new().attr("id", "other").flag("autofocus", true)))),
		)
	};
	renderer.mount(body, view(false)).unwrap();
	let search = document.child_nodes(document.child_nodes(body)[0])[0];
	document.clone().focus(search).unwrap();

	renderer.mount(body, view(true)).unwrap();
	assert_eq!(renderer.pending_deferred(), 1);
	assert_eq!(renderer.flush_deferred().unwrap(), 0);
	assert_eq!(document.focused(), Some(search));
}

#[test]
fn focus_restoration_can_be_disabled() {
	init_logging();
	let document = ArenaDocument::new();
	let body = document.body();
	let mut renderer = Renderer::with_config(
		document.clone(),
		Config {
			restore_focus: false,
			..Config::default()
		},
	);

	renderer.mount(body, el("input", Props::new().flag("autofocus", true))).unwrap();
	assert_eq!(renderer.pending_deferred(), 0);
	assert_eq!(renderer.flush_deferred().unwrap(), 0);
	assert_eq!(document.focused(), None);
}
