use sapling_dom::{arena::Mutation, el, Event, Handler, Props, VNode};
use std::{cell::RefCell, rc::Rc};

mod arena_;
use arena_::fixture;

type Log = Rc<RefCell<Vec<&'static str>>>;

fn logger(log: &Log, entry: &'static str) -> Handler {
	let log = Rc::clone(log);
	Handler::new(move |_| log.borrow_mut().push(entry))
}

fn button(onclick: Option<Handler>) -> VNode {
	let props = Props::new().attr("type", "button");
	el(
		"button",
		match onclick {
			Some(handler) => props.on_handler("click", handler),
			None => props,
		},
	)
}

#[test]
fn handlers_fan_out_in_order() {
	let (document, mut renderer, body) = fixture();
	let log = Log::default();
	renderer.mount(body, button(Some(logger(&log, "rendered")))).unwrap();
	let node = document.child_nodes(body)[0];

	let _first = renderer.bind(node, "click", logger(&log, "first")).unwrap();
	let _second = renderer.bind(node, "click", logger(&log, "second")).unwrap();
	assert_eq!(renderer.handler_count(node, "click"), 3);
	assert_eq!(document.listener_count(), 1);

	assert!(document.dispatch(node, &Event::new("click")));
	assert_eq!(*log.borrow(), ["rendered", "first", "second"]);
}

#[test]
fn releasing_the_last_binding_uninstalls_the_dispatcher() {
	let (document, mut renderer, body) = fixture();
	let log = Log::default();
	renderer.mount(body, button(None)).unwrap();
	let node = document.child_nodes(body)[0];

	let binding = renderer.bind(node, "click", logger(&log, "bound")).unwrap();
	assert_eq!(binding.event(), "click");
	assert_eq!(document.listener_count(), 1);

	assert!(renderer.release_binding(binding.clone()).unwrap());
	assert_eq!(document.listener_count(), 0);
	assert!(!document.dispatch(node, &Event::new("click")));
	assert!(log.borrow().is_empty());

	// Already released.
	assert!(!renderer.release_binding(binding).unwrap());
}

#[test]
fn unbinding_an_unknown_handler_is_a_no_op() {
	let (document, mut renderer, body) = fixture();
	let log = Log::default();
	renderer.mount(body, button(None)).unwrap();
	let node = document.child_nodes(body)[0];

	assert!(!renderer.unbind(node, "click", &logger(&log, "never bound")).unwrap());

	let _bound = renderer.bind(node, "click", logger(&log, "bound")).unwrap();
	assert!(!renderer.unbind(node, "click", &logger(&log, "other")).unwrap());
	assert!(!renderer.unbind(node, "input", &logger(&log, "other")).unwrap());
	assert_eq!(renderer.handler_count(node, "click"), 1);
}

#[test]
fn duplicate_bindings_are_counted_separately() {
	let (document, mut renderer, body) = fixture();
	let log = Log::default();
	renderer.mount(body, button(None)).unwrap();
	let node = document.child_nodes(body)[0];

	let handler = logger(&log, "twice");
	let first = renderer.bind(node, "click", handler.clone()).unwrap();
	let _second = renderer.bind(node, "click", handler).unwrap();

	document.dispatch(node, &Event::new("click"));
	assert_eq!(*log.borrow(), ["twice", "twice"]);

	assert!(renderer.release_binding(first).unwrap());
	assert_eq!(renderer.handler_count(node, "click"), 1);
	assert_eq!(document.listener_count(), 1);
}

#[test]
fn replacing_a_rendered_handler_keeps_the_listener() {
	let (document, mut renderer, body) = fixture();
	let log = Log::default();
	renderer.mount(body, button(Some(logger(&log, "old")))).unwrap();
	let node = document.child_nodes(body)[0];
	document.take_mutations();

	renderer.mount(body, button(Some(logger(&log, "new")))).unwrap();
	let mutations = document.take_mutations();
	assert!(!mutations
		.iter()
		.any(|mutation| matches!(mutation, Mutation::Listen { .. } | Mutation::Unlisten { .. })));
	assert_eq!(renderer.handler_count(node, "click"), 1);
	assert_eq!(document.listener_count(), 1);

	document.dispatch(node, &Event::new("click"));
	assert_eq!(*log.borrow(), ["new"]);
}

#[test]
fn same_handler_across_renders_is_untouched() {
	let (document, mut renderer, body) = fixture();
	let log = Log::default();
	let handler = logger(&log, "stable");
	renderer.mount(body, button(Some(handler.clone()))).unwrap();
	document.take_mutations();

	renderer.mount(body, button(Some(handler))).unwrap();
	assert!(document.take_mutations().is_empty());
}

#[test]
fn removing_a_handler_prop_unbinds_it() {
	let (document, mut renderer, body) = fixture();
	let log = Log::default();
	renderer.mount(body, button(Some(logger(&log, "rendered")))).unwrap();
	let node = document.child_nodes(body)[0];

	renderer.mount(body, button(None)).unwrap();
	assert_eq!(renderer.handler_count(node, "click"), 0);
	assert!(!document.dispatch(node, &Event::new("click")));
}

#[test]
fn handlers_may_bind_while_dispatching() {
	let (document, renderer, body) = fixture();
	let renderer = Rc::new(RefCell::new(renderer));
	renderer.borrow_mut().mount(body, button(None)).unwrap();
	let node = document.child_nodes(body)[0];

	let log = Log::default();
	let late = logger(&log, "late");
	let bindings = Rc::new(RefCell::new(Vec::new()));
	let reentrant = {
		let log = Rc::clone(&log);
		let renderer = Rc::clone(&renderer);
		let bindings = Rc::clone(&bindings);
		Handler::new(move |_| {
			log.borrow_mut().push("first");
			if bindings.borrow().is_empty() {
				let binding = renderer.borrow_mut().bind(node, "click", late.clone()).unwrap();
				bindings.borrow_mut().push(binding);
			}
		})
	};
	let _reentrant = renderer.borrow_mut().bind(node, "click", reentrant).unwrap();

	// The handler bound during dispatch only sees later events.
	document.dispatch(node, &Event::new("click"));
	assert_eq!(*log.borrow(), ["first"]);
	document.dispatch(node, &Event::new("click"));
	assert_eq!(*log.borrow(), ["first", "first", "late"]);
}

#[test]
fn removed_nodes_drop_their_handlers() {
	let (document, mut renderer, body) = fixture();
	let state = Rc::new(());
	let handler = {
		let state = Rc::clone(&state);
		Handler::new(move |_| {
			let _ = &state;
		})
	};
	renderer.mount(body, el("div", Props::new().child(button(Some(handler))))).unwrap();
	let node = document.child_nodes(document.child_nodes(body)[0])[0];
	assert_eq!(Rc::strong_count(&state), 2);

	renderer.mount(body, el("div", Props::new())).unwrap();
	assert_eq!(renderer.handler_count(node, "click"), 0);
	assert_eq!(document.listener_count(), 0);
	assert_eq!(Rc::strong_count(&state), 1);
}

#[test]
fn event_payload_reaches_handlers() {
	let (document, mut renderer, body) = fixture();
	let seen = Rc::new(RefCell::new(None));
	let input = {
		let seen = Rc::clone(&seen);
		el(
			"input",
			Props::new().on("input", move |event: &Event| *seen.borrow_mut() = event.value.clone()),
		)
	};
	renderer.mount(body, input).unwrap();
	let node = document.child_nodes(body)[0];

	document.dispatch(
		node,
		&Event {
			value: Some("typed".to_owned()),
			..Event::new("input")
		},
	);
	assert_eq!(seen.borrow().as_deref(), Some("typed"));
}

#[test]
fn handlers_may_rerender() {
	let (document, renderer, body) = fixture();
	let renderer = Rc::new(RefCell::new(renderer));
	let counter = Rc::new(RefCell::new(0));

	fn view(count: i32, on_click: Handler) -> VNode {
		el("button", Props::new().on_handler("click", on_click).child(count))
	}

	// The handler re-renders itself, so it reaches itself through a weak slot.
	let slot: Rc<RefCell<Option<Handler>>> = Rc::default();
	let handler = {
		let renderer = Rc::downgrade(&renderer);
		let counter = Rc::clone(&counter);
		let slot = Rc::downgrade(&slot);
		Handler::new(move |_| {
			*counter.borrow_mut() += 1;
			let handler = slot.upgrade().and_then(|slot| slot.borrow().clone());
			if let (Some(renderer), Some(handler)) = (renderer.upgrade(), handler) {
				renderer.borrow_mut().mount(body, view(*counter.borrow(), handler)).unwrap();
			}
		})
	};
	*slot.borrow_mut() = Some(handler.clone());
	renderer.borrow_mut().mount(body, view(0, handler)).unwrap();

	let button = document.child_nodes(body)[0];
	document.dispatch(button, &Event::new("click"));
	document.dispatch(button, &Event::new("click"));
	assert_eq!(document.inner_html(body), "<button>2</button>");
	assert_eq!(document.child_nodes(body), [button]);
	assert_eq!(document.listener_count(), 1);
}
