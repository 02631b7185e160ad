#![cfg(target_arch = "wasm32")]

use sapling_dom::{el, Props, VNode};
use std::{cell::RefCell, rc::Rc};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::HtmlElement;

wasm_bindgen_test_configure!(run_in_browser);

mod web_;
use web_::{document, fixture};

#[wasm_bindgen_test]
fn click() {
	let (container, mut renderer, root) = fixture();
	let click_count = Rc::new(RefCell::new(0));

	let vdom = || {
		let click_count = Rc::clone(&click_count);
		el(
			"button",
			Props::new().attr("id", "test-button").on("click", move |event| {
				assert_eq!(event.name, "click");
				*click_count.borrow_mut() += 1;
			}),
		)
	};

	assert_eq!(*click_count.borrow(), 0);
	renderer.mount(root, vdom()).unwrap();
	assert_eq!(*click_count.borrow(), 0);

	let button: HtmlElement = document().get_element_by_id("test-button").unwrap().dyn_into().unwrap();
	button.click();
	assert_eq!(*click_count.borrow(), 1);

	// A new closure each render, but still one native listener.
	renderer.mount(root, vdom()).unwrap();
	button.click();
	assert_eq!(*click_count.borrow(), 2);

	renderer.mount(root, VNode::Empty).unwrap();
	button.click();
	assert_eq!(*click_count.borrow(), 2);

	container.remove();
}

#[wasm_bindgen_test]
fn bound_alongside_rendered() {
	let (container, mut renderer, root) = fixture();
	let log = Rc::new(RefCell::new(Vec::new()));

	let rendered = {
		let log = Rc::clone(&log);
		el("button", Props::new().on("click", move |_| log.borrow_mut().push("rendered")))
	};
	renderer.mount(root, rendered).unwrap();

	let button = container.first_child().unwrap();
	let node = renderer.host_mut().handle(&button);
	let binding = {
		let log = Rc::clone(&log);
		renderer.bind(node, "click", sapling_dom::Handler::new(move |_| log.borrow_mut().push("bound"))).unwrap()
	};

	button.unchecked_ref::<HtmlElement>().click();
	assert_eq!(*log.borrow(), ["rendered", "bound"]);

	assert!(renderer.release_binding(binding).unwrap());
	button.unchecked_ref::<HtmlElement>().click();
	assert_eq!(*log.borrow(), ["rendered", "bound", "rendered"]);

	container.remove();
}
