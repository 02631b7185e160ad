#![cfg(target_arch = "wasm32")]

use sapling_dom::{el, text, Props, VNode};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);

mod web_;
use web_::fixture;

#[wasm_bindgen_test]
fn text_node() {
	test_create_diff_identical_remove(|| text("Hello sapling-dom text!"), "Hello sapling-dom text!");
}

#[wasm_bindgen_test]
fn fragment() {
	test_create_diff_identical_remove(
		|| VNode::fragment([text("Hello sapling-dom"), text(" multiple "), text("nodes!")]),
		"<div>Hello sapling-dom multiple nodes!</div>",
	);
}

#[wasm_bindgen_test]
fn keyed() {
	test_create_diff_identical_remove(
		|| {
			el(
				"ul",
				Props::new().children([
					el("li", Props::new().key("0").child("Hello")),
					el("li", Props::new().key("0").child("duplicate")), // Intentionally the same as above.
					el("li", Props::new().key("1").child("keys")),
				]),
			)
		},
		"<ul><li>Hello</li><li>duplicate</li><li>keys</li></ul>",
	);
}

#[wasm_bindgen_test]
fn minimal_div() {
	test_create_diff_identical_remove(|| el("div", Props::new()), "<div></div>");
}

#[wasm_bindgen_test]
fn clickable_div() {
	test_create_diff_identical_remove(|| el("div", Props::new().on("click", |_| ())), "<div></div>");
}

#[wasm_bindgen_test]
fn attributes_and_state() {
	test_create_diff_identical_remove(
		|| el("input", Props::new().attr("id", "agree").attr("type", "checkbox").flag("checked", true).class("big")),
		r#"<input id="agree" type="checkbox" class="big">"#,
	);
}

fn test_create_diff_identical_remove(vdom: impl Fn() -> VNode, expected_html: &str) {
	let (container, mut renderer, root) = fixture();

	renderer.mount(root, vdom()).unwrap();
	assert_eq!(container.inner_html(), expected_html);
	let first = container.first_child();

	renderer.mount(root, vdom()).unwrap();
	assert_eq!(container.inner_html(), expected_html);
	assert!(container.first_child().unwrap().is_same_node(first.as_ref()));

	renderer.mount(root, VNode::Empty).unwrap();
	assert_eq!(container.inner_html(), "");
	assert_eq!(renderer.handler_count(root, "click"), 0);

	container.remove();
}
