#![cfg(target_arch = "wasm32")]
#![allow(dead_code)]

use sapling_dom::{
	web::{WebHost, WebNode},
	Renderer,
};
use std::sync::Once;
use wasm_bindgen::JsCast;
use web_sys::{window, Document, HtmlBodyElement, HtmlElement};

static LOG_INIT: Once = Once::new();

pub fn document() -> Document {
	LOG_INIT.call_once(tracing_wasm::set_as_global_default);
	window().unwrap().document().unwrap()
}

/// A fresh `<div>` appended to the body, with a renderer whose host tracks it.
pub fn fixture() -> (HtmlElement, Renderer<WebHost>, WebNode) {
	let document = document();
	let body = document.body().unwrap().dyn_into::<HtmlBodyElement>().unwrap();
	let container = document.create_element("div").unwrap().dyn_into::<HtmlElement>().unwrap();
	body.append_child(&container).unwrap();

	let mut host = WebHost::new(document);
	let root = host.handle(container.as_ref());
	(container, Renderer::new(host), root)
}
