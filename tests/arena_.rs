#![allow(dead_code)]

use sapling_dom::{
	arena::{ArenaDocument, Mutation, NodeId},
	Renderer,
};
use tracing::Level;

pub fn init_logging() {
	// Fails harmlessly if another test in this binary got there first.
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(Level::TRACE).try_init();
}

/// A fresh document with a renderer targeting it, plus the body to mount into.
pub fn fixture() -> (ArenaDocument, Renderer<ArenaDocument>, NodeId) {
	init_logging();
	let document = ArenaDocument::new();
	let body = document.body();
	let renderer = Renderer::new(document.clone());
	(document, renderer, body)
}

pub fn structural(mutations: &[Mutation]) -> usize {
	mutations.iter().filter(|mutation| mutation.is_structural()).count()
}
