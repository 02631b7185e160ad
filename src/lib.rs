//! A small virtual-tree renderer.
//!
//! Build immutable trees with [`el`] and [`Props`], then [`Renderer::mount`] them into a live tree provided by a [`Host`].
//! Each mount is diffed against the tree previously mounted into the same root,
//! so that only what changed is written and focused inputs, cursors and event listeners survive re-renders.
//!
//! Two hosts are included: [`web::WebHost`] for the browser DOM and [`arena::ArenaDocument`], a headless in-memory tree.

#![doc(html_root_url = "https://docs.rs/sapling-dom/0.1.0")]
#![warn(clippy::pedantic)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod arena;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod node;
pub mod reconcile;
mod renderer;
pub mod web;

pub use crate::{
	config::Config,
	error::Error,
	event::Binding,
	host::{Dispatcher, Host},
	node::{el, text, Element, Event, Handler, Prop, PropKind, Props, Text, VNode, Value, FRAGMENT_TYPE},
	renderer::Renderer,
};
