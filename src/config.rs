/// Renderer settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
	/// Maximum element nesting. Deeper trees fail with [`Error::DepthLimit`](`crate::Error::DepthLimit`) instead of overflowing the stack.
	pub max_depth: usize,
	/// Whether rebuilt elements that match the previously focused one (by `id` or class name), or that set `autofocus`, receive focus after the pass.
	pub restore_focus: bool,
	/// Whether declared keys identify children across position changes.
	/// Without this, children are matched by position only.
	pub keyed: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			max_depth: 512,
			restore_focus: true,
			keyed: true,
		}
	}
}
