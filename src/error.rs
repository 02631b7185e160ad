use thiserror::Error;

/// Fatal reconciliation errors.
///
/// Shape mismatches between trees are never errors, they are resolved by replacement.
#[derive(Debug, Error)]
pub enum Error<E: std::error::Error + 'static> {
	/// The host failed to perform a capability. The live tree may be partially updated.
	#[error("host operation `{operation}` failed")]
	Host {
		operation: &'static str,
		#[source]
		source: E,
	},

	#[error("virtual tree is nested deeper than the limit of {limit}")]
	DepthLimit { limit: usize },
}

pub(crate) trait During<T, E: std::error::Error + 'static> {
	fn during(self, operation: &'static str) -> Result<T, Error<E>>;
}

impl<T, E: std::error::Error + 'static> During<T, E> for Result<T, E> {
	fn during(self, operation: &'static str) -> Result<T, Error<E>> {
		self.map_err(|source| Error::Host { operation, source })
	}
}
