pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<tenderlens_storage::Error> for Error {
	fn from(err: tenderlens_storage::Error) -> Self {
		match err {
			tenderlens_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			tenderlens_storage::Error::SerdeJson(inner) =>
				Self::Storage { message: inner.to_string() },
			tenderlens_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			tenderlens_storage::Error::NotFound(message) => Self::NotFound { message },
			tenderlens_storage::Error::Conflict(message) => Self::Conflict { message },
			tenderlens_storage::Error::Qdrant(inner) => Self::Index { message: inner.to_string() },
		}
	}
}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Index { message: err.to_string() }
	}
}
