//! PostgreSQL implementations of the store traits.

pub mod batch;
pub mod credential;
pub mod keyword;
pub mod post;

pub use batch::BatchRepository;
pub use credential::CredentialRepository;
pub use keyword::KeywordRepository;
pub use post::PostRepository;
