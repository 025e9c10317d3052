pub mod asset_repo;
pub mod conversation_repo;
pub mod job_repo;

pub use asset_repo::AssetRepo;
pub use conversation_repo::ConversationRepo;
pub use job_repo::JobRepo;
