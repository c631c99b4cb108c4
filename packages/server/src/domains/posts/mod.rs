pub mod data;
pub mod machine;
pub mod models;

pub use data::PostData;
pub use machine::PostStatus;
pub use models::Post;
