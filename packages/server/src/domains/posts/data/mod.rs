mod post;

pub use post::PostData;
