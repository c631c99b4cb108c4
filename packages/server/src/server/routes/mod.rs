mod health;
mod posts;

pub use health::health_handler;
pub use posts::{
    analyze_post, create_post, delete_post, edit_post, get_post, list_posts, retry_post,
    rewrite_post, schedule_post, search_posts, trigger_generate,
};
