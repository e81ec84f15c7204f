pub mod chat_client;
pub mod image_client;
pub mod metrics;
pub mod poller;
pub mod quota_manager;
pub mod quota_policy;
pub mod quota_store;
pub mod redis;
pub mod story_book;
pub mod story_formatter;
pub mod upstream;

pub use chat_client::ChatClient;
pub use image_client::ImageClient;
pub use metrics::*;
pub use poller::JobPoller;
pub use quota_manager::*;
pub use quota_policy::*;
pub use quota_store::*;
pub use self::redis::RedisService;
pub use story_book::StoryBookService;
