pub mod catalog;
pub mod classify;
pub mod output;
pub mod resolve;

pub use catalog::{
    cmd_detail, cmd_episodes, cmd_latest, cmd_libraries, cmd_popular, cmd_search, cmd_videos,
};
pub use classify::cmd_classify;
pub use resolve::cmd_resolve;
