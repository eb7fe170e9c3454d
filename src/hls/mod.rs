pub mod rewrite;

pub use rewrite::{BaseRef, RewriteContext, is_playlist_path, rewrite_playlist};
