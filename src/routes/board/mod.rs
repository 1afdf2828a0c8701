mod handler;
mod model;

pub use handler::{board_detail, board_list, comment_create, like_toggle};
pub use model::{
    Board, BoardDetail, BoardEntry, BoardPage, Comment, CommentForm, CommentView, Like, PageRequest,
};
