mod handler;
mod model;

pub use handler::{create, delete, edit, edit_form, home, new_form};
pub use model::{
    Fruit, RecordForm, RecordInput, TITLE_MAX_LEN, WorshipRecord, WorshipType,
};
