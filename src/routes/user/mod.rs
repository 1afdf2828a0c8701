mod handler;
mod model;

pub use handler::{SESSION_COOKIE, login, login_form, logout, register, register_form};
pub use model::{
    CurrentUser, NewUser, RegisterForm, Session, User, password_policy_errors, safe_next,
};
