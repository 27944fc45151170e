use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: usize,
    pub handle: String,
    pub is_admin: bool,
}
