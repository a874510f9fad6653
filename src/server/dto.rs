use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Level, Program, Student, User};

#[derive(Debug, Deserialize)]
pub struct UserRef {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveLevelRequest {
    pub list_index: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CampListParams {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    /// Endpoint path to display title, for every section the user may open.
    pub endpoints: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    #[serde(flatten)]
    pub student: Student,
    pub guardians: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgramResponse {
    #[serde(flatten)]
    pub program: Program,
    pub owners: Vec<String>,
    pub levels: Vec<Level>,
}
