use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::schema::{departments, designations, employees, roles};
use crate::core::shared::utils::double_option;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = departments)]
pub struct Department {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = departments)]
pub struct NewDepartment {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = departments)]
pub struct DepartmentChangeset {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DepartmentUpdateRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DepartmentListQuery {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = designations)]
pub struct Designation {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub department_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentRef {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DesignationView {
    #[serde(flatten)]
    pub designation: Designation,
    pub department: Option<DepartmentRef>,
}

impl DesignationView {
    pub fn new(designation: Designation, department: Option<(i32, String)>) -> Self {
        Self {
            designation,
            department: department.map(|(id, name)| DepartmentRef { id, name }),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = designations)]
pub struct NewDesignation {
    pub name: String,
    pub description: Option<String>,
    pub department_id: i32,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = designations)]
pub struct DesignationChangeset {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub department_id: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DesignationRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub department_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DesignationUpdateRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub department_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DesignationListQuery {
    pub search: Option<String>,
    pub department_id: Option<i32>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = roles)]
pub struct Role {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub department_id: Option<i32>,
    pub is_management: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = roles)]
pub struct NewRole {
    pub title: String,
    pub description: Option<String>,
    pub department_id: Option<i32>,
    pub is_management: bool,
    pub status: String,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = roles)]
pub struct RoleChangeset {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub department_id: Option<Option<i32>>,
    pub is_management: Option<bool>,
    pub status: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub department_id: Option<i32>,
    #[serde(default)]
    pub is_management: bool,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleUpdateRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub department_id: Option<Option<i32>>,
    pub is_management: Option<bool>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
}

pub const ROLE_STATUSES: &[&str] = &["active", "inactive"];

pub fn parse_role_status(status: &str) -> Result<String, String> {
    let normalized = status.trim().to_ascii_lowercase();
    if ROLE_STATUSES.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(format!("Invalid role status: {status}"))
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = employees)]
pub struct Employee {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<i32>,
    pub designation_id: Option<i32>,
    pub role_id: Option<i32>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: Employee,
    pub role_title: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = employees)]
pub struct NewEmployee {
    pub username: String,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<i32>,
    pub designation_id: Option<i32>,
    pub role_id: Option<i32>,
    pub is_active: bool,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = employees)]
pub struct EmployeeChangeset {
    pub username: Option<String>,
    pub password_hash: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub first_name: Option<String>,
    pub last_name: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub department_id: Option<Option<i32>>,
    pub designation_id: Option<Option<i32>>,
    pub role_id: Option<Option<i32>>,
    pub is_active: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeRequest {
    #[serde(default)]
    pub username: String,
    pub password: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<i32>,
    pub designation_id: Option<i32>,
    pub role_id: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeUpdateRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub department_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub designation_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub role_id: Option<Option<i32>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeListQuery {
    pub search: Option<String>,
    pub department_id: Option<i32>,
    pub role_id: Option<i32>,
    pub is_active: Option<bool>,
}
