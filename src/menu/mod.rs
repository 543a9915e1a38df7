//! Navigation menu, per-role menu permissions and route protection.
//!
//! Permission rows and the menu catalog are cached per process for a fixed
//! TTL; any write through this module invalidates the affected entries, other
//! writers are picked up when the TTL lapses.

pub mod cache;
pub mod handlers;
pub mod items;
pub mod permissions;
pub mod route_guard;
pub mod tree;
pub mod types;

pub use handlers::configure;
pub use permissions::{MenuPermissionService, PermissionSource, RolePermissions};
pub use route_guard::{RouteDecision, RoutePermissionGuard};
pub use tree::build_menu_tree;
pub use types::{MenuAccess, MenuAction, MenuItem, MenuNode, RoleMenuPermission};
