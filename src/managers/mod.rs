// bookmark-admin state managers
// Managers handle direct record-level work on the local store.

pub mod bookmark_manager;
