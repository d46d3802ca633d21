// bookmark-admin services
// Services provide the operations themselves plus settings and log setup.

pub mod logging;
pub mod order_backfill;
pub mod settings_engine;
