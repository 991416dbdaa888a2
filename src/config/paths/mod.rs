pub mod xdg_root;

pub use xdg_root::{app_data_dir, config_home, data_home, global_config_path, APP_DIR_NAME};
