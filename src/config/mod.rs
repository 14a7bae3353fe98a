//! Unified configuration system.
//!
//! Consolidates configuration from tiers with field-by-field YAML merging:
//! 1. **Defaults** - compiled into the binary
//! 2. **Project** - `$CWD/taskstreak/config.yaml`
//! 3. **User** - `~/.taskstreak/config.yaml`
//! 4. **Environment** - variables below
//!
//! ## Environment Variables
//! - `TASKSTREAK_CONFIG_PATH` - Explicit config file (skips the file tiers)
//! - `TASKSTREAK_DB_PATH` - Database path
//! - `TASKSTREAK_USER_DIR` - User config dir (default: `~/.taskstreak`)
//! - `TASKSTREAK_PROJECT_DIR` - Project config dir (default: `./taskstreak`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::deep_merge;
pub use types::*;
