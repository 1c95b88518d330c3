//! # HTTP リクエストハンドラ
//!
//! ```text
//! handler.rs          # 親モジュール（re-export）
//! └── handler/
//!     ├── health.rs   # Liveness / Readiness
//!     └── kv.rs       # キー・バリュー操作
//! ```

pub mod health;
pub mod kv;

pub use health::{health_check, readiness_check};
pub use kv::{delete_value, get_value, increment_value, put_value};
