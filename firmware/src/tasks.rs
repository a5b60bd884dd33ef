//! タスクモジュール
//!
//! 各タスクの実装を分離して管理します。

pub mod command;
pub mod control;
pub mod outer_loop;
pub mod torque_loop;

// タスク関数を再エクスポート
pub use command::command_task;
pub use control::control_task;
pub use outer_loop::outer_loop_task;
pub use torque_loop::torque_loop_task;
