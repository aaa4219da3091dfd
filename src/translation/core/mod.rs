//! 翻译系统核心模块
//!
//! 把文本管道和存储层组合成完整的页面处理流程。
//!
//! ## 模块依赖关系
//!
//! ```text
//! PageSession (session.rs)
//!     ├── ContentSegmenter (pipeline/segmenter.rs)
//!     ├── TranslationService (service.rs)
//!     │       ├── WordCache (storage/cache.rs)
//!     │       ├── RequestScheduler (scheduler.rs)
//!     │       └── TranslationBackend (remote.rs)
//!     ├── TextReplacer (engine.rs)
//!     ├── DictionaryService (storage/dictionary.rs)
//!     └── AudioPlayer (audio.rs)
//! ```

pub mod audio;
pub mod engine;
pub mod remote;
pub mod scheduler;
pub mod service;
pub mod session;

pub use audio::{play_with_fallback, AudioPlayer};
pub use engine::{restore_all, restore_element, TextReplacer};
pub use remote::{ChatCompletionClient, RemoteWord, TranslationBackend, WordRequest};
pub use scheduler::RequestScheduler;
pub use service::{Replacement, TextTranslation, TranslationService};
pub use session::{PageSession, PassReport};
