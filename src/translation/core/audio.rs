//! 发音播放
//!
//! 播放器由宿主环境提供。候选地址依次尝试，每次等待确认的时间有上限，
//! 超时即视为失败，即使播放稍后完成。播放失败不影响学习流程。

use std::time::Duration;

use async_trait::async_trait;

use crate::translation::error::helpers::log_error;
use crate::translation::error::{TranslationError, TranslationResult};

/// 音频播放器
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// 播放一个音频地址，播放开始后返回
    async fn play(&self, url: &str) -> TranslationResult<()>;
}

/// 依次尝试候选地址，任一成功即返回 `true`
pub async fn play_with_fallback(player: &dyn AudioPlayer, urls: &[String], ack_timeout: Duration) -> bool {
    for url in urls {
        let outcome = match tokio::time::timeout(ack_timeout, player.play(url)).await {
            Ok(result) => result,
            Err(elapsed) => Err(TranslationError::from(elapsed)),
        };
        match outcome {
            Ok(()) => {
                tracing::debug!("播放发音: {}", url);
                return true;
            }
            Err(e) => log_error(&e.with_context(format!("播放 {}", url))),
        }
    }

    if !urls.is_empty() {
        tracing::warn!("所有 {} 个发音地址都播放失败", urls.len());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedPlayer {
        attempts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AudioPlayer for ScriptedPlayer {
        async fn play(&self, url: &str) -> TranslationResult<()> {
            self.attempts.lock().unwrap().push(url.to_string());
            if url.contains("slow") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if url.contains("ok") {
                Ok(())
            } else {
                Err(TranslationError::NetworkError("404".to_string()))
            }
        }
    }

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_past_failures_and_timeouts() {
        let player = ScriptedPlayer { attempts: Mutex::new(Vec::new()) };
        let played = play_with_fallback(
            &player,
            &urls(&["missing.ogg", "slow-ok.ogg", "ok.ogg", "unused-ok.ogg"]),
            Duration::from_secs(3),
        )
        .await;

        assert!(played);
        assert_eq!(
            *player.attempts.lock().unwrap(),
            urls(&["missing.ogg", "slow-ok.ogg", "ok.ogg"])
        );
    }

    #[tokio::test]
    async fn test_no_candidates_is_failure() {
        let player = ScriptedPlayer { attempts: Mutex::new(Vec::new()) };
        assert!(!play_with_fallback(&player, &[], Duration::from_secs(1)).await);
    }
}
