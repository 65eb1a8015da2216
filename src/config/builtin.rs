//! Patch sets compiled into the binary.

use crate::config::loader::{load_from_str, ConfigError};
use crate::config::schema::PatchConfig;

/// Source of the AudioPlayer synced-lyrics skeleton patch set.
pub const AUDIO_PLAYER_LYRICS_SKELETON: &str =
    include_str!("../../patches/audio-player-lyrics-skeleton.toml");

/// The patch set used when no `--patches` path is given.
pub fn default_patch_set() -> Result<PatchConfig, ConfigError> {
    load_from_str(AUDIO_PLAYER_LYRICS_SKELETON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patch_set_loads() {
        let config = default_patch_set().unwrap();
        assert_eq!(config.meta.name, "audio-player-lyrics-skeleton");
        assert_eq!(
            config.meta.target.as_deref(),
            Some("src/features/player/ui/AudioPlayer/AudioPlayer.tsx")
        );

        let ids: Vec<&str> = config.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "add-synced-lyrics-state",
                "pass-lyrics-setters",
                "drop-has-synced-lyrics-memo",
                "extend-render-conditions",
                "render-skeleton-condition",
                "insert-skeleton-markup",
            ]
        );
    }

    #[test]
    fn test_default_patch_set_compiles() {
        let sequence = default_patch_set().unwrap().sequence().unwrap();
        assert_eq!(sequence.len(), 6);
        assert_eq!(sequence.steps()[2].kind.name(), "regex");
    }

    #[test]
    fn test_skeleton_markup_inserted_once() {
        let sequence = default_patch_set().unwrap().sequence().unwrap();
        let markup = &sequence.steps()[5];
        assert_eq!(markup.unless, vec!["player__lyrics-skeleton\"".to_string()]);

        // The markup replacement still contains its own search text
        let search = markup.kind.search_literal().unwrap();
        let patched = "          ) : shouldRenderSkeleton ? (\n            <div className=\"player__lyrics-skeleton\">\n";
        let buffer = format!("const shouldRenderSkeleton = true;\n{patched}{search}");
        let outcome = markup.apply(buffer.clone());
        assert_eq!(outcome.buffer, buffer);
        assert_eq!(outcome.status, crate::StepStatus::AlreadyApplied);
    }
}
