// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Final prompt assembly from a preset template and user text.

use pictor_core::PictorError;
use pictor_core::types::{PresetTemplate, USER_TEXT_PLACEHOLDER};

/// Separator placed between a template without placeholder and the user text.
pub const APPEND_SEPARATOR: &str = "\n";

/// Builds the prompt sent to the provider.
///
/// - No preset: the user text.
/// - Template containing `{{userText}}`: every occurrence is replaced.
/// - Otherwise the user text is appended after [`APPEND_SEPARATOR`], or the
///   template is used as is when there is no user text.
///
/// An empty result is [`PictorError::PromptBuildFailed`].
pub fn build_prompt(preset: Option<&PresetTemplate>, user_text: &str) -> Result<String, PictorError> {
    let user_text = user_text.trim();
    let prompt = match preset {
        None => user_text.to_string(),
        Some(preset) => merge(&preset.prompt_template, user_text),
    };
    if prompt.trim().is_empty() {
        return Err(PictorError::PromptBuildFailed);
    }
    Ok(prompt)
}

fn merge(template: &str, user_text: &str) -> String {
    if template.contains(USER_TEXT_PLACEHOLDER) {
        template.replace(USER_TEXT_PLACEHOLDER, user_text)
    } else if user_text.is_empty() {
        template.to_string()
    } else {
        format!("{template}{APPEND_SEPARATOR}{user_text}")
    }
}

#[cfg(test)]
mod tests {
    use pictor_core::types::PresetSource;

    use super::*;

    fn preset(template: &str) -> PresetTemplate {
        PresetTemplate {
            id: 1,
            name: "p".into(),
            prompt_template: template.into(),
            source: PresetSource::User,
            enabled: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn placeholder_is_replaced_everywhere() {
        let p = preset("draw: {{userText}}, again {{userText}}");
        assert_eq!(
            build_prompt(Some(&p), "a cat").unwrap(),
            "draw: a cat, again a cat"
        );
    }

    #[test]
    fn text_is_appended_without_placeholder() {
        let p = preset("figurine style");
        assert_eq!(
            build_prompt(Some(&p), " a cat ").unwrap(),
            "figurine style\na cat"
        );
        assert_eq!(build_prompt(Some(&p), "").unwrap(), "figurine style");
    }

    #[test]
    fn no_preset_uses_user_text() {
        assert_eq!(build_prompt(None, "a dog").unwrap(), "a dog");
    }

    #[test]
    fn empty_prompt_fails() {
        assert!(matches!(
            build_prompt(None, "   "),
            Err(PictorError::PromptBuildFailed)
        ));
        assert!(matches!(
            build_prompt(Some(&preset("{{userText}}")), ""),
            Err(PictorError::PromptBuildFailed)
        ));
    }
}
