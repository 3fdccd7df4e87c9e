use crate::core::builtin_presets::load_builtin_presets;
use crate::core::generation::SamplingParams;
use serde::{Deserialize, Serialize};

pub const CUSTOM_PRESET_ID: &str = "custom";

/// A named bundle of sampling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylePreset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: SamplingParams,
}

/// Manages built-in and user-defined style presets
pub struct PresetManager {
    builtin: Vec<StylePreset>,
    user: Vec<StylePreset>,
}

impl PresetManager {
    /// Create a manager with the shipped presets plus the given user presets
    pub fn new(user_presets: Vec<StylePreset>) -> Self {
        Self {
            builtin: load_builtin_presets(),
            user: user_presets,
        }
    }

    /// Built-in presets first, then user presets
    pub fn list_presets(&self) -> impl Iterator<Item = &StylePreset> {
        self.builtin.iter().chain(self.user.iter())
    }

    pub fn user_presets(&self) -> &[StylePreset] {
        &self.user
    }

    pub fn is_builtin(&self, id: &str) -> bool {
        self.builtin.iter().any(|preset| preset.id == id)
    }

    /// Find a preset by its ID. User presets shadow nothing; built-ins win.
    pub fn find_preset_by_id(&self, id: &str) -> Option<&StylePreset> {
        self.list_presets().find(|preset| preset.id == id)
    }

    /// Return the first preset whose parameters equal `params`, or `None`
    /// when the current settings are custom.
    pub fn detect(&self, params: &SamplingParams) -> Option<&StylePreset> {
        self.list_presets()
            .find(|preset| preset.parameters == *params)
    }

    /// Id of the matching preset, or `"custom"`
    pub fn detect_id(&self, params: &SamplingParams) -> &str {
        self.detect(params)
            .map(|preset| preset.id.as_str())
            .unwrap_or(CUSTOM_PRESET_ID)
    }

    /// Save the given parameters as a user preset and return its id.
    ///
    /// The id is the lowercased name with spaces replaced by underscores; a
    /// numeric suffix is appended when that id would collide with a built-in.
    /// An existing user preset with the same id is replaced.
    pub fn save_user_preset(
        &mut self,
        name: &str,
        description: &str,
        parameters: SamplingParams,
    ) -> Result<String, String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("Preset name cannot be empty".to_string());
        }

        let base_id = name.to_lowercase().replace(' ', "_");
        let mut id = base_id.clone();
        let mut counter = 1;
        while self.is_builtin(&id) || id == CUSTOM_PRESET_ID {
            id = format!("{base_id}_{counter}");
            counter += 1;
        }

        let preset = StylePreset {
            id: id.clone(),
            name: name.to_string(),
            description: description.trim().to_string(),
            parameters,
        };

        match self.user.iter_mut().find(|existing| existing.id == id) {
            Some(existing) => *existing = preset,
            None => self.user.push(preset),
        }
        Ok(id)
    }

    /// Delete a user preset. Built-in presets cannot be removed.
    pub fn delete_user_preset(&mut self, id: &str) -> Result<StylePreset, String> {
        if self.is_builtin(id) {
            return Err(format!("Preset '{id}' is built in and cannot be deleted"));
        }
        match self.user.iter().position(|preset| preset.id == id) {
            Some(index) => Ok(self.user.remove(index)),
            None => Err(format!("Preset '{id}' not found")),
        }
    }

    /// Merge presets from another source; imported entries replace user
    /// presets with the same id. Returns how many ids were new.
    pub fn import(&mut self, presets: &[StylePreset]) -> usize {
        let mut added = 0;
        for preset in presets {
            if self.is_builtin(&preset.id) {
                continue;
            }
            match self.user.iter_mut().find(|existing| existing.id == preset.id) {
                Some(existing) => *existing = preset.clone(),
                None => {
                    self.user.push(preset.clone());
                    added += 1;
                }
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_builtin_and_custom() {
        let manager = PresetManager::new(Vec::new());
        assert_eq!(manager.detect_id(&SamplingParams::default()), "balanced");

        let creative = manager.find_preset_by_id("creative").unwrap().parameters;
        assert_eq!(manager.detect_id(&creative), "creative");

        let tweaked = SamplingParams {
            temperature: 0.55,
            ..SamplingParams::default()
        };
        assert_eq!(manager.detect_id(&tweaked), CUSTOM_PRESET_ID);
        assert!(manager.detect(&tweaked).is_none());
    }

    #[test]
    fn saving_avoids_builtin_ids() {
        let mut manager = PresetManager::new(Vec::new());
        let params = SamplingParams {
            temperature: 0.9,
            ..SamplingParams::default()
        };

        let id = manager.save_user_preset("Creative", "mine", params).unwrap();
        assert_eq!(id, "creative_1");
        assert_eq!(manager.find_preset_by_id("creative_1").unwrap().name, "Creative");

        let id = manager.save_user_preset("My Style", "", params).unwrap();
        assert_eq!(id, "my_style");
        assert_eq!(manager.detect_id(&params), "creative_1");

        assert!(manager.save_user_preset("   ", "", params).is_err());
    }

    #[test]
    fn saving_same_name_replaces() {
        let mut manager = PresetManager::new(Vec::new());
        manager
            .save_user_preset("Night", "first", SamplingParams::default())
            .unwrap();
        manager
            .save_user_preset("Night", "second", SamplingParams::default())
            .unwrap();
        assert_eq!(manager.user_presets().len(), 1);
        assert_eq!(manager.user_presets()[0].description, "second");
    }

    #[test]
    fn delete_rejects_builtins() {
        let mut manager = PresetManager::new(Vec::new());
        assert!(manager.delete_user_preset("balanced").is_err());
        assert!(manager.delete_user_preset("missing").is_err());

        manager
            .save_user_preset("Temp", "", SamplingParams::default())
            .unwrap();
        let removed = manager.delete_user_preset("temp").unwrap();
        assert_eq!(removed.name, "Temp");
        assert!(manager.user_presets().is_empty());
    }

    #[test]
    fn import_counts_only_new_ids() {
        let existing = StylePreset {
            id: "night".to_string(),
            name: "Night".to_string(),
            description: String::new(),
            parameters: SamplingParams::default(),
        };
        let mut manager = PresetManager::new(vec![existing.clone()]);

        let incoming = vec![
            StylePreset {
                description: "updated".to_string(),
                ..existing
            },
            StylePreset {
                id: "day".to_string(),
                name: "Day".to_string(),
                description: String::new(),
                parameters: SamplingParams::default(),
            },
        ];

        assert_eq!(manager.import(&incoming), 1);
        assert_eq!(manager.user_presets().len(), 2);
        assert_eq!(
            manager.find_preset_by_id("night").unwrap().description,
            "updated"
        );
    }
}
