//! `property:value;` blocks as an ordered map with lower-cased property names.

/// How [`DeclarationMap::merge`] resolves a property present on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Incoming values replace existing ones.
    #[default]
    NewWins,
    /// Existing values are kept; only new properties are appended.
    OldWins,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationMap {
    entries: Vec<(String, String)>,
}

impl DeclarationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a declaration block. Fragments without a name or value are
    /// dropped and a repeated property keeps its last value.
    pub fn parse(block: &str) -> Self {
        let mut map = Self::new();
        for fragment in block.split(';') {
            let Some((name, value)) = fragment.split_once(':') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                continue;
            }
            map.set(name, value);
        }
        map
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Inserts or replaces in place, keeping the original position.
    pub fn set(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value.to_string();
        } else {
            self.entries.push((name, value.to_string()));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Existing entries keep their order; properties only `incoming` has are
    /// appended in its order.
    pub fn merge(&self, incoming: &DeclarationMap, mode: MergeMode) -> DeclarationMap {
        let mut out = self.clone();
        for (name, value) in incoming.iter() {
            match mode {
                MergeMode::NewWins => out.set(name, value),
                MergeMode::OldWins => {
                    if !out.contains(name) {
                        out.set(name, value);
                    }
                }
            }
        }
        out
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.entries {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
            out.push(';');
        }
        out
    }

    /// True for `display:none`, ignoring case and whitespace.
    pub fn hides_element(&self) -> bool {
        self.get("display")
            .map(|value| {
                let compact: String = value
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_lowercase();
                compact == "none" || compact.starts_with("none!")
            })
            .unwrap_or(false)
    }
}

/// Lower-cases the property names of a raw `style` attribute, leaving
/// values and separators untouched.
pub fn normalize_property_names(style: &str) -> String {
    style
        .split(';')
        .map(|fragment| match fragment.split_once(':') {
            Some((name, value)) => format!("{}:{}", name.to_ascii_lowercase(), value),
            None => fragment.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}
