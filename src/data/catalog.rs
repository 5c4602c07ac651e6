//! Editorial content attached to emission posts: explanatory text, icon and
//! the keys of the chart, table or image illustrating the post.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Catalog entry valid for every activity.
pub const ACTIVITY_BOTH: &str = "BOTH";

fn default_activity() -> String {
    ACTIVITY_BOTH.to_string()
}

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteContent {
    /// Level-1 post code
    pub poste_l1_code: String,
    /// Explanatory paragraph
    #[serde(default)]
    pub text: String,
    /// Icon name
    #[serde(default)]
    pub icone: Option<String>,
    /// Chart key, e.g. `TRAVAUX_BREAKDOWN`
    #[serde(default)]
    pub chart_key: Option<String>,
    /// Static image key, e.g. `DIGESTEUR_SCHEMA`
    #[serde(default)]
    pub image_key: Option<String>,
    /// Detail table key, e.g. `EM_INDIRECTES_TABLE`
    #[serde(default)]
    pub table_key: Option<String>,
    /// `EU`, `AEP` or `BOTH`
    #[serde(default = "default_activity")]
    pub activity: String,
}

impl PosteContent {
    fn normalized(mut self) -> Self {
        fn clean(key: Option<String>) -> Option<String> {
            key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
        }
        self.icone = clean(self.icone);
        self.chart_key = clean(self.chart_key);
        self.image_key = clean(self.image_key);
        self.table_key = clean(self.table_key);
        self.text = self.text.trim().to_string();
        let activity = self.activity.trim().to_uppercase();
        self.activity = if activity.is_empty() {
            default_activity()
        } else {
            activity
        };
        self
    }
}

/// Lookup of [`PosteContent`] by post code and activity.
#[derive(Debug, Clone, Default)]
pub struct ContentCatalog {
    entries: HashMap<String, Vec<PosteContent>>,
}

impl ContentCatalog {
    /// Build the catalog; blank keys are treated as absent.
    pub fn new(rows: Vec<PosteContent>) -> Self {
        let mut entries: HashMap<String, Vec<PosteContent>> = HashMap::new();
        for row in rows {
            let row = row.normalized();
            entries
                .entry(row.poste_l1_code.clone())
                .or_default()
                .push(row);
        }
        Self { entries }
    }

    /// Content for a post: the entry for `activity` if any, else the
    /// `BOTH` entry, else the first entry listed for the post.
    pub fn get(&self, code: &str, activity: &str) -> Option<&PosteContent> {
        let candidates = self.entries.get(code)?;
        candidates
            .iter()
            .find(|c| c.activity == activity)
            .or_else(|| candidates.iter().find(|c| c.activity == ACTIVITY_BOTH))
            .or_else(|| candidates.first())
    }

    /// Number of distinct posts described.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
