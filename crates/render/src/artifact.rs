//! The handle returned for a rendered story

use std::fmt;

use serde::Serialize;

use crate::outcome::RootRef;

/// A rendered story root, usable for further assertions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    story_id: String,
    export_name: Option<String>,
    root: RootRef,
}

impl Artifact {
    pub fn new(story_id: impl Into<String>, export_name: Option<String>, root: RootRef) -> Self {
        Self {
            story_id: story_id.into(),
            export_name,
            root,
        }
    }

    pub fn story_id(&self) -> &str {
        &self.story_id
    }

    pub fn export_name(&self) -> Option<&str> {
        self.export_name.as_deref()
    }

    pub fn root(&self) -> &RootRef {
        &self.root
    }

    /// `<storyId>.<exportName>`, or just the story id without an export name.
    pub fn identity(&self) -> String {
        component_identity(&self.story_id, self.export_name.as_deref())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}

pub(crate) fn component_identity(story_id: &str, export_name: Option<&str>) -> String {
    match export_name {
        Some(name) => format!("{}.{}", story_id, name),
        None => story_id.to_string(),
    }
}
